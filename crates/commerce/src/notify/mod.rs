//! Outbound order notifications.
//!
//! Both transports are optional; a missing one is skipped. Notifications run
//! after the database work has committed and never fail the request: every
//! delivery error is logged and swallowed.

pub mod email;
pub mod messages;
pub mod sms;

use thiserror::Error;

use agora_core::Phone;

use crate::db::companies::Shop;
use crate::db::orders::{Order, OrderProduct};
pub use email::{EmailService, SmtpConfig};
pub use messages::EmailMessage;
pub use sms::{SmsClient, SmsConfig};

/// Errors that can occur when sending a notification.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The SMS gateway returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// SMTP transport error.
    #[error("SMTP error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),

    /// Failed to build email message.
    #[error("failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    #[error("invalid email address: {0}")]
    InvalidAddress(String),

    #[error("configuration error: {0}")]
    Config(String),
}

/// Sends order notifications over whatever transports are configured.
#[derive(Clone, Default)]
pub struct Notifier {
    sms: Option<SmsClient>,
    email: Option<EmailService>,
    operator_email: Option<String>,
}

impl Notifier {
    #[must_use]
    pub const fn new(
        sms: Option<SmsClient>,
        email: Option<EmailService>,
        operator_email: Option<String>,
    ) -> Self {
        Self {
            sms,
            email,
            operator_email,
        }
    }

    /// A notifier that sends nothing.
    #[must_use]
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Tell the customer, every shop in the order and the operator about a
    /// new order.
    pub async fn order_placed(&self, order: &Order, products: &[OrderProduct], shops: &[Shop]) {
        self.sms_to(
            &order.customer_phone,
            &messages::order_placed_customer_sms(order),
            order,
        )
        .await;
        self.email_to(
            order.customer_email.as_str(),
            &messages::order_placed_customer_email(order, products),
            order,
        )
        .await;

        for shop in shops {
            let Some(message) = messages::order_placed_shop(order, shop.id, products) else {
                continue;
            };
            if let Some(address) = &shop.email {
                self.email_to(address.as_str(), &message, order).await;
            }
            if let Some(phone) = &shop.phone {
                self.sms_to(phone, &messages::order_placed_shop_sms(order), order)
                    .await;
            }
        }

        if let Some(address) = &self.operator_email {
            self.email_to(address, &messages::order_placed_operator(order, products), order)
                .await;
        }
    }

    /// Tell the customer their order changed status.
    pub async fn order_status_changed(&self, order: &Order) {
        self.sms_to(
            &order.customer_phone,
            &messages::order_status_changed_sms(order),
            order,
        )
        .await;
        self.email_to(
            order.customer_email.as_str(),
            &messages::order_status_changed_email(order),
            order,
        )
        .await;
    }

    async fn sms_to(&self, phone: &Phone, text: &str, order: &Order) {
        let Some(sms) = &self.sms else {
            return;
        };
        if let Err(e) = sms.send(phone, text).await {
            tracing::warn!(order = %order.item_id, error = %e, "Failed to send SMS");
        }
    }

    async fn email_to(&self, address: &str, message: &EmailMessage, order: &Order) {
        let Some(email) = &self.email else {
            return;
        };
        if let Err(e) = email.send(address, message).await {
            tracing::warn!(order = %order.item_id, error = %e, "Failed to send email");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_disabled_notifier_is_a_no_op() {
        let order = messages::tests::order();
        let notifier = Notifier::disabled();
        notifier
            .order_placed(&order, &messages::tests::products(), &[])
            .await;
        notifier.order_status_changed(&order).await;
    }
}
