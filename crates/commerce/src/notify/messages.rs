//! Notification texts.
//!
//! Plain functions of the order data so they can be tested without any
//! transport.

use std::fmt::Write;

use agora_core::{Money, OrderStatus, ShopId};

use crate::db::orders::{Order, OrderProduct};

/// Subject and plain-text body of an email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub subject: String,
    pub body: String,
}

#[must_use]
pub fn order_placed_customer_sms(order: &Order) -> String {
    format!(
        "Order {} accepted. Total {}. We will contact you to confirm it.",
        order.item_id, order.total
    )
}

#[must_use]
pub fn order_placed_customer_email(order: &Order, products: &[OrderProduct]) -> EmailMessage {
    let mut body = format!(
        "Hello, {}!\n\nThank you for your order {}.\n\n",
        order.customer_name, order.item_id
    );
    push_lines(&mut body, products.iter());
    let _ = write!(
        body,
        "\nTotal: {}\n\nWe will contact you shortly to confirm the order.\n",
        order.total
    );
    EmailMessage {
        subject: format!("Order {} accepted", order.item_id),
        body,
    }
}

/// Message for one shop, listing only the lines it fulfils.
///
/// Returns `None` when the order has nothing from this shop.
#[must_use]
pub fn order_placed_shop(
    order: &Order,
    shop_id: ShopId,
    products: &[OrderProduct],
) -> Option<EmailMessage> {
    let lines: Vec<&OrderProduct> = products.iter().filter(|p| p.shop_id == shop_id).collect();
    let first = lines.first()?;
    let shop_total: Money = lines.iter().map(|p| p.total).sum();

    let mut body = format!(
        "New order {} for {}.\n\nCustomer: {}, {}, {}\n",
        order.item_id,
        first.shop_name,
        order.customer_name,
        order.customer_phone,
        order.customer_email
    );
    if !order.comment.is_empty() {
        let _ = writeln!(body, "Comment: {}", order.comment);
    }
    body.push('\n');
    push_lines(&mut body, lines.iter().copied());
    let _ = writeln!(body, "\nTotal for your shop: {shop_total}");

    Some(EmailMessage {
        subject: format!("New order {}", order.item_id),
        body,
    })
}

#[must_use]
pub fn order_placed_shop_sms(order: &Order) -> String {
    format!("New order {} from {}.", order.item_id, order.customer_phone)
}

#[must_use]
pub fn order_placed_operator(order: &Order, products: &[OrderProduct]) -> EmailMessage {
    let mut body = format!(
        "Order {} placed by {} ({}, {}).\n\n",
        order.item_id, order.customer_name, order.customer_phone, order.customer_email
    );
    push_lines(&mut body, products.iter());
    let _ = writeln!(body, "\nTotal: {}", order.total);
    EmailMessage {
        subject: format!("[orders] {} {}", order.item_id, order.total),
        body,
    }
}

#[must_use]
pub fn order_status_changed_sms(order: &Order) -> String {
    format!("Order {}: {}.", order.item_id, status_text(order.status))
}

#[must_use]
pub fn order_status_changed_email(order: &Order) -> EmailMessage {
    EmailMessage {
        subject: format!("Order {} update", order.item_id),
        body: format!(
            "Hello, {}!\n\nYour order {}: {}.\n",
            order.customer_name,
            order.item_id,
            status_text(order.status)
        ),
    }
}

const fn status_text(status: OrderStatus) -> &'static str {
    match status {
        OrderStatus::Pending => "received and waiting for confirmation",
        OrderStatus::Confirmed => "confirmed",
        OrderStatus::Ready => "ready for pickup",
        OrderStatus::Done => "completed, thank you",
        OrderStatus::Canceled => "canceled",
    }
}

fn push_lines<'a>(body: &mut String, products: impl Iterator<Item = &'a OrderProduct>) {
    for p in products {
        let _ = writeln!(
            body,
            "- {} ({}) x{} @ {} = {}",
            p.product_name, p.shop_name, p.amount, p.price, p.total
        );
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use chrono::Utc;

    use agora_core::{
        CompanyId, Email, OrderId, OrderProductId, Phone, ProductId, ShopProductId, UserId,
    };

    use super::*;

    pub(crate) fn order() -> Order {
        Order {
            id: OrderId::new(7),
            item_id: "000042".to_owned(),
            user_id: UserId::new(3),
            customer_name: "Ann".to_owned(),
            customer_email: Email::parse("ann@example.com").unwrap(),
            customer_phone: Phone::parse("+79991234567").unwrap(),
            comment: "Call before noon".to_owned(),
            status: OrderStatus::Pending,
            total: Money::parse("35.00").unwrap(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    pub(crate) fn products() -> Vec<OrderProduct> {
        let product = |id: i32, shop: i32, shop_name: &str, price: &str, amount: i32| {
            let price = Money::parse(price).unwrap();
            OrderProduct {
                id: OrderProductId::new(id),
                order_id: OrderId::new(7),
                shop_product_id: Some(ShopProductId::new(id)),
                product_id: Some(ProductId::new(id)),
                shop_id: ShopId::new(shop),
                company_id: CompanyId::new(1),
                item_id: format!("1000{id}"),
                product_name: format!("Wine {id}"),
                product_slug: format!("wine-{id}"),
                shop_name: shop_name.to_owned(),
                price,
                amount,
                total: price.times(amount.unsigned_abs()),
            }
        };
        vec![
            product(1, 1, "Central", "10.00", 2),
            product(2, 2, "Harbour", "15.00", 1),
        ]
    }

    #[test]
    fn test_customer_email_lists_lines_and_total() {
        let message = order_placed_customer_email(&order(), &products());
        assert_eq!(message.subject, "Order 000042 accepted");
        assert!(message.body.contains("- Wine 1 (Central) x2 @ 10.00 = 20.00"));
        assert!(message.body.contains("- Wine 2 (Harbour) x1 @ 15.00 = 15.00"));
        assert!(message.body.contains("Total: 35.00"));
    }

    #[test]
    fn test_shop_message_only_has_own_lines() {
        let message = order_placed_shop(&order(), ShopId::new(2), &products()).unwrap();
        assert!(message.body.contains("for Harbour"));
        assert!(!message.body.contains("Wine 1"));
        assert!(message.body.contains("Total for your shop: 15.00"));
        assert!(message.body.contains("Comment: Call before noon"));

        assert!(order_placed_shop(&order(), ShopId::new(9), &products()).is_none());
    }

    #[test]
    fn test_status_texts() {
        let mut order = order();
        order.status = OrderStatus::Ready;
        assert_eq!(order_status_changed_sms(&order), "Order 000042: ready for pickup.");
        assert!(order_status_changed_email(&order).body.contains("ready for pickup"));
    }
}
