//! Plain-text email over SMTP.

use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::header::ContentType,
    transport::smtp::{Error as SmtpError, authentication::Credentials},
};
use secrecy::{ExposeSecret, SecretString};

use super::NotifyError;
use super::messages::EmailMessage;

/// SMTP settings.
#[derive(Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: SecretString,
    pub from_address: String,
}

impl std::fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("from_address", &self.from_address)
            .finish()
    }
}

/// Email service for transactional messages.
#[derive(Clone)]
pub struct EmailService {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
}

impl EmailService {
    /// Create a new email service from configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the SMTP relay cannot be set up.
    pub fn new(config: &SmtpConfig) -> Result<Self, SmtpError> {
        let credentials = Credentials::new(
            config.username.clone(),
            config.password.expose_secret().to_string(),
        );

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)?
            .port(config.port)
            .credentials(credentials)
            .build();

        Ok(Self {
            mailer,
            from_address: config.from_address.clone(),
        })
    }

    /// Send a plain-text message.
    ///
    /// # Errors
    ///
    /// Returns error if an address is invalid or delivery fails.
    pub async fn send(&self, to: &str, message: &EmailMessage) -> Result<(), NotifyError> {
        let email = build_message(&self.from_address, to, message)?;
        self.mailer.send(email).await?;

        tracing::info!(to = %to, subject = %message.subject, "Email sent");
        Ok(())
    }
}

fn build_message(from: &str, to: &str, message: &EmailMessage) -> Result<Message, NotifyError> {
    let email = Message::builder()
        .from(
            from.parse()
                .map_err(|_| NotifyError::InvalidAddress(from.to_owned()))?,
        )
        .to(to
            .parse()
            .map_err(|_| NotifyError::InvalidAddress(to.to_owned()))?)
        .subject(&message.subject)
        .header(ContentType::TEXT_PLAIN)
        .body(message.body.clone())?;
    Ok(email)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message() -> EmailMessage {
        EmailMessage {
            subject: "Order 000001 accepted".to_owned(),
            body: "Thank you".to_owned(),
        }
    }

    #[test]
    fn test_build_message() {
        assert!(build_message("Agora <orders@example.com>", "ann@example.com", &message()).is_ok());
    }

    #[test]
    fn test_invalid_recipient() {
        let err = build_message("orders@example.com", "not an address", &message());
        assert!(matches!(err, Err(NotifyError::InvalidAddress(a)) if a == "not an address"));
    }
}
