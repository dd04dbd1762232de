//! SMS gateway client.
//!
//! The gateway takes `POST {api_url}` with a bearer key and a JSON body
//! `{"sender": "...", "to": "+7...", "text": "..."}`.

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;

use agora_core::Phone;

use super::NotifyError;

/// SMS gateway settings.
#[derive(Clone)]
pub struct SmsConfig {
    pub api_url: String,
    pub api_key: SecretString,
    pub sender: String,
}

impl std::fmt::Debug for SmsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmsConfig")
            .field("api_url", &self.api_url)
            .field("api_key", &"[REDACTED]")
            .field("sender", &self.sender)
            .finish()
    }
}

#[derive(Serialize)]
struct SendRequest<'a> {
    sender: &'a str,
    to: &'a str,
    text: &'a str,
}

/// Client for the SMS gateway.
#[derive(Clone)]
pub struct SmsClient {
    client: reqwest::Client,
    api_url: String,
    sender: String,
}

impl SmsClient {
    /// Create a new SMS client.
    ///
    /// # Errors
    ///
    /// Returns error if the key is not a valid header value or the HTTP
    /// client fails to build.
    pub fn new(config: &SmsConfig) -> Result<Self, NotifyError> {
        let mut headers = HeaderMap::new();
        let auth_value = format!("Bearer {}", config.api_key.expose_secret());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth_value)
                .map_err(|e| NotifyError::Config(format!("invalid SMS API key: {e}")))?,
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(std::time::Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            api_url: config.api_url.clone(),
            sender: config.sender.clone(),
        })
    }

    /// Send one text message.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the gateway rejects it.
    pub async fn send(&self, to: &Phone, text: &str) -> Result<(), NotifyError> {
        let body = SendRequest {
            sender: &self.sender,
            to: to.as_str(),
            text,
        };

        let response = self.client.post(&self.api_url).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(NotifyError::Api {
                status: status.as_u16(),
                message,
            });
        }

        tracing::info!(to = %to, "SMS sent");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_request_body_shape() {
        let body = SendRequest {
            sender: "Agora",
            to: "+79991234567",
            text: "hi",
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            serde_json::json!({"sender": "Agora", "to": "+79991234567", "text": "hi"})
        );
    }

    #[test]
    fn test_debug_redacts_key() {
        let config = SmsConfig {
            api_url: "https://sms.example.com/send".to_owned(),
            api_key: SecretString::from("super-secret"),
            sender: "Agora".to_owned(),
        };
        assert!(!format!("{config:?}").contains("super-secret"));
    }
}
