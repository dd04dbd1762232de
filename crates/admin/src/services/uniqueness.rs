//! Text uniqueness checker client.
//!
//! Two-step protocol against one endpoint, both as form posts:
//!
//! - submit: `text` + `userkey` → `{"text_uid": "..."}`
//! - poll: `uid` + `userkey` → `{"text_unique": "87.50"}`, or error code
//!   `181` while the check is still running
//!
//! Failures come back as `{"error_code": N, "error_desc": "..."}` with a
//! `200` status.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::UniquenessConfig;

/// Error code the checker returns while a text is still queued.
const PENDING_ERROR_CODE: u32 = 181;

/// Texts shorter than this are rejected by the checker.
pub const MIN_TEXT_LENGTH: usize = 100;

/// Errors that can occur when talking to the uniqueness checker.
#[derive(Debug, Error)]
pub enum UniquenessError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Checker answered with an error code.
    #[error("API error {code}: {message}")]
    Api { code: u32, message: String },

    /// Unexpected HTTP status.
    #[error("unexpected status {0}")]
    Status(u16),

    /// Response did not have the expected shape.
    #[error("Parse error: {0}")]
    Parse(String),

    /// The text is too short to check.
    #[error("text must be at least {MIN_TEXT_LENGTH} characters")]
    TextTooShort,
}

/// Result of polling a submitted text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "percent", rename_all = "snake_case")]
pub enum PollOutcome {
    /// Still being checked.
    Pending,
    /// Uniqueness percentage, 0 to 100.
    Done(Decimal),
}

#[derive(Serialize)]
struct SubmitForm<'a> {
    text: &'a str,
    userkey: &'a str,
}

#[derive(Serialize)]
struct PollForm<'a> {
    uid: &'a str,
    userkey: &'a str,
}

#[derive(Debug, Default, Deserialize)]
struct Reply {
    text_uid: Option<String>,
    text_unique: Option<serde_json::Value>,
    error_code: Option<u32>,
    error_desc: Option<String>,
}

/// Uniqueness checker client.
#[derive(Clone)]
pub struct UniquenessClient {
    inner: Arc<UniquenessClientInner>,
}

struct UniquenessClientInner {
    client: reqwest::Client,
    api_url: String,
    api_key: SecretString,
}

impl UniquenessClient {
    /// Create a new client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &UniquenessConfig) -> Result<Self, UniquenessError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            inner: Arc::new(UniquenessClientInner {
                client,
                api_url: config.api_url.clone(),
                api_key: config.api_key.clone(),
            }),
        })
    }

    /// Submit a text and return the checker's id for it.
    ///
    /// # Errors
    ///
    /// Returns `UniquenessError::TextTooShort` before any request for short
    /// texts, and an API or HTTP error if the checker refuses the text.
    pub async fn submit(&self, text: &str) -> Result<String, UniquenessError> {
        if text.trim().chars().count() < MIN_TEXT_LENGTH {
            return Err(UniquenessError::TextTooShort);
        }
        let form = SubmitForm {
            text,
            userkey: self.inner.api_key.expose_secret(),
        };
        let reply = self.post(&form).await?;
        let uid = interpret_submit(reply)?;
        tracing::info!(text_uid = %uid, "Text submitted for uniqueness check");
        Ok(uid)
    }

    /// Ask whether a submitted text has been checked.
    ///
    /// # Errors
    ///
    /// Returns an API or HTTP error if the checker fails.
    pub async fn poll(&self, text_uid: &str) -> Result<PollOutcome, UniquenessError> {
        let form = PollForm {
            uid: text_uid,
            userkey: self.inner.api_key.expose_secret(),
        };
        let reply = self.post(&form).await?;
        interpret_poll(reply)
    }

    async fn post<F: Serialize + Sync>(&self, form: &F) -> Result<Reply, UniquenessError> {
        let response = self
            .inner
            .client
            .post(&self.inner.api_url)
            .form(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(UniquenessError::Status(status.as_u16()));
        }

        response
            .json()
            .await
            .map_err(|e| UniquenessError::Parse(format!("Failed to parse response: {e}")))
    }
}

impl std::fmt::Debug for UniquenessClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UniquenessClient")
            .field("api_url", &self.inner.api_url)
            .finish_non_exhaustive()
    }
}

fn reply_error(reply: &Reply) -> Option<UniquenessError> {
    reply.error_code.map(|code| UniquenessError::Api {
        code,
        message: reply
            .error_desc
            .clone()
            .unwrap_or_else(|| "unknown error".to_string()),
    })
}

fn interpret_submit(reply: Reply) -> Result<String, UniquenessError> {
    if let Some(err) = reply_error(&reply) {
        return Err(err);
    }
    reply
        .text_uid
        .filter(|uid| !uid.is_empty())
        .ok_or_else(|| UniquenessError::Parse("missing text_uid".to_string()))
}

fn interpret_poll(reply: Reply) -> Result<PollOutcome, UniquenessError> {
    if reply.error_code == Some(PENDING_ERROR_CODE) {
        return Ok(PollOutcome::Pending);
    }
    if let Some(err) = reply_error(&reply) {
        return Err(err);
    }

    let raw = reply
        .text_unique
        .ok_or_else(|| UniquenessError::Parse("missing text_unique".to_string()))?;
    let percent = match &raw {
        serde_json::Value::String(s) => Decimal::from_str(s.trim()).ok(),
        serde_json::Value::Number(n) => Decimal::from_str(&n.to_string()).ok(),
        _ => None,
    }
    .ok_or_else(|| UniquenessError::Parse(format!("bad text_unique: {raw}")))?;

    Ok(PollOutcome::Done(percent))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn reply(json: serde_json::Value) -> Reply {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_submit_returns_uid() {
        let uid = interpret_submit(reply(serde_json::json!({"text_uid": "5f1e"}))).unwrap();
        assert_eq!(uid, "5f1e");
    }

    #[test]
    fn test_submit_error_code() {
        let err = interpret_submit(reply(
            serde_json::json!({"error_code": 142, "error_desc": "Not enough balance"}),
        ))
        .unwrap_err();
        assert!(matches!(err, UniquenessError::Api { code: 142, .. }));
    }

    #[test]
    fn test_submit_without_uid_is_a_parse_error() {
        let err = interpret_submit(Reply::default()).unwrap_err();
        assert!(matches!(err, UniquenessError::Parse(_)));
    }

    #[test]
    fn test_poll_pending() {
        let outcome =
            interpret_poll(reply(serde_json::json!({"error_code": 181, "error_desc": "queued"})))
                .unwrap();
        assert_eq!(outcome, PollOutcome::Pending);
    }

    #[test]
    fn test_poll_done_from_string_or_number() {
        let outcome = interpret_poll(reply(serde_json::json!({"text_unique": "87.50"}))).unwrap();
        assert_eq!(outcome, PollOutcome::Done(Decimal::new(8750, 2)));

        let outcome = interpret_poll(reply(serde_json::json!({"text_unique": 100}))).unwrap();
        assert_eq!(outcome, PollOutcome::Done(Decimal::ONE_HUNDRED));
    }

    #[test]
    fn test_poll_garbage_percent() {
        let err = interpret_poll(reply(serde_json::json!({"text_unique": "lots"}))).unwrap_err();
        assert!(matches!(err, UniquenessError::Parse(_)));
    }

    #[test]
    fn test_outcome_serialization() {
        assert_eq!(
            serde_json::to_value(PollOutcome::Pending).unwrap(),
            serde_json::json!({"state": "pending"})
        );
        assert_eq!(
            serde_json::to_value(PollOutcome::Done(Decimal::new(913, 1))).unwrap(),
            serde_json::json!({"state": "done", "percent": "91.3"})
        );
    }

    #[tokio::test]
    async fn test_short_text_is_rejected_locally() {
        let client = UniquenessClient::new(&UniquenessConfig {
            api_url: "http://127.0.0.1:9/".to_string(),
            api_key: SecretString::from("k"),
        })
        .unwrap();
        let err = client.submit("too short").await.unwrap_err();
        assert!(matches!(err, UniquenessError::TextTooShort));
    }
}
