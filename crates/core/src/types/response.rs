//! Uniform API response envelope.
//!
//! Every mutation in both the storefront and the admin API answers with the
//! same shape so that the UI can show a notification without inspecting the
//! status code:
//!
//! ```json
//! { "success": true, "message": "Product added to cart", "payload": { ... } }
//! { "success": false, "message": "Cart is empty" }
//! ```

use serde::{Deserialize, Serialize};

/// The `{success, message, payload}` envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiResponse<T = ()> {
    /// Whether the operation succeeded.
    pub success: bool,
    /// Human-readable message for the UI.
    pub message: String,
    /// Operation result, if any.
    #[serde(default = "Option::default", skip_serializing_if = "Option::is_none")]
    pub payload: Option<T>,
}

impl ApiResponse<()> {
    /// A successful response without payload.
    #[must_use]
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            payload: None,
        }
    }

    /// A failed response.
    #[must_use]
    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            payload: None,
        }
    }
}

impl<T> ApiResponse<T> {
    /// A successful response carrying a payload.
    #[must_use]
    pub fn ok_with(message: impl Into<String>, payload: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            payload: Some(payload),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_fail_omits_payload() {
        let json = serde_json::to_value(ApiResponse::fail("Cart is empty")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "success": false, "message": "Cart is empty" })
        );
    }

    #[test]
    fn test_ok_with_payload() {
        let json = serde_json::to_value(ApiResponse::ok_with("Created", 5)).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["payload"], 5);
    }
}
