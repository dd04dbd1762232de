//! Unified error handling for admin.
//!
//! Every error renders as `{"success": false, "message": ...}`. Database and
//! internal failures are captured to Sentry and shown as a generic message;
//! upstream checker failures surface as `502`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use agora_commerce::db::RepositoryError;
use agora_core::ApiResponse;

use crate::services::auth::AuthError;
use crate::services::uniqueness::UniquenessError;

const INTERNAL_MESSAGE: &str = "Internal server error";

/// Application-level error type for the admin console.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Authentication operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Uniqueness checker failed.
    #[error("Uniqueness error: {0}")]
    Uniqueness(#[from] UniquenessError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// User is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// User lacks permission.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    const fn status(&self) -> StatusCode {
        match self {
            Self::Database(e) | Self::Auth(AuthError::Repository(e)) => match e {
                RepositoryError::Database(_) | RepositoryError::DataCorruption(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
                RepositoryError::NotFound => StatusCode::NOT_FOUND,
                RepositoryError::Conflict(_) => StatusCode::CONFLICT,
                RepositoryError::Invalid(_) => StatusCode::BAD_REQUEST,
            },
            Self::Auth(AuthError::InvalidCredentials) | Self::Unauthorized(_) => {
                StatusCode::UNAUTHORIZED
            }
            Self::Auth(AuthError::PasswordHash) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::Auth(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Uniqueness(UniquenessError::TextTooShort) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Uniqueness(_) => StatusCode::BAD_GATEWAY,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
        }
    }

    fn public_message(&self) -> String {
        match self {
            Self::Database(e) | Self::Auth(AuthError::Repository(e)) => match e {
                RepositoryError::NotFound => "Not found".to_string(),
                RepositoryError::Conflict(msg) | RepositoryError::Invalid(msg) => msg.clone(),
                RepositoryError::Database(_) | RepositoryError::DataCorruption(_) => {
                    INTERNAL_MESSAGE.to_string()
                }
            },
            Self::Auth(AuthError::InvalidCredentials) => "Invalid email or password".to_string(),
            Self::Auth(AuthError::PasswordHash) | Self::Internal(_) => INTERNAL_MESSAGE.to_string(),
            Self::Auth(e) => e.to_string(),
            Self::Uniqueness(UniquenessError::TextTooShort) => {
                UniquenessError::TextTooShort.to_string()
            }
            Self::Uniqueness(UniquenessError::Api { message, .. }) => {
                format!("Uniqueness service error: {message}")
            }
            Self::Uniqueness(_) => "Uniqueness service unavailable".to_string(),
            Self::NotFound(what) => format!("{what} not found"),
            Self::Unauthorized(msg) | Self::Forbidden(msg) | Self::BadRequest(msg) => msg.clone(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Admin request error"
            );
        } else {
            tracing::debug!(error = %self, "Admin request rejected");
        }

        (status, Json(ApiResponse::fail(self.public_message()))).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Map a missing row to a named 404.
pub fn not_found(what: &'static str) -> impl Fn(RepositoryError) -> AppError {
    move |e| match e {
        RepositoryError::NotFound => AppError::NotFound(what.to_string()),
        other => AppError::Database(other),
    }
}

/// Set the Sentry user context from an admin user ID.
pub fn set_sentry_user(admin_user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(admin_user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    async fn body(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("order-123".to_string());
        assert_eq!(err.to_string(), "Not found: order-123");

        let err = AppError::BadRequest("invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: invalid input");
    }

    #[test]
    fn test_app_error_status_codes() {
        fn get_status(err: AppError) -> StatusCode {
            err.into_response().status()
        }

        assert_eq!(
            get_status(AppError::NotFound("test".to_string())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::Unauthorized("test".to_string())),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(AppError::Forbidden("test".to_string())),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            get_status(AppError::Database(RepositoryError::Invalid("x".to_string()))),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(AppError::Uniqueness(UniquenessError::Status(503))),
            StatusCode::BAD_GATEWAY
        );
    }

    #[tokio::test]
    async fn test_conflict_message_reaches_client() {
        let (status, json) = body(AppError::Database(RepositoryError::Conflict(
            "slug already taken".to_string(),
        )))
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(
            json,
            serde_json::json!({"success": false, "message": "slug already taken"})
        );
    }

    #[tokio::test]
    async fn test_internal_details_are_hidden() {
        let (status, json) = body(AppError::Internal("pool exhausted".to_string())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["message"], INTERNAL_MESSAGE);
    }

    #[tokio::test]
    async fn test_upstream_status_is_hidden() {
        let (_, json) = body(AppError::Uniqueness(UniquenessError::Status(500))).await;
        assert_eq!(json["message"], "Uniqueness service unavailable");
    }

    #[test]
    fn test_not_found_mapper() {
        let err = not_found("Rubric")(RepositoryError::NotFound);
        assert!(matches!(err, AppError::NotFound(ref what) if what == "Rubric"));
        let err = not_found("Rubric")(RepositoryError::Conflict("x".to_string()));
        assert!(matches!(err, AppError::Database(_)));
    }
}
