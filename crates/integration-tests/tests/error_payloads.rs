//! Integration tests for the `{success, message}` envelope.
//!
//! Both binaries must render failures the same way so the UI can show a
//! notification from any response.

#![allow(clippy::unwrap_used)]

use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use agora_commerce::db::RepositoryError;
use agora_core::ApiResponse;

async fn render(response: axum::response::Response) -> (StatusCode, serde_json::Value) {
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_not_found_looks_the_same_in_both_apis() {
    let storefront =
        render(agora_storefront::error::AppError::NotFound("Product".to_owned()).into_response())
            .await;
    let admin =
        render(agora_admin::error::AppError::NotFound("Product".to_owned()).into_response()).await;

    let expected = json!({"success": false, "message": "Product not found"});
    assert_eq!(storefront, (StatusCode::NOT_FOUND, expected.clone()));
    assert_eq!(admin, (StatusCode::NOT_FOUND, expected));
}

#[tokio::test]
async fn test_conflicts_keep_their_message() {
    let conflict = || RepositoryError::Conflict("slug already exists".to_owned());

    let storefront =
        render(agora_storefront::error::AppError::Database(conflict()).into_response()).await;
    let admin = render(agora_admin::error::AppError::Database(conflict()).into_response()).await;

    let expected = json!({"success": false, "message": "slug already exists"});
    assert_eq!(storefront, (StatusCode::CONFLICT, expected.clone()));
    assert_eq!(admin, (StatusCode::CONFLICT, expected));
}

#[tokio::test]
async fn test_internal_errors_hide_details() {
    let (status, body) = render(
        agora_storefront::error::AppError::Internal("connection reset".to_owned()).into_response(),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], false);
    assert!(!body["message"].as_str().unwrap().contains("connection reset"));
}

#[test]
fn test_success_envelope_shape() {
    assert_eq!(
        serde_json::to_value(ApiResponse::ok("Order canceled")).unwrap(),
        json!({"success": true, "message": "Order canceled"})
    );
    assert_eq!(
        serde_json::to_value(ApiResponse::ok_with("Added", json!({"count": 2}))).unwrap(),
        json!({"success": true, "message": "Added", "payload": {"count": 2}})
    );
}
