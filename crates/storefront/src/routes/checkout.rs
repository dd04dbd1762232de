//! Checkout.

use axum::{Json, extract::State};
use tower_sessions::Session;
use tracing::instrument;

use agora_commerce::checkout::{self, CheckoutError, CheckoutForm, PlacedOrder};
use agora_core::ApiResponse;

use crate::error::{AppError, Result, add_breadcrumb};
use crate::middleware::OptionalAuth;
use crate::routes::cart::session_cart_id;
use crate::state::AppState;

/// Turn the session cart into an order.
///
/// Guests check out with their contact details; an account is found or
/// created for them by email and phone.
#[instrument(skip(state, session, user, form))]
pub async fn checkout(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
    Json(form): Json<CheckoutForm>,
) -> Result<Json<ApiResponse<PlacedOrder>>> {
    let cart_id = session_cart_id(&session)
        .await
        .ok_or(AppError::Checkout(CheckoutError::EmptyCart))?;

    let placed = checkout::make_order(
        state.pool(),
        state.notifier(),
        cart_id,
        user.map(|u| u.id),
        &form,
    )
    .await?;

    let order_id = placed.order.id.to_string();
    add_breadcrumb("checkout", "Order placed", Some(&[("order_id", order_id.as_str())]));

    let message = format!("Order {} has been placed", placed.order.item_id);
    Ok(Json(ApiResponse::ok_with(message, placed)))
}
