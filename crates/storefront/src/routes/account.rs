//! Account route handlers.
//!
//! These routes require authentication.

use axum::{
    Json,
    extract::{Path, State},
};
use tracing::instrument;

use agora_commerce::db::OrderRepository;
use agora_commerce::db::orders::{Order, OrderActor};
use agora_core::{ApiResponse, OrderId, OrderStatus};

use crate::error::Result;
use crate::middleware::RequireAuth;
use crate::state::AppState;

/// The customer's orders, newest first.
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn orders(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<Vec<Order>>> {
    let orders = OrderRepository::new(state.pool())
        .list_by_user(user.id)
        .await?;
    Ok(Json(orders))
}

/// Cancel a pending order and tell the customer.
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn cancel_order(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<Order>>> {
    let order = OrderRepository::new(state.pool())
        .transition(
            OrderId::new(id),
            OrderStatus::Canceled,
            OrderActor::Customer(user.id),
        )
        .await?;

    state.notifier().order_status_changed(&order).await;

    let message = format!("Order {} has been canceled", order.item_id);
    Ok(Json(ApiResponse::ok_with(message, order)))
}
