//! Order management.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use tracing::instrument;

use agora_commerce::db::OrderRepository;
use agora_commerce::db::orders::{Order, OrderActor, OrderDetails, OrderListFilter};
use agora_core::{ApiResponse, OrderId, OrderStatus};

use crate::error::{Result, not_found};
use crate::middleware::{RequireAdminAuth, RequireOrderManager};
use crate::routes::Page;
use crate::state::AppState;

/// Body for a status change.
#[derive(Debug, Deserialize)]
pub struct StatusChange {
    pub status: OrderStatus,
}

/// Orders, newest first, optionally by status.
pub async fn list(
    State(state): State<AppState>,
    RequireAdminAuth(_admin): RequireAdminAuth,
    Query(filter): Query<OrderListFilter>,
) -> Result<Json<Page<Order>>> {
    let (items, total) = OrderRepository::new(state.pool()).list(&filter).await?;
    Ok(Json(Page::new(items, total, filter.page)))
}

/// An order with its products, status log and allowed next statuses.
pub async fn show(
    State(state): State<AppState>,
    RequireAdminAuth(_admin): RequireAdminAuth,
    Path(id): Path<i32>,
) -> Result<Json<OrderDetails>> {
    let details = OrderRepository::new(state.pool())
        .get_details(OrderId::new(id))
        .await
        .map_err(not_found("Order"))?;
    Ok(Json(details))
}

/// Move an order to a new status and tell the customer.
#[instrument(skip(state, admin, body), fields(admin_id = %admin.id))]
pub async fn change_status(
    State(state): State<AppState>,
    RequireOrderManager(admin): RequireOrderManager,
    Path(id): Path<i32>,
    Json(body): Json<StatusChange>,
) -> Result<Json<ApiResponse<Order>>> {
    let order = OrderRepository::new(state.pool())
        .transition(OrderId::new(id), body.status, OrderActor::Admin(admin.id))
        .await
        .map_err(not_found("Order"))?;

    let notifier = state.notifier().clone();
    let notified = order.clone();
    tokio::spawn(async move { notifier.order_status_changed(&notified).await });

    Ok(Json(ApiResponse::ok_with(
        format!("Order {} is now {}", order.item_id, order.status),
        order,
    )))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_status_change_body() {
        let body: StatusChange = serde_json::from_str(r#"{"status": "ready"}"#).unwrap();
        assert_eq!(body.status, OrderStatus::Ready);
        assert!(serde_json::from_str::<StatusChange>(r#"{"status": "shipped"}"#).is_err());
    }

    #[test]
    fn test_list_filter_from_query() {
        let Query(filter): Query<OrderListFilter> =
            Query::try_from_uri(&"/api/orders?status=canceled".parse().unwrap()).unwrap();
        assert_eq!(filter.status, Some(OrderStatus::Canceled));
        assert_eq!(filter.page, 0);
    }
}
