//! Cart route handlers.
//!
//! The cart ID lives in the session. A cart is only created on the first
//! add, so browsing never writes to the database.

use axum::{Json, extract::State};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use agora_commerce::db::CartRepository;
use agora_commerce::db::carts::CartView;
use agora_core::{ApiResponse, CartId, CartProductId, ShopProductId, UserId};

use crate::error::{AppError, Result, add_breadcrumb};
use crate::middleware::OptionalAuth;
use crate::models::session::keys;
use crate::state::AppState;

/// Add-to-cart request body.
#[derive(Debug, Deserialize)]
pub struct AddToCart {
    pub shop_product_id: ShopProductId,
    #[serde(default = "default_amount")]
    pub amount: u32,
}

const fn default_amount() -> u32 {
    1
}

/// Line amount change. An amount of zero removes the line.
#[derive(Debug, Deserialize)]
pub struct UpdateLine {
    pub line_id: CartProductId,
    pub amount: u32,
}

/// Line removal.
#[derive(Debug, Deserialize)]
pub struct RemoveLine {
    pub line_id: CartProductId,
}

// =============================================================================
// Session Helpers
// =============================================================================

/// Get the cart ID from the session.
pub(crate) async fn session_cart_id(session: &Session) -> Option<CartId> {
    session.get::<CartId>(keys::CART_ID).await.ok().flatten()
}

/// Set the cart ID in the session.
pub(crate) async fn set_session_cart_id(session: &Session, cart_id: CartId) -> Result<()> {
    session
        .insert(keys::CART_ID, cart_id)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to save cart to session: {e}")))
}

/// The cart this request works on, created if needed and remembered in the
/// session.
async fn current_cart(
    state: &AppState,
    session: &Session,
    user_id: Option<UserId>,
) -> Result<CartId> {
    let stored = session_cart_id(session).await;
    let cart = CartRepository::new(state.pool())
        .get_or_create(stored, user_id)
        .await?;
    if stored != Some(cart.id) {
        set_session_cart_id(session, cart.id).await?;
    }
    Ok(cart.id)
}

/// An existing cart for this request, without creating one.
async fn existing_cart(
    state: &AppState,
    session: &Session,
    user_id: Option<UserId>,
) -> Result<Option<CartId>> {
    let carts = CartRepository::new(state.pool());
    if let Some(id) = session_cart_id(session).await
        && carts.find(id).await?.is_some()
    {
        return Ok(Some(id));
    }
    if let Some(user_id) = user_id
        && let Some(cart) = carts.find_for_user(user_id).await?
    {
        set_session_cart_id(session, cart.id).await?;
        return Ok(Some(cart.id));
    }
    Ok(None)
}

fn empty_view() -> CartView {
    CartView::new(CartId::new(0), Vec::new())
}

// =============================================================================
// Handlers
// =============================================================================

/// Show the cart. Visitors without a cart get an empty one.
#[instrument(skip(state, session, user))]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
) -> Result<Json<CartView>> {
    let user_id = user.map(|u| u.id);
    let view = match existing_cart(&state, &session, user_id).await? {
        Some(id) => CartRepository::new(state.pool()).view(id).await?,
        None => empty_view(),
    };
    Ok(Json(view))
}

/// Add a shop product to the cart.
#[instrument(skip(state, session, user))]
pub async fn add(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
    Json(body): Json<AddToCart>,
) -> Result<Json<ApiResponse<CartView>>> {
    let cart_id = current_cart(&state, &session, user.map(|u| u.id)).await?;
    let carts = CartRepository::new(state.pool());
    carts
        .add(cart_id, body.shop_product_id, body.amount)
        .await
        .map_err(|e| match e {
            agora_commerce::db::RepositoryError::NotFound => {
                AppError::NotFound("Product".to_string())
            }
            other => AppError::Database(other),
        })?;

    let shop_product_id = body.shop_product_id.to_string();
    add_breadcrumb(
        "cart",
        "Added product",
        Some(&[("shop_product_id", shop_product_id.as_str())]),
    );
    let view = carts.view(cart_id).await?;
    Ok(Json(ApiResponse::ok_with("Product added to cart", view)))
}

/// Change the amount of a line.
#[instrument(skip(state, session, user))]
pub async fn update(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
    Json(body): Json<UpdateLine>,
) -> Result<Json<ApiResponse<CartView>>> {
    let cart_id = existing_cart(&state, &session, user.map(|u| u.id))
        .await?
        .ok_or_else(|| AppError::NotFound("Cart line".to_string()))?;
    let carts = CartRepository::new(state.pool());
    carts
        .update_amount(cart_id, body.line_id, body.amount)
        .await
        .map_err(line_error)?;

    let view = carts.view(cart_id).await?;
    Ok(Json(ApiResponse::ok_with("Cart updated", view)))
}

/// Remove a line.
#[instrument(skip(state, session, user))]
pub async fn remove(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
    Json(body): Json<RemoveLine>,
) -> Result<Json<ApiResponse<CartView>>> {
    let cart_id = existing_cart(&state, &session, user.map(|u| u.id))
        .await?
        .ok_or_else(|| AppError::NotFound("Cart line".to_string()))?;
    let carts = CartRepository::new(state.pool());
    carts.remove(cart_id, body.line_id).await.map_err(line_error)?;

    let view = carts.view(cart_id).await?;
    Ok(Json(ApiResponse::ok_with("Product removed from cart", view)))
}

/// Remove every line.
#[instrument(skip(state, session, user))]
pub async fn clear(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
) -> Result<Json<ApiResponse<CartView>>> {
    let view = match existing_cart(&state, &session, user.map(|u| u.id)).await? {
        Some(cart_id) => {
            let carts = CartRepository::new(state.pool());
            carts.clear(cart_id).await?;
            carts.view(cart_id).await?
        }
        None => empty_view(),
    };
    Ok(Json(ApiResponse::ok_with("Cart cleared", view)))
}

fn line_error(e: agora_commerce::db::RepositoryError) -> AppError {
    match e {
        agora_commerce::db::RepositoryError::NotFound => {
            AppError::NotFound("Cart line".to_string())
        }
        other => AppError::Database(other),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_add_defaults_to_one() {
        let body: AddToCart = serde_json::from_str(r#"{"shop_product_id": 7}"#).unwrap();
        assert_eq!(body.shop_product_id, ShopProductId::new(7));
        assert_eq!(body.amount, 1);
    }

    #[test]
    fn test_negative_amount_is_rejected() {
        let body = serde_json::from_str::<UpdateLine>(r#"{"line_id": 1, "amount": -2}"#);
        assert!(body.is_err());
    }

    #[test]
    fn test_empty_view() {
        let view = empty_view();
        assert!(view.is_empty());
        assert_eq!(view.items, 0);
    }

    #[test]
    fn test_line_error_maps_not_found() {
        let err = line_error(agora_commerce::db::RepositoryError::NotFound);
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
