//! Authentication route handlers.
//!
//! Login and registration put the customer in the session and attach the
//! visitor's cart to their account. A customer arriving without a cart gets
//! their stored one back.

use axum::{Json, extract::State};
use tower_sessions::Session;
use tracing::instrument;

use agora_commerce::db::CartRepository;
use agora_commerce::db::carts::Cart;
use agora_commerce::db::users::User;
use agora_core::{ApiResponse, CartId, Email, UserId};

use crate::error::{AppError, Result, clear_sentry_user, set_sentry_user};
use crate::middleware::{clear_current_user, set_current_user};
use crate::models::CurrentUser;
use crate::models::session::keys;
use crate::routes::cart::{session_cart_id, set_session_cart_id};
use crate::services::auth::{AuthService, LoginForm, RegisterForm};
use crate::state::AppState;

/// Create an account and log in.
#[instrument(skip(state, session, form))]
pub async fn register(
    State(state): State<AppState>,
    session: Session,
    Json(form): Json<RegisterForm>,
) -> Result<Json<ApiResponse<CurrentUser>>> {
    let user = AuthService::new(state.pool()).register(&form).await?;
    let current = start_session(&state, &session, &user).await?;
    Ok(Json(ApiResponse::ok_with("Account created", current)))
}

/// Log in with email and password.
#[instrument(skip(state, session, form))]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Json(form): Json<LoginForm>,
) -> Result<Json<ApiResponse<CurrentUser>>> {
    let user = AuthService::new(state.pool()).login(&form).await?;
    let current = start_session(&state, &session, &user).await?;
    tracing::info!(user_id = %user.id, "Customer logged in");
    Ok(Json(ApiResponse::ok_with("Logged in", current)))
}

/// Log out. The cart stays in the session.
pub async fn logout(session: Session) -> Result<Json<ApiResponse>> {
    clear_current_user(&session)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to clear session: {e}")))?;
    clear_sentry_user();
    Ok(Json(ApiResponse::ok("Logged out")))
}

async fn start_session(state: &AppState, session: &Session, user: &User) -> Result<CurrentUser> {
    let current = CurrentUser::from(user);
    set_current_user(session, &current)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to save session: {e}")))?;

    let carts = CartRepository::new(state.pool());
    let session_cart = match session_cart_id(session).await {
        Some(cart_id) => carts.find(cart_id).await?,
        None => None,
    };
    match session_cart {
        Some(cart) if may_take_cart(&cart, user.id) => carts.attach_user(cart.id, user.id).await?,
        foreign => {
            if foreign.is_some() {
                session
                    .remove::<CartId>(keys::CART_ID)
                    .await
                    .map_err(|e| AppError::Internal(format!("Failed to save session: {e}")))?;
            }
            if let Some(stored) = carts.find_for_user(user.id).await? {
                set_session_cart_id(session, stored.id).await?;
            }
        }
    }

    set_sentry_user(&user.id, user.email.as_ref().map(Email::as_str));
    Ok(current)
}

/// A cart left behind by another customer on this browser is not theirs to take.
fn may_take_cart(cart: &Cart, user_id: UserId) -> bool {
    cart.user_id.is_none_or(|owner| owner == user_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn cart(owner: Option<i32>) -> Cart {
        Cart {
            id: CartId::new(1),
            user_id: owner.map(UserId::new),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_anonymous_cart_is_taken() {
        assert!(may_take_cart(&cart(None), UserId::new(5)));
    }

    #[test]
    fn test_own_cart_is_taken() {
        assert!(may_take_cart(&cart(Some(5)), UserId::new(5)));
    }

    #[test]
    fn test_someone_elses_cart_is_left() {
        assert!(!may_take_cart(&cart(Some(6)), UserId::new(5)));
    }
}
