//! Admin authentication route handlers.

use axum::{Json, extract::State};
use tower_sessions::Session;
use tracing::instrument;

use agora_core::ApiResponse;

use crate::error::{AppError, Result, clear_sentry_user, set_sentry_user};
use crate::middleware::{RequireAdminAuth, clear_current_admin, set_current_admin};
use crate::models::CurrentAdmin;
use crate::services::AdminAuthService;
use crate::services::auth::LoginForm;
use crate::state::AppState;

/// Log in with email and password.
#[instrument(skip(state, session, form))]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Json(form): Json<LoginForm>,
) -> Result<Json<ApiResponse<CurrentAdmin>>> {
    let admin = AdminAuthService::new(state.pool()).login(&form).await?;
    let current = CurrentAdmin::from(&admin);

    set_current_admin(&session, &current)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to save session: {e}")))?;
    set_sentry_user(&current.id, Some(current.email.as_str()));

    Ok(Json(ApiResponse::ok_with("Logged in", current)))
}

/// Log out and drop the session.
pub async fn logout(session: Session) -> Result<Json<ApiResponse>> {
    clear_current_admin(&session)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to clear session: {e}")))?;
    clear_sentry_user();
    Ok(Json(ApiResponse::ok("Logged out")))
}

/// The logged-in admin.
pub async fn me(RequireAdminAuth(admin): RequireAdminAuth) -> Json<CurrentAdmin> {
    Json(admin)
}
