//! Admin users management (super admin only).

use axum::{Json, extract::State};
use tracing::instrument;

use agora_commerce::db::AdminUserRepository;
use agora_commerce::db::users::AdminUser;
use agora_core::ApiResponse;

use crate::error::Result;
use crate::middleware::RequireSuperAdmin;
use crate::services::AdminAuthService;
use crate::services::auth::NewAdminForm;
use crate::state::AppState;

/// All admin users, newest first.
#[instrument(skip(state, _admin))]
pub async fn list(
    State(state): State<AppState>,
    RequireSuperAdmin(_admin): RequireSuperAdmin,
) -> Result<Json<Vec<AdminUser>>> {
    let users = AdminUserRepository::new(state.pool()).list_all().await?;
    Ok(Json(users))
}

/// Create an admin user with a password.
#[instrument(skip(state, admin, form), fields(by = %admin.id))]
pub async fn create(
    State(state): State<AppState>,
    RequireSuperAdmin(admin): RequireSuperAdmin,
    Json(form): Json<NewAdminForm>,
) -> Result<Json<ApiResponse<AdminUser>>> {
    let created = AdminAuthService::new(state.pool())
        .create_admin(&form)
        .await?;
    let message = format!("Admin {} created", created.email);
    Ok(Json(ApiResponse::ok_with(message, created)))
}
