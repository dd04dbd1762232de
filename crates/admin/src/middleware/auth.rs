//! Authentication and role extractors for admin.
//!
//! Each extractor reads the admin from the session and checks one
//! capability of their role. A missing login is a `401`, a missing
//! capability a `403`, both with the uniform error body.

use axum::{extract::FromRequestParts, http::request::Parts};
use tower_sessions::Session;

use agora_core::AdminRole;

use crate::error::AppError;
use crate::models::CurrentAdmin;
use crate::models::session::keys;

/// Extractor that requires any logged-in admin.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(
///     RequireAdminAuth(admin): RequireAdminAuth,
/// ) -> impl IntoResponse {
///     format!("Hello, {}!", admin.name)
/// }
/// ```
pub struct RequireAdminAuth(pub CurrentAdmin);

/// Extractor for admins allowed to edit rubrics, attributes, options and
/// products.
pub struct RequireCatalogueEditor(pub CurrentAdmin);

/// Extractor for admins allowed to manage companies, shops, stock and
/// orders.
pub struct RequireOrderManager(pub CurrentAdmin);

/// Extractor for super admins (admin user management).
pub struct RequireSuperAdmin(pub CurrentAdmin);

async fn current_admin(parts: &Parts) -> Result<CurrentAdmin, AppError> {
    let session = parts
        .extensions
        .get::<Session>()
        .ok_or_else(|| AppError::Internal("session layer missing".to_string()))?;

    session
        .get::<CurrentAdmin>(keys::CURRENT_ADMIN)
        .await
        .ok()
        .flatten()
        .ok_or_else(|| AppError::Unauthorized("Please log in".to_string()))
}

fn require(
    admin: CurrentAdmin,
    allowed: fn(AdminRole) -> bool,
    message: &str,
) -> Result<CurrentAdmin, AppError> {
    if allowed(admin.role) {
        Ok(admin)
    } else {
        tracing::warn!(admin_id = %admin.id, role = %admin.role, "Admin lacks permission");
        Err(AppError::Forbidden(message.to_string()))
    }
}

impl<S> FromRequestParts<S> for RequireAdminAuth
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        current_admin(parts).await.map(Self)
    }
}

impl<S> FromRequestParts<S> for RequireCatalogueEditor
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let admin = current_admin(parts).await?;
        require(
            admin,
            AdminRole::can_edit_catalogue,
            "Your role cannot edit the catalogue",
        )
        .map(Self)
    }
}

impl<S> FromRequestParts<S> for RequireOrderManager
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let admin = current_admin(parts).await?;
        require(
            admin,
            AdminRole::can_manage_orders,
            "Your role cannot manage shops or orders",
        )
        .map(Self)
    }
}

impl<S> FromRequestParts<S> for RequireSuperAdmin
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let admin = current_admin(parts).await?;
        require(
            admin,
            AdminRole::can_manage_admins,
            "Only super admins can access this resource",
        )
        .map(Self)
    }
}

/// Helper to set the current admin in the session.
///
/// The session id is cycled first so a pre-login id cannot be reused.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_current_admin(
    session: &Session,
    admin: &CurrentAdmin,
) -> Result<(), tower_sessions::session::Error> {
    session.cycle_id().await?;
    session.insert(keys::CURRENT_ADMIN, admin).await
}

/// Helper to clear the current admin from the session (logout).
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn clear_current_admin(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session.flush().await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use agora_core::{AdminUserId, Email};

    fn admin(role: AdminRole) -> CurrentAdmin {
        CurrentAdmin {
            id: AdminUserId::new(3),
            email: Email::parse("ops@agora.test").unwrap(),
            name: "Ops".to_string(),
            role,
        }
    }

    #[test]
    fn test_content_manager_edits_catalogue_only() {
        let editor = admin(AdminRole::ContentManager);
        assert!(require(editor.clone(), AdminRole::can_edit_catalogue, "no").is_ok());
        let err = require(editor, AdminRole::can_manage_orders, "no orders").unwrap_err();
        assert!(matches!(err, AppError::Forbidden(ref m) if m == "no orders"));
    }

    #[test]
    fn test_viewer_is_read_only() {
        let viewer = admin(AdminRole::Viewer);
        assert!(require(viewer.clone(), AdminRole::can_edit_catalogue, "no").is_err());
        assert!(require(viewer.clone(), AdminRole::can_manage_orders, "no").is_err());
        assert!(require(viewer, AdminRole::can_manage_admins, "no").is_err());
    }

    #[test]
    fn test_super_admin_can_do_everything() {
        let root = admin(AdminRole::SuperAdmin);
        assert!(require(root.clone(), AdminRole::can_edit_catalogue, "no").is_ok());
        assert!(require(root.clone(), AdminRole::can_manage_orders, "no").is_ok());
        assert!(require(root, AdminRole::can_manage_admins, "no").is_ok());
    }

    #[tokio::test]
    async fn test_missing_session_layer_is_internal() {
        let (parts, ()) = axum::http::Request::new(()).into_parts();
        let err = current_admin(&parts).await.unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));
    }
}
