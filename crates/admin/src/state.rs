//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use agora_commerce::notify::Notifier;

use crate::config::AdminConfig;
use crate::services::UniquenessClient;

/// Application state shared across all handlers.
///
/// Cheaply cloneable via `Arc`.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: AdminConfig,
    pool: PgPool,
    notifier: Notifier,
    uniqueness: Option<UniquenessClient>,
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub fn new(
        config: AdminConfig,
        pool: PgPool,
        notifier: Notifier,
        uniqueness: Option<UniquenessClient>,
    ) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                notifier,
                uniqueness,
            }),
        }
    }

    /// Get a reference to the admin configuration.
    #[must_use]
    pub fn config(&self) -> &AdminConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Customer notification sender.
    #[must_use]
    pub fn notifier(&self) -> &Notifier {
        &self.inner.notifier
    }

    /// Uniqueness checker, if configured.
    #[must_use]
    pub fn uniqueness(&self) -> Option<&UniquenessClient> {
        self.inner.uniqueness.as_ref()
    }
}
