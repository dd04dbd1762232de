//! Application state shared across handlers.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use sqlx::PgPool;

use agora_commerce::db::rubrics::Rubric;
use agora_commerce::notify::Notifier;

use crate::config::StorefrontConfig;
use crate::search::SearchIndex;

/// How long the rubric navigation is cached.
const RUBRIC_CACHE_TTL: Duration = Duration::from_secs(300);

/// Application state shared across all handlers.
///
/// Cheaply cloneable via `Arc`.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    pool: PgPool,
    notifier: Notifier,
    search: SearchIndex,
    rubrics: Cache<(), Arc<Vec<Rubric>>>,
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub fn new(
        config: StorefrontConfig,
        pool: PgPool,
        notifier: Notifier,
        search: SearchIndex,
    ) -> Self {
        let rubrics = Cache::builder()
            .max_capacity(1)
            .time_to_live(RUBRIC_CACHE_TTL)
            .build();

        Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                notifier,
                search,
                rubrics,
            }),
        }
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Order notification sender.
    #[must_use]
    pub fn notifier(&self) -> &Notifier {
        &self.inner.notifier
    }

    /// Product search index.
    #[must_use]
    pub fn search(&self) -> &SearchIndex {
        &self.inner.search
    }

    /// Cached list of active rubrics for navigation.
    #[must_use]
    pub fn rubric_cache(&self) -> &Cache<(), Arc<Vec<Rubric>>> {
        &self.inner.rubrics
    }
}
