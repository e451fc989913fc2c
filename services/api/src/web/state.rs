//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use crate::web::cache::{InMemoryStatsCache, StatsCache};
use prep_core::{CatalogService, Clock, CourseProgressService, DatabaseService, StatsService};
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn DatabaseService>,
    pub config: Arc<Config>,
    pub stats: StatsService,
    pub courses: CourseProgressService,
    pub catalog: CatalogService,
    pub stats_cache: Arc<dyn StatsCache>,
}

impl AppState {
    /// Wires the core services to one database port and an in-memory stats cache.
    pub fn new(db: Arc<dyn DatabaseService>, config: Arc<Config>, clock: Clock) -> Self {
        let stats_cache = Arc::new(InMemoryStatsCache::new(config.stats_cache_ttl));
        Self::with_cache(db, config, clock, stats_cache)
    }

    pub fn with_cache(
        db: Arc<dyn DatabaseService>,
        config: Arc<Config>,
        clock: Clock,
        stats_cache: Arc<dyn StatsCache>,
    ) -> Self {
        Self {
            stats: StatsService::new(db.clone(), clock),
            courses: CourseProgressService::new(db.clone(), clock),
            catalog: CatalogService::new(db.clone(), clock),
            db,
            config,
            stats_cache,
        }
    }
}
