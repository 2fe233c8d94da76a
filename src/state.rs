use std::sync::Arc;
use std::time::Duration;

use axum::extract::FromRef;
use sqlx::PgPool;

use crate::config::Config;
use crate::models::attempt::LeaderboardEntry;
use crate::utils::cache::TtlCache;

/// Per-quiz leaderboard rows, cached for the TTL configured in `Config`.
pub type LeaderboardCache = TtlCache<i64, Vec<LeaderboardEntry>>;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
    pub leaderboard_cache: Arc<LeaderboardCache>,
}

impl AppState {
    pub fn new(pool: PgPool, config: Config) -> Self {
        let ttl = Duration::from_secs(config.leaderboard_cache_ttl);
        Self {
            pool,
            config,
            leaderboard_cache: Arc::new(TtlCache::new(ttl)),
        }
    }
}

impl FromRef<AppState> for PgPool {
    fn from_ref(state: &AppState) -> Self {
        state.pool.clone()
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

impl FromRef<AppState> for Arc<LeaderboardCache> {
    fn from_ref(state: &AppState) -> Self {
        state.leaderboard_cache.clone()
    }
}
