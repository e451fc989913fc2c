//! services/api/src/web/cache.rs
//!
//! Short-lived caching of computed `UserStats`. The core never caches; the
//! handlers decide when a snapshot may be reused and when it must be dropped.

use async_trait::async_trait;
use prep_core::UserStats;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::debug;
use uuid::Uuid;

/// A per-user store of stats snapshots.
#[async_trait]
pub trait StatsCache: Send + Sync {
    async fn get(&self, user_id: Uuid) -> Option<UserStats>;

    async fn put(&self, user_id: Uuid, stats: UserStats);

    /// Drops the user's snapshot. Called after any write that changes a
    /// progress fact.
    async fn invalidate(&self, user_id: Uuid);
}

/// An in-process cache whose entries expire after a fixed time-to-live.
#[derive(Clone)]
pub struct InMemoryStatsCache {
    ttl: Duration,
    entries: Arc<RwLock<HashMap<Uuid, (UserStats, Instant)>>>,
}

impl InMemoryStatsCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Removes every expired entry.
    pub async fn cleanup_stale(&self) {
        let ttl = self.ttl;
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, (_, stored_at)| stored_at.elapsed() < ttl);
        if entries.len() < before {
            debug!("Evicted {} stale stats entries", before - entries.len());
        }
    }

    /// Spawns the background task that evicts expired entries once per TTL.
    /// A zero TTL is swept every second.
    pub fn spawn_cleanup_task(&self) -> JoinHandle<()> {
        let cache = self.clone();
        let period = self.ttl.max(Duration::from_secs(1));

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                cache.cleanup_stale().await;
            }
        })
    }
}

#[async_trait]
impl StatsCache for InMemoryStatsCache {
    async fn get(&self, user_id: Uuid) -> Option<UserStats> {
        let entries = self.entries.read().await;
        let (stats, stored_at) = entries.get(&user_id)?;
        if stored_at.elapsed() < self.ttl {
            Some(stats.clone())
        } else {
            None
        }
    }

    async fn put(&self, user_id: Uuid, stats: UserStats) {
        self.entries
            .write()
            .await
            .insert(user_id, (stats, Instant::now()));
    }

    async fn invalidate(&self, user_id: Uuid) {
        self.entries.write().await.remove(&user_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn stats(tests_completed: u32) -> UserStats {
        UserStats {
            overall_score: Some(7.0),
            study_streak_days: 2,
            hours_studied: 1.5,
            tests_completed,
            skill_progress: BTreeMap::new(),
            weekly_study_minutes: [0, 0, 0, 0, 0, 30, 60],
            achievements: Vec::new(),
        }
    }

    #[tokio::test]
    async fn returns_what_was_put_until_invalidated() {
        let cache = InMemoryStatsCache::new(Duration::from_secs(60));
        let user = Uuid::new_v4();
        assert!(cache.get(user).await.is_none());

        cache.put(user, stats(3)).await;
        assert_eq!(cache.get(user).await, Some(stats(3)));
        assert!(cache.get(Uuid::new_v4()).await.is_none());

        cache.invalidate(user).await;
        assert!(cache.get(user).await.is_none());
    }

    #[tokio::test]
    async fn entries_expire_after_the_ttl() {
        let cache = InMemoryStatsCache::new(Duration::ZERO);
        let user = Uuid::new_v4();
        cache.put(user, stats(1)).await;
        assert!(cache.get(user).await.is_none());

        cache.cleanup_stale().await;
        assert!(cache.entries.read().await.is_empty());
    }

    #[tokio::test]
    async fn background_task_evicts_expired_entries() {
        let cache = InMemoryStatsCache::new(Duration::ZERO);
        cache.put(Uuid::new_v4(), stats(1)).await;
        cache.put(Uuid::new_v4(), stats(2)).await;

        let task = cache.spawn_cleanup_task();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(cache.entries.read().await.is_empty());
        task.abort();
    }
}
