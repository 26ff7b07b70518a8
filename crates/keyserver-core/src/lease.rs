use keyserver_db::leases::{self, LeaseError, LeaseGuard};
use keyserver_db::DbPool;

/// Process-wide mutual exclusion for a named resource, bounded by a TTL and
/// persisted in the relational database. A thin, pool-carrying wrapper over
/// `keyserver_db::leases` so workers don't thread a bare `DbPool` through
/// their own lock handling.
#[derive(Clone)]
pub struct LeaseManager {
    pool: DbPool,
}

impl LeaseManager {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// At most one process holds `lock_id` at any wall-clock instant. The
    /// lease self-releases at `acquired_at + ttl_seconds` even if this
    /// process crashes before calling `release`.
    pub async fn acquire(
        &self,
        lock_id: &str,
        ttl_seconds: i64,
    ) -> Result<LeaseGuard, LeaseError> {
        leases::acquire(&self.pool, lock_id, ttl_seconds).await
    }

    /// Idempotent; tolerates being called after expiry or takeover. Errors
    /// are logged, never propagated — a failed release just means the
    /// lease expires passively instead.
    pub async fn release(&self, guard: &LeaseGuard) {
        if let Err(err) = leases::release(&self.pool, guard).await {
            tracing::warn!(lock_id = %guard.lock_id, error = %err, "lease release failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn manager() -> LeaseManager {
        let pool = keyserver_db::create_pool("sqlite::memory:", 1).await.unwrap();
        keyserver_db::run_migrations(&pool).await.unwrap();
        LeaseManager::new(pool)
    }

    #[tokio::test]
    async fn only_one_of_two_concurrent_acquires_wins() {
        let manager = manager().await;
        let first = manager.acquire("query_abc", 300).await;
        let second = manager.acquire("query_abc", 300).await;
        assert!(first.is_ok());
        assert!(second.is_err());
    }

    #[tokio::test]
    async fn release_frees_the_lock_for_a_new_acquire() {
        let manager = manager().await;
        let guard = manager.acquire("mirror-lock-1", 300).await.unwrap();
        manager.release(&guard).await;
        assert!(manager.acquire("mirror-lock-1", 300).await.is_ok());
    }

    #[tokio::test]
    async fn release_on_an_already_released_guard_does_not_panic() {
        let manager = manager().await;
        let guard = manager.acquire("mirror-lock-2", 300).await.unwrap();
        manager.release(&guard).await;
        manager.release(&guard).await;
    }
}
