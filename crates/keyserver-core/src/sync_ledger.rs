use keyserver_db::DbPool;
use keyserver_models::FetchState;

use crate::error::CoreError;

/// A two-phase "start / finalize" record of every federation pull, with
/// durable cursors and counters. Wraps `keyserver_db::federation_syncs` so
/// the puller deals only in `(sync_id, final_state, insertions)`.
#[derive(Clone)]
pub struct SyncLedger {
    pool: DbPool,
}

impl SyncLedger {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Opens a `FederationSync` row for `query_id` and returns its
    /// assigned `sync_id`.
    pub async fn start(&self, query_id: &str) -> Result<i64, CoreError> {
        Ok(keyserver_db::federation_syncs::start(&self.pool, query_id).await?)
    }

    /// Closes the `sync_id` row and, only if `insertions > 0`, advances
    /// `query_id`'s cursors to `final_state` — both in one transaction.
    pub async fn finalize(
        &self,
        sync_id: i64,
        query_id: &str,
        final_state: &FetchState,
        insertions: i64,
    ) -> Result<(), CoreError> {
        Ok(keyserver_db::federation_syncs::finalize(
            &self.pool,
            sync_id,
            query_id,
            final_state,
            insertions,
        )
        .await?)
    }
}
