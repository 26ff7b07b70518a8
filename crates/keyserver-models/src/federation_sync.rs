use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One historical pull record.
///
/// Created in the open state by `SyncLedger::start`, closed exactly once by
/// `SyncLedger::finalize`. Closed records are read-only history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct FederationSync {
    pub sync_id: i64,
    pub query_id: String,
    pub started: DateTime<Utc>,
    pub completed: Option<DateTime<Utc>>,
    pub insertions: i64,
    pub max_timestamp: i64,
    pub max_revised_timestamp: i64,
}

impl FederationSync {
    pub fn is_open(&self) -> bool {
        self.completed.is_none()
    }
}
