use serde::{Deserialize, Serialize};

/// Configuration for one remote federation server subscription.
///
/// Mutated only by the Sync Ledger's finalize phase of a successful pull;
/// everywhere else it is read-only configuration. `keyserver-db` owns the
/// row <-> struct mapping (the region sets are comma-joined columns).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FederationQuery {
    pub query_id: String,
    pub server_addr: String,
    pub audience: String,

    /// Region codes, upper-cased.
    pub include_regions: Vec<String>,
    pub exclude_regions: Vec<String>,

    pub only_travelers: bool,
    pub only_local_provenance: bool,

    /// Opaque resumption token for the "newly published keys" stream.
    pub last_key_cursor: String,
    /// Unix-seconds floor paired with `last_key_cursor`.
    pub last_key_timestamp: i64,

    /// Opaque resumption token for the "revisions to previously published
    /// keys" stream.
    pub last_revised_cursor: String,
    /// Unix-seconds floor paired with `last_revised_cursor`.
    pub last_revised_timestamp: i64,
}

impl FederationQuery {
    /// Build the `FetchState` that should open the next pull, from the two
    /// independent cursors recorded after the last successful run.
    pub fn resume_state(&self) -> crate::FetchState {
        crate::FetchState {
            key_cursor: crate::Cursor {
                timestamp: self.last_key_timestamp,
                next_token: self.last_key_cursor.clone(),
            },
            revised_key_cursor: crate::Cursor {
                timestamp: self.last_revised_timestamp,
                next_token: self.last_revised_cursor.clone(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resume_state_carries_both_cursors_independently() {
        let query = FederationQuery {
            query_id: "q1".into(),
            server_addr: "https://remote.example".into(),
            audience: "aud".into(),
            include_regions: vec![],
            exclude_regions: vec![],
            only_travelers: false,
            only_local_provenance: false,
            last_key_cursor: "tok-a".into(),
            last_key_timestamp: 100,
            last_revised_cursor: "tok-b".into(),
            last_revised_timestamp: 50,
        };
        let state = query.resume_state();
        assert_eq!(state.key_cursor.timestamp, 100);
        assert_eq!(state.key_cursor.next_token, "tok-a");
        assert_eq!(state.revised_key_cursor.timestamp, 50);
        assert_eq!(state.revised_key_cursor.next_token, "tok-b");
    }
}
