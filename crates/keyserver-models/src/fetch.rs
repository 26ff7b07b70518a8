use serde::{Deserialize, Serialize};

use crate::ExposureKey;

/// An opaque resumption token plus a timestamp floor for one of the two
/// independent federation streams.
///
/// Clients store and return `next_token` verbatim; they never interpret it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    pub timestamp: i64,
    #[serde(default)]
    pub next_token: String,
}

impl Cursor {
    /// Element-wise max so cursors never regress.
    pub fn advance(&self, next: &Cursor) -> Cursor {
        if next.timestamp >= self.timestamp {
            next.clone()
        } else {
            self.clone()
        }
    }
}

/// The tagged pair of cursors for the two independent streams: newly
/// published keys, and revisions to previously published keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchState {
    pub key_cursor: Cursor,
    pub revised_key_cursor: Cursor,
}

impl FetchState {
    /// Advance both cursors independently by element-wise max against
    /// `next`.
    pub fn advance(&self, next: &FetchState) -> FetchState {
        FetchState {
            key_cursor: self.key_cursor.advance(&next.key_cursor),
            revised_key_cursor: self.revised_key_cursor.advance(&next.revised_key_cursor),
        }
    }
}

/// Request body for the remote federation fetch RPC.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchRequest {
    pub include_regions: Vec<String>,
    pub exclude_regions: Vec<String>,
    pub only_travelers: bool,
    pub only_local_provenance: bool,
    pub max_exposure_keys: i32,
    pub state: FetchState,
}

/// Response body for the remote federation fetch RPC.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchResponse {
    #[serde(default)]
    pub keys: Vec<ExposureKey>,
    #[serde(default)]
    pub revised_keys: Vec<ExposureKey>,
    #[serde(default)]
    pub partial_response: bool,
    pub next_fetch_state: FetchState,
}
