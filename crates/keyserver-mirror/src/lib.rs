//! The Export-File Mirror worker: downloads newly published export files
//! from third-party index/export servers into this server's own object
//! store, keeping `MirrorFile` rows in sync with what actually exists
//! there.

mod error;
pub mod index;
pub mod rewrite;
mod worker;

pub use error::MirrorError;
pub use rewrite::RewriteState;
pub use worker::{run_mirror_worker, MirrorReport, MirrorWorkerConfig};
