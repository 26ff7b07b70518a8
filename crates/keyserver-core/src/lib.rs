pub mod error;
pub mod exposure_store;
pub mod lease;
pub mod reconcile;
pub mod sync_ledger;
pub mod transform;

pub use error::CoreError;
pub use exposure_store::{ExposureStore, ExposureStoreError};
pub use lease::LeaseManager;
pub use reconcile::reconcile;
pub use sync_ledger::SyncLedger;
pub use transform::{transform_and_validate, TransformError, TransformPolicy};
