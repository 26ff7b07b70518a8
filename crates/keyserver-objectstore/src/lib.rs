//! The Object Store capability: `{Get, Put, Delete}` over a
//! `(bucket, object)` address space.
//!
//! The core never depends on a specific cloud vendor's SDK — only on this
//! trait — so that production adapters and in-memory test doubles are
//! interchangeable.

mod local;
mod memory;

pub use local::LocalObjectStore;
pub use memory::InMemoryObjectStore;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ObjectStoreError {
    #[error("object not found: {bucket}/{object}")]
    NotFound { bucket: String, object: String },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("object store error: {0}")]
    Backend(String),
}

/// `{Get, Put, Delete}` over a `(bucket, object)` address space.
#[allow(async_fn_in_trait)]
pub trait ObjectStore: Send + Sync {
    async fn get(&self, bucket: &str, object: &str) -> Result<Vec<u8>, ObjectStoreError>;

    async fn put(
        &self,
        bucket: &str,
        object: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), ObjectStoreError>;

    async fn delete(&self, bucket: &str, object: &str) -> Result<(), ObjectStoreError>;
}
