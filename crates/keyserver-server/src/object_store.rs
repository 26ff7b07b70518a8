use keyserver_objectstore::{InMemoryObjectStore, LocalObjectStore, ObjectStore, ObjectStoreError};

use crate::config::{Config, ObjectStoreBackendKind};

/// Picks one `ObjectStore` adapter at startup per `[object_store] backend`.
/// The Mirror Worker is generic over `ObjectStore`, so this enum is the one
/// concrete type threaded through the rest of the binary.
pub enum ObjectStoreBackend {
    Local(LocalObjectStore),
    Memory(InMemoryObjectStore),
}

impl ObjectStoreBackend {
    pub fn from_config(config: &Config) -> Self {
        match config.object_store.backend {
            ObjectStoreBackendKind::Local => Self::Local(LocalObjectStore::new(&config.object_store.root)),
            ObjectStoreBackendKind::Memory => Self::Memory(InMemoryObjectStore::default()),
        }
    }
}

impl ObjectStore for ObjectStoreBackend {
    async fn get(&self, bucket: &str, object: &str) -> Result<Vec<u8>, ObjectStoreError> {
        match self {
            Self::Local(store) => store.get(bucket, object).await,
            Self::Memory(store) => store.get(bucket, object).await,
        }
    }

    async fn put(
        &self,
        bucket: &str,
        object: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), ObjectStoreError> {
        match self {
            Self::Local(store) => store.put(bucket, object, bytes, content_type).await,
            Self::Memory(store) => store.put(bucket, object, bytes, content_type).await,
        }
    }

    async fn delete(&self, bucket: &str, object: &str) -> Result<(), ObjectStoreError> {
        match self {
            Self::Local(store) => store.delete(bucket, object).await,
            Self::Memory(store) => store.delete(bucket, object).await,
        }
    }
}
