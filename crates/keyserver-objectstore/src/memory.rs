use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::{ObjectStore, ObjectStoreError};

/// In-memory object store for tests (and for single-node deployments with
/// no configured cloud bucket). Not durable across process restarts.
#[derive(Default)]
pub struct InMemoryObjectStore {
    objects: Mutex<BTreeMap<(String, String), Vec<u8>>>,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Test helper: list object names currently present under a bucket.
    pub fn list(&self, bucket: &str) -> Vec<String> {
        let objects = self.objects.lock().unwrap();
        objects
            .keys()
            .filter(|(b, _)| b == bucket)
            .map(|(_, o)| o.clone())
            .collect()
    }
}

impl ObjectStore for InMemoryObjectStore {
    async fn get(&self, bucket: &str, object: &str) -> Result<Vec<u8>, ObjectStoreError> {
        let objects = self.objects.lock().unwrap();
        objects
            .get(&(bucket.to_string(), object.to_string()))
            .cloned()
            .ok_or_else(|| ObjectStoreError::NotFound {
                bucket: bucket.to_string(),
                object: object.to_string(),
            })
    }

    async fn put(
        &self,
        bucket: &str,
        object: &str,
        bytes: Vec<u8>,
        _content_type: &str,
    ) -> Result<(), ObjectStoreError> {
        let mut objects = self.objects.lock().unwrap();
        objects.insert((bucket.to_string(), object.to_string()), bytes);
        Ok(())
    }

    async fn delete(&self, bucket: &str, object: &str) -> Result<(), ObjectStoreError> {
        let mut objects = self.objects.lock().unwrap();
        objects.remove(&(bucket.to_string(), object.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_get_delete_round_trip() {
        let store = InMemoryObjectStore::new();
        store.put("b", "k", b"v".to_vec(), "zip").await.unwrap();
        assert_eq!(store.get("b", "k").await.unwrap(), b"v");
        store.delete("b", "k").await.unwrap();
        assert!(store.get("b", "k").await.is_err());
    }

    #[tokio::test]
    async fn list_reflects_bucket_contents() {
        let store = InMemoryObjectStore::new();
        store.put("b", "a.zip", b"1".to_vec(), "zip").await.unwrap();
        store.put("b", "c.zip", b"2".to_vec(), "zip").await.unwrap();
        store.put("other", "d.zip", b"3".to_vec(), "zip").await.unwrap();
        let mut names = store.list("b");
        names.sort();
        assert_eq!(names, vec!["a.zip".to_string(), "c.zip".to_string()]);
    }
}
