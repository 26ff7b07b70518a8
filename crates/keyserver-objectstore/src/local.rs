use std::path::{Path, PathBuf};

use tokio::fs;

use crate::{ObjectStore, ObjectStoreError};

/// Filesystem-backed object store: buckets are directories under `root`,
/// objects are files under the bucket directory. The production adapter for
/// deployments that don't front a real cloud bucket.
#[derive(Clone)]
pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, bucket: &str, object: &str) -> PathBuf {
        self.root.join(bucket).join(object)
    }
}

impl ObjectStore for LocalObjectStore {
    async fn get(&self, bucket: &str, object: &str) -> Result<Vec<u8>, ObjectStoreError> {
        let path = self.path_for(bucket, object);
        if !Path::new(&path).exists() {
            return Err(ObjectStoreError::NotFound {
                bucket: bucket.to_string(),
                object: object.to_string(),
            });
        }
        Ok(fs::read(&path).await?)
    }

    async fn put(
        &self,
        bucket: &str,
        object: &str,
        bytes: Vec<u8>,
        _content_type: &str,
    ) -> Result<(), ObjectStoreError> {
        let path = self.path_for(bucket, object);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&path, bytes).await?;
        Ok(())
    }

    async fn delete(&self, bucket: &str, object: &str) -> Result<(), ObjectStoreError> {
        let path = self.path_for(bucket, object);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_then_get_round_trips_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path());
        store
            .put("bucket", "us/a.zip", b"hello".to_vec(), "zip")
            .await
            .unwrap();
        let bytes = store.get("bucket", "us/a.zip").await.unwrap();
        assert_eq!(bytes, b"hello");
    }

    #[tokio::test]
    async fn get_missing_object_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path());
        let err = store.get("bucket", "missing.zip").await.unwrap_err();
        assert!(matches!(err, ObjectStoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path());
        store.delete("bucket", "never-existed.zip").await.unwrap();
        store
            .put("bucket", "a.zip", b"x".to_vec(), "zip")
            .await
            .unwrap();
        store.delete("bucket", "a.zip").await.unwrap();
        store.delete("bucket", "a.zip").await.unwrap();
        assert!(store.get("bucket", "a.zip").await.is_err());
    }
}
