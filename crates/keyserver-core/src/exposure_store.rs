use keyserver_models::Exposure;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExposureStoreError {
    #[error("database error: {0}")]
    Database(#[from] keyserver_db::DbError),
}

/// Idempotent upsert for primary keys and revised keys, returning counts.
/// Injected into the Federation Puller so tests can substitute an
/// in-memory fake for the relational adapter.
#[allow(async_fn_in_trait)]
pub trait ExposureStore: Send + Sync {
    /// Idempotent insert keyed on exposure-key identity; never touches an
    /// existing row. Returns the number of rows actually inserted.
    async fn insert_skip_revisions(
        &self,
        exposures: &[Exposure],
    ) -> Result<i64, ExposureStoreError>;

    /// Update-only: a key is revised only when a row already exists under
    /// the same `federation_query_id`; otherwise it is dropped. Returns the
    /// number of rows revised.
    async fn only_revise(&self, exposures: &[Exposure]) -> Result<i64, ExposureStoreError>;
}

impl ExposureStore for keyserver_db::exposures::DbExposureStore {
    async fn insert_skip_revisions(
        &self,
        exposures: &[Exposure],
    ) -> Result<i64, ExposureStoreError> {
        Ok(self.insert_skip_revisions(exposures).await?)
    }

    async fn only_revise(&self, exposures: &[Exposure]) -> Result<i64, ExposureStoreError> {
        Ok(self.only_revise(exposures).await?)
    }
}

/// An in-memory `ExposureStore` for fast, DB-free worker tests — in
/// `keyserver-core` itself and downstream in `keyserver-federation`.
pub mod fake {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct InMemoryExposureStore {
        rows: Mutex<HashMap<String, Exposure>>,
    }

    impl InMemoryExposureStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn all(&self) -> Vec<Exposure> {
            self.rows.lock().unwrap().values().cloned().collect()
        }
    }

    impl ExposureStore for InMemoryExposureStore {
        async fn insert_skip_revisions(
            &self,
            exposures: &[Exposure],
        ) -> Result<i64, ExposureStoreError> {
            let mut rows = self.rows.lock().unwrap();
            let mut inserted = 0;
            for exposure in exposures {
                if !rows.contains_key(&exposure.exposure_key) {
                    rows.insert(exposure.exposure_key.clone(), exposure.clone());
                    inserted += 1;
                }
            }
            Ok(inserted)
        }

        async fn only_revise(&self, exposures: &[Exposure]) -> Result<i64, ExposureStoreError> {
            let mut rows = self.rows.lock().unwrap();
            let mut revised = 0;
            for exposure in exposures {
                if let Some(existing) = rows.get(&exposure.exposure_key) {
                    if existing.federation_query_id == exposure.federation_query_id {
                        rows.insert(exposure.exposure_key.clone(), exposure.clone());
                        revised += 1;
                    }
                }
            }
            Ok(revised)
        }
    }

}
