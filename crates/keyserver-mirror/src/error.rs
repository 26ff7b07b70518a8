use thiserror::Error;

#[derive(Debug, Error)]
pub enum MirrorError {
    #[error("database error: {0}")]
    Database(#[from] keyserver_db::DbError),
    #[error("lock error: {0}")]
    Lease(#[from] keyserver_db::leases::LeaseError),
    #[error("object store error: {0}")]
    ObjectStore(#[from] keyserver_objectstore::ObjectStoreError),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("request to {url} timed out")]
    Timeout { url: String },
    #[error("request to {url} returned status {status}")]
    NonSuccessStatus { url: String, status: u16 },
    #[error("response from {url} exceeded the {limit}-byte cap")]
    TooLarge { url: String, limit: u64 },
    #[error("rewrite template '{0}' contains no substitution tokens")]
    RewriteHasNoTokens(String),
}
