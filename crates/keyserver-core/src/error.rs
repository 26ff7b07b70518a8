use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("not found")]
    NotFound,
    #[error("database error: {0}")]
    Database(#[from] keyserver_db::DbError),
    #[error("lock error: {0}")]
    Lease(#[from] keyserver_db::leases::LeaseError),
}
