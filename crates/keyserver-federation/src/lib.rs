pub mod client;
pub mod id_token;
pub mod puller;

pub use client::{ClientTlsConfig, HttpFederationClient, RemoteFederationClient};
pub use id_token::{IdTokenSource, StaticFileIdTokenSource};
pub use puller::{run_pull, PullError, PullOutcome, PullerConfig, PullerDeps};

#[derive(Debug, thiserror::Error)]
pub enum FederationError {
    #[error("http error: {0}")]
    Http(String),
    #[error("remote server error: {0}")]
    RemoteError(String),
    #[error("credentials error: {0}")]
    Credentials(String),
}
