use std::time::Duration;

use keyserver_models::{FetchRequest, FetchResponse};
use reqwest::Client;

use crate::id_token::IdTokenSource;
use crate::FederationError;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_RETRIES: u32 = 3;
const RETRY_BASE_DELAY: Duration = Duration::from_millis(500);

/// TLS knobs for the outbound fetch connection: `TLS_SKIP_VERIFY` (dev/test
/// only) and an optional extra trusted `TLS_CERT_FILE` (PEM) for remotes
/// behind a private CA.
#[derive(Debug, Clone, Default)]
pub struct ClientTlsConfig {
    pub skip_verify: bool,
    pub extra_root_cert_pem: Option<Vec<u8>>,
}

/// The remote fetch RPC, abstracted so the puller can run against a fake in
/// tests without any network stack.
#[allow(async_fn_in_trait)]
pub trait RemoteFederationClient: Send + Sync {
    async fn fetch(
        &self,
        server_addr: &str,
        audience: &str,
        request: &FetchRequest,
    ) -> Result<FetchResponse, FederationError>;
}

/// Bearer-authenticated HTTP adapter for `RemoteFederationClient`, with
/// exponential-backoff retry on network failures and 5xx responses.
pub struct HttpFederationClient<T> {
    http: Client,
    id_tokens: T,
}

impl<T: IdTokenSource> HttpFederationClient<T> {
    pub fn new(id_tokens: T) -> Result<Self, FederationError> {
        Self::with_tls_config(id_tokens, ClientTlsConfig::default())
    }

    pub fn with_tls_config(id_tokens: T, tls: ClientTlsConfig) -> Result<Self, FederationError> {
        let mut builder = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .user_agent("keyserver-federation/1.0")
            .danger_accept_invalid_certs(tls.skip_verify);
        if let Some(pem) = tls.extra_root_cert_pem {
            let cert = reqwest::Certificate::from_pem(&pem)
                .map_err(|e| FederationError::Http(e.to_string()))?;
            builder = builder.add_root_certificate(cert);
        }
        let http = builder.build().map_err(|e| FederationError::Http(e.to_string()))?;
        Ok(Self { http, id_tokens })
    }
}

impl<T: IdTokenSource> RemoteFederationClient for HttpFederationClient<T> {
    async fn fetch(
        &self,
        server_addr: &str,
        audience: &str,
        request: &FetchRequest,
    ) -> Result<FetchResponse, FederationError> {
        let token = self.id_tokens.token(audience).await?;
        let url = format!("{}/federation/fetch", server_addr.trim_end_matches('/'));
        let body = serde_json::to_vec(request).map_err(|e| FederationError::Http(e.to_string()))?;

        let resp = self.post_with_retry(&url, &token, body).await?;
        resp.json()
            .await
            .map_err(|e| FederationError::RemoteError(format!("invalid fetch response: {e}")))
    }
}

impl<T: IdTokenSource> HttpFederationClient<T> {
    async fn post_with_retry(
        &self,
        url: &str,
        bearer_token: &str,
        body_bytes: Vec<u8>,
    ) -> Result<reqwest::Response, FederationError> {
        let mut last_err = FederationError::Http("no attempts made".to_string());
        for attempt in 0..MAX_RETRIES {
            let request = self
                .http
                .post(url)
                .header("content-type", "application/json")
                .bearer_auth(bearer_token)
                .body(body_bytes.clone());

            match request.send().await {
                Ok(resp) if resp.status().is_success() => return Ok(resp),
                Ok(resp) if resp.status().is_server_error() => {
                    last_err = FederationError::RemoteError(format!(
                        "server error {} from {}",
                        resp.status(),
                        url
                    ));
                }
                Ok(resp) => {
                    return Err(FederationError::RemoteError(format!(
                        "request to {} returned {}",
                        url,
                        resp.status()
                    )));
                }
                Err(e) => {
                    last_err = FederationError::Http(e.to_string());
                }
            }
            if attempt + 1 < MAX_RETRIES {
                let delay = RETRY_BASE_DELAY * 2u32.pow(attempt);
                tokio::time::sleep(delay).await;
            }
        }
        Err(last_err)
    }
}
