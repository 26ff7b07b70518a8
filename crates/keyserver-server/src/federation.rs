//! HTTP trigger surface for the Federation Puller, per spec.md §6:
//! `GET /?query-id=<id>`.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::response::IntoResponse;
use keyserver_db::exposures::DbExposureStore;
use keyserver_federation::{
    HttpFederationClient, IdTokenSource, PullOutcome, PullerConfig, PullerDeps, StaticFileIdTokenSource,
};
use serde::Deserialize;

use crate::config::Config;
use crate::error::AppError;

#[derive(Clone)]
pub struct FederationState {
    pub pool: keyserver_db::DbPool,
    pub config: Arc<Config>,
}

#[derive(Debug, Deserialize)]
pub struct TriggerParams {
    #[serde(rename = "query-id", default)]
    query_id: Vec<String>,
}

/// `GET /?query-id=<id>`. A missing, empty, or duplicated `query-id`
/// parameter is a 400; an unknown query id is also a 400 (it surfaces
/// through `PullError::UnknownQuery`). Lock contention is reported as a 200
/// with an explanatory body so the external scheduler does not retry.
pub async fn trigger(
    State(state): State<FederationState>,
    Query(params): Query<TriggerParams>,
) -> Result<impl IntoResponse, AppError> {
    let query_id = match params.query_id.as_slice() {
        [] => return Err(AppError::InvalidRequest("missing query-id parameter".into())),
        [single] if !single.is_empty() => single.clone(),
        [empty] if empty.is_empty() => {
            return Err(AppError::InvalidRequest("empty query-id parameter".into()))
        }
        _ => return Err(AppError::InvalidRequest("duplicated query-id parameter".into())),
    };

    let id_tokens = StaticFileIdTokenSource::new(&state.config.federation.credentials_file);
    let outcome = run_for_query(&state, &query_id, id_tokens).await?;

    Ok(match outcome {
        PullOutcome::LockContention => {
            format!("Lock query_{query_id} already in use. No work will be performed.")
        }
        PullOutcome::Completed { insertions, dropped, .. } => {
            tracing::info!(query_id, insertions, dropped, "federation pull trigger completed");
            String::new()
        }
    })
}

async fn run_for_query<T: IdTokenSource>(
    state: &FederationState,
    query_id: &str,
    id_tokens: T,
) -> Result<PullOutcome, AppError> {
    let tls = keyserver_federation::ClientTlsConfig {
        skip_verify: state.config.federation.tls_skip_verify,
        extra_root_cert_pem: load_extra_cert(&state.config.federation.tls_cert_file).await?,
    };
    let client = HttpFederationClient::with_tls_config(id_tokens, tls)
        .map_err(|err| AppError::Internal(err.to_string()))?;

    let deps = PullerDeps {
        pool: state.pool.clone(),
        client,
        exposure_store: DbExposureStore::new(state.pool.clone()),
    };

    let puller_config = PullerConfig {
        timeout_seconds: state.config.federation.rpc_timeout_seconds,
        max_exposure_keys: state.config.federation.max_exposure_keys,
        transform_policy: keyserver_core::TransformPolicy {
            accept_self_report: state.config.federation.accept_self_report,
            accept_recursive: state.config.federation.accept_recursive,
            max_interval_age_seconds: state.config.federation.max_interval_age_seconds,
            max_magnitude_symptom_onset_days: state.config.federation.max_magnitude_symptom_onset_days,
        },
    };

    keyserver_federation::run_pull(&deps, query_id, &puller_config)
        .await
        .map_err(AppError::from)
}

async fn load_extra_cert(path: &Option<String>) -> Result<Option<Vec<u8>>, AppError> {
    match path {
        Some(path) => tokio::fs::read(path)
            .await
            .map(Some)
            .map_err(|err| AppError::Internal(format!("reading TLS_CERT_FILE {path}: {err}"))),
        None => Ok(None),
    }
}
