//! HTTP trigger surface for the Mirror Worker, per spec.md §6: `GET /`,
//! responding with a JSON summary once every registered mirror has been
//! processed (or skipped).

use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use keyserver_mirror::{run_mirror_worker, MirrorReport, MirrorWorkerConfig};
use serde::Serialize;

use crate::config::Config;
use crate::object_store::ObjectStoreBackend;

#[derive(Clone)]
pub struct MirrorState {
    pub pool: keyserver_db::DbPool,
    pub object_store: Arc<ObjectStoreBackend>,
    pub http: reqwest::Client,
    pub config: Arc<Config>,
}

#[derive(Debug, Serialize)]
struct MirrorEntry {
    id: i64,
    processed: bool,
    errors: Vec<String>,
}

#[derive(Debug, Serialize)]
struct MirrorResponse {
    mirrors: Vec<MirrorEntry>,
}

impl From<MirrorReport> for MirrorEntry {
    fn from(report: MirrorReport) -> Self {
        Self { id: report.id, processed: report.processed, errors: report.errors }
    }
}

/// `GET /`. Any mirror whose `errors` list is non-empty causes the overall
/// response to come back as HTTP 500; otherwise 200.
pub async fn trigger(State(state): State<MirrorState>) -> impl IntoResponse {
    let worker_config = MirrorWorkerConfig {
        max_runtime: Duration::from_secs(state.config.runtime.max_runtime_seconds.max(0) as u64),
        lease_ttl_seconds: state.config.mirror.lock_duration_seconds,
        max_index_bytes: state.config.mirror.max_index_bytes,
        max_zip_bytes: state.config.mirror.max_zip_bytes,
        index_file_download_timeout: Duration::from_secs(
            state.config.mirror.index_file_download_timeout_seconds,
        ),
        export_file_download_timeout: Duration::from_secs(
            state.config.mirror.export_file_download_timeout_seconds,
        ),
        export_file_upload_timeout: Duration::from_secs(
            state.config.mirror.export_file_upload_timeout_seconds,
        ),
        export_file_delete_timeout: Duration::from_secs(
            state.config.mirror.export_file_delete_timeout_seconds,
        ),
    };

    let reports =
        run_mirror_worker(&state.pool, &state.http, state.object_store.as_ref(), &worker_config).await;

    let any_errors = reports.iter().any(|report| !report.errors.is_empty());
    let status = if any_errors { StatusCode::INTERNAL_SERVER_ERROR } else { StatusCode::OK };
    let body = MirrorResponse { mirrors: reports.into_iter().map(MirrorEntry::from).collect() };

    (status, Json(body))
}
