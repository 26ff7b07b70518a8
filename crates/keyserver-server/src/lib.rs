//! Shared bootstrap for the two trigger binaries: the Federation Puller
//! (`keyserver-federation-puller`) and the Export-File Mirror worker
//! (`keyserver-mirror-worker`). Each is deployed as its own periodically
//! invoked HTTP service (spec.md §2, §6) but they share config loading,
//! tracing setup, and database bootstrap.

pub mod cli;
pub mod config;
pub mod error;
pub mod federation;
pub mod mirror;
pub mod object_store;

use std::io::IsTerminal;

use axum::http::StatusCode;
use tracing_subscriber::EnvFilter;

/// Initializes the process-wide tracing subscriber, matching the compact,
/// target-free formatter the rest of this workspace uses.
pub fn init_tracing() {
    let use_ansi = std::io::stderr().is_terminal();
    let default_log_filter =
        "keyserver=info,keyserver_core=info,keyserver_db=info,keyserver_federation=info,keyserver_mirror=info,tower_http=info,axum=warn";

    tracing_subscriber::fmt()
        .compact()
        .with_target(false)
        .with_ansi(use_ansi)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_log_filter)),
        )
        .init();
}

/// Opens the database pool for the detected engine and applies migrations.
/// Shared by both binaries so the schema is always current on startup.
pub async fn open_database(config: &config::Config) -> anyhow::Result<keyserver_db::DbPool> {
    let engine = match config.database.engine {
        config::DatabaseEngine::Sqlite => keyserver_db::DatabaseEngine::Sqlite,
        config::DatabaseEngine::Postgres => keyserver_db::DatabaseEngine::Postgres,
    };
    let pool = keyserver_db::create_pool_with_engine(
        &config.database.url,
        config.database.max_connections,
        Some(engine),
    )
    .await?;
    keyserver_db::run_migrations(&pool).await?;
    Ok(pool)
}

/// `GET /health` -> `200 "ok"` when the database is reachable (spec.md §6),
/// shared by both trigger binaries.
pub async fn health(pool: &keyserver_db::DbPool) -> (StatusCode, &'static str) {
    match sqlx::query("SELECT 1").fetch_one(pool).await {
        Ok(_) => (StatusCode::OK, "ok"),
        Err(err) => {
            tracing::error!(error = %err, "health check failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "database unreachable")
        }
    }
}
