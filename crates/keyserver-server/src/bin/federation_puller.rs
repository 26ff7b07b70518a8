//! Federation Puller trigger binary: `GET /?query-id=<id>` (spec.md §6).

use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use clap::Parser;
use keyserver_server::federation::{self, FederationState};
use keyserver_server::{cli, config, health, init_tracing, open_database};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let args = cli::Args::parse();
    let config = config::Config::load(&args.config)?;
    let port = config.server.port;
    let pool = open_database(&config).await?;
    let config = Arc::new(config);

    let state = FederationState { pool: pool.clone(), config };

    let app = Router::new()
        .route("/", get(federation::trigger))
        .route(
            "/health",
            get({
                let pool = pool.clone();
                move || async move { health(&pool).await }
            }),
        )
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    tracing::info!(port, "federation puller listening");
    axum::serve(listener, app).await?;
    Ok(())
}
