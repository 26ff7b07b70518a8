//! Mirror Worker trigger binary: `GET /` (spec.md §6).

use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use clap::Parser;
use keyserver_server::mirror::{self, MirrorState};
use keyserver_server::object_store::ObjectStoreBackend;
use keyserver_server::{cli, config, health, init_tracing, open_database};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let args = cli::Args::parse();
    let config = config::Config::load(&args.config)?;
    let port = config.server.port;
    let pool = open_database(&config).await?;
    let object_store = Arc::new(ObjectStoreBackend::from_config(&config));
    let config = Arc::new(config);

    let state = MirrorState {
        pool: pool.clone(),
        object_store,
        http: reqwest::Client::new(),
        config,
    };

    let app = Router::new()
        .route("/", get(mirror::trigger))
        .route(
            "/health",
            get({
                let pool = pool.clone();
                move || async move { health(&pool).await }
            }),
        )
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    tracing::info!(port, "mirror worker listening");
    axum::serve(listener, app).await?;
    Ok(())
}
