use std::sync::Arc;

use anyhow::Result;
use axum::{
    routing::{get, post},
    Router,
};
use tokio::sync::Mutex;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

use kindred_common::Config;
use kindred_graph::{GdsEngine, GraphClient, Orchestrator, OrchestratorConfig};

mod rest;

pub struct AppState {
    pub orchestrator: Mutex<Orchestrator>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("kindred=info".parse()?))
        .init();

    let config = Config::from_env();

    let client =
        GraphClient::connect(&config.neo4j_uri, &config.neo4j_user, &config.neo4j_password)
            .await?;
    let engine = Arc::new(GdsEngine::new(client));
    let orchestrator = Orchestrator::new(engine, OrchestratorConfig::from_config(&config));

    let state = Arc::new(AppState {
        orchestrator: Mutex::new(orchestrator),
    });

    let app = Router::new()
        .route("/", get(rest::health))
        .route("/start", post(rest::start))
        .route("/predict", get(rest::predict))
        .route("/recommend/{email}", get(rest::recommend))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = format!("{}:{}", config.api_host, config.api_port);
    info!(%addr, "kindred-api listening");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
