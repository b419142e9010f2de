use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::Deserialize;
use tracing::{error, info};

use kindred_common::KindredError;

use crate::AppState;

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({"status": "ok"}))
}

/// Run the training pipeline and materialize the prediction table.
pub async fn start(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let mut orchestrator = state.orchestrator.lock().await;
    match orchestrator.start().await {
        Ok(summary) => {
            info!(model = %summary.model, predictions = summary.predictions, "training complete");
            Json(serde_json::json!({
                "model": summary.model,
                "predictions": summary.predictions,
            }))
            .into_response()
        }
        Err(e) => error_response(e),
    }
}

#[derive(Deserialize)]
pub struct PredictParams {
    email: Option<String>,
    group: Option<String>,
}

/// Identity-filtered prediction lookup. Zero, one, or two filters; an
/// identifier matching nothing yields an empty list, not an error.
pub async fn predict(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PredictParams>,
) -> impl IntoResponse {
    let orchestrator = state.orchestrator.lock().await;
    match orchestrator
        .predict(params.email.as_deref(), params.group.as_deref())
        .await
    {
        Ok(outcome) => Json(outcome).into_response(),
        Err(e) => error_response(e),
    }
}

/// Group recommendations for the user behind `email`.
pub async fn recommend(
    State(state): State<Arc<AppState>>,
    Path(email): Path<String>,
) -> impl IntoResponse {
    let orchestrator = state.orchestrator.lock().await;
    match orchestrator.recommend(&email).await {
        Ok(outcome) => Json(outcome).into_response(),
        // No resolvable identity is a successful empty result for callers.
        Err(KindredError::UnknownIdentity { identifier }) => {
            info!(%identifier, "no user behind email, returning empty recommendation");
            Json(serde_json::json!([])).into_response()
        }
        Err(e) => error_response(e),
    }
}

/// Engine and training failures are server-side problems; empty results
/// never reach this path.
fn error_response(e: KindredError) -> axum::response::Response {
    let status = match &e {
        KindredError::EngineUnavailable(_) | KindredError::Engine(_) => StatusCode::BAD_GATEWAY,
        KindredError::ModelUnavailable => StatusCode::CONFLICT,
        KindredError::TrainingFailed { .. }
        | KindredError::InvalidFeatureReference { .. }
        | KindredError::InvalidSplitConfig(_)
        | KindredError::UnknownIdentity { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error!(error = %e, status = %status, "request failed");
    (status, Json(serde_json::json!({"error": e.to_string()}))).into_response()
}
