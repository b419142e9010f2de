//! Session-scoped facade over the pipeline and recommendation sides.
//!
//! One orchestrator instance owns one engine connection and runs strictly
//! sequentially: project → configure → train → predict. Prediction before
//! a successful `start` reports `ModelUnavailable` instead of touching the
//! engine. Concurrent instances sharing resource names race on
//! create-or-replace; callers needing isolation must use distinct names.

use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use kindred_common::{Config, EntityId, KindredError, PredictionRow, QueryOutcome};

use crate::engine::{EngineResult, GraphEngine};
use crate::prediction::PredictionTable;
use crate::recommender::{Recommender, RecommenderConfig};
use crate::trainer::{self, TrainedModel, TrainingRequest};

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub graph_name: String,
    pub pipeline_name: String,
    pub model_name: String,
    pub prediction_top_n: usize,
    pub cohort_property: Option<String>,
}

impl OrchestratorConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            graph_name: config.graph_name.clone(),
            pipeline_name: config.pipeline_name.clone(),
            model_name: config.model_name.clone(),
            prediction_top_n: config.prediction_top_n,
            cohort_property: config.similarity_cohort_property.clone(),
        }
    }
}

/// Result summary of a training run, serializable for callers.
#[derive(Debug, Clone, Serialize)]
pub struct StartSummary {
    pub model: String,
    pub predictions: usize,
}

pub struct Orchestrator {
    engine: Arc<dyn GraphEngine>,
    config: OrchestratorConfig,
    trained: Option<TrainedModel>,
    predictions: Option<PredictionTable>,
}

impl Orchestrator {
    pub fn new(engine: Arc<dyn GraphEngine>, config: OrchestratorConfig) -> Self {
        Self {
            engine,
            config,
            trained: None,
            predictions: None,
        }
    }

    /// Whether a model has been trained and its predictions materialized.
    pub fn is_ready(&self) -> bool {
        self.predictions.is_some()
    }

    /// Run the training pipeline and materialize the prediction table.
    /// On failure the model handle stays unset, leaving the orchestrator
    /// in a known non-ready state.
    pub async fn start(&mut self) -> EngineResult<StartSummary> {
        let request = TrainingRequest::link_prediction(
            self.config.graph_name.as_str(),
            self.config.pipeline_name.as_str(),
            self.config.model_name.as_str(),
        );
        let trained = trainer::train(self.engine.as_ref(), &request).await?;

        let table = PredictionTable::materialize(
            self.engine.as_ref(),
            &trained,
            self.config.prediction_top_n,
        )
        .await
        .map_err(|e| e.at_stage("predict"))?;

        let summary = StartSummary {
            model: trained.model.name.clone(),
            predictions: table.len(),
        };
        self.trained = Some(trained);
        self.predictions = Some(table);
        Ok(summary)
    }

    fn table(&self) -> EngineResult<&PredictionTable> {
        self.predictions
            .as_ref()
            .ok_or(KindredError::ModelUnavailable)
    }

    /// Identity-filtered prediction lookup. Zero, one, or two filters.
    pub async fn predict(
        &self,
        email: Option<&str>,
        group_name: Option<&str>,
    ) -> EngineResult<QueryOutcome<PredictionRow>> {
        self.table()?
            .query_by_identity(self.engine.as_ref(), email, group_name)
            .await
    }

    /// Id-filtered prediction lookup. Zero, one, or two filters.
    pub fn predict_by_ids(
        &self,
        user_id: Option<EntityId>,
        group_id: Option<EntityId>,
    ) -> EngineResult<QueryOutcome<PredictionRow>> {
        Ok(self.table()?.query_by_ids(user_id, group_id))
    }

    /// Run one full recommendation pass for the user behind `email`.
    /// Each invocation is its own recommender state machine, restarting
    /// from an unconnected state and rebuilding the projection.
    pub async fn recommend(&self, email: &str) -> EngineResult<QueryOutcome<String>> {
        let config = RecommenderConfig {
            cohort_property: self.config.cohort_property.clone(),
            ..RecommenderConfig::new(self.config.graph_name.as_str())
        };
        let mut recommender = Recommender::new(self.engine.clone(), config);
        recommender.establish_connection().await?;
        recommender.recommend(email).await
    }

    /// Release the engine connection. Consuming `self` guarantees the
    /// release happens exactly once; dropping the orchestrator on an error
    /// path releases it the same way.
    pub fn close(self) {
        info!("orchestrator closed, engine connection released");
        drop(self.engine);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockEngine;

    fn config() -> OrchestratorConfig {
        OrchestratorConfig {
            graph_name: "g1".to_string(),
            pipeline_name: "pipe".to_string(),
            model_name: "model-1".to_string(),
            prediction_top_n: 1000,
            cohort_property: None,
        }
    }

    fn prediction(node1: i64, node2: i64, probability: f64) -> PredictionRow {
        PredictionRow {
            node1: EntityId(node1),
            node2: EntityId(node2),
            probability,
        }
    }

    #[tokio::test]
    async fn predict_before_start_is_model_unavailable() {
        let engine = Arc::new(MockEngine::new());
        let orchestrator = Orchestrator::new(engine.clone(), config());
        assert!(!orchestrator.is_ready());
        match orchestrator.predict(Some("a@example.com"), None).await {
            Err(KindredError::ModelUnavailable) => {}
            other => panic!("expected ModelUnavailable, got {other:?}"),
        }
        // The engine was never consulted.
        assert!(engine.calls().is_empty());
    }

    #[tokio::test]
    async fn start_then_predict_round_trip() {
        let engine = Arc::new(
            MockEngine::new()
                .with_target_edges("UserIsInGroup")
                .with_user("ann@example.com", 1, "Ann")
                .with_group("Hikers", 11)
                .with_predictions(vec![prediction(1, 11, 0.9), prediction(2, 11, 0.4)]),
        );
        let mut orchestrator = Orchestrator::new(engine, config());

        let summary = orchestrator.start().await.unwrap();
        assert_eq!(summary.model, "model-1");
        assert_eq!(summary.predictions, 2);
        assert!(orchestrator.is_ready());

        let outcome = orchestrator
            .predict(Some("ann@example.com"), Some("Hikers"))
            .await
            .unwrap();
        assert_eq!(outcome.rows(), &[prediction(1, 11, 0.9)]);
    }

    #[tokio::test]
    async fn failed_start_leaves_orchestrator_non_ready() {
        // No target edges: training fails at the train stage.
        let engine = Arc::new(MockEngine::new());
        let mut orchestrator = Orchestrator::new(engine, config());
        assert!(orchestrator.start().await.is_err());
        assert!(!orchestrator.is_ready());
        assert!(matches!(
            orchestrator.predict_by_ids(None, None),
            Err(KindredError::ModelUnavailable)
        ));
    }
}
