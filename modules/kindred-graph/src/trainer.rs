//! Training coordinator: makes sure a fresh projection backs training,
//! builds and configures the pipeline, and drives model training.
//!
//! Every step runs under create-or-replace lifecycle semantics, so a
//! failure at any stage leaves no partial model registered under the
//! target name. Failures surface as `TrainingFailed` tagged with the
//! stage that broke.

use tracing::info;

use kindred_common::{ModelHandle, ProjectionHandle, ProjectionSpec};

use crate::engine::{EngineResult, GraphEngine};
use crate::lifecycle::{ensure_present, ResourceKind};
use crate::pipeline::{self, PipelineSpec};

/// Everything needed to train one model.
#[derive(Debug, Clone)]
pub struct TrainingRequest {
    pub projection: ProjectionSpec,
    pub pipeline_name: String,
    pub pipeline: PipelineSpec,
    /// Relationship type used as supervision for link prediction.
    pub target_rel_type: String,
    pub model_name: String,
}

/// A trained model bound to the projection it was trained on.
#[derive(Debug, Clone)]
pub struct TrainedModel {
    pub model: ModelHandle,
    pub projection: ProjectionHandle,
}

/// Run the full training sequence: project, build pipeline, configure,
/// train. Returns the trained-model handle bound to its projection.
pub async fn train(
    engine: &dyn GraphEngine,
    request: &TrainingRequest,
) -> EngineResult<TrainedModel> {
    info!(
        projection = %request.projection.name,
        pipeline = %request.pipeline_name,
        model = %request.model_name,
        "training sequence starting"
    );

    let projection = ensure_present(
        engine,
        ResourceKind::Projection,
        &request.projection.name,
        || engine.project(&request.projection),
    )
    .await
    .map_err(|e| e.at_stage("project"))?;

    let pipeline = ensure_present(
        engine,
        ResourceKind::Pipeline,
        &request.pipeline_name,
        || engine.create_pipeline(&request.pipeline_name),
    )
    .await
    .map_err(|e| e.at_stage("pipeline"))?;

    pipeline::configure(engine, &pipeline, &request.pipeline)
        .await
        .map_err(|e| e.at_stage("configure"))?;

    let model = ensure_present(engine, ResourceKind::Model, &request.model_name, || {
        engine.train_model(
            &pipeline,
            &projection,
            &request.target_rel_type,
            &request.model_name,
        )
    })
    .await
    .map_err(|e| e.at_stage("train"))?;

    info!(model = %model.name, "training sequence complete");

    Ok(TrainedModel { model, projection })
}

impl TrainingRequest {
    /// The production request: social graph projection, default
    /// link-prediction pipeline, supervised on `UserIsInGroup`.
    pub fn link_prediction(
        graph_name: impl Into<String>,
        pipeline_name: impl Into<String>,
        model_name: impl Into<String>,
    ) -> Self {
        Self {
            projection: ProjectionSpec::social_graph(graph_name),
            pipeline_name: pipeline_name.into(),
            pipeline: PipelineSpec::link_prediction_defaults(),
            target_rel_type: "UserIsInGroup".to_string(),
            model_name: model_name.into(),
        }
    }
}
