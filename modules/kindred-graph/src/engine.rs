//! Capability surface of the external graph engine.
//!
//! The engine (storage, embeddings, KNN, link-prediction training and
//! inference) is a black box behind this trait. The core never sees
//! transport details or engine response shapes; implementations normalize
//! both (e.g. existence checks that raise vs. return a flag).

use async_trait::async_trait;
use serde::Serialize;

use kindred_common::{
    EntityId, KindredError, ModelHandle, PipelineHandle, PredictionRow, ProjectionHandle,
    ProjectionSpec, SimilarityRow,
};

use crate::pipeline::{ClassifierSpec, FeatureStep, NodePropertyStep, SplitConfig};

pub type EngineResult<T> = Result<T, KindredError>;

/// Node-embedding mutate configuration (fastRP written into the
/// projection, not the stored graph).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbedMutateConfig {
    pub embedding_dimension: u32,
    pub iteration_weights: Vec<f64>,
    pub random_seed: u64,
    pub mutate_property: String,
}

impl Default for EmbedMutateConfig {
    fn default() -> Self {
        Self {
            embedding_dimension: 4,
            iteration_weights: vec![0.8, 1.0, 1.0, 1.0],
            random_seed: 42,
            mutate_property: "embedding".to_string(),
        }
    }
}

/// K-nearest-neighbor write configuration: similarity edges written back
/// to the stored graph as `SIMILAR` relationships carrying `score`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KnnWriteConfig {
    pub node_properties: Vec<String>,
    pub top_k: u32,
    pub sample_rate: f64,
    pub delta_threshold: f64,
    pub random_seed: u64,
    pub concurrency: u32,
    pub write_property: String,
    pub write_relationship_type: String,
}

impl Default for KnnWriteConfig {
    fn default() -> Self {
        Self {
            node_properties: vec!["embedding".to_string()],
            top_k: 2,
            sample_rate: 1.0,
            delta_threshold: 0.0,
            random_seed: 42,
            concurrency: 1,
            write_property: "score".to_string(),
            write_relationship_type: "SIMILAR".to_string(),
        }
    }
}

/// Everything the orchestrator consumes from the graph engine.
///
/// All query methods are parameterized at the implementation boundary;
/// user-supplied identifiers never appear in query text.
#[async_trait]
pub trait GraphEngine: Send + Sync {
    // Projections
    async fn projection_exists(&self, name: &str) -> EngineResult<bool>;
    async fn drop_projection(&self, name: &str) -> EngineResult<()>;
    async fn project(&self, spec: &ProjectionSpec) -> EngineResult<ProjectionHandle>;

    // Link-prediction pipelines
    async fn pipeline_exists(&self, name: &str) -> EngineResult<bool>;
    async fn drop_pipeline(&self, name: &str) -> EngineResult<()>;
    async fn create_pipeline(&self, name: &str) -> EngineResult<PipelineHandle>;
    async fn add_node_property(
        &self,
        pipeline: &PipelineHandle,
        step: &NodePropertyStep,
    ) -> EngineResult<()>;
    async fn add_feature(&self, pipeline: &PipelineHandle, feature: &FeatureStep)
        -> EngineResult<()>;
    async fn configure_split(
        &self,
        pipeline: &PipelineHandle,
        split: &SplitConfig,
    ) -> EngineResult<()>;
    async fn add_classifier(
        &self,
        pipeline: &PipelineHandle,
        classifier: &ClassifierSpec,
    ) -> EngineResult<()>;

    // Models
    async fn model_exists(&self, name: &str) -> EngineResult<bool>;
    async fn drop_model(&self, name: &str) -> EngineResult<()>;
    async fn train_model(
        &self,
        pipeline: &PipelineHandle,
        projection: &ProjectionHandle,
        target_rel_type: &str,
        model_name: &str,
    ) -> EngineResult<ModelHandle>;

    /// Stream the model's top-N predictions over the projection.
    async fn predict_stream(
        &self,
        model: &ModelHandle,
        projection: &ProjectionHandle,
        top_n: usize,
    ) -> EngineResult<Vec<PredictionRow>>;

    // Opaque mutate/write algorithm execution (recommender side)
    async fn mutate_embeddings(
        &self,
        projection: &ProjectionHandle,
        cfg: &EmbedMutateConfig,
    ) -> EngineResult<()>;
    async fn write_similarity(
        &self,
        projection: &ProjectionHandle,
        cfg: &KnnWriteConfig,
    ) -> EngineResult<()>;

    // Identity resolution and ad-hoc relationship queries
    async fn user_id_by_email(&self, email: &str) -> EngineResult<Option<EntityId>>;
    async fn group_id_by_name(&self, name: &str) -> EngineResult<Option<EntityId>>;
    async fn user_name_by_email(&self, email: &str) -> EngineResult<Option<String>>;

    /// All SIMILAR pairs, ordered by similarity descending then
    /// `(person1, person2)` ascending. When `cohort_property` is set, only
    /// pairs whose named attribute matches are returned.
    async fn similar_pairs(&self, cohort_property: Option<&str>)
        -> EngineResult<Vec<SimilarityRow>>;

    /// Group names the peer belongs to that `user_name` does not,
    /// deduplicated.
    async fn groups_unique_to_peer(
        &self,
        user_name: &str,
        peer_name: &str,
    ) -> EngineResult<Vec<String>>;
}
