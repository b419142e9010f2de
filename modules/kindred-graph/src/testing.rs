//! In-memory engine mock for unit tests.
//!
//! Builder-style setup (`with_user`, `with_similar`, ...), interior state
//! behind a std Mutex, and a recorded call log so tests can assert
//! lifecycle ordering (drop-before-create, fail-closed).

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

use async_trait::async_trait;

use kindred_common::{
    EntityId, KindredError, ModelHandle, PipelineHandle, PredictionRow, ProjectionHandle,
    ProjectionSpec, SimilarityRow,
};

use crate::engine::{EmbedMutateConfig, EngineResult, GraphEngine, KnnWriteConfig};
use crate::pipeline::{ClassifierSpec, FeatureStep, NodePropertyStep, SplitConfig};

#[derive(Debug, Clone)]
struct MockUser {
    id: EntityId,
    name: String,
    cohort: Option<String>,
}

#[derive(Debug, Default)]
struct MockState {
    projections: BTreeSet<String>,
    pipelines: BTreeSet<String>,
    models: BTreeSet<String>,
    calls: Vec<String>,
}

/// Scripted graph engine. Everything is set up through builder methods;
/// every trait call is appended to the call log.
#[derive(Default)]
pub struct MockEngine {
    state: Mutex<MockState>,
    users: BTreeMap<String, MockUser>,
    groups: BTreeMap<String, EntityId>,
    memberships: BTreeMap<String, BTreeSet<String>>,
    similar: Vec<SimilarityRow>,
    predictions: Vec<PredictionRow>,
    target_edge_types: BTreeSet<String>,
    unavailable: bool,
}

impl MockEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate an unreachable engine: every call fails with
    /// `EngineUnavailable`.
    pub fn unavailable(mut self) -> Self {
        self.unavailable = true;
        self
    }

    /// Seed a pre-existing projection under the given name.
    pub fn with_projection(self, name: &str) -> Self {
        self.state.lock().unwrap().projections.insert(name.to_string());
        self
    }

    /// Seed a pre-existing trained model under the given name.
    pub fn with_model(self, name: &str) -> Self {
        self.state.lock().unwrap().models.insert(name.to_string());
        self
    }

    pub fn with_user(self, email: &str, id: i64, name: &str) -> Self {
        self.add_user(email, id, name, None)
    }

    pub fn with_user_in_cohort(self, email: &str, id: i64, name: &str, cohort: &str) -> Self {
        self.add_user(email, id, name, Some(cohort.to_string()))
    }

    fn add_user(mut self, email: &str, id: i64, name: &str, cohort: Option<String>) -> Self {
        self.users.insert(
            email.to_string(),
            MockUser {
                id: EntityId(id),
                name: name.to_string(),
                cohort,
            },
        );
        self
    }

    pub fn with_group(mut self, name: &str, id: i64) -> Self {
        self.groups.insert(name.to_string(), EntityId(id));
        self
    }

    pub fn with_membership(mut self, user_name: &str, group: &str) -> Self {
        self.memberships
            .entry(user_name.to_string())
            .or_default()
            .insert(group.to_string());
        self
    }

    pub fn with_similar(mut self, person1: &str, person2: &str, similarity: f64) -> Self {
        self.similar.push(SimilarityRow {
            person1: person1.to_string(),
            person2: person2.to_string(),
            similarity,
        });
        self
    }

    pub fn with_predictions(mut self, rows: Vec<PredictionRow>) -> Self {
        self.predictions = rows;
        self
    }

    /// Declare that the stored graph has edges of this relationship type,
    /// making it usable as a supervision target.
    pub fn with_target_edges(mut self, rel_type: &str) -> Self {
        self.target_edge_types.insert(rel_type.to_string());
        self
    }

    /// The full ordered call log.
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn live_projections(&self) -> Vec<String> {
        self.state.lock().unwrap().projections.iter().cloned().collect()
    }

    pub fn live_models(&self) -> Vec<String> {
        self.state.lock().unwrap().models.iter().cloned().collect()
    }

    fn record(&self, call: String) -> EngineResult<()> {
        self.state.lock().unwrap().calls.push(call);
        if self.unavailable {
            return Err(KindredError::EngineUnavailable(
                "mock engine offline".to_string(),
            ));
        }
        Ok(())
    }

    fn cohort_of(&self, name: &str) -> Option<String> {
        self.users
            .values()
            .find(|u| u.name == name)
            .and_then(|u| u.cohort.clone())
    }
}

#[async_trait]
impl GraphEngine for MockEngine {
    async fn projection_exists(&self, name: &str) -> EngineResult<bool> {
        self.record(format!("projection_exists:{name}"))?;
        Ok(self.state.lock().unwrap().projections.contains(name))
    }

    async fn drop_projection(&self, name: &str) -> EngineResult<()> {
        self.record(format!("drop_projection:{name}"))?;
        self.state.lock().unwrap().projections.remove(name);
        Ok(())
    }

    async fn project(&self, spec: &ProjectionSpec) -> EngineResult<ProjectionHandle> {
        self.record(format!("project:{}", spec.name))?;
        self.state
            .lock()
            .unwrap()
            .projections
            .insert(spec.name.clone());
        Ok(ProjectionHandle {
            name: spec.name.clone(),
        })
    }

    async fn pipeline_exists(&self, name: &str) -> EngineResult<bool> {
        self.record(format!("pipeline_exists:{name}"))?;
        Ok(self.state.lock().unwrap().pipelines.contains(name))
    }

    async fn drop_pipeline(&self, name: &str) -> EngineResult<()> {
        self.record(format!("drop_pipeline:{name}"))?;
        self.state.lock().unwrap().pipelines.remove(name);
        Ok(())
    }

    async fn create_pipeline(&self, name: &str) -> EngineResult<PipelineHandle> {
        self.record(format!("create_pipeline:{name}"))?;
        self.state.lock().unwrap().pipelines.insert(name.to_string());
        Ok(PipelineHandle {
            name: name.to_string(),
        })
    }

    async fn add_node_property(
        &self,
        pipeline: &PipelineHandle,
        step: &NodePropertyStep,
    ) -> EngineResult<()> {
        self.record(format!(
            "add_node_property:{}:{}",
            pipeline.name, step.algorithm
        ))
    }

    async fn add_feature(
        &self,
        pipeline: &PipelineHandle,
        feature: &FeatureStep,
    ) -> EngineResult<()> {
        self.record(format!("add_feature:{}:{}", pipeline.name, feature.combiner))
    }

    async fn configure_split(
        &self,
        pipeline: &PipelineHandle,
        _split: &SplitConfig,
    ) -> EngineResult<()> {
        self.record(format!("configure_split:{}", pipeline.name))
    }

    async fn add_classifier(
        &self,
        pipeline: &PipelineHandle,
        classifier: &ClassifierSpec,
    ) -> EngineResult<()> {
        self.record(format!(
            "add_classifier:{}:{}",
            pipeline.name, classifier.kind
        ))
    }

    async fn model_exists(&self, name: &str) -> EngineResult<bool> {
        self.record(format!("model_exists:{name}"))?;
        Ok(self.state.lock().unwrap().models.contains(name))
    }

    async fn drop_model(&self, name: &str) -> EngineResult<()> {
        self.record(format!("drop_model:{name}"))?;
        self.state.lock().unwrap().models.remove(name);
        Ok(())
    }

    async fn train_model(
        &self,
        pipeline: &PipelineHandle,
        projection: &ProjectionHandle,
        target_rel_type: &str,
        model_name: &str,
    ) -> EngineResult<ModelHandle> {
        self.record(format!("train_model:{model_name}"))?;
        {
            let state = self.state.lock().unwrap();
            if !state.pipelines.contains(&pipeline.name) {
                return Err(KindredError::Engine(format!(
                    "pipeline `{}` does not exist",
                    pipeline.name
                )));
            }
            if !state.projections.contains(&projection.name) {
                return Err(KindredError::Engine(format!(
                    "projection `{}` does not exist",
                    projection.name
                )));
            }
        }
        if !self.target_edge_types.contains(target_rel_type) {
            return Err(KindredError::Engine(format!(
                "projection `{}` has no relationships of type `{target_rel_type}`",
                projection.name
            )));
        }
        self.state
            .lock()
            .unwrap()
            .models
            .insert(model_name.to_string());
        Ok(ModelHandle {
            name: model_name.to_string(),
        })
    }

    async fn predict_stream(
        &self,
        model: &ModelHandle,
        _projection: &ProjectionHandle,
        top_n: usize,
    ) -> EngineResult<Vec<PredictionRow>> {
        self.record(format!("predict_stream:{}", model.name))?;
        if !self.state.lock().unwrap().models.contains(&model.name) {
            return Err(KindredError::Engine(format!(
                "model `{}` does not exist",
                model.name
            )));
        }
        let mut rows = self.predictions.clone();
        rows.sort_by(|a, b| b.probability.total_cmp(&a.probability));
        rows.truncate(top_n);
        Ok(rows)
    }

    async fn mutate_embeddings(
        &self,
        projection: &ProjectionHandle,
        _cfg: &EmbedMutateConfig,
    ) -> EngineResult<()> {
        self.record(format!("mutate_embeddings:{}", projection.name))?;
        if !self
            .state
            .lock()
            .unwrap()
            .projections
            .contains(&projection.name)
        {
            return Err(KindredError::Engine(format!(
                "projection `{}` does not exist",
                projection.name
            )));
        }
        Ok(())
    }

    async fn write_similarity(
        &self,
        projection: &ProjectionHandle,
        _cfg: &KnnWriteConfig,
    ) -> EngineResult<()> {
        self.record(format!("write_similarity:{}", projection.name))
    }

    async fn user_id_by_email(&self, email: &str) -> EngineResult<Option<EntityId>> {
        self.record(format!("user_id_by_email:{email}"))?;
        Ok(self.users.get(email).map(|u| u.id))
    }

    async fn group_id_by_name(&self, name: &str) -> EngineResult<Option<EntityId>> {
        self.record(format!("group_id_by_name:{name}"))?;
        Ok(self.groups.get(name).copied())
    }

    async fn user_name_by_email(&self, email: &str) -> EngineResult<Option<String>> {
        self.record(format!("user_name_by_email:{email}"))?;
        Ok(self.users.get(email).map(|u| u.name.clone()))
    }

    async fn similar_pairs(
        &self,
        cohort_property: Option<&str>,
    ) -> EngineResult<Vec<SimilarityRow>> {
        self.record("similar_pairs".to_string())?;
        let rows = self
            .similar
            .iter()
            .filter(|row| {
                if cohort_property.is_none() {
                    return true;
                }
                match (self.cohort_of(&row.person1), self.cohort_of(&row.person2)) {
                    (Some(a), Some(b)) => a == b,
                    _ => false,
                }
            })
            .cloned()
            .collect();
        Ok(rows)
    }

    async fn groups_unique_to_peer(
        &self,
        user_name: &str,
        peer_name: &str,
    ) -> EngineResult<Vec<String>> {
        self.record(format!("groups_unique_to_peer:{user_name}:{peer_name}"))?;
        let empty = BTreeSet::new();
        let own = self.memberships.get(user_name).unwrap_or(&empty);
        let peers = self.memberships.get(peer_name).unwrap_or(&empty);
        Ok(peers.difference(own).cloned().collect())
    }
}
