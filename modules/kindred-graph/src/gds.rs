//! Graph Data Science engine implementation over the Bolt driver.
//!
//! Every capability maps to a `CALL gds.*` procedure or a Cypher lookup.
//! All user-supplied values travel as query parameters; query text only
//! ever contains operator-controlled identifiers (labels, property names).

use async_trait::async_trait;
use neo4rs::{query, BoltBoolean, BoltFloat, BoltInteger, BoltMap, BoltString, BoltType};
use serde_json::Value;
use tracing::{debug, info};

use kindred_common::{
    EntityId, KindredError, ModelHandle, PipelineHandle, PredictionRow, ProjectionHandle,
    ProjectionSpec, SimilarityRow,
};

use crate::client::GraphClient;
use crate::engine::{EmbedMutateConfig, EngineResult, GraphEngine, KnnWriteConfig};
use crate::pipeline::{ClassifierSpec, FeatureStep, NodePropertyStep, SplitConfig};

/// GDS-backed [`GraphEngine`].
pub struct GdsEngine {
    client: GraphClient,
}

impl GdsEngine {
    pub fn new(client: GraphClient) -> Self {
        Self { client }
    }

    /// Existence checks normalized to a bool: a row with an `exists`
    /// column, or no row at all for engines that return nothing for
    /// unknown names. Transport failures propagate as `EngineUnavailable`.
    async fn exists(&self, cypher: &str, name: &str) -> EngineResult<bool> {
        let q = query(cypher).param("name", name);
        let mut stream = self
            .client
            .graph
            .execute(q)
            .await
            .map_err(|e| unavailable("existence check", e))?;
        match stream
            .next()
            .await
            .map_err(|e| unavailable("existence check", e))?
        {
            Some(row) => Ok(row.get::<bool>("exists").unwrap_or(false)),
            None => Ok(false),
        }
    }

    async fn run(&self, context: &'static str, q: neo4rs::Query) -> EngineResult<()> {
        self.client
            .graph
            .run(q)
            .await
            .map_err(|e| engine_err(context, e))
    }

    async fn single_id(
        &self,
        context: &'static str,
        q: neo4rs::Query,
    ) -> EngineResult<Option<EntityId>> {
        let mut stream = self
            .client
            .graph
            .execute(q)
            .await
            .map_err(|e| engine_err(context, e))?;
        match stream.next().await.map_err(|e| engine_err(context, e))? {
            Some(row) => Ok(row.get::<i64>("id").ok().map(EntityId)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl GraphEngine for GdsEngine {
    async fn projection_exists(&self, name: &str) -> EngineResult<bool> {
        self.exists(
            "CALL gds.graph.exists($name) YIELD exists RETURN exists",
            name,
        )
        .await
    }

    async fn drop_projection(&self, name: &str) -> EngineResult<()> {
        // failIfMissing=false: dropping an already-gone projection is a no-op
        let q = query("CALL gds.graph.drop($name, false)").param("name", name);
        self.run("drop projection", q).await
    }

    async fn project(&self, spec: &ProjectionSpec) -> EngineResult<ProjectionHandle> {
        let labels: Vec<BoltType> = spec
            .node_labels
            .iter()
            .map(|l| BoltType::String(BoltString::from(l.as_str())))
            .collect();
        let relationships: BoltMap = spec
            .relationships
            .iter()
            .map(|rel| {
                let config = BoltMap::from_iter(vec![(
                    BoltString::from("orientation"),
                    BoltType::String(BoltString::from(rel.orientation.as_str())),
                )]);
                (
                    BoltString::from(rel.rel_type.as_str()),
                    BoltType::Map(config),
                )
            })
            .collect();

        let q = query("CALL gds.graph.project($name, $labels, $relationships)")
            .param("name", spec.name.as_str())
            .param("labels", labels)
            .param("relationships", BoltType::Map(relationships));
        self.run("project graph", q).await?;
        info!(projection = %spec.name, "graph projection created");
        Ok(ProjectionHandle {
            name: spec.name.clone(),
        })
    }

    async fn pipeline_exists(&self, name: &str) -> EngineResult<bool> {
        self.exists(
            "CALL gds.pipeline.exists($name) YIELD exists RETURN exists",
            name,
        )
        .await
    }

    async fn drop_pipeline(&self, name: &str) -> EngineResult<()> {
        let q = query("CALL gds.pipeline.drop($name, false)").param("name", name);
        self.run("drop pipeline", q).await
    }

    async fn create_pipeline(&self, name: &str) -> EngineResult<PipelineHandle> {
        let q = query("CALL gds.beta.pipeline.linkPrediction.create($name)").param("name", name);
        self.run("create pipeline", q).await?;
        Ok(PipelineHandle {
            name: name.to_string(),
        })
    }

    async fn add_node_property(
        &self,
        pipeline: &PipelineHandle,
        step: &NodePropertyStep,
    ) -> EngineResult<()> {
        let mut config = step.params.clone();
        config.insert(
            "mutateProperty".to_string(),
            Value::String(step.mutate_property.clone()),
        );
        let q = query(
            "CALL gds.beta.pipeline.linkPrediction.addNodeProperty($pipeline, $procedure, $config)",
        )
        .param("pipeline", pipeline.name.as_str())
        .param("procedure", step.algorithm.as_str())
        .param("config", object_to_bolt(&config));
        debug!(pipeline = %pipeline.name, algorithm = %step.algorithm, "node property step added");
        self.run("add node property", q).await
    }

    async fn add_feature(
        &self,
        pipeline: &PipelineHandle,
        feature: &FeatureStep,
    ) -> EngineResult<()> {
        let props: Vec<BoltType> = feature
            .input_properties
            .iter()
            .map(|p| BoltType::String(BoltString::from(p.as_str())))
            .collect();
        let props: BoltType = props.into();
        let config = BoltMap::from_iter(vec![(BoltString::from("nodeProperties"), props)]);
        let q = query(
            "CALL gds.beta.pipeline.linkPrediction.addFeature($pipeline, $featureType, $config)",
        )
        .param("pipeline", pipeline.name.as_str())
        .param("featureType", feature.combiner.as_str())
        .param("config", BoltType::Map(config));
        self.run("add feature", q).await
    }

    async fn configure_split(
        &self,
        pipeline: &PipelineHandle,
        split: &SplitConfig,
    ) -> EngineResult<()> {
        let config = BoltMap::from_iter(vec![
            (
                BoltString::from("trainFraction"),
                BoltType::Float(BoltFloat::new(split.train_fraction)),
            ),
            (
                BoltString::from("testFraction"),
                BoltType::Float(BoltFloat::new(split.test_fraction)),
            ),
            (
                BoltString::from("validationFolds"),
                BoltType::Integer(BoltInteger::new(split.validation_folds as i64)),
            ),
        ]);
        let q = query("CALL gds.beta.pipeline.linkPrediction.configureSplit($pipeline, $config)")
            .param("pipeline", pipeline.name.as_str())
            .param("config", BoltType::Map(config));
        self.run("configure split", q).await
    }

    async fn add_classifier(
        &self,
        pipeline: &PipelineHandle,
        classifier: &ClassifierSpec,
    ) -> EngineResult<()> {
        // The classifier kind picks the procedure; there is no generic
        // addClassifier in the engine.
        let procedure = match classifier.kind.as_str() {
            "logisticRegression" => "gds.beta.pipeline.linkPrediction.addLogisticRegression",
            "randomForest" => "gds.beta.pipeline.linkPrediction.addRandomForest",
            "mlp" => "gds.alpha.pipeline.linkPrediction.addMLP",
            other => {
                return Err(KindredError::Engine(format!(
                    "unsupported classifier kind `{other}`"
                )))
            }
        };
        let q = query(&format!("CALL {procedure}($pipeline, $config)"))
            .param("pipeline", pipeline.name.as_str())
            .param("config", object_to_bolt(&classifier.params));
        self.run("add classifier", q).await
    }

    async fn model_exists(&self, name: &str) -> EngineResult<bool> {
        self.exists(
            "CALL gds.model.exists($name) YIELD exists RETURN exists",
            name,
        )
        .await
    }

    async fn drop_model(&self, name: &str) -> EngineResult<()> {
        let q = query("CALL gds.model.drop($name, false)").param("name", name);
        self.run("drop model", q).await
    }

    async fn train_model(
        &self,
        pipeline: &PipelineHandle,
        projection: &ProjectionHandle,
        target_rel_type: &str,
        model_name: &str,
    ) -> EngineResult<ModelHandle> {
        let config = BoltMap::from_iter(vec![
            (
                BoltString::from("pipeline"),
                BoltType::String(BoltString::from(pipeline.name.as_str())),
            ),
            (
                BoltString::from("modelName"),
                BoltType::String(BoltString::from(model_name)),
            ),
            (
                BoltString::from("targetRelationshipType"),
                BoltType::String(BoltString::from(target_rel_type)),
            ),
        ]);
        let q = query(
            "CALL gds.beta.pipeline.linkPrediction.train($graphName, $config) \
             YIELD modelInfo RETURN modelInfo.modelName AS name",
        )
        .param("graphName", projection.name.as_str())
        .param("config", BoltType::Map(config));

        let mut stream = self
            .client
            .graph
            .execute(q)
            .await
            .map_err(|e| engine_err("train model", e))?;
        // Drain the result row so training errors surface here.
        stream
            .next()
            .await
            .map_err(|e| engine_err("train model", e))?;
        info!(model = model_name, projection = %projection.name, "model trained");
        Ok(ModelHandle {
            name: model_name.to_string(),
        })
    }

    async fn predict_stream(
        &self,
        model: &ModelHandle,
        projection: &ProjectionHandle,
        top_n: usize,
    ) -> EngineResult<Vec<PredictionRow>> {
        let config = BoltMap::from_iter(vec![
            (
                BoltString::from("modelName"),
                BoltType::String(BoltString::from(model.name.as_str())),
            ),
            (
                BoltString::from("topN"),
                BoltType::Integer(BoltInteger::new(top_n as i64)),
            ),
        ]);
        let q = query(
            "CALL gds.beta.pipeline.linkPrediction.predict.stream($graphName, $config) \
             YIELD node1, node2, probability \
             RETURN node1, node2, probability \
             ORDER BY probability DESC",
        )
        .param("graphName", projection.name.as_str())
        .param("config", BoltType::Map(config));

        let mut stream = self
            .client
            .graph
            .execute(q)
            .await
            .map_err(|e| engine_err("predict stream", e))?;
        let mut rows = Vec::new();
        while let Some(row) = stream
            .next()
            .await
            .map_err(|e| engine_err("predict stream", e))?
        {
            let node1: i64 = row.get("node1").unwrap_or_default();
            let node2: i64 = row.get("node2").unwrap_or_default();
            let probability: f64 = row.get("probability").unwrap_or_default();
            rows.push(PredictionRow {
                node1: EntityId(node1),
                node2: EntityId(node2),
                probability,
            });
        }
        Ok(rows)
    }

    async fn mutate_embeddings(
        &self,
        projection: &ProjectionHandle,
        cfg: &EmbedMutateConfig,
    ) -> EngineResult<()> {
        let q = query("CALL gds.fastRP.mutate($graphName, $config)")
            .param("graphName", projection.name.as_str())
            .param("config", serde_to_bolt(cfg)?);
        self.run("mutate embeddings", q).await
    }

    async fn write_similarity(
        &self,
        projection: &ProjectionHandle,
        cfg: &KnnWriteConfig,
    ) -> EngineResult<()> {
        let q = query("CALL gds.knn.write($graphName, $config)")
            .param("graphName", projection.name.as_str())
            .param("config", serde_to_bolt(cfg)?);
        self.run("write similarity", q).await
    }

    async fn user_id_by_email(&self, email: &str) -> EngineResult<Option<EntityId>> {
        let q = query("MATCH (n:User {email: $email}) RETURN id(n) AS id LIMIT 1")
            .param("email", email);
        self.single_id("resolve user id", q).await
    }

    async fn group_id_by_name(&self, name: &str) -> EngineResult<Option<EntityId>> {
        let q =
            query("MATCH (n:Groups {name: $name}) RETURN id(n) AS id LIMIT 1").param("name", name);
        self.single_id("resolve group id", q).await
    }

    async fn user_name_by_email(&self, email: &str) -> EngineResult<Option<String>> {
        let q = query("MATCH (u:User {email: $email}) RETURN u.firstname AS firstname LIMIT 1")
            .param("email", email);
        let mut stream = self
            .client
            .graph
            .execute(q)
            .await
            .map_err(|e| engine_err("resolve user name", e))?;
        match stream
            .next()
            .await
            .map_err(|e| engine_err("resolve user name", e))?
        {
            Some(row) => Ok(row.get::<String>("firstname").ok()),
            None => Ok(None),
        }
    }

    async fn similar_pairs(
        &self,
        cohort_property: Option<&str>,
    ) -> EngineResult<Vec<SimilarityRow>> {
        // The cohort property name is operator configuration, never user
        // input; it is the only non-parameter piece of this query.
        let cohort_clause = match cohort_property {
            Some(prop) => format!("WHERE n.{prop} = m.{prop}"),
            None => String::new(),
        };
        let cypher = format!(
            "MATCH (n:User)-[r:SIMILAR]->(m:User) {cohort_clause} \
             RETURN n.firstname AS person1, m.firstname AS person2, r.score AS similarity \
             ORDER BY similarity DESC, person1 ASC, person2 ASC"
        );
        let mut stream = self
            .client
            .graph
            .execute(query(&cypher))
            .await
            .map_err(|e| engine_err("similar pairs", e))?;
        let mut rows = Vec::new();
        while let Some(row) = stream
            .next()
            .await
            .map_err(|e| engine_err("similar pairs", e))?
        {
            let person1: String = row.get("person1").unwrap_or_default();
            let person2: String = row.get("person2").unwrap_or_default();
            let similarity: f64 = row.get("similarity").unwrap_or_default();
            if !person1.is_empty() && !person2.is_empty() {
                rows.push(SimilarityRow {
                    person1,
                    person2,
                    similarity,
                });
            }
        }
        Ok(rows)
    }

    async fn groups_unique_to_peer(
        &self,
        user_name: &str,
        peer_name: &str,
    ) -> EngineResult<Vec<String>> {
        let q = query(
            "MATCH (:User {firstname: $user})-->(g1:Groups) \
             WITH collect(g1) AS groups \
             MATCH (:User {firstname: $peer})-->(g2:Groups) \
             WHERE NOT g2 IN groups \
             RETURN DISTINCT g2.name AS group_name",
        )
        .param("user", user_name)
        .param("peer", peer_name);
        let mut stream = self
            .client
            .graph
            .execute(q)
            .await
            .map_err(|e| engine_err("group difference", e))?;
        let mut groups = Vec::new();
        while let Some(row) = stream
            .next()
            .await
            .map_err(|e| engine_err("group difference", e))?
        {
            if let Ok(name) = row.get::<String>("group_name") {
                groups.push(name);
            }
        }
        Ok(groups)
    }
}

/// Driver failures on regular operations surface as engine errors; the
/// stage wrappers above them add lifecycle context.
fn engine_err(context: &str, e: neo4rs::Error) -> KindredError {
    KindredError::Engine(format!("{context}: {e}"))
}

/// Existence checks fail closed: a failure there means the engine state is
/// unknown (typically unreachable), so it is reported as unavailability
/// and nothing is constructed on top of it.
fn unavailable(context: &str, e: neo4rs::Error) -> KindredError {
    KindredError::EngineUnavailable(format!("{context}: {e}"))
}

/// Serialize a camelCase config struct into a Bolt map parameter.
fn serde_to_bolt<T: serde::Serialize>(cfg: &T) -> EngineResult<BoltType> {
    let value = serde_json::to_value(cfg)
        .map_err(|e| KindredError::Engine(format!("config serialization: {e}")))?;
    match value {
        Value::Object(map) => Ok(object_to_bolt(&map)),
        other => Err(KindredError::Engine(format!(
            "config did not serialize to a map: {other}"
        ))),
    }
}

fn object_to_bolt(map: &serde_json::Map<String, Value>) -> BoltType {
    let entries: Vec<(BoltString, BoltType)> = map
        .iter()
        .filter(|(_, v)| !v.is_null())
        .map(|(k, v)| (BoltString::from(k.as_str()), json_to_bolt(v)))
        .collect();
    BoltType::Map(BoltMap::from_iter(entries))
}

fn json_to_bolt(value: &Value) -> BoltType {
    match value {
        Value::Bool(b) => BoltType::Boolean(BoltBoolean::new(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => BoltType::Integer(BoltInteger::new(i)),
            None => BoltType::Float(BoltFloat::new(n.as_f64().unwrap_or(0.0))),
        },
        Value::String(s) => BoltType::String(BoltString::from(s.as_str())),
        Value::Array(items) => {
            let list: Vec<BoltType> = items
                .iter()
                .filter(|v| !v.is_null())
                .map(json_to_bolt)
                .collect();
            list.into()
        }
        Value::Object(map) => object_to_bolt(map),
        // Nulls are filtered out by the callers above.
        Value::Null => BoltType::String(BoltString::from("")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn numbers_map_to_integer_or_float() {
        assert!(matches!(json_to_bolt(&json!(42)), BoltType::Integer(_)));
        assert!(matches!(json_to_bolt(&json!(0.5)), BoltType::Float(_)));
    }

    #[test]
    fn knn_config_serializes_with_engine_key_names() {
        let cfg = KnnWriteConfig::default();
        let value = serde_json::to_value(&cfg).unwrap();
        assert_eq!(value["topK"], json!(2));
        assert_eq!(value["sampleRate"], json!(1.0));
        assert_eq!(value["writeRelationshipType"], json!("SIMILAR"));
        assert_eq!(value["writeProperty"], json!("score"));
    }

    #[test]
    fn embed_config_serializes_with_engine_key_names() {
        let cfg = EmbedMutateConfig::default();
        let value = serde_json::to_value(&cfg).unwrap();
        assert_eq!(value["embeddingDimension"], json!(4));
        assert_eq!(value["iterationWeights"], json!([0.8, 1.0, 1.0, 1.0]));
        assert_eq!(value["randomSeed"], json!(42));
        assert_eq!(value["mutateProperty"], json!("embedding"));
    }
}
