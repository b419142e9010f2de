//! Pipeline configurator: builds the deterministic feature/training spec
//! and applies it to a pipeline handle, in order. Stateless: nothing is
//! kept between calls; the engine holds the configured pipeline.

use std::collections::BTreeSet;

use serde_json::{json, Map, Value};
use tracing::debug;

use kindred_common::{KindredError, PipelineHandle};

use crate::engine::{EngineResult, GraphEngine};

/// One node-property step: run `algorithm` over the projection and write
/// its output under `mutate_property`, available downstream as a feature
/// input.
#[derive(Debug, Clone, PartialEq)]
pub struct NodePropertyStep {
    pub algorithm: String,
    pub mutate_property: String,
    /// Algorithm-specific parameters, keyed by the engine's camelCase
    /// names. `Map` keeps insertion order so application is deterministic.
    pub params: Map<String, Value>,
}

impl NodePropertyStep {
    /// A step whose output property is named after the algorithm itself.
    pub fn self_named(algorithm: impl Into<String>) -> Self {
        let algorithm = algorithm.into();
        Self {
            mutate_property: algorithm.clone(),
            algorithm,
            params: Map::new(),
        }
    }
}

/// Feature combiner over previously produced node properties.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureStep {
    pub combiner: String,
    pub input_properties: Vec<String>,
}

/// Train/test split with validation folds. Fractions must each lie in
/// (0, 1) and sum to at most 1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SplitConfig {
    pub train_fraction: f64,
    pub test_fraction: f64,
    pub validation_folds: u32,
}

impl SplitConfig {
    pub fn validate(&self) -> Result<(), KindredError> {
        for (label, f) in [
            ("trainFraction", self.train_fraction),
            ("testFraction", self.test_fraction),
        ] {
            if f <= 0.0 || f >= 1.0 {
                return Err(KindredError::InvalidSplitConfig(format!(
                    "{label} {f} outside (0, 1)"
                )));
            }
        }
        let sum = self.train_fraction + self.test_fraction;
        if sum > 1.0 {
            return Err(KindredError::InvalidSplitConfig(format!(
                "fractions sum to {sum}, above 1"
            )));
        }
        if self.validation_folds == 0 {
            return Err(KindredError::InvalidSplitConfig(
                "validationFolds must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Classifier added as the final pipeline step.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifierSpec {
    pub kind: String,
    pub params: Map<String, Value>,
}

/// The full feature/training specification applied to a pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSpec {
    pub node_properties: Vec<NodePropertyStep>,
    pub feature: FeatureStep,
    pub split: SplitConfig,
    pub classifier: ClassifierSpec,
}

impl PipelineSpec {
    /// The link-prediction configuration used in production: fastRP
    /// embeddings plus pageRank and betweenness, combined with hadamard,
    /// a 0.3/0.3 split over 7 folds, and logistic regression.
    pub fn link_prediction_defaults() -> Self {
        let mut embed_params = Map::new();
        embed_params.insert("embeddingDimension".into(), json!(256));
        embed_params.insert("iterationWeights".into(), json!([0.8, 1, 1, 1]));
        embed_params.insert("normalizationStrength".into(), json!(0.5));
        embed_params.insert("randomSeed".into(), json!(42));

        Self {
            node_properties: vec![
                NodePropertyStep {
                    algorithm: "fastRP".into(),
                    mutate_property: "embedding".into(),
                    params: embed_params,
                },
                NodePropertyStep::self_named("pageRank"),
                NodePropertyStep::self_named("betweenness"),
            ],
            feature: FeatureStep {
                combiner: "hadamard".into(),
                input_properties: vec![
                    "embedding".into(),
                    "pageRank".into(),
                    "betweenness".into(),
                ],
            },
            split: SplitConfig {
                train_fraction: 0.3,
                test_fraction: 0.3,
                validation_folds: 7,
            },
            classifier: ClassifierSpec {
                kind: "logisticRegression".into(),
                params: Map::new(),
            },
        }
    }

    /// Check the spec is internally consistent before any engine call:
    /// every feature input must be produced by a node-property step, and
    /// the split must be sane.
    pub fn validate(&self) -> Result<(), KindredError> {
        let produced: BTreeSet<&str> = self
            .node_properties
            .iter()
            .map(|s| s.mutate_property.as_str())
            .collect();
        for input in &self.feature.input_properties {
            if !produced.contains(input.as_str()) {
                return Err(KindredError::InvalidFeatureReference {
                    property: input.clone(),
                });
            }
        }
        self.split.validate()
    }
}

/// Apply the spec to a freshly created pipeline, in order: node-property
/// steps, feature combiner, split, classifier. Fails fast on an invalid
/// spec without touching the engine.
pub async fn configure(
    engine: &dyn GraphEngine,
    pipeline: &PipelineHandle,
    spec: &PipelineSpec,
) -> EngineResult<()> {
    spec.validate()?;

    for step in &spec.node_properties {
        debug!(pipeline = %pipeline.name, algorithm = %step.algorithm, "adding node property step");
        engine.add_node_property(pipeline, step).await?;
    }
    engine.add_feature(pipeline, &spec.feature).await?;
    engine.configure_split(pipeline, &spec.split).await?;
    engine.add_classifier(pipeline, &spec.classifier).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_spec_is_valid() {
        let spec = PipelineSpec::link_prediction_defaults();
        assert!(spec.validate().is_ok());
        assert_eq!(spec.node_properties.len(), 3);
        assert_eq!(spec.node_properties[0].mutate_property, "embedding");
        assert_eq!(
            spec.node_properties[0].params["embeddingDimension"],
            json!(256)
        );
        assert_eq!(spec.split.validation_folds, 7);
        assert_eq!(spec.classifier.kind, "logisticRegression");
    }

    #[test]
    fn unknown_feature_input_is_rejected() {
        let mut spec = PipelineSpec::link_prediction_defaults();
        spec.feature.input_properties.push("degree".into());
        match spec.validate() {
            Err(KindredError::InvalidFeatureReference { property }) => {
                assert_eq!(property, "degree");
            }
            other => panic!("expected InvalidFeatureReference, got {other:?}"),
        }
    }

    #[test]
    fn split_fractions_above_one_are_rejected() {
        let mut spec = PipelineSpec::link_prediction_defaults();
        spec.split.train_fraction = 0.7;
        spec.split.test_fraction = 0.5;
        assert!(matches!(
            spec.validate(),
            Err(KindredError::InvalidSplitConfig(_))
        ));
    }

    #[test]
    fn split_fraction_bounds_are_exclusive() {
        let mut spec = PipelineSpec::link_prediction_defaults();
        spec.split.train_fraction = 1.0;
        spec.split.test_fraction = 0.0;
        assert!(matches!(
            spec.validate(),
            Err(KindredError::InvalidSplitConfig(_))
        ));

        spec.split.train_fraction = 0.3;
        spec.split.test_fraction = -0.1;
        assert!(matches!(
            spec.validate(),
            Err(KindredError::InvalidSplitConfig(_))
        ));
    }

    #[test]
    fn zero_validation_folds_are_rejected() {
        let mut spec = PipelineSpec::link_prediction_defaults();
        spec.split.validation_folds = 0;
        assert!(matches!(
            spec.validate(),
            Err(KindredError::InvalidSplitConfig(_))
        ));
    }
}
