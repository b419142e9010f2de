use thiserror::Error;

/// Error taxonomy for the orchestrator. "Nothing found" is never an error;
/// query paths report it as [`crate::QueryOutcome::Empty`] instead.
#[derive(Error, Debug)]
pub enum KindredError {
    /// Transport/connectivity failure reaching the graph engine.
    /// Fatal for the current call; no retries are attempted.
    #[error("graph engine unavailable: {0}")]
    EngineUnavailable(String),

    /// Engine-side operation failure that is not a transport problem
    /// (e.g. a procedure rejected its arguments).
    #[error("graph engine error: {0}")]
    Engine(String),

    /// The feature combiner referenced a property that no node-property
    /// step produces.
    #[error("feature references unknown node property: {property}")]
    InvalidFeatureReference { property: String },

    #[error("invalid train/test split: {0}")]
    InvalidSplitConfig(String),

    /// A step of the training sequence failed. The whole sequence aborts;
    /// no partial model is left registered under the target name.
    #[error("training failed at stage `{stage}`: {source}")]
    TrainingFailed {
        stage: &'static str,
        #[source]
        source: Box<KindredError>,
    },

    /// An identity lookup found no match where the identity was a required
    /// input (e.g. the email driving a recommendation).
    #[error("unknown identity: {identifier}")]
    UnknownIdentity { identifier: String },

    /// Predict was invoked before training completed successfully.
    #[error("no trained model available; run the training pipeline first")]
    ModelUnavailable,
}

impl KindredError {
    /// Wrap an error as a training failure at the given stage.
    pub fn at_stage(self, stage: &'static str) -> Self {
        KindredError::TrainingFailed {
            stage,
            source: Box::new(self),
        }
    }
}
