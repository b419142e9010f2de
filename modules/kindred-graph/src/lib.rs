pub mod client;
pub mod engine;
pub mod gds;
pub mod lifecycle;
pub mod orchestrator;
pub mod pipeline;
pub mod prediction;
pub mod recommender;
pub mod trainer;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;
#[cfg(feature = "test-utils")]
pub mod testutil;

pub use client::GraphClient;
pub use engine::GraphEngine;
pub use gds::GdsEngine;
pub use orchestrator::{Orchestrator, OrchestratorConfig};
pub use pipeline::PipelineSpec;
pub use prediction::PredictionTable;
pub use recommender::{Recommender, RecommenderConfig, RecommenderState, SimilarityTable};
pub use trainer::{train, TrainedModel, TrainingRequest};
