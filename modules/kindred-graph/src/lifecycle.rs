//! Idempotent create-or-replace lifecycle for named engine resources.
//!
//! Every named resource (projection, pipeline, model) has at most one live
//! instance in the engine. Creation always drops any prior instance first,
//! so a successful `ensure_present` leaves exactly one freshly built
//! resource under the name, never a stale one.

use std::future::Future;

use tracing::debug;

use crate::engine::{EngineResult, GraphEngine};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Projection,
    Pipeline,
    Model,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Projection => "projection",
            ResourceKind::Pipeline => "pipeline",
            ResourceKind::Model => "model",
        }
    }
}

/// Drop the named resource if it exists. Returns whether a drop happened.
///
/// The existence check is already normalized by the engine implementation
/// ("not found" responses come back as `false`, not as errors). If the
/// check itself fails the error propagates and nothing is dropped:
/// fail-closed, no construction on top of unknown engine state.
pub async fn ensure_absent(
    engine: &dyn GraphEngine,
    kind: ResourceKind,
    name: &str,
) -> EngineResult<bool> {
    let exists = match kind {
        ResourceKind::Projection => engine.projection_exists(name).await?,
        ResourceKind::Pipeline => engine.pipeline_exists(name).await?,
        ResourceKind::Model => engine.model_exists(name).await?,
    };
    if !exists {
        return Ok(false);
    }
    debug!(kind = kind.as_str(), name, "dropping stale resource");
    match kind {
        ResourceKind::Projection => engine.drop_projection(name).await?,
        ResourceKind::Pipeline => engine.drop_pipeline(name).await?,
        ResourceKind::Model => engine.drop_model(name).await?,
    }
    Ok(true)
}

/// Create-or-replace: drop any prior instance, then run the constructor.
/// After a successful return exactly one resource with this name exists,
/// and it is the one `build` just made.
pub async fn ensure_present<T, F, Fut>(
    engine: &dyn GraphEngine,
    kind: ResourceKind,
    name: &str,
    build: F,
) -> EngineResult<T>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = EngineResult<T>>,
{
    ensure_absent(engine, kind, name).await?;
    build().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockEngine;
    use kindred_common::{KindredError, ProjectionSpec};

    fn spec(name: &str) -> ProjectionSpec {
        ProjectionSpec::social_graph(name)
    }

    #[tokio::test]
    async fn absent_resource_is_not_dropped() {
        let engine = MockEngine::new();
        let dropped = ensure_absent(&engine, ResourceKind::Projection, "g1")
            .await
            .unwrap();
        assert!(!dropped);
        assert_eq!(engine.calls(), vec!["projection_exists:g1"]);
    }

    #[tokio::test]
    async fn existing_resource_is_dropped_before_create() {
        let engine = MockEngine::new().with_projection("g1");
        let g1 = spec("g1");
        let handle = ensure_present(&engine, ResourceKind::Projection, "g1", || {
            engine.project(&g1)
        })
        .await
        .unwrap();
        assert_eq!(handle.name, "g1");
        // Drop-then-create order, never create over a live instance.
        assert_eq!(
            engine.calls(),
            vec!["projection_exists:g1", "drop_projection:g1", "project:g1"]
        );
    }

    #[tokio::test]
    async fn ensure_present_twice_yields_one_fresh_resource() {
        let engine = MockEngine::new();
        let g1 = spec("g1");
        for _ in 0..2 {
            ensure_present(&engine, ResourceKind::Projection, "g1", || {
                engine.project(&g1)
            })
            .await
            .unwrap();
        }
        assert_eq!(engine.live_projections(), vec!["g1".to_string()]);
        // Second call found the first's resource and replaced it.
        assert_eq!(
            engine.calls(),
            vec![
                "projection_exists:g1",
                "project:g1",
                "projection_exists:g1",
                "drop_projection:g1",
                "project:g1",
            ]
        );
    }

    #[tokio::test]
    async fn unavailable_engine_fails_closed() {
        let engine = MockEngine::new().unavailable();
        let result: Result<kindred_common::ModelHandle, _> =
            ensure_present(&engine, ResourceKind::Model, "m1", || async {
                panic!("constructor must not run when the existence check fails")
            })
            .await;
        assert!(matches!(result, Err(KindredError::EngineUnavailable(_))));
    }
}
