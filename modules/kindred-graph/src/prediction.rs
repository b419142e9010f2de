//! In-memory relation over streamed link predictions.
//!
//! Materialized once per trained model and queried by entity ids or by
//! resolved identity. Zero matches is the distinguished `Empty` outcome,
//! never an error, so callers can tell "nothing found" from "something
//! broke".

use tracing::info;

use kindred_common::{EntityId, PredictionRow, QueryOutcome};

use crate::engine::{EngineResult, GraphEngine};
use crate::trainer::TrainedModel;

/// Predictions for one trained model, ordered by descending probability.
#[derive(Debug, Clone, Default)]
pub struct PredictionTable {
    rows: Vec<PredictionRow>,
}

impl PredictionTable {
    /// Collect the model's prediction stream and hold the top rows in
    /// memory, ordered by descending probability.
    pub async fn materialize(
        engine: &dyn GraphEngine,
        trained: &TrainedModel,
        top_n: usize,
    ) -> EngineResult<Self> {
        let mut rows = engine
            .predict_stream(&trained.model, &trained.projection, top_n)
            .await?;
        rows.sort_by(|a, b| b.probability.total_cmp(&a.probability));
        rows.truncate(top_n);
        info!(rows = rows.len(), model = %trained.model.name, "prediction table materialized");
        Ok(Self { rows })
    }

    /// Build a table from already-collected rows. Ordering is enforced
    /// here, not assumed.
    pub fn from_rows(mut rows: Vec<PredictionRow>) -> Self {
        rows.sort_by(|a, b| b.probability.total_cmp(&a.probability));
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[PredictionRow] {
        &self.rows
    }

    /// Rows matching all provided filters (logical AND). An omitted filter
    /// imposes no constraint; with neither filter the whole table comes
    /// back. Zero matches is the `Empty` signal.
    pub fn query_by_ids(
        &self,
        user_id: Option<EntityId>,
        group_id: Option<EntityId>,
    ) -> QueryOutcome<PredictionRow> {
        let rows: Vec<PredictionRow> = self
            .rows
            .iter()
            .filter(|row| user_id.map_or(true, |u| row.node1 == u))
            .filter(|row| group_id.map_or(true, |g| row.node2 == g))
            .cloned()
            .collect();
        QueryOutcome::from_rows(rows)
    }

    /// Resolve human identifiers to entity ids, then filter. An identifier
    /// that resolves to nothing yields `Empty` (the row set cannot match),
    /// not an error; lookups run against the engine with parameterized
    /// queries.
    pub async fn query_by_identity(
        &self,
        engine: &dyn GraphEngine,
        email: Option<&str>,
        group_name: Option<&str>,
    ) -> EngineResult<QueryOutcome<PredictionRow>> {
        let user_id = match email {
            Some(email) => match engine.user_id_by_email(email).await? {
                Some(id) => Some(id),
                None => return Ok(QueryOutcome::Empty),
            },
            None => None,
        };
        let group_id = match group_name {
            Some(name) => match engine.group_id_by_name(name).await? {
                Some(id) => Some(id),
                None => return Ok(QueryOutcome::Empty),
            },
            None => None,
        };
        Ok(self.query_by_ids(user_id, group_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockEngine;

    fn row(node1: i64, node2: i64, probability: f64) -> PredictionRow {
        PredictionRow {
            node1: EntityId(node1),
            node2: EntityId(node2),
            probability,
        }
    }

    fn table() -> PredictionTable {
        PredictionTable::from_rows(vec![
            row(1, 10, 0.4),
            row(1, 11, 0.9),
            row(2, 10, 0.7),
            row(2, 12, 0.2),
        ])
    }

    #[test]
    fn rows_are_ordered_by_descending_probability() {
        let t = table();
        let probs: Vec<f64> = t.rows().iter().map(|r| r.probability).collect();
        assert_eq!(probs, vec![0.9, 0.7, 0.4, 0.2]);
    }

    #[test]
    fn no_filters_return_whole_table() {
        let t = table();
        assert_eq!(t.query_by_ids(None, None).rows().len(), t.len());
    }

    #[test]
    fn filters_are_anded() {
        let t = table();
        let both = t.query_by_ids(Some(EntityId(1)), Some(EntityId(11)));
        assert_eq!(both.rows(), &[row(1, 11, 0.9)]);

        // Conjunction is contained in each single-filter result.
        let by_user = t.query_by_ids(Some(EntityId(1)), None);
        let by_group = t.query_by_ids(None, Some(EntityId(11)));
        for r in both.rows() {
            assert!(by_user.rows().contains(r));
            assert!(by_group.rows().contains(r));
        }
    }

    #[test]
    fn unmatched_filter_is_empty_signal() {
        let t = table();
        let outcome = t.query_by_ids(Some(EntityId(99)), None);
        assert!(outcome.is_empty());
    }

    #[tokio::test]
    async fn identity_query_resolves_and_filters() {
        let engine = MockEngine::new()
            .with_user("ann@example.com", 1, "Ann")
            .with_group("Hikers", 11);
        let t = table();
        let outcome = t
            .query_by_identity(&engine, Some("ann@example.com"), Some("Hikers"))
            .await
            .unwrap();
        assert_eq!(outcome.rows(), &[row(1, 11, 0.9)]);
    }

    #[tokio::test]
    async fn unresolvable_identity_is_empty_not_error() {
        let engine = MockEngine::new();
        let t = table();
        let outcome = t
            .query_by_identity(&engine, Some("nobody@example.com"), None)
            .await
            .unwrap();
        assert!(outcome.is_empty());
    }

    #[tokio::test]
    async fn identity_query_without_filters_returns_all() {
        let engine = MockEngine::new();
        let t = table();
        let outcome = t.query_by_identity(&engine, None, None).await.unwrap();
        assert_eq!(outcome.rows().len(), t.len());
    }
}
