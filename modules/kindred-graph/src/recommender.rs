//! Similarity-based group recommender.
//!
//! Builds pairwise user similarity in the engine (fastRP embeddings, then
//! KNN written back as SIMILAR edges), reads the pairs into an in-memory
//! table, and derives recommendations as the union over each similar
//! peer's groups minus the user's own.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::info;

use kindred_common::{KindredError, ProjectionSpec, QueryOutcome, SimilarityRow};

use crate::engine::{EmbedMutateConfig, EngineResult, GraphEngine, KnnWriteConfig};
use crate::lifecycle::{ensure_present, ResourceKind};

/// Configuration for one recommender session.
#[derive(Debug, Clone)]
pub struct RecommenderConfig {
    pub projection: ProjectionSpec,
    pub embedding: EmbedMutateConfig,
    pub knn: KnnWriteConfig,
    /// Node property similar pairs must share (e.g. `gender`); `None`
    /// disables the restriction.
    pub cohort_property: Option<String>,
}

impl RecommenderConfig {
    pub fn new(graph_name: impl Into<String>) -> Self {
        Self {
            projection: ProjectionSpec::social_graph(graph_name),
            embedding: EmbedMutateConfig::default(),
            knn: KnnWriteConfig::default(),
            cohort_property: Some("gender".to_string()),
        }
    }

    pub fn without_cohort_filter(mut self) -> Self {
        self.cohort_property = None;
        self
    }
}

/// Progress of one recommender run. Transitions are one-way;
/// `establish_connection` always restarts from `Unconnected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecommenderState {
    Unconnected,
    Projected,
    SimilarityComputed,
    Queried,
    Done,
}

/// SIMILAR pairs held in memory, ordered by descending similarity with
/// ties broken by `(person1, person2)` ascending.
#[derive(Debug, Clone, Default)]
pub struct SimilarityTable {
    rows: Vec<SimilarityRow>,
}

impl SimilarityTable {
    /// Ordering is enforced here, not assumed from the engine.
    pub fn from_rows(mut rows: Vec<SimilarityRow>) -> Self {
        rows.sort_by(|a, b| {
            b.similarity
                .total_cmp(&a.similarity)
                .then_with(|| a.person1.cmp(&b.person1))
                .then_with(|| a.person2.cmp(&b.person2))
        });
        Self { rows }
    }

    pub fn rows(&self) -> &[SimilarityRow] {
        &self.rows
    }

    /// The set of peers reported similar to `name`.
    pub fn peers_of(&self, name: &str) -> BTreeSet<String> {
        self.rows
            .iter()
            .filter(|r| r.person1 == name)
            .map(|r| r.person2.clone())
            .collect()
    }
}

pub struct Recommender {
    engine: Arc<dyn GraphEngine>,
    config: RecommenderConfig,
    state: RecommenderState,
    table: Option<SimilarityTable>,
}

impl Recommender {
    pub fn new(engine: Arc<dyn GraphEngine>, config: RecommenderConfig) -> Self {
        Self {
            engine,
            config,
            state: RecommenderState::Unconnected,
            table: None,
        }
    }

    pub fn state(&self) -> RecommenderState {
        self.state
    }

    pub fn similarity_table(&self) -> Option<&SimilarityTable> {
        self.table.as_ref()
    }

    /// Project the graph, compute embeddings and SIMILAR edges, and load
    /// the similarity table. Re-entrant: every call restarts from
    /// `Unconnected` and re-runs the create-or-replace projection, so
    /// repeated runs never accumulate duplicate SIMILAR edges.
    pub async fn establish_connection(&mut self) -> EngineResult<()> {
        self.state = RecommenderState::Unconnected;
        self.table = None;

        let engine = self.engine.as_ref();
        let projection = ensure_present(
            engine,
            ResourceKind::Projection,
            &self.config.projection.name,
            || engine.project(&self.config.projection),
        )
        .await?;
        self.state = RecommenderState::Projected;

        engine
            .mutate_embeddings(&projection, &self.config.embedding)
            .await?;
        engine.write_similarity(&projection, &self.config.knn).await?;
        self.state = RecommenderState::SimilarityComputed;

        let rows = engine
            .similar_pairs(self.config.cohort_property.as_deref())
            .await?;
        info!(pairs = rows.len(), "similarity table loaded");
        self.table = Some(SimilarityTable::from_rows(rows));
        self.state = RecommenderState::Queried;
        Ok(())
    }

    /// Recommend groups for the user behind `email`: groups any similar
    /// peer belongs to that the user does not, deduplicated across peers.
    /// No peers or no differing groups is the `Empty` outcome.
    ///
    /// The email must resolve; recommendation has no meaning without an
    /// identity, so an unresolvable email is `UnknownIdentity`.
    pub async fn recommend(&mut self, email: &str) -> EngineResult<QueryOutcome<String>> {
        let table = match (&self.state, &self.table) {
            (RecommenderState::Queried | RecommenderState::Done, Some(table)) => table,
            _ => {
                return Err(KindredError::Engine(
                    "recommender not connected; call establish_connection first".to_string(),
                ))
            }
        };

        let name = self
            .engine
            .user_name_by_email(email)
            .await?
            .ok_or_else(|| KindredError::UnknownIdentity {
                identifier: email.to_string(),
            })?;

        let peers = table.peers_of(&name);
        let mut recommended: BTreeSet<String> = BTreeSet::new();
        for peer in &peers {
            let groups = self.engine.groups_unique_to_peer(&name, peer).await?;
            recommended.extend(groups);
        }
        info!(
            user = %name,
            peers = peers.len(),
            groups = recommended.len(),
            "recommendation computed"
        );

        self.state = RecommenderState::Done;
        Ok(QueryOutcome::from_rows(recommended.into_iter().collect()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockEngine;

    fn sim(p1: &str, p2: &str, score: f64) -> SimilarityRow {
        SimilarityRow {
            person1: p1.to_string(),
            person2: p2.to_string(),
            similarity: score,
        }
    }

    /// Users A and B, similar to each other; A is in {g1, g2}, B in {g2, g3}.
    fn engine_with_two_users() -> Arc<MockEngine> {
        Arc::new(
            MockEngine::new()
                .with_user("a@example.com", 1, "A")
                .with_user("b@example.com", 2, "B")
                .with_membership("A", "g1")
                .with_membership("A", "g2")
                .with_membership("B", "g2")
                .with_membership("B", "g3")
                .with_similar("A", "B", 0.9)
                .with_similar("B", "A", 0.9),
        )
    }

    fn recommender(engine: Arc<MockEngine>) -> Recommender {
        Recommender::new(engine, RecommenderConfig::new("g1").without_cohort_filter())
    }

    #[test]
    fn similarity_table_orders_by_score_then_names() {
        let t = SimilarityTable::from_rows(vec![
            sim("C", "D", 0.5),
            sim("A", "B", 0.9),
            sim("B", "A", 0.5),
            sim("B", "C", 0.5),
        ]);
        let ordered: Vec<(&str, &str)> = t
            .rows()
            .iter()
            .map(|r| (r.person1.as_str(), r.person2.as_str()))
            .collect();
        assert_eq!(
            ordered,
            vec![("A", "B"), ("B", "A"), ("B", "C"), ("C", "D")]
        );
    }

    #[tokio::test]
    async fn recommendation_is_peer_groups_minus_own() {
        let engine = engine_with_two_users();

        let mut rec = recommender(engine.clone());
        rec.establish_connection().await.unwrap();
        let for_a = rec.recommend("a@example.com").await.unwrap();
        assert_eq!(for_a.rows(), &["g3".to_string()]);

        let mut rec = recommender(engine);
        rec.establish_connection().await.unwrap();
        let for_b = rec.recommend("b@example.com").await.unwrap();
        assert_eq!(for_b.rows(), &["g1".to_string()]);
    }

    #[tokio::test]
    async fn unknown_email_is_a_hard_error() {
        let engine = engine_with_two_users();
        let mut rec = recommender(engine);
        rec.establish_connection().await.unwrap();
        match rec.recommend("nobody@example.com").await {
            Err(KindredError::UnknownIdentity { identifier }) => {
                assert_eq!(identifier, "nobody@example.com");
            }
            other => panic!("expected UnknownIdentity, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn user_without_peers_gets_empty_outcome() {
        let engine = Arc::new(
            MockEngine::new()
                .with_user("lone@example.com", 5, "Lone")
                .with_membership("Lone", "g1"),
        );
        let mut rec = recommender(engine);
        rec.establish_connection().await.unwrap();
        let outcome = rec.recommend("lone@example.com").await.unwrap();
        assert!(outcome.is_empty());
    }

    #[tokio::test]
    async fn identical_memberships_recommend_nothing() {
        let engine = Arc::new(
            MockEngine::new()
                .with_user("a@example.com", 1, "A")
                .with_user("b@example.com", 2, "B")
                .with_membership("A", "g1")
                .with_membership("B", "g1")
                .with_similar("A", "B", 0.8),
        );
        let mut rec = recommender(engine);
        rec.establish_connection().await.unwrap();
        let outcome = rec.recommend("a@example.com").await.unwrap();
        assert!(outcome.is_empty());
    }

    #[tokio::test]
    async fn recommend_before_connection_is_rejected() {
        let engine = engine_with_two_users();
        let mut rec = recommender(engine);
        assert_eq!(rec.state(), RecommenderState::Unconnected);
        assert!(rec.recommend("a@example.com").await.is_err());
    }

    #[tokio::test]
    async fn state_advances_through_the_machine() {
        let engine = engine_with_two_users();
        let mut rec = recommender(engine);
        rec.establish_connection().await.unwrap();
        assert_eq!(rec.state(), RecommenderState::Queried);
        rec.recommend("a@example.com").await.unwrap();
        assert_eq!(rec.state(), RecommenderState::Done);
    }

    #[tokio::test]
    async fn reconnecting_replaces_the_projection() {
        let engine = engine_with_two_users();
        let mut rec = recommender(engine.clone());
        rec.establish_connection().await.unwrap();
        rec.establish_connection().await.unwrap();
        assert_eq!(rec.state(), RecommenderState::Queried);

        // Second run dropped the first run's projection before recreating.
        let calls = engine.calls();
        let drops = calls.iter().filter(|c| *c == "drop_projection:g1").count();
        let projects = calls.iter().filter(|c| *c == "project:g1").count();
        assert_eq!(drops, 1);
        assert_eq!(projects, 2);
        assert_eq!(engine.live_projections(), vec!["g1".to_string()]);
    }

    #[tokio::test]
    async fn cohort_filter_restricts_pairs() {
        let engine = Arc::new(
            MockEngine::new()
                .with_user_in_cohort("a@example.com", 1, "A", "m")
                .with_user_in_cohort("b@example.com", 2, "B", "f")
                .with_user_in_cohort("c@example.com", 3, "C", "m")
                .with_similar("A", "B", 0.9)
                .with_similar("A", "C", 0.8),
        );
        let mut rec = Recommender::new(engine, RecommenderConfig::new("g1"));
        rec.establish_connection().await.unwrap();
        let table = rec.similarity_table().unwrap();
        // Only the same-cohort pair survives.
        assert_eq!(table.rows().len(), 1);
        assert_eq!(table.rows()[0].person2, "C");
    }
}
