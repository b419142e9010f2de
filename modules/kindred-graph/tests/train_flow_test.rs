#![cfg(feature = "test-utils")]

// End-to-end orchestration tests against a real Neo4j + GDS instance.
//
// Seeds a small social graph, runs the full training pipeline, and
// exercises prediction and recommendation queries.
//
// Requirements: Docker (for Neo4j via testcontainers)
//
// Run with: cargo test -p kindred-graph --features test-utils --test train_flow_test

use std::sync::Arc;

use neo4rs::query;

use kindred_graph::orchestrator::{Orchestrator, OrchestratorConfig};
use kindred_graph::{GdsEngine, GraphClient};

async fn setup() -> (impl std::any::Any, GraphClient) {
    kindred_graph::testutil::neo4j_container().await
}

/// Two users sharing one group, each with one group of their own, plus a
/// child and a match edge so every projected relationship type exists.
async fn seed_social_graph(client: &GraphClient) {
    let statements = [
        "CREATE (a:User {email: 'ann@example.com', firstname: 'Ann', gender: 'f'})",
        "CREATE (b:User {email: 'bea@example.com', firstname: 'Bea', gender: 'f'})",
        "CREATE (c:Child {firstname: 'Cal'})",
        "CREATE (g1:Groups {name: 'Hikers'})",
        "CREATE (g2:Groups {name: 'Readers'})",
        "CREATE (g3:Groups {name: 'Swimmers'})",
        "MATCH (a:User {firstname: 'Ann'}), (g:Groups {name: 'Hikers'})
         CREATE (a)-[:UserIsInGroup]->(g)",
        "MATCH (a:User {firstname: 'Ann'}), (g:Groups {name: 'Readers'})
         CREATE (a)-[:UserIsInGroup]->(g)",
        "MATCH (b:User {firstname: 'Bea'}), (g:Groups {name: 'Readers'})
         CREATE (b)-[:UserIsInGroup]->(g)",
        "MATCH (b:User {firstname: 'Bea'}), (g:Groups {name: 'Swimmers'})
         CREATE (b)-[:UserIsInGroup]->(g)",
        "MATCH (c:Child {firstname: 'Cal'}), (a:User {firstname: 'Ann'})
         CREATE (c)-[:ChildBelongToParent]->(a)",
        "MATCH (a:User {firstname: 'Ann'}), (b:User {firstname: 'Bea'})
         CREATE (a)-[:UserMatches]->(b)",
    ];
    for statement in statements {
        client
            .inner()
            .run(query(statement))
            .await
            .expect("seed statement failed");
    }
}

fn config() -> OrchestratorConfig {
    OrchestratorConfig {
        graph_name: "kindred-test".to_string(),
        pipeline_name: "kindred-test-pipe".to_string(),
        model_name: "kindred-test-model".to_string(),
        prediction_top_n: 1000,
        cohort_property: Some("gender".to_string()),
    }
}

#[tokio::test]
async fn full_train_predict_recommend_flow() {
    let (_container, client) = setup().await;
    seed_social_graph(&client).await;

    let engine = Arc::new(GdsEngine::new(client));
    let mut orchestrator = Orchestrator::new(engine, config());

    let summary = orchestrator.start().await.expect("training failed");
    assert_eq!(summary.model, "kindred-test-model");

    // Whole-table query: no filters.
    let all = orchestrator.predict(None, None).await.expect("predict failed");
    assert_eq!(all.rows().len(), summary.predictions);

    // An email present in no User node is the empty signal, not an error.
    let none = orchestrator
        .predict(Some("nobody@example.com"), None)
        .await
        .expect("predict failed");
    assert!(none.is_empty());

    // Ann and Bea share Readers; each should be recommended the other's
    // non-shared group.
    let for_ann = orchestrator
        .recommend("ann@example.com")
        .await
        .expect("recommend failed");
    assert!(for_ann.rows().iter().all(|g| g != "Readers"));

    orchestrator.close();
}

#[tokio::test]
async fn training_twice_replaces_resources() {
    let (_container, client) = setup().await;
    seed_social_graph(&client).await;

    let engine = Arc::new(GdsEngine::new(client));
    let mut orchestrator = Orchestrator::new(engine, config());

    orchestrator.start().await.expect("first training failed");
    // Second run must drop-and-recreate the projection, pipeline and
    // model rather than fail on existing names.
    let summary = orchestrator.start().await.expect("second training failed");
    assert_eq!(summary.model, "kindred-test-model");
}
