use serde::{Deserialize, Serialize};

/// Engine-internal identity of a graph node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub i64);

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl From<i64> for EntityId {
    fn from(id: i64) -> Self {
        EntityId(id)
    }
}

/// One streamed link-prediction result: the model's estimate that a
/// relationship holds between two nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRow {
    pub node1: EntityId,
    pub node2: EntityId,
    pub probability: f64,
}

/// One pairwise similarity result read back from the SIMILAR edges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityRow {
    pub person1: String,
    pub person2: String,
    pub similarity: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Orientation {
    Directed,
    Undirected,
}

impl Orientation {
    /// The engine's spelling of the orientation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Orientation::Directed => "DIRECTED",
            Orientation::Undirected => "UNDIRECTED",
        }
    }
}

/// A relationship type selected into a projection, with its orientation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelProjection {
    pub rel_type: String,
    pub orientation: Orientation,
}

impl RelProjection {
    pub fn undirected(rel_type: impl Into<String>) -> Self {
        Self {
            rel_type: rel_type.into(),
            orientation: Orientation::Undirected,
        }
    }
}

/// A named in-engine subgraph view: node-label selectors plus
/// relationship-type/orientation selectors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectionSpec {
    pub name: String,
    pub node_labels: Vec<String>,
    pub relationships: Vec<RelProjection>,
}

impl ProjectionSpec {
    /// The social graph projection used by both training and the
    /// recommender: users, children and groups, with the three
    /// undirected relationship types between them.
    pub fn social_graph(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            node_labels: vec!["User".into(), "Child".into(), "Groups".into()],
            relationships: vec![
                RelProjection::undirected("UserIsInGroup"),
                RelProjection::undirected("ChildBelongToParent"),
                RelProjection::undirected("UserMatches"),
            ],
        }
    }
}

/// Opaque handle to a live projection in the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectionHandle {
    pub name: String,
}

/// Opaque handle to a link-prediction pipeline in the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineHandle {
    pub name: String,
}

/// Opaque handle to a trained model in the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelHandle {
    pub name: String,
}

/// Outcome of a well-formed query: matching rows, or the distinguished
/// "nothing found" signal. Distinct from every error: an `Empty` means the
/// query ran fine and matched nothing.
///
/// Serializes as a plain list (empty list for `Empty`) so HTTP callers get
/// a uniform shape.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome<T> {
    Rows(Vec<T>),
    Empty,
}

impl<T> QueryOutcome<T> {
    /// Normalize: an empty row set becomes the `Empty` signal.
    pub fn from_rows(rows: Vec<T>) -> Self {
        if rows.is_empty() {
            QueryOutcome::Empty
        } else {
            QueryOutcome::Rows(rows)
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, QueryOutcome::Empty)
    }

    /// The matching rows; empty slice for `Empty`.
    pub fn rows(&self) -> &[T] {
        match self {
            QueryOutcome::Rows(rows) => rows,
            QueryOutcome::Empty => &[],
        }
    }

    pub fn into_rows(self) -> Vec<T> {
        match self {
            QueryOutcome::Rows(rows) => rows,
            QueryOutcome::Empty => Vec::new(),
        }
    }
}

impl<T: Serialize> Serialize for QueryOutcome<T> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.rows().serialize(serializer)
    }
}
