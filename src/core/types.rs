// ids, subgraph tags and edge kinds
use std::fmt;

use serde::{Deserialize, Serialize};

/// Index of a node in the graph arena. Allocated by `ReflexionGraph::add_node`.
pub type NodeId = u32;

/// Index of an edge in the graph arena. Allocated by `ReflexionGraph::add_edge`.
pub type EdgeId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SubgraphKind {
    Architecture,
    Implementation,
}

impl fmt::Display for SubgraphKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubgraphKind::Architecture => f.write_str("architecture"),
            SubgraphKind::Implementation => f.write_str("implementation"),
        }
    }
}

/// Edge type tag, e.g. `Call` or `Source_Dependency`.
///
/// Lifting ignores the kind; it only matters for edge weights and for
/// telling parallel edges apart in the edge state cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EdgeKind(pub String);

impl EdgeKind {
    pub fn new(kind: impl Into<String>) -> Self {
        Self(kind.into())
    }

    pub fn calls() -> Self {
        Self::new("Call")
    }

    pub fn depends_on() -> Self {
        Self::new("Source_Dependency")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for EdgeKind {
    fn from(kind: &str) -> Self {
        Self::new(kind)
    }
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
