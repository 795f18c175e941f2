// errors of the recommendation layer
use thiserror::Error;

use crate::core::graph::GraphError;
use crate::core::types::{EdgeId, NodeId, SubgraphKind};

pub type RecommendResult<T> = Result<T, RecommendError>;

/// Graph element named in a subgraph violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementRef {
    Node(NodeId),
    Edge(EdgeId),
}

impl std::fmt::Display for ElementRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ElementRef::Node(id) => write!(f, "node {id}"),
            ElementRef::Edge(id) => write!(f, "edge {id}"),
        }
    }
}

#[derive(Debug, Error)]
pub enum RecommendError {
    #[error("graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("{element} is not in the {expected} subgraph")]
    NotInSubgraph { element: ElementRef, expected: SubgraphKind },

    #[error("no attract function registered under '{0}'")]
    UnknownStrategy(String),

    #[error("invalid parameter {name} = {value}: {reason}")]
    InvalidParameter { name: String, value: f64, reason: String },

    #[error("configuration error: {message}")]
    Config { message: String },
}
