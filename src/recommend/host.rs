// what the controller tells an attract function about clusters and candidates
use crate::core::graph::{Node, ReflexionGraph};
use crate::core::types::{NodeId, SubgraphKind};

/// Type predicates and enumerations an attract function needs from whoever
/// drives it.
pub trait RecommendationHost {
    fn is_cluster(&self, node: &Node) -> bool;

    fn is_candidate(&self, node: &Node) -> bool;

    /// Every cluster of the graph, ascending by id.
    fn clusters(&self, graph: &ReflexionGraph) -> Vec<NodeId> {
        graph
            .node_ids()
            .into_iter()
            .filter(|&id| graph.node(id).is_ok_and(|n| self.is_cluster(n)))
            .collect()
    }

    /// Every candidate of the graph, ascending by id.
    fn candidates(&self, graph: &ReflexionGraph) -> Vec<NodeId> {
        graph
            .node_ids()
            .into_iter()
            .filter(|&id| graph.node(id).is_ok_and(|n| self.is_candidate(n)))
            .collect()
    }

    /// Candidates that neither have an explicit mapping nor inherit one.
    fn unmapped_candidates(&self, graph: &ReflexionGraph) -> Vec<NodeId> {
        self.candidates(graph)
            .into_iter()
            .filter(|&id| graph.maps_to(id).is_none())
            .collect()
    }
}

/// Clusters are architecture nodes of `cluster_type`, candidates are
/// implementation nodes of `candidate_type`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeTypes {
    pub candidate_type: String,
    pub cluster_type: String,
}

impl NodeTypes {
    pub fn new(candidate_type: impl Into<String>, cluster_type: impl Into<String>) -> Self {
        Self { candidate_type: candidate_type.into(), cluster_type: cluster_type.into() }
    }
}

impl RecommendationHost for NodeTypes {
    fn is_cluster(&self, node: &Node) -> bool {
        node.subgraph == SubgraphKind::Architecture && node.node_type == self.cluster_type
    }

    fn is_candidate(&self, node: &Node) -> bool {
        node.subgraph == SubgraphKind::Implementation && node.node_type == self.candidate_type
    }
}
