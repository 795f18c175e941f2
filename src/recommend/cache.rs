// edge states under hypothetical mappings
use std::collections::HashMap;

use parking_lot::RwLock;
use tracing::{trace, warn};

use crate::core::graph::{Edge, GraphError, ReflexionGraph};
use crate::core::mapping::MappingOverlay;
use crate::core::state::EdgeState;
use crate::core::types::{EdgeKind, NodeId};

/// Structural identity of an implementation edge under some mapping.
///
/// Parallel edges of the same kind between the same endpoints share an entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EdgeStateKey {
    pub source: NodeId,
    pub source_cluster: Option<NodeId>,
    pub target: NodeId,
    pub target_cluster: Option<NodeId>,
    pub kind: EdgeKind,
}

/// Memo of edge states under hypothetical mappings.
///
/// Answers "if `node` were mapped to `cluster`, how would `edge` be
/// classified?" by classifying the edges around `node` through a
/// [`MappingOverlay`]. The graph's own mapping is never touched.
///
/// Entries only depend on the architecture topology and stay valid until the
/// next [`EdgeStateCache::clear_cache`], which callers must issue whenever an
/// architecture edge or cluster is added or removed.
#[derive(Debug, Default)]
pub struct EdgeStateCache {
    entries: RwLock<HashMap<EdgeStateKey, EdgeState>>,
}

impl EdgeStateCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// State of `edge` if `node`, one of its endpoints, were mapped to `cluster`.
    ///
    /// The other endpoint keeps its real mapping; if it has none the answer is
    /// `Unmapped` and nothing is cached. `Undefined` means no information.
    pub fn get_from_cache(&self, graph: &ReflexionGraph, cluster: NodeId, node: NodeId, edge: &Edge) -> EdgeState {
        let neighbor = edge.other_end(node);
        let neighbor_cluster = if neighbor == node {
            Some(cluster)
        } else {
            match graph.maps_to(neighbor) {
                Some(c) => Some(c),
                None => return EdgeState::Unmapped,
            }
        };

        let key = EdgeStateKey {
            source: edge.from,
            source_cluster: if edge.from == node { Some(cluster) } else { neighbor_cluster },
            target: edge.to,
            target_cluster: if edge.to == node { Some(cluster) } else { neighbor_cluster },
            kind: edge.kind.clone(),
        };

        if let Some(state) = self.entries.read().get(&key) {
            return *state;
        }

        trace!(node, cluster, edge = edge.id, "edge state cache miss");
        if let Err(e) = self.update(graph, cluster, node) {
            warn!(node, cluster, error = %e, "could not simulate mapping");
        }

        self.entries.read().get(&key).copied().unwrap_or(EdgeState::Undefined)
    }

    /// Classifies every implementation edge touching the subtree of `node`
    /// with `node` mapped to `cluster`, and stores the results.
    fn update(&self, graph: &ReflexionGraph, cluster: NodeId, node: NodeId) -> Result<(), GraphError> {
        let mut overlay = MappingOverlay::new(graph);
        overlay.map(node, cluster);

        let mut fresh = HashMap::new();
        for descendant in graph.descendants_post_order(node)? {
            for eid in graph.implementation_edges(descendant)? {
                let edge = graph.edge(eid)?;
                let state = graph.classify_with(&overlay, eid)?;
                let key = EdgeStateKey {
                    source: edge.from,
                    source_cluster: graph.maps_to_in(&overlay, edge.from),
                    target: edge.to,
                    target_cluster: graph.maps_to_in(&overlay, edge.to),
                    kind: edge.kind.clone(),
                };
                fresh.insert(key, state);
            }
        }

        self.entries.write().extend(fresh);
        Ok(())
    }

    pub fn clear_cache(&self) {
        let mut entries = self.entries.write();
        if !entries.is_empty() {
            trace!(entries = entries.len(), "edge state cache cleared");
        }
        entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
