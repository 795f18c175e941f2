// one graph, one attract function, one table of scored pairs
use std::collections::{BTreeSet, HashMap};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::core::graph::{Edge, Node, ReflexionGraph};
use crate::core::state::EdgeChange;
use crate::core::types::{EdgeId, EdgeKind, NodeId, SubgraphKind};
use crate::recommend::attract::{AttractBase, AttractContext, AttractFunction};
use crate::recommend::config::AttractFunctionConfig;
use crate::recommend::error::RecommendResult;
use crate::recommend::handling::ChangeType;
use crate::recommend::host::{NodeTypes, RecommendationHost};
use crate::recommend::registry::AttractRegistry;

/// Pairs whose attraction lies this close to the best one are recommended too.
pub const ATTRACTION_VALUE_DELTA: f64 = 0.001;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MappingPair {
    pub candidate: NodeId,
    pub cluster: NodeId,
    pub attraction: f64,
}

/// Drives one attract function through graph edits.
///
/// Every edit mutates the graph first and then tells the attract function
/// what changed. `update_recommendations` rescores whatever the function
/// reported as stale and `recommendations` returns the best pairs.
pub struct RecommendationSession {
    graph: ReflexionGraph,
    types: NodeTypes,
    registry: AttractRegistry,
    config: AttractFunctionConfig,
    attract: Box<dyn AttractFunction>,
    //(candidate, cluster) -> attraction
    pairs: HashMap<(NodeId, NodeId), f64>,
}

impl RecommendationSession {
    pub fn new(graph: ReflexionGraph, config: AttractFunctionConfig) -> RecommendResult<Self> {
        Self::with_registry(graph, config, AttractRegistry::default())
    }

    /// Builds the configured attract function, feeds it the mapping the graph
    /// already carries and computes the first recommendations.
    pub fn with_registry(graph: ReflexionGraph, config: AttractFunctionConfig, registry: AttractRegistry) -> RecommendResult<Self> {
        graph.validate_all_mappings()?;
        let types = NodeTypes::new(config.candidate_type.clone(), config.cluster_type.clone());
        let attract = registry.create(&config, &AttractContext::new(&graph, &types))?;
        let mut session = Self { graph, types, registry, config, attract, pairs: HashMap::new() };
        session.initialize()?;
        Ok(session)
    }

    fn initialize(&mut self) -> RecommendResult<()> {
        let mut mapped: Vec<(NodeId, NodeId)> = self.graph.iter_mapping().collect();
        mapped.sort_unstable();
        for (node, cluster) in mapped {
            self.notify_candidate(cluster, node, ChangeType::Addition)?;
        }
        self.run_analysis()?;
        self.update_recommendations();
        Ok(())
    }

    pub fn graph(&self) -> &ReflexionGraph {
        &self.graph
    }

    pub fn into_graph(self) -> ReflexionGraph {
        self.graph
    }

    pub fn config(&self) -> &AttractFunctionConfig {
        &self.config
    }

    pub fn attract_function(&self) -> &dyn AttractFunction {
        self.attract.as_ref()
    }

    pub fn is_cluster(&self, node: NodeId) -> bool {
        self.graph.node(node).is_ok_and(|n| self.types.is_cluster(n))
    }

    pub fn is_candidate(&self, node: NodeId) -> bool {
        self.graph.node(node).is_ok_and(|n| self.types.is_candidate(n))
    }

    pub fn clusters(&self) -> Vec<NodeId> {
        self.types.clusters(&self.graph)
    }

    pub fn unmapped_candidates(&self) -> Vec<NodeId> {
        self.types.unmapped_candidates(&self.graph)
    }

    /// Candidates mapped explicitly or through a parent.
    pub fn mapped_candidates(&self) -> Vec<NodeId> {
        self.types
            .candidates(&self.graph)
            .into_iter()
            .filter(|&id| self.graph.maps_to(id).is_some())
            .collect()
    }

    pub fn unmapped_candidates_left(&self) -> bool {
        !self.unmapped_candidates().is_empty()
    }

    //only candidates reach the attract function
    fn notify_candidate(&mut self, cluster: NodeId, node: NodeId, change: ChangeType) -> RecommendResult<()> {
        if !self.is_candidate(node) {
            return Ok(());
        }
        self.forget_candidate(node);
        let ctx = AttractContext::new(&self.graph, &self.types);
        self.attract.handle_changed_candidate(&ctx, cluster, node, change)
    }

    fn forget_candidate(&mut self, candidate: NodeId) {
        self.pairs.retain(|&(c, _), _| c != candidate);
    }

    fn forget_cluster(&mut self, cluster: NodeId) {
        self.pairs.retain(|&(_, c), _| c != cluster);
    }

    /// Maps `node` to `cluster`. Mapping a node onto the cluster it is
    /// already mapped to changes nothing.
    pub fn add_to_mapping(&mut self, node: NodeId, cluster: NodeId) -> RecommendResult<()> {
        if self.graph.get_arch_node(node)? == Some(cluster) {
            return Ok(());
        }
        self.graph.set_mapping(node, cluster)?;
        debug!(node, cluster, "mapped");
        self.notify_candidate(cluster, node, ChangeType::Addition)?;

        //descendants may have inherited the mapping without a notification of their own
        let ctx = AttractContext::new(&self.graph, &self.types);
        self.attract.prune_mapped_candidates(&ctx);
        Ok(())
    }

    /// Removes the explicit mapping of `node` and returns the cluster it had.
    pub fn remove_from_mapping(&mut self, node: NodeId) -> RecommendResult<Option<NodeId>> {
        let Some(cluster) = self.graph.remove_mapping(node)? else {
            return Ok(None);
        };
        debug!(node, cluster, "unmapped");
        self.notify_candidate(cluster, node, ChangeType::Removal)?;
        Ok(Some(cluster))
    }

    /// Unmaps every explicitly mapped node.
    pub fn reset_mapping(&mut self) -> RecommendResult<()> {
        let mut mapped: Vec<NodeId> = self.graph.iter_mapping().map(|(node, _)| node).collect();
        mapped.sort_unstable();
        for node in mapped {
            self.remove_from_mapping(node)?;
        }
        Ok(())
    }

    /// Adds an architecture node of the configured cluster type.
    pub fn add_cluster(&mut self, name: impl Into<String>, parent: Option<NodeId>) -> RecommendResult<NodeId> {
        let node = Node::new(name, SubgraphKind::Architecture, parent).with_type(self.types.cluster_type.clone());
        let id = self.graph.add_node(node)?;
        let ctx = AttractContext::new(&self.graph, &self.types);
        self.attract.handle_add_cluster(&ctx, self.graph.node(id)?)?;
        Ok(id)
    }

    /// Removes an architecture node. Its architecture edges are removed and
    /// the nodes mapped onto it are unmapped first, each with its own
    /// notification.
    pub fn remove_cluster(&mut self, cluster: NodeId) -> RecommendResult<Node> {
        AttractBase::ensure_node_subgraph(self.graph.node(cluster)?, SubgraphKind::Architecture)?;

        let mut arch_edges = self.graph.architecture_incoming(cluster);
        arch_edges.extend(self.graph.architecture_outgoing(cluster));
        arch_edges.sort_unstable();
        arch_edges.dedup();
        for eid in arch_edges {
            self.remove_arch_edge(eid)?;
        }

        let mut mapped: Vec<NodeId> = self
            .graph
            .iter_mapping()
            .filter(|&(_, target)| target == cluster)
            .map(|(node, _)| node)
            .collect();
        mapped.sort_unstable();
        for node in mapped {
            self.remove_from_mapping(node)?;
        }

        let removed = self.graph.remove_node(cluster)?;
        self.forget_cluster(cluster);
        let ctx = AttractContext::new(&self.graph, &self.types);
        self.attract.handle_removed_cluster(&ctx, &removed)?;
        debug!(cluster, name = %removed.name, "cluster removed");
        Ok(removed)
    }

    pub fn add_arch_edge(&mut self, from: NodeId, to: NodeId, kind: EdgeKind) -> RecommendResult<EdgeId> {
        let id = self.graph.add_edge(Edge::new(from, to, kind, SubgraphKind::Architecture))?;
        let ctx = AttractContext::new(&self.graph, &self.types);
        self.attract.handle_add_arch_edge(&ctx, self.graph.edge(id)?)?;
        Ok(id)
    }

    pub fn remove_arch_edge(&mut self, edge: EdgeId) -> RecommendResult<Edge> {
        AttractBase::ensure_edge_subgraph(self.graph.edge(edge)?, SubgraphKind::Architecture)?;
        let removed = self.graph.remove_edge(edge)?;
        let ctx = AttractContext::new(&self.graph, &self.types);
        self.attract.handle_removed_arch_edge(&ctx, &removed)?;
        Ok(removed)
    }

    /// Reclassifies the graph and forwards every changed edge state.
    pub fn run_analysis(&mut self) -> RecommendResult<Vec<EdgeChange>> {
        let changes = self.graph.run_from_scratch()?;
        let ctx = AttractContext::new(&self.graph, &self.types);
        for change in &changes {
            self.attract.handle_changed_state(&ctx, change)?;
        }
        Ok(changes)
    }

    /// Rescores stale pairs: every stale cluster against every unmapped
    /// candidate and every stale candidate against every cluster. Clears the
    /// stale flags and returns the number of rescored pairs.
    pub fn update_recommendations(&mut self) -> usize {
        let graph = &self.graph;
        let types = &self.types;
        let attract = &mut self.attract;
        let ctx = AttractContext::new(graph, types);

        self.pairs
            .retain(|&(candidate, cluster), _| graph.contains_node(cluster) && graph.contains_node(candidate) && graph.maps_to(candidate).is_none());

        let dirty_clusters: BTreeSet<NodeId> = attract.clusters_to_update().iter().copied().collect();
        let dirty_candidates: BTreeSet<NodeId> = attract.candidates_to_update().iter().copied().collect();
        for &cluster in &dirty_clusters {
            if !graph.contains_node(cluster) {
                warn!(cluster, "stale cluster is not part of the graph anymore");
            }
        }

        let mut rescored = 0;
        let candidates = types.unmapped_candidates(graph);
        for cluster in types.clusters(graph) {
            let whole_cluster = dirty_clusters.contains(&cluster);
            for &candidate in &candidates {
                if !whole_cluster && !dirty_candidates.contains(&candidate) {
                    continue;
                }
                match attract.attraction_value(&ctx, candidate, cluster) {
                    Ok(attraction) => {
                        self.pairs.insert((candidate, cluster), attraction);
                        rescored += 1;
                    }
                    Err(e) => warn!(candidate, cluster, error = %e, "could not score pair"),
                }
            }
        }

        for cluster in dirty_clusters {
            attract.remove_cluster_to_update(cluster);
        }
        for candidate in dirty_candidates {
            attract.remove_candidate_to_update(candidate);
        }
        debug!(rescored, pairs = self.pairs.len(), "recommendations updated");
        rescored
    }

    /// Every scored pair, ordered by candidate and cluster.
    pub fn mapping_pairs(&self) -> Vec<MappingPair> {
        let mut pairs: Vec<MappingPair> = self
            .pairs
            .iter()
            .map(|(&(candidate, cluster), &attraction)| MappingPair { candidate, cluster, attraction })
            .collect();
        pairs.sort_unstable_by_key(|p| (p.candidate, p.cluster));
        pairs
    }

    pub fn attraction(&self, candidate: NodeId, cluster: NodeId) -> Option<f64> {
        self.pairs.get(&(candidate, cluster)).copied()
    }

    /// Positive pairs within [`ATTRACTION_VALUE_DELTA`] of the highest attraction.
    pub fn recommendations(&self) -> Vec<MappingPair> {
        let pairs = self.mapping_pairs();
        let Some(max) = pairs.iter().map(|p| p.attraction).reduce(f64::max) else {
            return Vec::new();
        };
        pairs
            .into_iter()
            .filter(|p| p.attraction > 0.0 && max - p.attraction <= ATTRACTION_VALUE_DELTA)
            .collect()
    }

    /// Pairs that could be mapped without asking. Same as the recommendations.
    pub fn automatic_mappings(&self) -> Vec<MappingPair> {
        self.recommendations()
    }

    /// Recommendations involving `node` as candidate or as cluster. Any
    /// other node has none.
    pub fn recommendations_for(&self, node: NodeId) -> Vec<MappingPair> {
        let is_candidate = self.is_candidate(node);
        let is_cluster = self.is_cluster(node);
        self.recommendations()
            .into_iter()
            .filter(|p| (is_candidate && p.candidate == node) || (is_cluster && p.cluster == node))
            .collect()
    }

    /// Swaps in a new attract function and rebuilds its state from the
    /// current mapping.
    pub fn reconfigure(&mut self, config: AttractFunctionConfig) -> RecommendResult<()> {
        let types = NodeTypes::new(config.candidate_type.clone(), config.cluster_type.clone());
        let attract = self.registry.create(&config, &AttractContext::new(&self.graph, &types))?;
        info!(attract_function = attract.name(), "attract function reconfigured");
        self.types = types;
        self.attract = attract;
        self.config = config;
        self.pairs.clear();
        self.initialize()
    }
}
