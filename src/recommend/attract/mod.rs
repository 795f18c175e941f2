// attract functions: shared bookkeeping and the scoring contract
pub mod count;
pub mod none;

use std::collections::{HashMap, HashSet};

use tracing::{debug, warn};

use crate::core::graph::{Edge, Node, ReflexionGraph};
use crate::core::state::{EdgeChange, EdgeState};
use crate::core::types::{EdgeId, NodeId, SubgraphKind};
use crate::recommend::cache::EdgeStateCache;
use crate::recommend::config::AttractFunctionConfig;
use crate::recommend::error::{ElementRef, RecommendError, RecommendResult};
use crate::recommend::handling::{CandidateState, ChangeType, TransitionError};
use crate::recommend::host::RecommendationHost;

pub use count::CountAttract;
pub use none::NoAttract;

/// Borrowed collaborators handed to every attract function call.
#[derive(Clone, Copy)]
pub struct AttractContext<'a> {
    pub graph: &'a ReflexionGraph,
    pub host: &'a dyn RecommendationHost,
}

impl<'a> AttractContext<'a> {
    pub fn new(graph: &'a ReflexionGraph, host: &'a dyn RecommendationHost) -> Self {
        Self { graph, host }
    }

    pub fn is_cluster(&self, node: NodeId) -> bool {
        self.graph.node(node).is_ok_and(|n| self.host.is_cluster(n))
    }

    pub fn is_candidate(&self, node: NodeId) -> bool {
        self.graph.node(node).is_ok_and(|n| self.host.is_candidate(n))
    }
}

/// State shared by every attract function: configured types, edge weights,
/// the edge state cache, the stale cluster/candidate sets and the handled
/// candidates.
#[derive(Debug)]
pub struct AttractBase {
    candidate_type: String,
    cluster_type: String,
    edge_weights: HashMap<String, f64>,
    edge_state_cache: EdgeStateCache,
    clusters_to_update: HashSet<NodeId>,
    candidates_to_update: HashSet<NodeId>,
    handled_candidates: HashSet<NodeId>,
}

impl AttractBase {
    pub fn new(config: &AttractFunctionConfig) -> Self {
        Self {
            candidate_type: config.candidate_type.clone(),
            cluster_type: config.cluster_type.clone(),
            edge_weights: config.edge_weights.iter().map(|(k, &v)| (k.clone(), v)).collect(),
            edge_state_cache: EdgeStateCache::new(),
            clusters_to_update: HashSet::new(),
            candidates_to_update: HashSet::new(),
            handled_candidates: HashSet::new(),
        }
    }

    pub fn candidate_type(&self) -> &str {
        &self.candidate_type
    }

    pub fn cluster_type(&self) -> &str {
        &self.cluster_type
    }

    /// Configured weight of the edge's kind, 1.0 if the kind is unknown.
    pub fn edge_weight(&self, edge: &Edge) -> f64 {
        self.edge_weights.get(edge.kind.as_str()).copied().unwrap_or(1.0)
    }

    pub fn edge_state(&self, graph: &ReflexionGraph, cluster: NodeId, node: NodeId, edge: &Edge) -> EdgeState {
        self.edge_state_cache.get_from_cache(graph, cluster, node, edge)
    }

    pub fn edge_state_cache(&self) -> &EdgeStateCache {
        &self.edge_state_cache
    }

    pub fn clear_state_cache(&self) {
        self.edge_state_cache.clear_cache();
    }

    pub fn clusters_to_update(&self) -> &HashSet<NodeId> {
        &self.clusters_to_update
    }

    pub fn candidates_to_update(&self) -> &HashSet<NodeId> {
        &self.candidates_to_update
    }

    pub fn handled_candidates(&self) -> &HashSet<NodeId> {
        &self.handled_candidates
    }

    /// Marks an existing cluster as stale. Anything that is not a cluster is ignored.
    pub fn add_cluster_to_update(&mut self, ctx: &AttractContext<'_>, cluster: NodeId) {
        if ctx.is_cluster(cluster) {
            self.clusters_to_update.insert(cluster);
        }
    }

    pub fn add_clusters_to_update(&mut self, ctx: &AttractContext<'_>, clusters: impl IntoIterator<Item = NodeId>) {
        for cluster in clusters {
            self.add_cluster_to_update(ctx, cluster);
        }
    }

    /// Marks a candidate as stale if it is currently unmapped.
    pub fn add_candidate_to_update(&mut self, ctx: &AttractContext<'_>, candidate: NodeId) {
        if ctx.is_candidate(candidate) && ctx.graph.maps_to(candidate).is_none() {
            self.candidates_to_update.insert(candidate);
        }
    }

    pub fn add_candidates_to_update(&mut self, ctx: &AttractContext<'_>, candidates: impl IntoIterator<Item = NodeId>) {
        for candidate in candidates {
            self.add_candidate_to_update(ctx, candidate);
        }
    }

    pub fn add_all_cluster_to_update(&mut self, ctx: &AttractContext<'_>) {
        let clusters = ctx.host.clusters(ctx.graph);
        self.add_clusters_to_update(ctx, clusters);
    }

    pub fn add_all_candidates_to_update(&mut self, ctx: &AttractContext<'_>) {
        let candidates = ctx.host.unmapped_candidates(ctx.graph);
        self.add_candidates_to_update(ctx, candidates);
    }

    pub fn remove_cluster_to_update(&mut self, cluster: NodeId) {
        self.clusters_to_update.remove(&cluster);
    }

    pub fn remove_candidate_to_update(&mut self, candidate: NodeId) {
        self.candidates_to_update.remove(&candidate);
    }

    /// Drops stale candidates that are mapped now, explicitly or through a parent.
    pub fn prune_mapped_candidates(&mut self, ctx: &AttractContext<'_>) {
        self.candidates_to_update
            .retain(|&candidate| ctx.graph.maps_to(candidate).is_none());
    }

    pub fn candidate_state(&self, candidate: NodeId) -> CandidateState {
        if self.handled_candidates.contains(&candidate) {
            CandidateState::Mapped
        } else {
            CandidateState::Unmapped
        }
    }

    /// Applies `change` to the candidate's handling state, committing it if `commit` is set.
    pub fn transition(&mut self, candidate: NodeId, change: ChangeType, commit: bool) -> Result<CandidateState, TransitionError> {
        let next = self.candidate_state(candidate).apply(change)?;
        if commit {
            match next {
                CandidateState::Mapped => self.handled_candidates.insert(candidate),
                CandidateState::Unmapped => self.handled_candidates.remove(&candidate),
            };
        }
        Ok(next)
    }

    /// True if `change` still has to be applied for `candidate`.
    ///
    /// A repeated addition or a removal of an unhandled candidate is a
    /// rejected transition and yields false.
    pub fn handling_required(&mut self, candidate: NodeId, change: ChangeType, commit: bool) -> bool {
        match self.transition(candidate, change, commit) {
            Ok(_) => true,
            Err(e) => {
                warn!(candidate, error = %e, "ignoring duplicate candidate notification");
                false
            }
        }
    }

    pub fn ensure_node_subgraph(node: &Node, expected: SubgraphKind) -> RecommendResult<()> {
        if !node.is_in(expected) {
            return Err(RecommendError::NotInSubgraph { element: ElementRef::Node(node.id), expected });
        }
        Ok(())
    }

    pub fn ensure_edge_subgraph(edge: &Edge, expected: SubgraphKind) -> RecommendResult<()> {
        if !edge.is_in(expected) {
            return Err(RecommendError::NotInSubgraph { element: ElementRef::Edge(edge.id), expected });
        }
        Ok(())
    }

    pub fn handle_add_cluster(&mut self, ctx: &AttractContext<'_>, cluster: &Node) -> RecommendResult<()> {
        Self::ensure_node_subgraph(cluster, SubgraphKind::Architecture)?;
        self.add_cluster_to_update(ctx, cluster.id);
        Ok(())
    }

    pub fn handle_removed_cluster(&mut self, cluster: &Node) -> RecommendResult<()> {
        Self::ensure_node_subgraph(cluster, SubgraphKind::Architecture)?;
        self.remove_cluster_to_update(cluster.id);
        Ok(())
    }

    pub fn handle_arch_edge_change(&mut self, arch_edge: &Edge) -> RecommendResult<()> {
        Self::ensure_edge_subgraph(arch_edge, SubgraphKind::Architecture)?;
        self.clear_state_cache();
        Ok(())
    }

    /// Clears the handled candidates.
    pub fn reset(&mut self) {
        self.handled_candidates.clear();
    }
}

/// A scoring strategy for (candidate, cluster) pairs.
///
/// The controller mutates the graph first and then reports the change
/// through the matching `handle_*` callback. Scores are only read through
/// `attraction_value`, which never alters the mapping.
pub trait AttractFunction: Send + Sync {
    /// Discriminator this strategy is registered under.
    fn name(&self) -> &'static str;

    fn base(&self) -> &AttractBase;

    fn base_mut(&mut self) -> &mut AttractBase;

    /// Attraction of `candidate` towards `cluster`; higher means a better fit.
    /// Nodes that are not of the candidate type score 0.
    fn attraction_value(&self, ctx: &AttractContext<'_>, candidate: NodeId, cluster: NodeId) -> RecommendResult<f64>;

    /// `changed` was mapped into (`Addition`) or unmapped from (`Removal`) `cluster`.
    fn handle_changed_candidate(
        &mut self,
        ctx: &AttractContext<'_>,
        cluster: NodeId,
        changed: NodeId,
        change: ChangeType,
    ) -> RecommendResult<()>;

    /// The live state of a single edge changed.
    fn handle_changed_state(&mut self, _ctx: &AttractContext<'_>, _change: &EdgeChange) -> RecommendResult<()> {
        Ok(())
    }

    fn handle_add_cluster(&mut self, ctx: &AttractContext<'_>, cluster: &Node) -> RecommendResult<()> {
        self.base_mut().handle_add_cluster(ctx, cluster)
    }

    /// `cluster` has already been removed from the graph.
    fn handle_removed_cluster(&mut self, _ctx: &AttractContext<'_>, cluster: &Node) -> RecommendResult<()> {
        self.base_mut().handle_removed_cluster(cluster)
    }

    fn handle_add_arch_edge(&mut self, _ctx: &AttractContext<'_>, arch_edge: &Edge) -> RecommendResult<()> {
        self.base_mut().handle_arch_edge_change(arch_edge)
    }

    /// `arch_edge` has already been removed from the graph.
    fn handle_removed_arch_edge(&mut self, _ctx: &AttractContext<'_>, arch_edge: &Edge) -> RecommendResult<()> {
        self.base_mut().handle_arch_edge_change(arch_edge)
    }

    fn add_all_cluster_to_update(&mut self, ctx: &AttractContext<'_>) {
        self.base_mut().add_all_cluster_to_update(ctx);
    }

    fn add_all_candidates_to_update(&mut self, ctx: &AttractContext<'_>) {
        self.base_mut().add_all_candidates_to_update(ctx);
    }

    fn remove_cluster_to_update(&mut self, cluster: NodeId) {
        self.base_mut().remove_cluster_to_update(cluster);
    }

    fn remove_candidate_to_update(&mut self, candidate: NodeId) {
        self.base_mut().remove_candidate_to_update(candidate);
    }

    fn prune_mapped_candidates(&mut self, ctx: &AttractContext<'_>) {
        self.base_mut().prune_mapped_candidates(ctx);
    }

    fn clusters_to_update(&self) -> &HashSet<NodeId> {
        self.base().clusters_to_update()
    }

    fn candidates_to_update(&self) -> &HashSet<NodeId> {
        self.base().candidates_to_update()
    }

    fn handling_required(&mut self, candidate: NodeId, change: ChangeType, commit: bool) -> bool {
        self.base_mut().handling_required(candidate, change, commit)
    }

    fn clear_state_cache(&self) {
        self.base().clear_state_cache();
    }

    /// Human readable snapshot of the strategy's counters.
    fn dump_training_data(&self) -> String;

    /// True if the counters are neutral, i.e. nothing is mapped from the
    /// strategy's point of view.
    fn empty_training_data(&self) -> bool;

    fn reset(&mut self) {
        debug!(attract_function = self.name(), "reset");
        self.base_mut().reset();
    }
}

/// Ids of the architecture neighbors of `cluster` (both directions).
pub(crate) fn architecture_neighbors(graph: &ReflexionGraph, cluster: NodeId) -> Vec<NodeId> {
    let incoming = graph.architecture_incoming(cluster).into_iter().map(|eid: EdgeId| (eid, true));
    let outgoing = graph.architecture_outgoing(cluster).into_iter().map(|eid: EdgeId| (eid, false));
    incoming
        .chain(outgoing)
        .filter_map(|(eid, is_incoming)| {
            let e = graph.edge(eid).ok()?;
            Some(if is_incoming { e.from } else { e.to })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recommend::host::NodeTypes;

    fn base() -> AttractBase {
        AttractBase::new(&AttractFunctionConfig::new("NoAttract", "Class", "Cluster").with_edge_weight("Call", 2.0))
    }

    #[test]
    fn handling_required_follows_the_transition_table() {
        let mut b = base();

        assert!(b.handling_required(7, ChangeType::Addition, true));
        assert!(!b.handling_required(7, ChangeType::Addition, true));
        assert!(b.handled_candidates().contains(&7));

        assert!(b.handling_required(7, ChangeType::Removal, true));
        assert!(b.handled_candidates().is_empty());
        assert!(b.handling_required(7, ChangeType::Addition, false));
        assert!(b.handled_candidates().is_empty());
    }

    #[test]
    fn removal_of_unhandled_candidate_is_not_required() {
        let mut b = base();
        assert!(!b.handling_required(3, ChangeType::Removal, true));
        assert_eq!(
            b.transition(3, ChangeType::Removal, true).unwrap_err(),
            TransitionError { state: CandidateState::Unmapped, change: ChangeType::Removal }
        );
    }

    #[test]
    fn dirty_sets_respect_types_and_mapping() {
        let mut g = ReflexionGraph::new();
        let a = g
            .add_node(Node::new("A", SubgraphKind::Architecture, None).with_type("Cluster"))
            .unwrap();
        let layer = g
            .add_node(Node::new("L", SubgraphKind::Architecture, None).with_type("Layer"))
            .unwrap();
        let c1 = g
            .add_node(Node::new("c1", SubgraphKind::Implementation, None).with_type("Class"))
            .unwrap();
        let c2 = g
            .add_node(Node::new("c2", SubgraphKind::Implementation, None).with_type("Class"))
            .unwrap();
        g.set_mapping(c1, a).unwrap();

        let types = NodeTypes::new("Class", "Cluster");
        let ctx = AttractContext::new(&g, &types);
        let mut b = base();

        b.add_cluster_to_update(&ctx, layer);
        b.add_cluster_to_update(&ctx, 999);
        b.add_candidate_to_update(&ctx, c1);
        assert!(b.clusters_to_update().is_empty());
        assert!(b.candidates_to_update().is_empty());

        b.add_all_cluster_to_update(&ctx);
        b.add_all_candidates_to_update(&ctx);
        assert_eq!(b.clusters_to_update(), &HashSet::from([a]));
        assert_eq!(b.candidates_to_update(), &HashSet::from([c2]));

        b.remove_cluster_to_update(a);
        b.remove_cluster_to_update(a);
        b.remove_candidate_to_update(c2);
        b.remove_candidate_to_update(c2);
        assert!(b.clusters_to_update().is_empty());
        assert!(b.candidates_to_update().is_empty());
    }

    #[test]
    fn cluster_callbacks_fail_fast_outside_the_architecture() {
        let mut g = ReflexionGraph::new();
        let c = g
            .add_node(Node::new("c", SubgraphKind::Implementation, None).with_type("Cluster"))
            .unwrap();
        let types = NodeTypes::new("Class", "Cluster");
        let ctx = AttractContext::new(&g, &types);
        let mut b = base();

        let node = g.node(c).unwrap();
        let err = b.handle_add_cluster(&ctx, node).unwrap_err();
        assert!(matches!(
            err,
            RecommendError::NotInSubgraph { element: ElementRef::Node(id), expected: SubgraphKind::Architecture } if id == c
        ));
    }

    #[test]
    fn edge_weight_defaults_to_one() {
        let b = base();
        let call = Edge::new(0, 1, "Call".into(), SubgraphKind::Implementation);
        let uses = Edge::new(0, 1, "Use".into(), SubgraphKind::Implementation);
        assert_eq!(b.edge_weight(&call), 2.0);
        assert_eq!(b.edge_weight(&uses), 1.0);
    }
}
