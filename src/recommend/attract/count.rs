// CountAttract: attraction by counting mapped neighbors
use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use tracing::{debug, trace};

use crate::core::graph::{Edge, Node};
use crate::core::types::NodeId;
use crate::recommend::attract::{AttractBase, AttractContext, AttractFunction, architecture_neighbors};
use crate::recommend::config::{AttractFunctionConfig, COUNT_ATTRACT, PHI};
use crate::recommend::error::{RecommendError, RecommendResult};
use crate::recommend::handling::ChangeType;

const NEUTRAL_EPSILON: f64 = 1e-9;

/// Scores a candidate by the weight of its (and its descendants') relations
/// to mapped neighbors, minus the relations leading to other clusters.
///
/// A relation to another cluster only counts `phi` times its weight when the
/// architecture allows it under the hypothetical mapping, so `phi = 1`
/// treats sanctioned cross-cluster relations like violations and `phi = 0`
/// ignores them.
#[derive(Debug)]
pub struct CountAttract {
    base: AttractBase,
    //node -> summed weight of its edges to mapped neighbors, subtree not included
    local_overall_values: HashMap<NodeId, f64>,
    phi: f64,
}

#[derive(Serialize)]
struct OverallSnapshot {
    phi: f64,
    overall_values: BTreeMap<String, f64>,
}

impl CountAttract {
    pub fn new(config: &AttractFunctionConfig) -> RecommendResult<Self> {
        let phi = config.parameter(PHI).unwrap_or(1.0);
        if !(0.0..=1.0).contains(&phi) {
            return Err(RecommendError::InvalidParameter {
                name: PHI.to_string(),
                value: phi,
                reason: "phi must lie in [0, 1]".to_string(),
            });
        }
        Ok(Self { base: AttractBase::new(config), local_overall_values: HashMap::new(), phi })
    }

    pub fn boxed(config: &AttractFunctionConfig) -> RecommendResult<Box<dyn AttractFunction>> {
        Ok(Box::new(Self::new(config)?))
    }

    pub fn phi(&self) -> f64 {
        self.phi
    }

    pub fn overall_local(&self, node: NodeId) -> f64 {
        self.local_overall_values.get(&node).copied().unwrap_or(0.0)
    }

    fn to_others_local(&self, ctx: &AttractContext<'_>, descendant: NodeId, cluster: NodeId) -> RecommendResult<f64> {
        let mut to_others = 0.0;
        for eid in ctx.graph.implementation_edges(descendant)? {
            let edge = ctx.graph.edge(eid)?;
            let neighbor = edge.other_end(descendant);
            match ctx.graph.maps_to(neighbor) {
                None => continue,
                Some(c) if c == cluster => continue,
                Some(_) => {}
            }

            let mut weight = self.base.edge_weight(edge);
            if self.base.edge_state(ctx.graph, cluster, descendant, edge).is_allowed() {
                weight *= self.phi;
            }
            to_others += weight;
        }
        Ok(to_others)
    }

    fn update_overall_table(&mut self, ctx: &AttractContext<'_>, neighbor: NodeId, edge: &Edge, change: ChangeType) {
        let weight = match change {
            ChangeType::Addition => self.base.edge_weight(edge),
            ChangeType::Removal => -self.base.edge_weight(edge),
        };
        *self.local_overall_values.entry(neighbor).or_insert(0.0) += weight;

        //only unmapped candidates are ever scored
        self.base.add_candidate_to_update(ctx, neighbor);
    }

    fn mark_endpoints_and_candidates(&mut self, ctx: &AttractContext<'_>, arch_edge: &Edge) {
        for end in [arch_edge.from, arch_edge.to] {
            if ctx.graph.contains_node(end) {
                self.base.add_cluster_to_update(ctx, end);
            }
        }
        self.base.add_all_candidates_to_update(ctx);
    }
}

impl AttractFunction for CountAttract {
    fn name(&self) -> &'static str {
        COUNT_ATTRACT
    }

    fn base(&self) -> &AttractBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut AttractBase {
        &mut self.base
    }

    fn attraction_value(&self, ctx: &AttractContext<'_>, candidate: NodeId, cluster: NodeId) -> RecommendResult<f64> {
        let node = ctx.graph.node(candidate)?;
        ctx.graph.node(cluster)?;
        if node.node_type != self.base.candidate_type() {
            return Ok(0.0);
        }

        let mut attraction = 0.0;
        for d in ctx.graph.descendants_post_order(candidate)? {
            attraction += self.overall_local(d) - self.to_others_local(ctx, d, cluster)?;
        }
        trace!(candidate, cluster, attraction, "count attract");
        Ok(attraction)
    }

    fn handle_changed_candidate(
        &mut self,
        ctx: &AttractContext<'_>,
        cluster: NodeId,
        changed: NodeId,
        change: ChangeType,
    ) -> RecommendResult<()> {
        if !self.base.handling_required(changed, change, true) {
            return Ok(());
        }

        self.base.add_cluster_to_update(ctx, cluster);
        let neighbors = architecture_neighbors(ctx.graph, cluster);
        self.base.add_clusters_to_update(ctx, neighbors);

        match change {
            ChangeType::Addition => self.base.prune_mapped_candidates(ctx),
            ChangeType::Removal => self.base.add_candidate_to_update(ctx, changed),
        }

        for eid in ctx.graph.implementation_edges(changed)? {
            let edge = ctx.graph.edge(eid)?;
            self.update_overall_table(ctx, edge.other_end(changed), edge, change);
        }

        debug!(cluster, candidate = changed, %change, "count attract updated");
        Ok(())
    }

    fn handle_add_cluster(&mut self, ctx: &AttractContext<'_>, cluster: &Node) -> RecommendResult<()> {
        self.base.handle_add_cluster(ctx, cluster)?;
        self.base.add_all_candidates_to_update(ctx);
        self.base.clear_state_cache();
        Ok(())
    }

    fn handle_removed_cluster(&mut self, ctx: &AttractContext<'_>, cluster: &Node) -> RecommendResult<()> {
        self.base.handle_removed_cluster(cluster)?;
        self.base.add_all_candidates_to_update(ctx);
        self.base.clear_state_cache();
        Ok(())
    }

    fn handle_add_arch_edge(&mut self, ctx: &AttractContext<'_>, arch_edge: &Edge) -> RecommendResult<()> {
        self.base.handle_arch_edge_change(arch_edge)?;
        self.mark_endpoints_and_candidates(ctx, arch_edge);
        Ok(())
    }

    fn handle_removed_arch_edge(&mut self, ctx: &AttractContext<'_>, arch_edge: &Edge) -> RecommendResult<()> {
        self.base.handle_arch_edge_change(arch_edge)?;
        self.mark_endpoints_and_candidates(ctx, arch_edge);
        Ok(())
    }

    fn dump_training_data(&self) -> String {
        let snapshot = OverallSnapshot {
            phi: self.phi,
            overall_values: self
                .local_overall_values
                .iter()
                .map(|(id, v)| (id.to_string(), *v))
                .collect(),
        };
        match toon_format::encode_default(&snapshot) {
            Ok(text) => text,
            Err(_) => {
                let mut out = String::from("overall values:\n");
                for (id, v) in &snapshot.overall_values {
                    out.push_str(&format!("{id:<10} :{v}\n"));
                }
                out
            }
        }
    }

    fn empty_training_data(&self) -> bool {
        self.local_overall_values.values().all(|v| v.abs() <= NEUTRAL_EPSILON)
    }

    fn reset(&mut self) {
        debug!(attract_function = COUNT_ATTRACT, "reset");
        self.base.reset();
        self.local_overall_values.clear();
        self.base.clear_state_cache();
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use approx::assert_relative_eq;

    use super::*;
    use crate::core::graph::{GraphError, ReflexionGraph};
    use crate::core::types::{EdgeId, EdgeKind, SubgraphKind};
    use crate::recommend::error::ElementRef;
    use crate::recommend::host::NodeTypes;

    struct World {
        g: ReflexionGraph,
        types: NodeTypes,
        a: NodeId,
        b: NodeId,
        c1: NodeId,
        c2: NodeId,
        c3: NodeId,
        arch: EdgeId,
    }

    fn cluster(g: &mut ReflexionGraph, name: &str) -> NodeId {
        g.add_node(Node::new(name, SubgraphKind::Architecture, None).with_type("Cluster"))
            .unwrap()
    }

    fn class(g: &mut ReflexionGraph, name: &str, parent: Option<NodeId>) -> NodeId {
        g.add_node(Node::new(name, SubgraphKind::Implementation, parent).with_type("Class"))
            .unwrap()
    }

    fn call(g: &mut ReflexionGraph, from: NodeId, to: NodeId) -> EdgeId {
        g.add_edge(Edge::new(from, to, EdgeKind::calls(), SubgraphKind::Implementation))
            .unwrap()
    }

    //A -> B allowed, c1 in A, c2 in B, c3 unmapped and calling both
    fn world() -> World {
        let mut g = ReflexionGraph::new();
        let a = cluster(&mut g, "A");
        let b = cluster(&mut g, "B");
        let arch = g
            .add_edge(Edge::new(a, b, EdgeKind::depends_on(), SubgraphKind::Architecture))
            .unwrap();
        let c1 = class(&mut g, "c1", None);
        let c2 = class(&mut g, "c2", None);
        let c3 = class(&mut g, "c3", None);
        call(&mut g, c3, c1);
        call(&mut g, c3, c2);
        World { g, types: NodeTypes::new("Class", "Cluster"), a, b, c1, c2, c3, arch }
    }

    impl World {
        fn map(&mut self, f: &mut CountAttract, node: NodeId, cluster: NodeId) {
            self.g.set_mapping(node, cluster).unwrap();
            let ctx = AttractContext::new(&self.g, &self.types);
            f.handle_changed_candidate(&ctx, cluster, node, ChangeType::Addition).unwrap();
        }

        fn unmap(&mut self, f: &mut CountAttract, node: NodeId) {
            let cluster = self.g.remove_mapping(node).unwrap().unwrap();
            let ctx = AttractContext::new(&self.g, &self.types);
            f.handle_changed_candidate(&ctx, cluster, node, ChangeType::Removal).unwrap();
        }
    }

    fn count_attract(phi: f64) -> CountAttract {
        CountAttract::new(&AttractFunctionConfig::count_attract("Class", "Cluster", phi)).unwrap()
    }

    #[test]
    fn worked_scenario() {
        let mut w = world();
        let mut f = count_attract(0.5);
        w.map(&mut f, w.c1, w.a);
        w.map(&mut f, w.c2, w.b);

        let ctx = AttractContext::new(&w.g, &w.types);
        //overall 2, the relation to c2 in B is allowed and discounted
        assert_relative_eq!(f.attraction_value(&ctx, w.c3, w.a).unwrap(), 1.5);
        //overall 2, nothing allows B -> A
        assert_relative_eq!(f.attraction_value(&ctx, w.c3, w.b).unwrap(), 1.0);

        let removed = w.g.remove_edge(w.arch).unwrap();
        let ctx = AttractContext::new(&w.g, &w.types);
        f.handle_removed_arch_edge(&ctx, &removed).unwrap();
        assert_relative_eq!(f.attraction_value(&ctx, w.c3, w.a).unwrap(), 1.0);
        assert_relative_eq!(f.attraction_value(&ctx, w.c3, w.b).unwrap(), 1.0);
    }

    #[test]
    fn phi_scales_only_allowed_relations() {
        let mut w = world();
        w.g.set_mapping(w.c1, w.a).unwrap();
        w.g.set_mapping(w.c2, w.b).unwrap();
        let ctx = AttractContext::new(&w.g, &w.types);

        let mut full = count_attract(1.0);
        let mut none = count_attract(0.0);
        for f in [&mut full, &mut none] {
            f.handle_changed_candidate(&ctx, w.a, w.c1, ChangeType::Addition).unwrap();
            f.handle_changed_candidate(&ctx, w.b, w.c2, ChangeType::Addition).unwrap();
        }

        assert_relative_eq!(full.attraction_value(&ctx, w.c3, w.a).unwrap(), 1.0);
        assert_relative_eq!(none.attraction_value(&ctx, w.c3, w.a).unwrap(), 2.0);
        assert_relative_eq!(full.attraction_value(&ctx, w.c3, w.b).unwrap(), 1.0);
        assert_relative_eq!(none.attraction_value(&ctx, w.c3, w.b).unwrap(), 1.0);
    }

    #[test]
    fn descendants_contribute_to_the_parent() {
        let mut g = ReflexionGraph::new();
        let a = cluster(&mut g, "A");
        let b = cluster(&mut g, "B");
        let outer = class(&mut g, "outer", None);
        let inner = class(&mut g, "inner", Some(outer));
        let x = class(&mut g, "x", None);
        let y = class(&mut g, "y", None);
        call(&mut g, inner, x);
        call(&mut g, outer, y);
        let mut w = World { g, types: NodeTypes::new("Class", "Cluster"), a, b, c1: x, c2: y, c3: outer, arch: 0 };

        let mut f = count_attract(1.0);
        w.map(&mut f, x, a);
        w.map(&mut f, y, a);

        let ctx = AttractContext::new(&w.g, &w.types);
        assert_relative_eq!(f.attraction_value(&ctx, outer, a).unwrap(), 2.0);
        assert_relative_eq!(f.attraction_value(&ctx, inner, a).unwrap(), 1.0);
        assert_relative_eq!(f.attraction_value(&ctx, outer, b).unwrap(), 0.0);
    }

    #[test]
    fn relations_to_other_clusters_cancel_out() {
        let mut w = world();
        let mut f = count_attract(1.0);
        w.map(&mut f, w.c1, w.a);
        w.map(&mut f, w.c2, w.b);
        let c4 = class(&mut w.g, "c4", None);
        let c5 = class(&mut w.g, "c5", None);
        call(&mut w.g, c4, c5);
        let other = cluster(&mut w.g, "Other");
        w.map(&mut f, c5, other);

        let ctx = AttractContext::new(&w.g, &w.types);
        assert_relative_eq!(f.attraction_value(&ctx, c4, w.a).unwrap(), 0.0);
        assert_relative_eq!(f.attraction_value(&ctx, c4, other).unwrap(), 1.0);
        //both relations of c3 leave Other
        assert_relative_eq!(f.attraction_value(&ctx, w.c3, other).unwrap(), 0.0);
    }

    #[test]
    fn non_candidates_score_zero() {
        let mut w = world();
        let mut f = count_attract(0.5);
        let pkg = w
            .g
            .add_node(Node::new("pkg", SubgraphKind::Implementation, None).with_type("Package"))
            .unwrap();
        call(&mut w.g, pkg, w.c1);
        w.map(&mut f, w.c1, w.a);

        let ctx = AttractContext::new(&w.g, &w.types);
        assert_eq!(f.attraction_value(&ctx, pkg, w.a).unwrap(), 0.0);
        assert_eq!(f.attraction_value(&ctx, w.a, w.b).unwrap(), 0.0);
    }

    #[test]
    fn mapping_changes_mark_stale_scores() {
        let mut w = world();
        let mut f = count_attract(0.5);
        w.map(&mut f, w.c1, w.a);

        assert_eq!(f.clusters_to_update(), &HashSet::from([w.a, w.b]));
        assert_eq!(f.candidates_to_update(), &HashSet::from([w.c3]));

        f.remove_cluster_to_update(w.a);
        f.remove_cluster_to_update(w.b);
        f.remove_candidate_to_update(w.c3);
        w.unmap(&mut f, w.c1);
        assert_eq!(f.clusters_to_update(), &HashSet::from([w.a, w.b]));
        assert_eq!(f.candidates_to_update(), &HashSet::from([w.c1, w.c3]));
    }

    #[test]
    fn mapping_a_stale_candidate_clears_its_flag() {
        let mut w = world();
        let mut f = count_attract(0.5);
        w.map(&mut f, w.c1, w.a);
        assert!(f.candidates_to_update().contains(&w.c3));

        w.map(&mut f, w.c3, w.a);
        assert!(f.candidates_to_update().is_empty());
    }

    #[test]
    fn mapping_a_parent_clears_inherited_candidates() {
        let mut w = world();
        let mut f = count_attract(0.5);
        let outer = class(&mut w.g, "outer", None);
        let inner = class(&mut w.g, "inner", Some(outer));
        call(&mut w.g, inner, w.c1);
        w.map(&mut f, w.c1, w.a);
        assert!(f.candidates_to_update().contains(&inner));

        w.map(&mut f, outer, w.b);
        assert!(!f.candidates_to_update().contains(&inner));
        assert!(!f.candidates_to_update().contains(&outer));
        assert!(f.candidates_to_update().contains(&w.c3));
    }

    #[test]
    fn unknown_cluster_is_an_error() {
        let mut w = world();
        let mut f = count_attract(0.5);
        w.map(&mut f, w.c1, w.a);

        let ctx = AttractContext::new(&w.g, &w.types);
        let err = f.attraction_value(&ctx, w.c3, 999).unwrap_err();
        assert!(matches!(err, RecommendError::Graph(GraphError::NodeNotFound(999))));
    }

    #[test]
    fn duplicate_notifications_are_ignored() {
        let mut w = world();
        let mut f = count_attract(0.5);
        w.map(&mut f, w.c1, w.a);

        let ctx = AttractContext::new(&w.g, &w.types);
        f.handle_changed_candidate(&ctx, w.a, w.c1, ChangeType::Addition).unwrap();
        assert_relative_eq!(f.overall_local(w.c3), 1.0);
    }

    #[test]
    fn training_data_is_neutral_after_unmapping_everything() {
        let mut w = world();
        let mut f = count_attract(0.5);
        assert!(f.empty_training_data());

        w.map(&mut f, w.c1, w.a);
        w.map(&mut f, w.c2, w.b);
        w.map(&mut f, w.c3, w.a);
        assert!(!f.empty_training_data());
        assert!(f.dump_training_data().contains("overall"));

        w.unmap(&mut f, w.c3);
        w.unmap(&mut f, w.c1);
        w.unmap(&mut f, w.c2);
        assert!(f.empty_training_data());
    }

    #[test]
    fn reset_clears_counters_handled_set_and_cache() {
        let mut w = world();
        let mut f = count_attract(0.5);
        w.map(&mut f, w.c1, w.a);
        w.map(&mut f, w.c2, w.b);
        let ctx = AttractContext::new(&w.g, &w.types);
        f.attraction_value(&ctx, w.c3, w.a).unwrap();
        assert!(!f.base().edge_state_cache().is_empty());

        f.reset();
        assert!(f.empty_training_data());
        assert!(f.base().handled_candidates().is_empty());
        assert!(f.base().edge_state_cache().is_empty());
    }

    #[test]
    fn arch_edge_callbacks_reject_implementation_edges() {
        let mut w = world();
        let mut f = count_attract(0.5);
        let eid = call(&mut w.g, w.c1, w.c2);
        let ctx = AttractContext::new(&w.g, &w.types);
        let edge = w.g.edge(eid).unwrap();

        let err = f.handle_add_arch_edge(&ctx, edge).unwrap_err();
        assert!(matches!(err, RecommendError::NotInSubgraph { element: ElementRef::Edge(id), .. } if id == eid));
    }

    //scores c3 against A so the cache holds entries
    fn warm_cache(w: &World, f: &CountAttract) {
        let ctx = AttractContext::new(&w.g, &w.types);
        f.attraction_value(&ctx, w.c3, w.a).unwrap();
        assert!(!f.base().edge_state_cache().is_empty());
    }

    #[test]
    fn topology_changes_empty_the_cache() {
        let mut w = world();
        let mut f = count_attract(0.5);
        w.map(&mut f, w.c1, w.a);
        w.map(&mut f, w.c2, w.b);

        warm_cache(&w, &f);
        let back = w
            .g
            .add_edge(Edge::new(w.b, w.a, EdgeKind::depends_on(), SubgraphKind::Architecture))
            .unwrap();
        let ctx = AttractContext::new(&w.g, &w.types);
        f.handle_add_arch_edge(&ctx, w.g.edge(back).unwrap()).unwrap();
        assert!(f.base().edge_state_cache().is_empty());

        warm_cache(&w, &f);
        let removed = w.g.remove_edge(back).unwrap();
        let ctx = AttractContext::new(&w.g, &w.types);
        f.handle_removed_arch_edge(&ctx, &removed).unwrap();
        assert!(f.base().edge_state_cache().is_empty());

        warm_cache(&w, &f);
        let c = cluster(&mut w.g, "C");
        let ctx = AttractContext::new(&w.g, &w.types);
        f.handle_add_cluster(&ctx, w.g.node(c).unwrap()).unwrap();
        assert!(f.base().edge_state_cache().is_empty());

        warm_cache(&w, &f);
        let gone = w.g.remove_node(c).unwrap();
        let ctx = AttractContext::new(&w.g, &w.types);
        f.handle_removed_cluster(&ctx, &gone).unwrap();
        assert!(f.base().edge_state_cache().is_empty());
        assert!(!f.clusters_to_update().contains(&c));
    }

    #[test]
    fn arch_changes_mark_every_unmapped_candidate() {
        let mut w = world();
        let mut f = count_attract(0.5);
        w.g.set_mapping(w.c1, w.a).unwrap();
        let c = cluster(&mut w.g, "C");
        let ctx = AttractContext::new(&w.g, &w.types);

        f.handle_add_cluster(&ctx, w.g.node(c).unwrap()).unwrap();
        assert!(f.clusters_to_update().contains(&c));
        assert_eq!(f.candidates_to_update(), &HashSet::from([w.c2, w.c3]));
    }

    #[test]
    fn phi_outside_unit_interval_is_rejected() {
        let err = CountAttract::new(&AttractFunctionConfig::count_attract("Class", "Cluster", 1.5)).unwrap_err();
        assert!(matches!(err, RecommendError::InvalidParameter { ref name, .. } if name == PHI));
        let defaulted = CountAttract::new(&AttractFunctionConfig::default()).unwrap();
        assert_eq!(defaulted.phi(), 1.0);
    }
}
