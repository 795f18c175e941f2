// lifting/hierarchy logic
//does this implementation dependency correspond to something the architecture explicitly allows?
use crate::core::graph::{GraphError, ReflexionGraph};
use crate::core::mapping::MappingView;
use crate::core::state::EdgeState;
use crate::core::types::{EdgeId, NodeId, SubgraphKind};

impl ReflexionGraph {
    /// Finds a specified architecture edge allowing a dependency `from_arch -> to_arch`.
    ///
    /// Walks `from_arch` and its ancestors; an outgoing architecture edge
    /// matches if its target is `to_arch` or one of its ancestors. Edge kinds
    /// are not compared.
    pub fn lift(&self, from_arch: NodeId, to_arch: NodeId) -> Result<Option<EdgeId>, GraphError> {
        let mut targets = self.ancestors(to_arch)?;
        targets.push(to_arch);

        let mut cursor = Some(from_arch);
        while let Some(arch) = cursor {
            if let Some(out) = self.arch_out.get(&arch) {
                for &eid in out {
                    let e = self.edge(eid)?;
                    if e.subgraph == SubgraphKind::Architecture && targets.contains(&e.to) {
                        return Ok(Some(eid));
                    }
                }
            }
            cursor = self.node(arch)?.parent;
        }
        Ok(None)
    }

    /// Classifies an implementation edge against the architecture, resolving
    /// both endpoints through `view`.
    pub fn classify_with<V: MappingView + ?Sized>(&self, view: &V, impl_edge_id: EdgeId) -> Result<EdgeState, GraphError> {
        Ok(self.classify_and_lift(view, impl_edge_id)?.0)
    }

    /// Classification under the live mapping.
    pub fn classify_edge(&self, impl_edge_id: EdgeId) -> Result<EdgeState, GraphError> {
        self.classify_with(self, impl_edge_id)
    }

    /// Classification plus the architecture edge that allows it, if any.
    pub(crate) fn classify_and_lift<V: MappingView + ?Sized>(
        &self,
        view: &V,
        impl_edge_id: EdgeId,
    ) -> Result<(EdgeState, Option<EdgeId>), GraphError> {
        let (from_impl, to_impl) = {
            let e = self.edge(impl_edge_id)?;
            if e.subgraph != SubgraphKind::Implementation {
                return Err(GraphError::WrongSubgraph {
                    node: e.from,
                    expected: SubgraphKind::Implementation,
                    found: e.subgraph,
                });
            }
            (e.from, e.to)
        };

        let (Some(from_arch), Some(to_arch)) = (self.maps_to_in(view, from_impl), self.maps_to_in(view, to_impl)) else {
            return Ok((EdgeState::Unmapped, None));
        };

        if let Some(arch_eid) = self.lift(from_arch, to_arch)? {
            return Ok((EdgeState::Allowed, Some(arch_eid)));
        }

        //every entity may use itself
        if from_arch == to_arch {
            return Ok((EdgeState::ImplicitlyAllowed, None));
        }

        if self.allow_dependencies_to_parents && self.is_descendant_of(from_arch, to_arch) {
            return Ok((EdgeState::ImplicitlyAllowed, None));
        }

        Ok((EdgeState::Divergent, None))
    }
}
