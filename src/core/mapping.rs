// maps_to table + copy-on-write overlay for hypothetical mappings
use std::collections::HashMap;

use crate::core::graph::{GraphError, ReflexionGraph};
use crate::core::types::{NodeId, SubgraphKind};

/// Read access to explicit `maps_to` entries.
///
/// The graph itself is the authoritative view. `MappingOverlay` layers
/// hypothetical entries on top of it without touching the graph.
pub trait MappingView {
    /// Explicit mapping target of `impl_node`, ignoring its ancestors.
    fn explicit_target(&self, impl_node: NodeId) -> Option<NodeId>;
}

impl MappingView for ReflexionGraph {
    fn explicit_target(&self, impl_node: NodeId) -> Option<NodeId> {
        self.maps_to.get(&impl_node).copied()
    }
}

/// Per-node overrides on top of the graph's mapping.
///
/// `Some(cluster)` maps the node, `None` unmaps it; nodes without an
/// override fall through to the graph.
#[derive(Debug)]
pub struct MappingOverlay<'g> {
    graph: &'g ReflexionGraph,
    overrides: HashMap<NodeId, Option<NodeId>>,
}

impl<'g> MappingOverlay<'g> {
    pub fn new(graph: &'g ReflexionGraph) -> Self {
        Self { graph, overrides: HashMap::new() }
    }

    pub fn map(&mut self, impl_node: NodeId, arch_node: NodeId) -> &mut Self {
        self.overrides.insert(impl_node, Some(arch_node));
        self
    }

    pub fn unmap(&mut self, impl_node: NodeId) -> &mut Self {
        self.overrides.insert(impl_node, None);
        self
    }

    pub fn graph(&self) -> &'g ReflexionGraph {
        self.graph
    }
}

impl MappingView for MappingOverlay<'_> {
    fn explicit_target(&self, impl_node: NodeId) -> Option<NodeId> {
        match self.overrides.get(&impl_node) {
            Some(target) => *target,
            None => self.graph.explicit_target(impl_node),
        }
    }
}

impl ReflexionGraph {
    //each impl node maps to at most one arch node, many impl nodes may share one,
    //no overwrites unless explicit

    //validation helpers
    fn expect_impl_node(&self, impl_node: NodeId) -> Result<(), GraphError> {
        self.expect_subgraph(impl_node, SubgraphKind::Implementation)
    }

    fn expect_arch_node(&self, arch_node: NodeId) -> Result<(), GraphError> {
        self.expect_subgraph(arch_node, SubgraphKind::Architecture)
    }

    pub fn set_mapping(&mut self, impl_node: NodeId, arch_node: NodeId) -> Result<(), GraphError> {
        self.expect_impl_node(impl_node)?;
        self.expect_arch_node(arch_node)?;

        match self.maps_to.get(&impl_node).copied() {
            None => {
                self.maps_to.insert(impl_node, arch_node);
                Ok(())
            }
            Some(old_arch) if old_arch == arch_node => Ok(()), //idempotent if mapping is identical
            Some(old_arch) => Err(GraphError::MappingAlreadyExists { impl_node, old_arch, new_arch: arch_node }),
        }
    }

    pub fn set_mapping_overwrite(&mut self, impl_node: NodeId, arch_node: NodeId) -> Result<Option<NodeId>, GraphError> {
        self.expect_impl_node(impl_node)?;
        self.expect_arch_node(arch_node)?;

        Ok(self.maps_to.insert(impl_node, arch_node))
    }

    //returns Ok(Some(arch)) if explicitly mapped, Ok(None) if not. errors only if impl_node doesn't
    //exist or is in the wrong subgraph.
    pub fn get_arch_node(&self, impl_node: NodeId) -> Result<Option<NodeId>, GraphError> {
        self.expect_impl_node(impl_node)?;
        Ok(self.maps_to.get(&impl_node).copied())
    }

    pub fn is_mapped(&self, impl_node: NodeId) -> Result<bool, GraphError> {
        self.expect_impl_node(impl_node)?;
        Ok(self.maps_to.contains_key(&impl_node))
    }

    pub fn remove_mapping(&mut self, impl_node: NodeId) -> Result<Option<NodeId>, GraphError> {
        self.expect_impl_node(impl_node)?;
        Ok(self.maps_to.remove(&impl_node))
    }

    pub fn mapping_len(&self) -> usize {
        self.maps_to.len()
    }

    //for reports
    pub fn iter_mapping(&self) -> impl Iterator<Item = (NodeId, NodeId)> + '_ {
        self.maps_to.iter().map(|(&i, &a)| (i, a))
    }

    pub fn validate_all_mappings(&self) -> Result<(), GraphError> {
        for (&impl_node, &arch_node) in self.maps_to.iter() {
            self.expect_impl_node(impl_node)?;
            self.expect_arch_node(arch_node)?;
        }
        Ok(())
    }

    /// Effective cluster of a node: its own explicit target, or else the
    /// target of its nearest explicitly mapped ancestor.
    ///
    /// Unknown ids and architecture nodes are never mapped.
    pub fn maps_to(&self, node: NodeId) -> Option<NodeId> {
        self.maps_to_in(self, node)
    }

    /// Same as `maps_to`, resolved through `view` instead of the graph's own table.
    pub fn maps_to_in<V: MappingView + ?Sized>(&self, view: &V, node: NodeId) -> Option<NodeId> {
        let mut cursor = Some(node);
        while let Some(id) = cursor {
            let n = self.nodes.get(&id)?;
            if n.subgraph != SubgraphKind::Implementation {
                return None;
            }
            if let Some(target) = view.explicit_target(id) {
                return Some(target);
            }
            cursor = n.parent;
        }
        None
    }
}
