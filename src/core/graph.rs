// node/edge storage of the reflexion graph
use std::collections::HashMap;

use thiserror::Error;

use crate::core::state::EdgeState;
use crate::core::types::{EdgeId, EdgeKind, NodeId, SubgraphKind};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("node {0} not found")]
    NodeNotFound(NodeId),

    #[error("edge {0} not found")]
    EdgeNotFound(EdgeId),

    #[error("node {node} is in the {found} subgraph, expected {expected}")]
    WrongSubgraph {
        node: NodeId,
        expected: SubgraphKind,
        found: SubgraphKind,
    },

    #[error("node {impl_node} is already mapped to {old_arch}, refusing to remap it to {new_arch}")]
    MappingAlreadyExists {
        impl_node: NodeId,
        old_arch: NodeId,
        new_arch: NodeId,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: NodeId,
    pub name: String,
    pub node_type: String,
    pub subgraph: SubgraphKind,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
}

impl Node {
    pub fn new(name: impl Into<String>, subgraph: SubgraphKind, parent: Option<NodeId>) -> Self {
        Self {
            id: 0, // overwritten by add_node
            name: name.into(),
            node_type: String::new(),
            subgraph,
            parent,
            children: Vec::new(),
        }
    }

    pub fn with_type(mut self, node_type: impl Into<String>) -> Self {
        self.node_type = node_type.into();
        self
    }

    pub fn is_in(&self, subgraph: SubgraphKind) -> bool {
        self.subgraph == subgraph
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    pub id: EdgeId,
    pub from: NodeId,
    pub to: NodeId,
    pub kind: EdgeKind,
    pub subgraph: SubgraphKind,
    pub state: EdgeState,
    /// Number of implementation edges an architecture edge currently allows.
    pub counter: i32,
}

impl Edge {
    pub fn new(from: NodeId, to: NodeId, kind: EdgeKind, subgraph: SubgraphKind) -> Self {
        Self {
            id: 0, // overwritten by add_edge
            from,
            to,
            kind,
            subgraph,
            state: EdgeState::Undefined,
            counter: 0,
        }
    }

    pub fn is_in(&self, subgraph: SubgraphKind) -> bool {
        self.subgraph == subgraph
    }

    /// The endpoint of this edge that is not `node`. Self loops return `node`.
    pub fn other_end(&self, node: NodeId) -> NodeId {
        if self.from == node { self.to } else { self.from }
    }
}

/// Architecture and implementation nodes/edges plus the `maps_to` table.
///
/// Ids are handed out by the graph and never reused, so a stale id simply
/// fails the lookup instead of aliasing a different element.
#[derive(Debug, Clone)]
pub struct ReflexionGraph {
    pub(crate) nodes: HashMap<NodeId, Node>,
    pub(crate) edges: HashMap<EdgeId, Edge>,
    pub(crate) arch_out: HashMap<NodeId, Vec<EdgeId>>,
    pub(crate) arch_in: HashMap<NodeId, Vec<EdgeId>>,
    pub(crate) impl_out: HashMap<NodeId, Vec<EdgeId>>,
    pub(crate) impl_in: HashMap<NodeId, Vec<EdgeId>>,
    pub(crate) maps_to: HashMap<NodeId, NodeId>,
    pub(crate) allow_dependencies_to_parents: bool,
    next_node: NodeId,
    next_edge: EdgeId,
}

impl Default for ReflexionGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl ReflexionGraph {
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
            edges: HashMap::new(),
            arch_out: HashMap::new(),
            arch_in: HashMap::new(),
            impl_out: HashMap::new(),
            impl_in: HashMap::new(),
            maps_to: HashMap::new(),
            allow_dependencies_to_parents: true,
            next_node: 0,
            next_edge: 0,
        }
    }

    /// Whether implementation dependencies from a descendant cluster to one of
    /// its ancestors count as implicitly allowed. On by default.
    pub fn with_allow_dependencies_to_parents(mut self, allow: bool) -> Self {
        self.allow_dependencies_to_parents = allow;
        self
    }

    pub fn add_node(&mut self, mut node: Node) -> Result<NodeId, GraphError> {
        if let Some(parent) = node.parent {
            self.expect_subgraph(parent, node.subgraph)?;
        }

        let id = self.next_node;
        self.next_node += 1;
        node.id = id;
        node.children.clear();

        if let Some(parent) = node.parent {
            if let Some(p) = self.nodes.get_mut(&parent) {
                p.children.push(id);
            }
        }
        self.nodes.insert(id, node);
        Ok(id)
    }

    pub fn add_edge(&mut self, mut edge: Edge) -> Result<EdgeId, GraphError> {
        self.expect_subgraph(edge.from, edge.subgraph)?;
        self.expect_subgraph(edge.to, edge.subgraph)?;

        let id = self.next_edge;
        self.next_edge += 1;
        edge.id = id;

        //architecture edges start out specified, implementation edges unclassified
        if edge.subgraph == SubgraphKind::Architecture && edge.state == EdgeState::Undefined {
            edge.state = EdgeState::Specified;
        }

        let (out, inc) = self.adjacency_mut(edge.subgraph);
        out.entry(edge.from).or_default().push(id);
        inc.entry(edge.to).or_default().push(id);

        self.edges.insert(id, edge);
        Ok(id)
    }

    pub fn remove_edge(&mut self, edge_id: EdgeId) -> Result<Edge, GraphError> {
        let edge = self.edges.remove(&edge_id).ok_or(GraphError::EdgeNotFound(edge_id))?;

        let (out, inc) = self.adjacency_mut(edge.subgraph);
        if let Some(v) = out.get_mut(&edge.from) {
            v.retain(|&x| x != edge_id);
        }
        if let Some(v) = inc.get_mut(&edge.to) {
            v.retain(|&x| x != edge_id);
        }
        Ok(edge)
    }

    /// Removes a node with all incident edges and every mapping it takes part in.
    /// Children are reattached to the removed node's parent.
    pub fn remove_node(&mut self, node_id: NodeId) -> Result<Node, GraphError> {
        let subgraph = self.node_subgraph(node_id)?;

        let incident: Vec<EdgeId> = {
            let (out, inc) = self.adjacency(subgraph);
            out.get(&node_id)
                .into_iter()
                .chain(inc.get(&node_id))
                .flatten()
                .copied()
                .collect()
        };
        for eid in incident {
            // self loops show up twice
            if self.edges.contains_key(&eid) {
                self.remove_edge(eid)?;
            }
        }

        let node = self.nodes.remove(&node_id).ok_or(GraphError::NodeNotFound(node_id))?;
        self.arch_out.remove(&node_id);
        self.arch_in.remove(&node_id);
        self.impl_out.remove(&node_id);
        self.impl_in.remove(&node_id);

        self.maps_to.remove(&node_id);
        self.maps_to.retain(|_, arch| *arch != node_id);

        if let Some(parent) = node.parent {
            if let Some(p) = self.nodes.get_mut(&parent) {
                p.children.retain(|&c| c != node_id);
                p.children.extend(node.children.iter().copied());
            }
        }
        for &child in &node.children {
            if let Some(c) = self.nodes.get_mut(&child) {
                c.parent = node.parent;
            }
        }

        Ok(node)
    }

    pub fn node(&self, node_id: NodeId) -> Result<&Node, GraphError> {
        self.nodes.get(&node_id).ok_or(GraphError::NodeNotFound(node_id))
    }

    pub fn edge(&self, edge_id: EdgeId) -> Result<&Edge, GraphError> {
        self.edges.get(&edge_id).ok_or(GraphError::EdgeNotFound(edge_id))
    }

    pub fn contains_node(&self, node_id: NodeId) -> bool {
        self.nodes.contains_key(&node_id)
    }

    pub fn contains_edge(&self, edge_id: EdgeId) -> bool {
        self.edges.contains_key(&edge_id)
    }

    pub fn node_subgraph(&self, node_id: NodeId) -> Result<SubgraphKind, GraphError> {
        Ok(self.node(node_id)?.subgraph)
    }

    /// All node ids in ascending order.
    pub fn node_ids(&self) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self.nodes.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// All edge ids in ascending order.
    pub fn edge_ids(&self) -> Vec<EdgeId> {
        let mut ids: Vec<EdgeId> = self.edges.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> + '_ {
        self.nodes.values()
    }

    pub fn edges(&self) -> impl Iterator<Item = &Edge> + '_ {
        self.edges.values()
    }

    /// Outgoing and incoming implementation edges of a single node (not its subtree).
    pub fn implementation_edges(&self, node_id: NodeId) -> Result<Vec<EdgeId>, GraphError> {
        self.node(node_id)?;
        let mut result: Vec<EdgeId> = self.impl_out.get(&node_id).cloned().unwrap_or_default();
        if let Some(incoming) = self.impl_in.get(&node_id) {
            for &eid in incoming {
                // self loops are already listed as outgoing
                if !result.contains(&eid) {
                    result.push(eid);
                }
            }
        }
        Ok(result)
    }

    pub fn architecture_outgoing(&self, node_id: NodeId) -> Vec<EdgeId> {
        self.arch_out.get(&node_id).cloned().unwrap_or_default()
    }

    pub fn architecture_incoming(&self, node_id: NodeId) -> Vec<EdgeId> {
        self.arch_in.get(&node_id).cloned().unwrap_or_default()
    }

    /// `node_id` and all its descendants, children before their parents.
    pub fn descendants_post_order(&self, node_id: NodeId) -> Result<Vec<NodeId>, GraphError> {
        self.node(node_id)?;

        let mut result = Vec::new();
        let mut stack = vec![(node_id, false)];
        while let Some((id, expanded)) = stack.pop() {
            if expanded {
                result.push(id);
                continue;
            }
            stack.push((id, true));
            let node = self.node(id)?;
            for &child in node.children.iter().rev() {
                stack.push((child, false));
            }
        }
        Ok(result)
    }

    /// Proper ancestors of `node_id`, nearest first.
    pub fn ancestors(&self, node_id: NodeId) -> Result<Vec<NodeId>, GraphError> {
        let mut result = Vec::new();
        let mut cursor = self.node(node_id)?.parent;
        while let Some(id) = cursor {
            result.push(id);
            cursor = self.node(id)?.parent;
        }
        Ok(result)
    }

    /// True if `ancestor` is a proper ancestor of `descendant`.
    pub fn is_descendant_of(&self, descendant: NodeId, ancestor: NodeId) -> bool {
        let mut cursor = self.nodes.get(&descendant).and_then(|n| n.parent);
        while let Some(id) = cursor {
            if id == ancestor {
                return true;
            }
            cursor = self.nodes.get(&id).and_then(|n| n.parent);
        }
        false
    }

    pub(crate) fn expect_subgraph(&self, node_id: NodeId, expected: SubgraphKind) -> Result<(), GraphError> {
        let found = self.node_subgraph(node_id)?;
        if found != expected {
            return Err(GraphError::WrongSubgraph { node: node_id, expected, found });
        }
        Ok(())
    }

    fn adjacency(&self, subgraph: SubgraphKind) -> (&HashMap<NodeId, Vec<EdgeId>>, &HashMap<NodeId, Vec<EdgeId>>) {
        match subgraph {
            SubgraphKind::Architecture => (&self.arch_out, &self.arch_in),
            SubgraphKind::Implementation => (&self.impl_out, &self.impl_in),
        }
    }

    fn adjacency_mut(
        &mut self,
        subgraph: SubgraphKind,
    ) -> (&mut HashMap<NodeId, Vec<EdgeId>>, &mut HashMap<NodeId, Vec<EdgeId>>) {
        match subgraph {
            SubgraphKind::Architecture => (&mut self.arch_out, &mut self.arch_in),
            SubgraphKind::Implementation => (&mut self.impl_out, &mut self.impl_in),
        }
    }
}
