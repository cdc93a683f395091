//! DSL module: builder API for patches with named nodes.

use crate::graph::{Graph, GraphError, NodeId, PortId};
use crate::message::Token;
use std::collections::HashMap;

/// Handle to a node in the builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeHandle(pub NodeId);

/// The patch builder.
#[derive(Debug, Default)]
pub struct PatchBuilder {
    graph: Graph,
    node_names: HashMap<String, NodeId>,
}

/// DSL-specific errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DslError {
    /// Underlying graph error.
    #[error(transparent)]
    Graph(#[from] GraphError),
    /// No node was registered under this name.
    #[error("no node named {0:?}")]
    MissingNode(String),
    /// The name is already taken.
    #[error("node name {0:?} is already used")]
    DuplicateName(String),
}

impl PatchBuilder {
    /// Create a new builder over the standard node types.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing graph, e.g. one with a custom registry.
    pub fn from_graph(graph: Graph) -> Self {
        Self {
            graph,
            node_names: HashMap::new(),
        }
    }

    /// Add an anonymous node.
    pub fn node(&mut self, type_name: &str, args: &[Token]) -> Result<NodeHandle, DslError> {
        Ok(NodeHandle(self.graph.add_node(type_name, args)?))
    }

    /// Add a named node.
    pub fn node_named(
        &mut self,
        name: &str,
        type_name: &str,
        args: &[Token],
    ) -> Result<NodeHandle, DslError> {
        if self.node_names.contains_key(name) {
            return Err(DslError::DuplicateName(name.to_string()));
        }
        let handle = self.node(type_name, args)?;
        self.node_names.insert(name.to_string(), handle.0);
        Ok(handle)
    }

    /// Look up a named node.
    pub fn get(&self, name: &str) -> Result<NodeHandle, DslError> {
        self.node_names
            .get(name)
            .map(|id| NodeHandle(*id))
            .ok_or_else(|| DslError::MissingNode(name.to_string()))
    }

    /// Connect `outlet` of `from` to `inlet` of `to`.
    pub fn connect(
        &mut self,
        from: NodeHandle,
        outlet: usize,
        to: NodeHandle,
        inlet: usize,
    ) -> Result<PortId, DslError> {
        Ok(self.graph.connect(from.0, outlet, to.0, PortId::new(inlet))?)
    }

    /// Connect two named nodes.
    pub fn wire(
        &mut self,
        from: &str,
        outlet: usize,
        to: &str,
        inlet: usize,
    ) -> Result<PortId, DslError> {
        let from = self.get(from)?;
        let to = self.get(to)?;
        self.connect(from, outlet, to, inlet)
    }

    /// Build the graph.
    pub fn build(self) -> Graph {
        self.graph
    }
}
