//! Graph module: typed ports, node topologies and the wiring between them.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use crate::invariant_ppt::{assert_invariant, GRAPH_REJECTS_INVALID, PORT_IDS_UNIQUE};
use crate::message::Token;
use crate::node::{ErasedArgs, NodeDef, NodeDefDyn, NodeError};
use crate::registry::NodeRegistry;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Whether a port carries per-sample values or discrete messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PortKind {
    /// One value per tick.
    Signal,
    /// Discrete token sequences.
    Message,
}

/// Unique identifier for a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub usize);

/// Identifier of a port within one node.
///
/// Shadow ports are message inlets standing in for a signal inlet of the
/// same index; they display as `"1_message"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PortId {
    /// Position of the port.
    pub index: usize,
    /// True for a message shadow of a signal inlet.
    pub shadow: bool,
}

impl PortId {
    /// A regular port.
    pub const fn new(index: usize) -> Self {
        Self {
            index,
            shadow: false,
        }
    }

    /// The message shadow of signal inlet `index`.
    pub const fn shadow(index: usize) -> Self {
        Self {
            index,
            shadow: true,
        }
    }
}

impl fmt::Display for PortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.shadow {
            write!(f, "{}_message", self.index)
        } else {
            write!(f, "{}", self.index)
        }
    }
}

/// A port with its kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Port {
    /// The identifier for this port.
    pub id: PortId,
    /// What the port carries.
    pub kind: PortKind,
}

impl Port {
    /// A signal port at `index`.
    pub const fn signal(index: usize) -> Self {
        Self {
            id: PortId::new(index),
            kind: PortKind::Signal,
        }
    }

    /// A message port at `index`.
    pub const fn message(index: usize) -> Self {
        Self {
            id: PortId::new(index),
            kind: PortKind::Message,
        }
    }

    /// The message shadow of signal inlet `index`.
    pub const fn message_shadow(index: usize) -> Self {
        Self {
            id: PortId::shadow(index),
            kind: PortKind::Message,
        }
    }
}

/// Ports produced by a node type's `build`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Topology {
    /// Inlets, in declaration order.
    pub inlets: Vec<Port>,
    /// Outlets, in declaration order. Outlets are never shadows.
    pub outlets: Vec<Port>,
    /// Set when the node emits messages on its own after configuration.
    pub is_pushing_messages: bool,
}

impl Topology {
    /// Topology from inlet and outlet lists.
    pub fn new(inlets: Vec<Port>, outlets: Vec<Port>) -> Self {
        Self {
            inlets,
            outlets,
            is_pushing_messages: false,
        }
    }

    /// Mark the node as a spontaneous message source.
    pub fn pushing_messages(mut self, pushing: bool) -> Self {
        self.is_pushing_messages = pushing;
        self
    }

    /// Look up an inlet.
    pub fn inlet(&self, id: PortId) -> Option<&Port> {
        self.inlets.iter().find(|p| p.id == id)
    }

    /// Look up an outlet by index.
    pub fn outlet(&self, index: usize) -> Option<&Port> {
        self.outlets.iter().find(|p| p.id == PortId::new(index))
    }

    /// True if any port is a signal port.
    pub fn has_signal_ports(&self) -> bool {
        self.inlets
            .iter()
            .chain(self.outlets.iter())
            .any(|p| p.kind == PortKind::Signal)
    }

    /// Width of the per-tick input slice: highest signal inlet index + 1.
    pub fn signal_input_width(&self) -> usize {
        self.inlets
            .iter()
            .filter(|p| p.kind == PortKind::Signal)
            .map(|p| p.id.index + 1)
            .max()
            .unwrap_or(0)
    }

    /// Width of the per-tick output slice: highest signal outlet index + 1.
    pub fn signal_output_width(&self) -> usize {
        self.outlets
            .iter()
            .filter(|p| p.kind == PortKind::Signal)
            .map(|p| p.id.index + 1)
            .max()
            .unwrap_or(0)
    }

    fn ids_unique(&self) -> bool {
        let unique = |ports: &[Port]| {
            ports
                .iter()
                .enumerate()
                .all(|(i, p)| ports[..i].iter().all(|q| q.id != p.id))
        };
        unique(&self.inlets) && unique(&self.outlets)
    }
}

/// An edge from an outlet to an inlet.
#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    /// The source node ID.
    pub from_node: NodeId,
    /// The source outlet index.
    pub from_port: usize,
    /// The destination node ID.
    pub to_node: NodeId,
    /// The destination inlet, after any shadow rerouting.
    pub to_port: PortId,
    /// What travels along this edge.
    pub kind: PortKind,
}

/// A node in the graph.
#[derive(Clone)]
pub struct NodeData {
    /// The unique ID of this node.
    pub id: NodeId,
    /// Registered type name, e.g. `"osc~"`.
    pub type_name: String,
    /// Construction arguments as written in the patch.
    pub raw_args: Vec<Token>,
    /// Validated arguments produced by `translate_args`.
    pub args: ErasedArgs,
    /// Ports produced by `build`.
    pub topology: Topology,
    /// The node type.
    pub def: Arc<dyn NodeDefDyn>,
}

impl fmt::Debug for NodeData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeData")
            .field("id", &self.id)
            .field("type_name", &self.type_name)
            .field("raw_args", &self.raw_args)
            .field("topology", &self.topology)
            .finish()
    }
}

/// The patch graph: nodes and the edges between them.
///
/// Signal edges must form a DAG. Message edges may loop; the runtime cuts
/// runaway cascades.
#[derive(Debug, Clone)]
pub struct Graph {
    /// All nodes in the graph.
    pub nodes: Vec<NodeData>,
    /// All edges connecting nodes.
    pub edges: Vec<Edge>,
    registry: Arc<NodeRegistry>,
}

/// Errors that can occur when building the graph.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GraphError {
    /// Node construction failed.
    #[error(transparent)]
    Node(#[from] NodeError),
    /// Node does not exist.
    #[error("no such node: {0:?}")]
    InvalidNode(NodeId),
    /// Port does not exist on the node.
    #[error("no such port {port} on node {node:?}")]
    InvalidPort {
        /// Node addressed.
        node: NodeId,
        /// Port addressed.
        port: PortId,
    },
    /// Outlet and inlet kinds are incompatible.
    #[error("cannot connect {from:?} outlet to {to:?} inlet")]
    KindMismatch {
        /// Outlet kind.
        from: PortKind,
        /// Inlet kind.
        to: PortKind,
    },
    /// Adding the signal edge would create a cycle.
    #[error("signal cycle detected")]
    CycleDetected,
    /// The exact same connection already exists.
    #[error("connection already exists")]
    DuplicateEdge,
}

impl Graph {
    /// Create an empty graph backed by the standard node types.
    pub fn new() -> Self {
        Self::with_registry(Arc::new(NodeRegistry::standard()))
    }

    /// Create an empty graph backed by a custom registry.
    pub fn with_registry(registry: Arc<NodeRegistry>) -> Self {
        Self {
            nodes: Vec::new(),
            edges: Vec::new(),
            registry,
        }
    }

    /// The registry node types are resolved from.
    pub fn registry(&self) -> &NodeRegistry {
        &self.registry
    }

    /// Add a node of a registered type.
    pub fn add_node(&mut self, type_name: &str, raw_args: &[Token]) -> Result<NodeId, GraphError> {
        let def = self.registry.get(type_name)?;
        self.insert(type_name.to_string(), def, raw_args)
    }

    /// Add a node from a definition that is not in the registry.
    pub fn add_external_node<T: NodeDef>(
        &mut self,
        type_name: &str,
        def: T,
        raw_args: &[Token],
    ) -> Result<NodeId, GraphError> {
        self.insert(type_name.to_string(), Arc::new(def), raw_args)
    }

    fn insert(
        &mut self,
        type_name: String,
        def: Arc<dyn NodeDefDyn>,
        raw_args: &[Token],
    ) -> Result<NodeId, GraphError> {
        let args = def.translate_args(raw_args)?;
        let topology = def.build(args.as_ref())?;
        assert_invariant(
            PORT_IDS_UNIQUE,
            topology.ids_unique(),
            "Port ids must be unique within a node",
            Some(&type_name),
        );
        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeData {
            id,
            type_name,
            raw_args: raw_args.to_vec(),
            args,
            topology,
            def,
        });
        Ok(id)
    }

    /// Get a node by ID.
    pub fn node(&self, id: NodeId) -> Option<&NodeData> {
        self.nodes.get(id.0)
    }

    /// Connect `outlet` of `from` to `inlet` of `to`.
    ///
    /// A message outlet wired to a signal inlet is rerouted to the node's
    /// shadow inlet when the node type provides one. Returns the inlet that
    /// was actually connected.
    pub fn connect(
        &mut self,
        from: NodeId,
        outlet: usize,
        to: NodeId,
        inlet: PortId,
    ) -> Result<PortId, GraphError> {
        let from_data = self.node(from).ok_or(GraphError::InvalidNode(from))?;
        let to_data = self.node(to).ok_or(GraphError::InvalidNode(to))?;

        let out_kind = from_data
            .topology
            .outlet(outlet)
            .ok_or(GraphError::InvalidPort {
                node: from,
                port: PortId::new(outlet),
            })?
            .kind;
        let in_port = *to_data
            .topology
            .inlet(inlet)
            .ok_or(GraphError::InvalidPort { node: to, port: inlet })?;

        let resolved = match (out_kind, in_port.kind) {
            (PortKind::Signal, PortKind::Signal) | (PortKind::Message, PortKind::Message) => inlet,
            (PortKind::Message, PortKind::Signal) => to_data
                .def
                .reroute_message_connection(inlet)
                .filter(|shadow| {
                    to_data
                        .topology
                        .inlet(*shadow)
                        .is_some_and(|p| p.kind == PortKind::Message)
                })
                .ok_or(GraphError::KindMismatch {
                    from: out_kind,
                    to: in_port.kind,
                })?,
            (PortKind::Signal, PortKind::Message) => {
                return Err(GraphError::KindMismatch {
                    from: out_kind,
                    to: in_port.kind,
                })
            }
        };

        let edge = Edge {
            from_node: from,
            from_port: outlet,
            to_node: to,
            to_port: resolved,
            kind: out_kind,
        };

        if self.edges.contains(&edge) {
            return Err(GraphError::DuplicateEdge);
        }

        if edge.kind == PortKind::Signal && self.would_create_cycle(&edge) {
            assert_invariant(
                GRAPH_REJECTS_INVALID,
                true,
                "Signal cycle detected, rejecting",
                Some("connect"),
            );
            return Err(GraphError::CycleDetected);
        }

        self.edges.push(edge);
        Ok(resolved)
    }

    /// Signal edges arriving at `node`.
    pub fn signal_sources(&self, node: NodeId) -> impl Iterator<Item = &Edge> {
        self.edges
            .iter()
            .filter(move |e| e.to_node == node && e.kind == PortKind::Signal)
    }

    fn would_create_cycle(&self, edge: &Edge) -> bool {
        let mut visited = vec![false; self.nodes.len()];
        self.dfs(edge.to_node, edge.from_node, &mut visited)
    }

    fn dfs(&self, current: NodeId, target: NodeId, visited: &mut [bool]) -> bool {
        if current == target {
            return true;
        }
        if visited[current.0] {
            return false;
        }
        visited[current.0] = true;
        for edge in &self.edges {
            if edge.kind == PortKind::Signal
                && edge.from_node == current
                && self.dfs(edge.to_node, target, visited)
            {
                return true;
            }
        }
        false
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}
