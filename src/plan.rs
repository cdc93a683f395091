//! Plan module: link a graph into a fixed execution order and routing tables.

use crate::graph::{Graph, NodeId, PortId, PortKind};
use crate::invariant_ppt::{assert_invariant, MODE_RESOLVED_AT_LINK, PLAN_SOUNDNESS};
use crate::node::LinkInfo;
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Range;

/// One summed contribution to a signal inlet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignalInput {
    /// Destination inlet index.
    pub inlet: usize,
    /// Source node.
    pub from_node: NodeId,
    /// Source outlet index.
    pub from_outlet: usize,
}

/// The compiled plan: tick order, per-node link info and routing.
#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
    /// Loop-bearing nodes in signal-domain topological order.
    pub execution_order: Vec<NodeId>,
    /// Per node: which inlets have a wired signal source.
    pub links: Vec<LinkInfo>,
    /// Per node: sources summed into each signal inlet.
    pub signal_inputs: Vec<Vec<SignalInput>>,
    /// Per node: width of the tick input slice.
    pub input_widths: Vec<usize>,
    /// Per node: slots of the shared output buffer.
    pub output_slots: Vec<Range<usize>>,
    /// Total length of the shared output buffer.
    pub output_len: usize,
    /// Message fan-out per (node, outlet), in connection order.
    pub message_routes: BTreeMap<(NodeId, usize), Vec<(NodeId, PortId)>>,
}

/// Errors during plan compilation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PlanError {
    /// The signal edges do not form a DAG.
    #[error("signal cycle detected")]
    CycleDetected,
}

impl Plan {
    /// Create a plan from a graph.
    pub fn compile(graph: &Graph) -> Result<Self, PlanError> {
        let execution_order = topo_sort(graph)?;

        let n = graph.nodes.len();
        let mut signal_inputs: Vec<Vec<SignalInput>> = vec![Vec::new(); n];
        let mut message_routes: BTreeMap<(NodeId, usize), Vec<(NodeId, PortId)>> =
            BTreeMap::new();
        for edge in &graph.edges {
            match edge.kind {
                PortKind::Signal => signal_inputs[edge.to_node.0].push(SignalInput {
                    inlet: edge.to_port.index,
                    from_node: edge.from_node,
                    from_outlet: edge.from_port,
                }),
                PortKind::Message => message_routes
                    .entry((edge.from_node, edge.from_port))
                    .or_default()
                    .push((edge.to_node, edge.to_port)),
            }
        }

        let links: Vec<LinkInfo> = signal_inputs
            .iter()
            .map(|inputs| LinkInfo::new(inputs.iter().map(|s| s.inlet).collect()))
            .collect();
        for (node, inputs) in graph.nodes.iter().zip(&signal_inputs) {
            assert_invariant(
                MODE_RESOLVED_AT_LINK,
                inputs.iter().all(|s| {
                    node.topology
                        .inlet(PortId::new(s.inlet))
                        .is_some_and(|p| p.kind == PortKind::Signal)
                }),
                "Signal sources must land on signal inlets",
                Some(&node.type_name),
            );
        }

        let mut output_slots = Vec::with_capacity(n);
        let mut output_len = 0;
        for node in &graph.nodes {
            let width = node.topology.signal_output_width();
            output_slots.push(output_len..output_len + width);
            output_len += width;
        }
        let input_widths = graph
            .nodes
            .iter()
            .map(|node| node.topology.signal_input_width())
            .collect();

        Ok(Self {
            execution_order,
            links,
            signal_inputs,
            input_widths,
            output_slots,
            output_len,
            message_routes,
        })
    }

    /// Message destinations of `outlet` on `node`.
    pub fn message_targets(&self, node: NodeId, outlet: usize) -> &[(NodeId, PortId)] {
        self.message_routes
            .get(&(node, outlet))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// Stable topological sort of loop-bearing nodes over signal edges.
///
/// Among ready nodes the lowest id runs first.
fn topo_sort(graph: &Graph) -> Result<Vec<NodeId>, PlanError> {
    let n = graph.nodes.len();
    let mut in_degree = vec![0usize; n];
    let mut adj: Vec<Vec<NodeId>> = vec![vec![]; n];

    for edge in graph.edges.iter().filter(|e| e.kind == PortKind::Signal) {
        adj[edge.from_node.0].push(edge.to_node);
        in_degree[edge.to_node.0] += 1;
    }

    let mut ready: BTreeSet<NodeId> = (0..n)
        .filter(|&i| in_degree[i] == 0)
        .map(NodeId)
        .collect();

    let mut order = Vec::with_capacity(n);
    while let Some(node) = ready.pop_first() {
        order.push(node);
        for &neighbor in &adj[node.0] {
            in_degree[neighbor.0] -= 1;
            if in_degree[neighbor.0] == 0 {
                ready.insert(neighbor);
            }
        }
    }

    if order.len() != n {
        return Err(PlanError::CycleDetected);
    }
    assert_invariant(
        PLAN_SOUNDNESS,
        order.len() == n,
        "Every node must appear exactly once in the order",
        Some("topo_sort"),
    );

    order.retain(|id| graph.nodes[id.0].topology.has_signal_ports());
    Ok(order)
}
