use patchcore::graph::{Graph, GraphError, PortId, PortKind};
use patchcore::plan::Plan;
use proptest::prelude::*;

const SIGNAL_TYPES: [&str; 8] = [
    "osc~", "phasor~", "sig~", "lop~", "hip~", "rpole~", "rzero~", "rzero_rev~",
];

/// Build a graph from node picks and connection attempts. Failed connections
/// are kept out of the graph, which is what the property relies on.
fn random_graph(types: &[usize], wires: &[(usize, usize, usize)]) -> Graph {
    let mut graph = Graph::new();
    let ids: Vec<_> = types
        .iter()
        .map(|&t| graph.add_node(SIGNAL_TYPES[t], &[]).unwrap())
        .collect();
    for &(from, to, inlet) in wires {
        let (from, to) = (ids[from % ids.len()], ids[to % ids.len()]);
        match graph.connect(from, 0, to, PortId::new(inlet)) {
            Ok(_)
            | Err(GraphError::CycleDetected)
            | Err(GraphError::DuplicateEdge)
            | Err(GraphError::InvalidPort { .. })
            | Err(GraphError::KindMismatch { .. }) => {}
            Err(other) => panic!("unexpected connect error: {}", other),
        }
    }
    graph
}

proptest! {
    #[test]
    fn random_graphs_link_in_topological_order(
        types in prop::collection::vec(0..SIGNAL_TYPES.len(), 1..12),
        wires in prop::collection::vec((0..12usize, 0..12usize, 0..2usize), 0..30),
    ) {
        let graph = random_graph(&types, &wires);
        let plan = Plan::compile(&graph).unwrap();

        // Every node here has signal ports, so every node runs exactly once.
        let mut seen = plan.execution_order.clone();
        seen.sort();
        seen.dedup();
        prop_assert_eq!(seen.len(), graph.nodes.len());

        let position = |id| plan.execution_order.iter().position(|&n| n == id).unwrap();
        for edge in graph.edges.iter().filter(|e| e.kind == PortKind::Signal) {
            prop_assert!(position(edge.from_node) < position(edge.to_node));
        }
    }

    #[test]
    fn compilation_is_deterministic(
        types in prop::collection::vec(0..SIGNAL_TYPES.len(), 1..12),
        wires in prop::collection::vec((0..12usize, 0..12usize, 0..2usize), 0..30),
    ) {
        let graph = random_graph(&types, &wires);
        let first = Plan::compile(&graph).unwrap();
        let second = Plan::compile(&graph).unwrap();
        prop_assert_eq!(first, second);
    }
}
