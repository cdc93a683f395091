use patchcore::graph::{Graph, NodeId, PortId};
use patchcore::message::Token;
use patchcore::plan::Plan;

#[test]
fn plan_deterministic_compilation() {
    let mut graph = Graph::new();
    let osc = graph.add_node("osc~", &[Token::Float(220.0)]).unwrap();
    let lop = graph.add_node("lop~", &[Token::Float(800.0)]).unwrap();
    let number = graph.add_node("floatatom", &[]).unwrap();
    graph.connect(osc, 0, lop, PortId::new(0)).unwrap();
    graph.connect(number, 0, lop, PortId::new(1)).unwrap();

    let first = Plan::compile(&graph).unwrap();
    let second = Plan::compile(&graph).unwrap();
    assert_eq!(first, second);
}

#[test]
fn ready_nodes_run_lowest_id_first() {
    let mut graph = Graph::new();
    let lop = graph.add_node("lop~", &[]).unwrap();
    let osc = graph.add_node("osc~", &[]).unwrap();
    let dc = graph.add_node("sig~", &[]).unwrap();
    graph.add_node("print", &[]).unwrap();
    graph.connect(dc, 0, lop, PortId::new(0)).unwrap();
    graph.connect(osc, 0, lop, PortId::new(1)).unwrap();

    let plan = Plan::compile(&graph).unwrap();
    assert_eq!(plan.execution_order, vec![osc, dc, lop]);
}

#[test]
fn message_only_nodes_are_not_ticked() {
    let mut graph = Graph::new();
    graph.add_node("floatatom", &[]).unwrap();
    graph.add_node("route", &[]).unwrap();
    graph.add_node("print", &[]).unwrap();
    let dc = graph.add_node("sig~", &[]).unwrap();

    let plan = Plan::compile(&graph).unwrap();
    assert_eq!(plan.execution_order, vec![dc]);
    assert_eq!(plan.output_slots[0], 0..0);
    assert_eq!(plan.output_slots[dc.0], 0..1);
    assert_eq!(plan.output_len, 1);
    assert!(plan.execution_order.iter().all(|id| *id != NodeId(0)));
}
