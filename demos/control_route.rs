//! A message cascade: `listbox` feeds `route freq gain`, whose outlets go to
//! `print` nodes and to the frequency inlet of an `osc~`.
//!
//! Run with `cargo run --example control_route` to see the `print` output.

use patchcore::dsl::PatchBuilder;
use patchcore::graph::PortId;
use patchcore::msg;
use patchcore::plan::Plan;
use patchcore::rt::{render_offline, Runtime};
use patchcore::EngineConfig;

fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let mut patch = PatchBuilder::new();
    patch.node_named("list", "listbox", &[]).unwrap();
    patch
        .node_named("route", "route", &["freq".into(), "gain".into()])
        .unwrap();
    patch.node_named("freq", "print", &["freq".into()]).unwrap();
    patch.node_named("gain", "print", &["gain".into()]).unwrap();
    patch.node_named("other", "print", &["unrouted".into()]).unwrap();
    patch.node_named("osc", "osc~", &[]).unwrap();
    patch.wire("list", 0, "route", 0).unwrap();
    patch.wire("route", 0, "freq", 0).unwrap();
    patch.wire("route", 1, "gain", 0).unwrap();
    patch.wire("route", 2, "other", 0).unwrap();
    // A message into a signal inlet lands on the shadow inlet.
    let port = patch.wire("route", 0, "osc", 0).unwrap();
    assert_eq!(port, PortId::shadow(0));
    let list = patch.get("list").unwrap().0;
    let osc = patch.get("osc").unwrap().0;
    let graph = patch.build();

    let plan = Plan::compile(&graph).unwrap();
    let mut runtime = Runtime::new(plan, &graph).unwrap();
    runtime.configure(EngineConfig::default()).unwrap();

    for message in [msg!["freq", 440.0], msg!["gain", 0.5], msg!["pan", -1.0]] {
        runtime
            .send_message(list, PortId::new(0), message)
            .unwrap();
    }

    let samples = render_offline(&mut runtime, osc, 0, 64).unwrap();
    println!("osc~ now runs at 440 Hz, second sample {:.4}", samples[1]);
}
