//! Node harness: drives one node instance without a graph.
//!
//! The harness plays host for a single node: it resolves link info from the
//! signal inlets you declare as wired, runs the deferred configure callback,
//! records every emission and keeps the node's bus subscriptions.

use crate::graph::{PortId, Topology};
use crate::message::{Message, Token};
use crate::node::{DeclareCtx, Emission, LinkInfo, MessageCtx, NodeDef, NodeDefDyn, NodeError, NodeImpl};
use crate::registry::NodeRegistry;
use crate::EngineConfig;
use std::sync::Arc;

/// Harness around a single node instance.
pub struct NodeHarness {
    node: Box<dyn NodeImpl>,
    topology: Topology,
    sample_rate: f64,
    outputs: Vec<f64>,
    sent: Vec<(usize, Message)>,
    published: Vec<(String, Message)>,
    subscriptions: Vec<(String, PortId)>,
    scratch: Vec<Emission>,
}

impl NodeHarness {
    /// Harness for a registered node type. `signal_inlets` lists the inlets
    /// treated as signal-wired.
    pub fn new(
        type_name: &str,
        raw_args: &[Token],
        signal_inlets: &[usize],
        config: &EngineConfig,
    ) -> Result<Self, NodeError> {
        let def = NodeRegistry::standard().get(type_name)?;
        Self::from_dyn(def, raw_args, signal_inlets, config)
    }

    /// Harness for a definition outside the registry.
    pub fn with_def<T: NodeDef>(
        def: T,
        raw_args: &[Token],
        signal_inlets: &[usize],
        config: &EngineConfig,
    ) -> Result<Self, NodeError> {
        Self::from_dyn(Arc::new(def), raw_args, signal_inlets, config)
    }

    fn from_dyn(
        def: Arc<dyn NodeDefDyn>,
        raw_args: &[Token],
        signal_inlets: &[usize],
        config: &EngineConfig,
    ) -> Result<Self, NodeError> {
        let args = def.translate_args(raw_args)?;
        let topology = def.build(args.as_ref())?;
        let link = LinkInfo::new(signal_inlets.to_vec());
        let mut ctx = DeclareCtx::new(&link);
        let node = def.declare(args.as_ref(), &mut ctx)?;
        let wants_configure = ctx.wants_configure();
        let subscriptions = ctx.take_subscriptions();

        let mut harness = Self {
            node,
            outputs: vec![0.0; topology.signal_output_width()],
            topology,
            sample_rate: config.sample_rate,
            sent: Vec::new(),
            published: Vec::new(),
            subscriptions,
            scratch: Vec::new(),
        };
        if wants_configure {
            let mut emissions = std::mem::take(&mut harness.scratch);
            harness
                .node
                .configure(&mut MessageCtx::new(harness.sample_rate, &mut emissions));
            harness.absorb(&mut emissions);
        }
        Ok(harness)
    }

    /// Ports of the node under test.
    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    /// Deliver `msg` to `inlet`.
    pub fn send(&mut self, inlet: PortId, msg: Message) {
        let mut emissions = std::mem::take(&mut self.scratch);
        self.node.message(
            inlet,
            &msg,
            &mut MessageCtx::new(self.sample_rate, &mut emissions),
        );
        self.absorb(&mut emissions);
    }

    /// Deliver `msg` to every inlet subscribed to `bus`.
    pub fn publish(&mut self, bus: &str, msg: Message) {
        let inlets: Vec<PortId> = self
            .subscriptions
            .iter()
            .filter(|(name, _)| name == bus)
            .map(|(_, inlet)| *inlet)
            .collect();
        for inlet in inlets {
            self.send(inlet, msg.clone());
        }
    }

    /// Run one tick with the given signal inputs.
    pub fn tick(&mut self, inputs: &[f64]) -> &[f64] {
        self.outputs.fill(0.0);
        self.node.tick(inputs, &mut self.outputs, self.sample_rate);
        &self.outputs
    }

    /// Drain the messages sent on `outlet`.
    pub fn take(&mut self, outlet: usize) -> Vec<Message> {
        let (taken, kept): (Vec<_>, Vec<_>) =
            self.sent.drain(..).partition(|(o, _)| *o == outlet);
        self.sent = kept;
        taken.into_iter().map(|(_, m)| m).collect()
    }

    /// Drain the (bus, message) pairs published by the node.
    pub fn take_published(&mut self) -> Vec<(String, Message)> {
        std::mem::take(&mut self.published)
    }

    /// Current bus subscriptions of the node.
    pub fn subscriptions(&self) -> Vec<(String, PortId)> {
        self.subscriptions.clone()
    }

    fn absorb(&mut self, emissions: &mut Vec<Emission>) {
        for emission in emissions.drain(..) {
            match emission {
                Emission::Outlet(outlet, msg) => self.sent.push((outlet, msg)),
                Emission::Publish(bus, msg) => self.published.push((bus, msg)),
                Emission::Subscribe(bus, inlet) => {
                    if !self.subscriptions.iter().any(|(b, i)| *b == bus && *i == inlet) {
                        self.subscriptions.push((bus, inlet));
                    }
                }
                Emission::Unsubscribe(bus, inlet) => {
                    self.subscriptions.retain(|(b, i)| !(*b == bus && *i == inlet))
                }
            }
        }
        self.scratch = std::mem::take(emissions);
    }
}
