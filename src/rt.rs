//! RT module: single-threaded execution of a linked graph.
//!
//! Two scheduling domains share one thread. The signal domain runs every
//! loop-bearing node once per tick in plan order. The message domain runs a
//! handler and its whole downstream cascade before returning.

// IMPORTANT: Do not call PPT invariant logging here; it takes a Mutex.

use crate::bus::{BusRegistry, InMemoryBuses, Subscriber};
use crate::graph::{Graph, NodeId, PortId, PortKind, Topology};
use crate::message::Message;
use crate::node::{DeclareCtx, Emission, MessageCtx, NodeDefDyn, NodeError, NodeImpl};
use crate::plan::Plan;
use crate::{ConfigError, EngineConfig};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// Cascades nested deeper than this are cut off.
pub const MAX_CASCADE_DEPTH: usize = 256;

/// Runtime errors.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// `tick` or a message arrived before `configure`.
    #[error("runtime is not configured")]
    NotConfigured,
    /// `configure` may run only once.
    #[error("runtime is already configured")]
    AlreadyConfigured,
    /// Rejected configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Node instantiation failed.
    #[error(transparent)]
    Node(#[from] NodeError),
    /// Node does not exist.
    #[error("no such node: {0:?}")]
    InvalidNode(NodeId),
    /// Port does not exist or cannot take messages.
    #[error("no message port {port} on node {node:?}")]
    InvalidPort {
        /// Node addressed.
        node: NodeId,
        /// Port addressed.
        port: PortId,
    },
    /// WAV output failed.
    #[error("wav output failed: {0}")]
    Wav(#[from] hound::Error),
}

/// The runtime engine.
pub struct Runtime {
    /// The linked plan this runtime executes.
    pub plan: Plan,
    nodes: Vec<Box<dyn NodeImpl>>,
    defs: Vec<Arc<dyn NodeDefDyn>>,
    topologies: Vec<Topology>,
    type_names: Vec<String>,
    buses: Box<dyn BusRegistry>,
    pending_configure: Vec<NodeId>,
    config: Option<EngineConfig>,
    outputs: Vec<f64>,
    inputs: Vec<f64>,
    listeners: BTreeMap<(NodeId, usize), Vec<Message>>,
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("plan", &self.plan)
            .field("nodes", &self.type_names)
            .field("config", &self.config)
            .finish()
    }
}

impl Runtime {
    /// Declare every node of `graph` with an in-memory bus registry.
    pub fn new(plan: Plan, graph: &Graph) -> Result<Self, RuntimeError> {
        Self::with_buses(plan, graph, InMemoryBuses::new())
    }

    /// Declare every node of `graph` against the given bus registry.
    ///
    /// Deferred callbacks are only registered here; they run in
    /// [`configure`](Self::configure).
    pub fn with_buses(
        plan: Plan,
        graph: &Graph,
        buses: impl BusRegistry + 'static,
    ) -> Result<Self, RuntimeError> {
        let mut buses: Box<dyn BusRegistry> = Box::new(buses);
        let mut nodes = Vec::with_capacity(graph.nodes.len());
        let mut pending_configure = Vec::new();

        for node in &graph.nodes {
            let mut ctx = DeclareCtx::new(&plan.links[node.id.0]);
            let instance = node.def.declare(node.args.as_ref(), &mut ctx)?;
            if ctx.wants_configure() {
                pending_configure.push(node.id);
            }
            for (bus, inlet) in ctx.take_subscriptions() {
                buses.subscribe(
                    &bus,
                    Subscriber {
                        node: node.id,
                        inlet,
                    },
                );
            }
            nodes.push(instance);
        }

        let max_input = plan.input_widths.iter().copied().max().unwrap_or(0);
        Ok(Self {
            outputs: vec![0.0; plan.output_len],
            inputs: vec![0.0; max_input],
            plan,
            nodes,
            defs: graph.nodes.iter().map(|n| n.def.clone()).collect(),
            topologies: graph.nodes.iter().map(|n| n.topology.clone()).collect(),
            type_names: graph.nodes.iter().map(|n| n.type_name.clone()).collect(),
            buses,
            pending_configure,
            config: None,
            listeners: BTreeMap::new(),
        })
    }

    /// Apply the global configuration and run every deferred callback once,
    /// in registration order. Messages emitted by the callbacks are delivered
    /// after all callbacks have run.
    pub fn configure(&mut self, config: EngineConfig) -> Result<(), RuntimeError> {
        if self.config.is_some() {
            return Err(RuntimeError::AlreadyConfigured);
        }
        config.validate()?;
        tracing::debug!(
            sample_rate = config.sample_rate,
            block_size = config.block_size,
            callbacks = self.pending_configure.len(),
            "configuring runtime"
        );
        let sample_rate = config.sample_rate;
        self.config = Some(config);

        let pending = std::mem::take(&mut self.pending_configure);
        let mut emitted = Vec::with_capacity(pending.len());
        for id in pending {
            let mut emissions = Vec::new();
            self.nodes[id.0].configure(&mut MessageCtx::new(sample_rate, &mut emissions));
            emitted.push((id, emissions));
        }
        for (id, emissions) in emitted {
            self.apply(id, emissions, 0);
        }
        Ok(())
    }

    /// The active configuration, once configured.
    pub fn config(&self) -> Option<&EngineConfig> {
        self.config.as_ref()
    }

    /// Run one tick of the signal domain. Does not allocate.
    pub fn tick(&mut self) -> Result<(), RuntimeError> {
        let sample_rate = self
            .config
            .as_ref()
            .ok_or(RuntimeError::NotConfigured)?
            .sample_rate;
        for &id in &self.plan.execution_order {
            let inputs = &mut self.inputs[..self.plan.input_widths[id.0]];
            inputs.fill(0.0);
            for source in &self.plan.signal_inputs[id.0] {
                let slot = self.plan.output_slots[source.from_node.0].start + source.from_outlet;
                inputs[source.inlet] += self.outputs[slot];
            }
            let outputs = &mut self.outputs[self.plan.output_slots[id.0].clone()];
            self.nodes[id.0].tick(inputs, outputs, sample_rate);
        }
        Ok(())
    }

    /// Current sample on a signal outlet.
    pub fn signal(&self, node: NodeId, outlet: usize) -> Option<f64> {
        let slots = self.plan.output_slots.get(node.0)?;
        if outlet >= slots.len() {
            return None;
        }
        self.outputs.get(slots.start + outlet).copied()
    }

    /// Tick `out.len()` times, writing the samples of one signal outlet.
    pub fn process_block(
        &mut self,
        node: NodeId,
        outlet: usize,
        out: &mut [f64],
    ) -> Result<(), RuntimeError> {
        let slot = self
            .plan
            .output_slots
            .get(node.0)
            .filter(|slots| outlet < slots.len())
            .map(|slots| slots.start + outlet)
            .ok_or(RuntimeError::InvalidPort {
                node,
                port: PortId::new(outlet),
            })?;
        for sample in out.iter_mut() {
            self.tick()?;
            *sample = self.outputs[slot];
        }
        Ok(())
    }

    /// Deliver an external message to `inlet` of `node` and run its whole
    /// cascade before returning. A signal inlet is rerouted to its shadow.
    pub fn send_message(
        &mut self,
        node: NodeId,
        inlet: PortId,
        msg: Message,
    ) -> Result<(), RuntimeError> {
        if self.config.is_none() {
            return Err(RuntimeError::NotConfigured);
        }
        let topology = self
            .topologies
            .get(node.0)
            .ok_or(RuntimeError::InvalidNode(node))?;
        let target = match topology.inlet(inlet).map(|p| p.kind) {
            Some(PortKind::Message) => Some(inlet),
            Some(PortKind::Signal) => self.defs[node.0].reroute_message_connection(inlet),
            None => None,
        }
        .ok_or(RuntimeError::InvalidPort { node, port: inlet })?;
        self.deliver(node, target, &msg, 0);
        Ok(())
    }

    /// Publish on a bus from outside the graph.
    pub fn publish(&mut self, bus: &str, msg: Message) -> Result<(), RuntimeError> {
        if self.config.is_none() {
            return Err(RuntimeError::NotConfigured);
        }
        self.publish_at(bus, &msg, 0);
        Ok(())
    }

    /// Start capturing messages sent on `outlet` of `node`.
    pub fn listen(&mut self, node: NodeId, outlet: usize) {
        self.listeners.entry((node, outlet)).or_default();
    }

    /// Drain the messages captured on `outlet` of `node`.
    pub fn take_messages(&mut self, node: NodeId, outlet: usize) -> Vec<Message> {
        self.listeners
            .get_mut(&(node, outlet))
            .map(std::mem::take)
            .unwrap_or_default()
    }

    fn publish_at(&mut self, bus: &str, msg: &Message, depth: usize) {
        for sub in self.buses.subscribers(bus) {
            self.deliver(sub.node, sub.inlet, msg, depth);
        }
    }

    fn deliver(&mut self, node: NodeId, inlet: PortId, msg: &Message, depth: usize) {
        if depth > MAX_CASCADE_DEPTH {
            tracing::error!(
                node = %self.type_names[node.0],
                %inlet,
                %msg,
                "message cascade too deep, cutting off"
            );
            return;
        }
        let sample_rate = self.config.as_ref().map_or(0.0, |c| c.sample_rate);
        let mut emissions = Vec::new();
        self.nodes[node.0].message(inlet, msg, &mut MessageCtx::new(sample_rate, &mut emissions));
        self.apply(node, emissions, depth);
    }

    fn apply(&mut self, node: NodeId, emissions: Vec<Emission>, depth: usize) {
        for emission in emissions {
            match emission {
                Emission::Outlet(outlet, msg) => {
                    if let Some(captured) = self.listeners.get_mut(&(node, outlet)) {
                        captured.push(msg.clone());
                    }
                    let targets = self.plan.message_targets(node, outlet).to_vec();
                    for (to, inlet) in targets {
                        self.deliver(to, inlet, &msg, depth + 1);
                    }
                }
                Emission::Publish(bus, msg) => self.publish_at(&bus, &msg, depth + 1),
                Emission::Subscribe(bus, inlet) => {
                    self.buses.subscribe(&bus, Subscriber { node, inlet })
                }
                Emission::Unsubscribe(bus, inlet) => {
                    self.buses.unsubscribe(&bus, Subscriber { node, inlet })
                }
            }
        }
    }
}

/// Render `frames` samples of one signal outlet, block by block.
pub fn render_offline(
    runtime: &mut Runtime,
    node: NodeId,
    outlet: usize,
    frames: usize,
) -> Result<Vec<f64>, RuntimeError> {
    let block_size = runtime
        .config()
        .ok_or(RuntimeError::NotConfigured)?
        .block_size;
    let mut output = vec![0.0; frames];
    for block in output.chunks_mut(block_size) {
        runtime.process_block(node, outlet, block)?;
    }
    Ok(output)
}

/// Run `process_block` with panic containment; on panic the block is silenced.
pub fn process_block_safe(
    runtime: &mut Runtime,
    node: NodeId,
    outlet: usize,
    out: &mut [f64],
) -> Result<(), RuntimeError> {
    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        runtime.process_block(node, outlet, out)
    }));
    match result {
        Ok(inner) => inner,
        Err(_) => {
            tracing::error!(node = node.0, "node panicked during block, silencing output");
            out.fill(0.0);
            Ok(())
        }
    }
}

/// Write mono samples as a 32-bit float WAV, duplicated over
/// `config.channel_count` channels.
pub fn write_wav(
    path: impl AsRef<Path>,
    samples: &[f64],
    config: &EngineConfig,
) -> Result<(), RuntimeError> {
    config.validate()?;
    let spec = hound::WavSpec {
        channels: config.channel_count,
        sample_rate: config.sample_rate.round() as u32,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut writer = hound::WavWriter::create(path, spec)?;
    for &sample in samples {
        for _ in 0..config.channel_count {
            writer.write_sample(sample as f32)?;
        }
    }
    writer.finalize()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Token;
    use crate::msg;

    fn runtime(graph: &Graph) -> Runtime {
        let plan = Plan::compile(graph).unwrap();
        let mut rt = Runtime::new(plan, graph).unwrap();
        rt.configure(EngineConfig::default()).unwrap();
        rt
    }

    #[test]
    fn tick_before_configure_fails() {
        let mut graph = Graph::new();
        graph.add_node("osc~", &[]).unwrap();
        let plan = Plan::compile(&graph).unwrap();
        let mut rt = Runtime::new(plan, &graph).unwrap();
        assert!(matches!(rt.tick(), Err(RuntimeError::NotConfigured)));
        assert!(matches!(
            rt.send_message(NodeId(0), PortId::new(1), msg![0.0]),
            Err(RuntimeError::NotConfigured)
        ));
    }

    #[test]
    fn configure_runs_once() {
        let graph = Graph::new();
        let mut rt = runtime(&graph);
        assert!(matches!(
            rt.configure(EngineConfig::default()),
            Err(RuntimeError::AlreadyConfigured)
        ));
    }

    #[test]
    fn invalid_config_is_rejected() {
        let graph = Graph::new();
        let plan = Plan::compile(&graph).unwrap();
        let mut rt = Runtime::new(plan, &graph).unwrap();
        assert!(matches!(
            rt.configure(EngineConfig::with_sample_rate(-1.0)),
            Err(RuntimeError::Config(_))
        ));
        assert!(rt.configure(EngineConfig::default()).is_ok());
    }

    #[test]
    fn signal_chain_propagates_within_a_tick() {
        let mut graph = Graph::new();
        let sig = graph.add_node("sig~", &[Token::Float(0.25)]).unwrap();
        let filter = graph.add_node("rpole~", &[]).unwrap();
        graph.connect(sig, 0, filter, PortId::new(0)).unwrap();
        let mut rt = runtime(&graph);
        rt.tick().unwrap();
        assert_eq!(rt.signal(filter, 0), Some(0.25));
    }

    #[test]
    fn signal_fan_in_sums() {
        let mut graph = Graph::new();
        let a = graph.add_node("sig~", &[Token::Float(0.25)]).unwrap();
        let b = graph.add_node("sig~", &[Token::Float(0.5)]).unwrap();
        let filter = graph.add_node("lop~", &[Token::Float(1e9)]).unwrap();
        graph.connect(a, 0, filter, PortId::new(0)).unwrap();
        graph.connect(b, 0, filter, PortId::new(0)).unwrap();
        let mut rt = runtime(&graph);
        rt.tick().unwrap();
        assert_eq!(rt.signal(filter, 0), Some(0.75));
    }

    #[test]
    fn external_message_to_signal_inlet_is_rerouted() {
        let mut graph = Graph::new();
        let osc = graph.add_node("phasor~", &[]).unwrap();
        let mut rt = runtime(&graph);
        rt.send_message(osc, PortId::new(0), msg![44100.0 / 4.0]).unwrap();
        let mut out = [0.0; 3];
        rt.process_block(osc, 0, &mut out).unwrap();
        assert_eq!(out, [0.0, 0.25, 0.5]);
    }

    #[test]
    fn invalid_targets_are_reported() {
        let mut graph = Graph::new();
        let osc = graph.add_node("osc~", &[]).unwrap();
        let print = graph.add_node("print", &[]).unwrap();
        let mut rt = runtime(&graph);
        assert!(matches!(
            rt.send_message(NodeId(9), PortId::new(0), msg![1.0]),
            Err(RuntimeError::InvalidNode(NodeId(9)))
        ));
        assert!(matches!(
            rt.send_message(osc, PortId::new(4), msg![1.0]),
            Err(RuntimeError::InvalidPort { .. })
        ));
        let mut out = [0.0; 1];
        assert!(matches!(
            rt.process_block(print, 0, &mut out),
            Err(RuntimeError::InvalidPort { .. })
        ));
        assert_eq!(rt.signal(print, 0), None);
    }

    #[test]
    fn cascade_runs_depth_first() {
        let mut graph = Graph::new();
        let a = graph.add_node("floatatom", &[]).unwrap();
        let b = graph.add_node("floatatom", &[]).unwrap();
        let c = graph.add_node("floatatom", &[]).unwrap();
        graph.connect(a, 0, b, PortId::new(0)).unwrap();
        graph.connect(a, 0, c, PortId::new(0)).unwrap();
        let mut rt = runtime(&graph);
        rt.listen(b, 0);
        rt.listen(c, 0);
        rt.send_message(a, PortId::new(0), msg![3.0]).unwrap();
        assert_eq!(rt.take_messages(b, 0), vec![msg![3.0]]);
        assert_eq!(rt.take_messages(c, 0), vec![msg![3.0]]);
        assert!(rt.take_messages(a, 0).is_empty());
    }

    #[test]
    fn message_feedback_loop_is_cut_off() {
        let mut graph = Graph::new();
        let a = graph.add_node("floatatom", &[]).unwrap();
        let b = graph.add_node("floatatom", &[]).unwrap();
        graph.connect(a, 0, b, PortId::new(0)).unwrap();
        graph.connect(b, 0, a, PortId::new(0)).unwrap();
        let mut rt = runtime(&graph);
        rt.listen(a, 0);
        rt.send_message(a, PortId::new(0), msg![1.0]).unwrap();
        let captured = rt.take_messages(a, 0);
        assert!(!captured.is_empty());
        assert!(captured.len() <= MAX_CASCADE_DEPTH);
    }

    #[test]
    fn output_on_load_reaches_downstream_after_its_configure() {
        let mut graph = Graph::new();
        let number = graph
            .add_node("nbx", &[Token::Float(0.0), Token::Float(1.0), Token::Float(1.0), Token::Float(0.5)])
            .unwrap();
        let filter = graph.add_node("rpole~", &[Token::Float(0.9)]).unwrap();
        let one = graph.add_node("sig~", &[Token::Float(1.0)]).unwrap();
        graph.connect(number, 0, filter, PortId::new(1)).unwrap();
        graph.connect(one, 0, filter, PortId::new(0)).unwrap();
        let mut rt = runtime(&graph);
        rt.tick().unwrap();
        rt.tick().unwrap();
        // The emitted 0.5 replaces the constructed 0.9.
        assert_eq!(rt.signal(filter, 0), Some(1.5));
    }
}
