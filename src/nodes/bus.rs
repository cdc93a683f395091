//! `send` and `receive`: the graph-side endpoints of named buses.

use crate::graph::{Port, PortId, Topology};
use crate::message::{Message, Token};
use crate::node::{DeclareCtx, MessageCtx, NodeDef, NodeError, NodeImpl};
use crate::nodes::bus_arg;
use serde::{Deserialize, Serialize};

/// The `send` node type.
#[derive(Debug, Clone, Copy, Default)]
pub struct SendBus;

/// The `receive` node type.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReceiveBus;

/// Construction arguments for `send`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SendArgs {
    /// Target bus; `None` until rebound.
    pub bus_name: Option<String>,
}

/// Construction arguments for `receive`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceiveArgs {
    /// Source bus.
    pub bus_name: String,
}

impl NodeDef for SendBus {
    type Args = SendArgs;

    fn translate_args(&self, raw: &[Token]) -> Result<SendArgs, NodeError> {
        Ok(SendArgs {
            bus_name: bus_arg(raw, 0),
        })
    }

    fn build(&self, _args: &SendArgs) -> Topology {
        Topology::new(vec![Port::message(0), Port::message(1)], vec![])
    }

    fn declare(&self, args: &SendArgs, _ctx: &mut DeclareCtx<'_>) -> Box<dyn NodeImpl> {
        Box::new(SendImpl {
            bus_name: args.bus_name.clone(),
        })
    }
}

struct SendImpl {
    bus_name: Option<String>,
}

impl NodeImpl for SendImpl {
    fn message(&mut self, inlet: PortId, msg: &Message, ctx: &mut MessageCtx<'_>) {
        if inlet == PortId::new(1) {
            match msg.read_symbol(0) {
                Some(bus) => self.bus_name = Some(bus.to_string()),
                None => tracing::debug!(node = "send", %msg, "bus name must be a symbol"),
            }
            return;
        }
        match &self.bus_name {
            Some(bus) => ctx.publish(bus, msg.clone()),
            None => tracing::debug!(node = "send", %msg, "no bus bound"),
        }
    }
}

impl NodeDef for ReceiveBus {
    type Args = ReceiveArgs;

    fn translate_args(&self, raw: &[Token]) -> Result<ReceiveArgs, NodeError> {
        let bus_name =
            bus_arg(raw, 0).ok_or_else(|| NodeError::invalid("receive", "missing bus name"))?;
        Ok(ReceiveArgs { bus_name })
    }

    fn build(&self, _args: &ReceiveArgs) -> Topology {
        Topology::new(vec![], vec![Port::message(0)])
    }

    fn declare(&self, args: &ReceiveArgs, ctx: &mut DeclareCtx<'_>) -> Box<dyn NodeImpl> {
        ctx.subscribe(args.bus_name.clone(), PortId::new(0));
        Box::new(ReceiveImpl)
    }
}

/// Bus deliveries arrive on inlet 0 even though no inlet is drawn.
struct ReceiveImpl;

impl NodeImpl for ReceiveImpl {
    fn message(&mut self, _inlet: PortId, msg: &Message, ctx: &mut MessageCtx<'_>) {
        ctx.send(0, msg.clone());
    }
}
