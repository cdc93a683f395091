//! `sig~`: a constant signal driven by messages.

use crate::graph::{Port, PortId, Topology};
use crate::message::{Message, Token};
use crate::node::{DeclareCtx, MessageCtx, NodeDef, NodeError, NodeImpl};
use crate::nodes::float_arg;
use serde::{Deserialize, Serialize};

/// The `sig~` node type.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sig;

/// Construction arguments.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SigArgs {
    /// Initial output; 0 when absent.
    pub init_value: f64,
}

impl NodeDef for Sig {
    type Args = SigArgs;

    fn translate_args(&self, raw: &[Token]) -> Result<SigArgs, NodeError> {
        Ok(SigArgs {
            init_value: float_arg(raw, 0, "sig~")?.unwrap_or(0.0),
        })
    }

    fn build(&self, _args: &SigArgs) -> Topology {
        Topology::new(vec![Port::message(0)], vec![Port::signal(0)])
    }

    fn declare(&self, args: &SigArgs, _ctx: &mut DeclareCtx<'_>) -> Box<dyn NodeImpl> {
        Box::new(SigImpl {
            value: args.init_value,
        })
    }
}

struct SigImpl {
    value: f64,
}

impl NodeImpl for SigImpl {
    fn tick(&mut self, _inputs: &[f64], outputs: &mut [f64], _sample_rate: f64) {
        outputs[0] = self.value;
    }

    fn message(&mut self, _inlet: PortId, msg: &Message, _ctx: &mut MessageCtx<'_>) {
        match msg.is_single_float().then(|| msg.read_float(0)).flatten() {
            Some(v) => self.value = v,
            None => tracing::debug!(node = "sig~", %msg, "dropped message"),
        }
    }
}
