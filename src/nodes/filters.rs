//! One-pole / one-zero filter family.
//!
//! Every member shares one recurrence skeleton: a coefficient plus the
//! previous input and output sample. Members differ only in the per-tick
//! formula and in how a user value becomes a coefficient.

use crate::graph::{Port, PortId, Topology};
use crate::message::{Message, Token};
use crate::node::{DeclareCtx, MessageCtx, NodeDef, NodeError, NodeImpl};
use crate::nodes::float_arg;
use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;

/// y from (x, coefficient, previous input, previous output).
pub type Recurrence = fn(f64, f64, f64, f64) -> f64;
/// Coefficient from (user value, sample rate).
pub type CoefficientTransform = fn(f64, f64) -> f64;

/// A filter type: name, recurrence and coefficient transform.
#[derive(Debug, Clone, Copy)]
pub struct RealFilter {
    type_name: &'static str,
    recurrence: Recurrence,
    coefficient: CoefficientTransform,
}

fn raw_coefficient(value: f64, _sample_rate: f64) -> f64 {
    value
}

fn lop_coefficient(freq: f64, sample_rate: f64) -> f64 {
    (freq.max(0.0) * TAU / sample_rate).clamp(0.0, 1.0)
}

fn hip_coefficient(freq: f64, sample_rate: f64) -> f64 {
    (1.0 - freq.max(0.0) * TAU / sample_rate).clamp(0.0, 1.0)
}

impl RealFilter {
    /// `rpole~`: y = x + c·y_prev.
    pub const RPOLE: RealFilter = RealFilter {
        type_name: "rpole~",
        recurrence: |x, c, _x1, y1| x + c * y1,
        coefficient: raw_coefficient,
    };

    /// `rzero~`: y = x − c·x_prev.
    pub const RZERO: RealFilter = RealFilter {
        type_name: "rzero~",
        recurrence: |x, c, x1, _y1| x - c * x1,
        coefficient: raw_coefficient,
    };

    /// `rzero_rev~`: y = x_prev − c·x.
    pub const RZERO_REV: RealFilter = RealFilter {
        type_name: "rzero_rev~",
        recurrence: |x, c, x1, _y1| x1 - c * x,
        coefficient: raw_coefficient,
    };

    /// `lop~`: y = y_prev + c·(x − y_prev).
    pub const LOP: RealFilter = RealFilter {
        type_name: "lop~",
        recurrence: |x, c, _x1, y1| y1 + c * (x - y1),
        coefficient: lop_coefficient,
    };

    /// `hip~`: y = c·(y_prev + x − x_prev).
    pub const HIP: RealFilter = RealFilter {
        type_name: "hip~",
        recurrence: |x, c, x1, y1| c * (y1 + x - x1),
        coefficient: hip_coefficient,
    };

    /// Every member of the family.
    pub fn all() -> [RealFilter; 5] {
        [
            Self::RPOLE,
            Self::RZERO,
            Self::RZERO_REV,
            Self::LOP,
            Self::HIP,
        ]
    }

    /// Registered type name.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

/// Construction arguments.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FilterArgs {
    /// Initial cutoff or coefficient; 0 when absent.
    pub init_value: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// Coefficient read from inlet 1 every tick.
    Signal,
    /// Coefficient stored from messages on `1_message`.
    Message,
}

struct RealFilterImpl {
    filter: RealFilter,
    mode: Mode,
    init_value: f64,
    coeff: f64,
    last_input: f64,
    last_output: f64,
}

impl NodeDef for RealFilter {
    type Args = FilterArgs;

    fn translate_args(&self, raw: &[Token]) -> Result<FilterArgs, NodeError> {
        Ok(FilterArgs {
            init_value: float_arg(raw, 0, self.type_name)?.unwrap_or(0.0),
        })
    }

    fn build(&self, _args: &FilterArgs) -> Topology {
        Topology::new(
            vec![Port::signal(0), Port::signal(1), Port::message_shadow(1)],
            vec![Port::signal(0)],
        )
    }

    fn reroute_message_connection(&self, inlet: PortId) -> Option<PortId> {
        (inlet == PortId::new(1)).then_some(PortId::shadow(1))
    }

    fn declare(&self, args: &FilterArgs, ctx: &mut DeclareCtx<'_>) -> Box<dyn NodeImpl> {
        let mode = if ctx.has_signal_source(1) {
            Mode::Signal
        } else {
            ctx.on_configured();
            Mode::Message
        };
        Box::new(RealFilterImpl {
            filter: *self,
            mode,
            init_value: args.init_value,
            coeff: 0.0,
            last_input: 0.0,
            last_output: 0.0,
        })
    }
}

impl NodeImpl for RealFilterImpl {
    fn configure(&mut self, ctx: &mut MessageCtx<'_>) {
        self.coeff = (self.filter.coefficient)(self.init_value, ctx.sample_rate());
    }

    fn tick(&mut self, inputs: &[f64], outputs: &mut [f64], sample_rate: f64) {
        let x = inputs[0];
        let c = match self.mode {
            Mode::Signal => (self.filter.coefficient)(inputs[1], sample_rate),
            Mode::Message => self.coeff,
        };
        let y = (self.filter.recurrence)(x, c, self.last_input, self.last_output);
        self.last_output = y;
        self.last_input = x;
        outputs[0] = y;
    }

    fn message(&mut self, inlet: PortId, msg: &Message, ctx: &mut MessageCtx<'_>) {
        if inlet != PortId::shadow(1) || self.mode != Mode::Message {
            tracing::debug!(node = self.filter.type_name, %inlet, %msg, "dropped message");
            return;
        }
        let value = if msg.is_single_float() {
            msg.read_float(0)
        } else if msg.len() == 2 && msg.starts_with("set") {
            msg.read_float(1)
        } else {
            None
        };
        match value {
            Some(v) => self.coeff = (self.filter.coefficient)(v, ctx.sample_rate()),
            None => tracing::debug!(node = self.filter.type_name, %msg, "unexpected coefficient"),
        }
    }
}
