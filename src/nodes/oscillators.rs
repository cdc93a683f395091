//! Phase-accumulating oscillators: `osc~` (cosine) and `phasor~` (ramp).

use crate::graph::{Port, PortId, Topology};
use crate::message::{Message, Token};
use crate::node::{DeclareCtx, MessageCtx, NodeDef, NodeError, NodeImpl};
use crate::nodes::float_arg;
use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;

/// An oscillator type: name and phase-to-output function.
#[derive(Debug, Clone, Copy)]
pub struct Oscillator {
    type_name: &'static str,
    shape: fn(f64) -> f64,
}

impl Oscillator {
    /// `osc~`: cos(2π·phase).
    pub const COSINE: Oscillator = Oscillator {
        type_name: "osc~",
        shape: |phase| (TAU * phase).cos(),
    };

    /// `phasor~`: the phase itself.
    pub const RAMP: Oscillator = Oscillator {
        type_name: "phasor~",
        shape: |phase| phase,
    };

    /// Every member of the family.
    pub fn all() -> [Oscillator; 2] {
        [Self::COSINE, Self::RAMP]
    }

    /// Registered type name.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

/// Construction arguments.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OscillatorArgs {
    /// Initial frequency in Hz; 0 when absent.
    pub frequency: f64,
}

struct OscillatorImpl {
    osc: Oscillator,
    phase: f64,
    control_frequency: f64,
}

impl NodeDef for Oscillator {
    type Args = OscillatorArgs;

    fn translate_args(&self, raw: &[Token]) -> Result<OscillatorArgs, NodeError> {
        Ok(OscillatorArgs {
            frequency: float_arg(raw, 0, self.type_name)?.unwrap_or(0.0),
        })
    }

    fn build(&self, _args: &OscillatorArgs) -> Topology {
        Topology::new(
            vec![Port::signal(0), Port::message_shadow(0), Port::message(1)],
            vec![Port::signal(0)],
        )
    }

    fn reroute_message_connection(&self, inlet: PortId) -> Option<PortId> {
        (inlet == PortId::new(0)).then_some(PortId::shadow(0))
    }

    fn declare(&self, args: &OscillatorArgs, ctx: &mut DeclareCtx<'_>) -> Box<dyn NodeImpl> {
        // The construction frequency only drives the phase while no signal
        // source is wired.
        let control_frequency = if ctx.has_signal_source(0) {
            0.0
        } else {
            args.frequency
        };
        Box::new(OscillatorImpl {
            osc: *self,
            phase: 0.0,
            control_frequency,
        })
    }
}

impl NodeImpl for OscillatorImpl {
    fn tick(&mut self, inputs: &[f64], outputs: &mut [f64], sample_rate: f64) {
        outputs[0] = (self.osc.shape)(self.phase);
        self.phase += inputs[0] / sample_rate;
        self.phase += self.control_frequency / sample_rate;
    }

    fn message(&mut self, inlet: PortId, msg: &Message, _ctx: &mut MessageCtx<'_>) {
        let value = if msg.is_single_float() {
            msg.read_float(0)
        } else {
            None
        };
        match (inlet, value) {
            (id, Some(freq)) if id == PortId::shadow(0) => self.control_frequency = freq,
            (id, Some(phase)) if id == PortId::new(1) => self.phase = phase,
            _ => tracing::debug!(node = self.osc.type_name, %inlet, %msg, "dropped message"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harness::NodeHarness;
    use crate::msg;
    use crate::EngineConfig;

    const SR: f64 = 44100.0;

    fn harness(name: &str, freq: Option<f64>, signal_wired: bool) -> NodeHarness {
        let args: Vec<Token> = freq.map(Token::Float).into_iter().collect();
        let wired: &[usize] = if signal_wired { &[0] } else { &[] };
        NodeHarness::new(name, &args, wired, &EngineConfig::with_sample_rate(SR)).unwrap()
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {}, got {}",
            expected,
            actual
        );
    }

    #[test]
    fn cosine_from_construction_frequency() {
        let mut h = harness("osc~", Some(100.0), false);
        let j = TAU * 100.0 / SR;
        for k in 0..4 {
            assert_close(h.tick(&[0.0])[0], (j * k as f64).cos());
        }
    }

    #[test]
    fn cosine_from_signal_frequency() {
        // Construction frequency is ignored once a signal is wired.
        let mut h = harness("osc~", Some(999.0), true);
        let j = TAU * 100.0 / SR;
        for k in 0..4 {
            assert_close(h.tick(&[100.0])[0], (j * k as f64).cos());
        }
    }

    #[test]
    fn message_frequency_change_applies_from_next_increment() {
        let mut h = harness("osc~", Some(100.0), false);
        let j = TAU * 100.0 / SR;
        assert_close(h.tick(&[0.0])[0], 1.0);
        assert_close(h.tick(&[0.0])[0], j.cos());
        h.send(PortId::shadow(0), msg![300.0]);
        assert_close(h.tick(&[0.0])[0], (2.0 * j).cos());
        assert_close(h.tick(&[0.0])[0], (5.0 * j).cos());
        assert_close(h.tick(&[0.0])[0], (8.0 * j).cos());
    }

    #[test]
    fn signal_and_control_frequencies_accumulate() {
        let mut h = harness("phasor~", None, true);
        h.send(PortId::shadow(0), msg![SR / 4.0]);
        assert_close(h.tick(&[SR / 4.0])[0], 0.0);
        assert_close(h.tick(&[SR / 4.0])[0], 0.5);
        assert_close(h.tick(&[0.0])[0], 1.0);
    }

    #[test]
    fn phase_set_replaces_phase() {
        let mut h = harness("osc~", None, false);
        h.send(PortId::new(1), msg![0.0]);
        assert_close(h.tick(&[0.0])[0], 1.0);
        h.send(PortId::new(1), msg![0.25]);
        assert_close(h.tick(&[0.0])[0], 0.0);
        h.send(PortId::new(1), msg![-2.5]);
        assert_close(h.tick(&[0.0])[0], -1.0);
    }

    #[test]
    fn ramp_is_not_wrapped() {
        let mut h = harness("phasor~", Some(SR / 2.0), false);
        let outputs: Vec<f64> = (0..5).map(|_| h.tick(&[0.0])[0]).collect();
        assert_eq!(outputs, vec![0.0, 0.5, 1.0, 1.5, 2.0]);

        h.send(PortId::new(1), msg![0.25]);
        assert_close(h.tick(&[0.0])[0], 0.25);
        h.send(PortId::new(1), msg![7.5]);
        assert_close(h.tick(&[0.0])[0], 7.5);
    }

    #[test]
    fn ramp_message_frequency_sequence() {
        let mut h = harness("phasor~", Some(100.0), false);
        let j = 100.0 / SR;
        assert_close(h.tick(&[0.0])[0], 0.0);
        assert_close(h.tick(&[0.0])[0], j);
        h.send(PortId::shadow(0), msg![300.0]);
        assert_close(h.tick(&[0.0])[0], 2.0 * j);
        assert_close(h.tick(&[0.0])[0], 5.0 * j);
        assert_close(h.tick(&[0.0])[0], 8.0 * j);
    }

    #[test]
    fn non_float_messages_are_dropped() {
        let mut h = harness("phasor~", Some(SR / 2.0), false);
        h.send(PortId::new(1), msg!["reset"]);
        h.send(PortId::shadow(0), msg![1.0, 2.0]);
        assert_close(h.tick(&[0.0])[0], 0.0);
        assert_close(h.tick(&[0.0])[0], 0.5);
    }
}
