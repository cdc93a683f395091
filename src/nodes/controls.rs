//! Interactive control atoms.
//!
//! Each control keeps one persisted value and forwards it to outlet 0 and to
//! its bound send bus. Values arrive on inlet 0, either wired or through the
//! bound receive bus. `send <bus>` and `receive <bus>` rebind at runtime.

use crate::graph::{Port, PortId, Topology};
use crate::invariant_ppt::{assert_invariant, CONTROL_VALUE_IN_BOUNDS};
use crate::message::{Message, Token};
use crate::node::{DeclareCtx, MessageCtx, NodeDef, NodeError, NodeImpl};
use crate::nodes::{bus_arg, float_arg};
use serde::{Deserialize, Serialize};

/// Control variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControlKind {
    /// `floatatom`
    FloatAtom,
    /// `symbolatom`
    SymbolAtom,
    /// `listbox`
    ListBox,
    /// `nbx`
    NumberBox,
    /// `hsl`
    HSlider,
    /// `vsl`
    VSlider,
    /// `hradio`
    HRadio,
    /// `vradio`
    VRadio,
    /// `tgl`
    Toggle,
}

impl ControlKind {
    fn type_name(self) -> &'static str {
        match self {
            ControlKind::FloatAtom => "floatatom",
            ControlKind::SymbolAtom => "symbolatom",
            ControlKind::ListBox => "listbox",
            ControlKind::NumberBox => "nbx",
            ControlKind::HSlider => "hsl",
            ControlKind::VSlider => "vsl",
            ControlKind::HRadio => "hradio",
            ControlKind::VRadio => "vradio",
            ControlKind::Toggle => "tgl",
        }
    }

    /// Upper bound used when the max argument is missing.
    fn default_max(self) -> f64 {
        match self {
            ControlKind::Toggle => 1.0,
            ControlKind::HRadio | ControlKind::VRadio => 7.0,
            _ => 127.0,
        }
    }
}

/// A control node type.
#[derive(Debug, Clone, Copy)]
pub struct Control {
    kind: ControlKind,
}

impl Control {
    /// Every control variant.
    pub fn all() -> Vec<Control> {
        [
            ControlKind::FloatAtom,
            ControlKind::SymbolAtom,
            ControlKind::ListBox,
            ControlKind::NumberBox,
            ControlKind::HSlider,
            ControlKind::VSlider,
            ControlKind::HRadio,
            ControlKind::VRadio,
            ControlKind::Toggle,
        ]
        .into_iter()
        .map(Control::new)
        .collect()
    }

    /// Control of the given variant.
    pub fn new(kind: ControlKind) -> Self {
        Self { kind }
    }

    /// Registered type name.
    pub fn type_name(&self) -> &'static str {
        self.kind.type_name()
    }
}

/// Inclusive numeric range, `min <= max`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    /// Lower bound.
    pub min: f64,
    /// Upper bound.
    pub max: f64,
}

impl Bounds {
    /// Range between `a` and `b`, in either order.
    pub fn new(a: f64, b: f64) -> Self {
        if a <= b {
            Self { min: a, max: b }
        } else {
            Self { min: b, max: a }
        }
    }

    /// Clamp `v` into the range.
    pub fn clamp(&self, v: f64) -> f64 {
        v.max(self.min).min(self.max)
    }

    /// True if `v` lies within the range.
    pub fn contains(&self, v: f64) -> bool {
        self.min <= v && v <= self.max
    }
}

/// A control's persisted value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ControlValue {
    /// Numeric controls and the toggle.
    Float(f64),
    /// `symbolatom`.
    Symbol(String),
    /// `listbox`.
    List(Message),
}

impl ControlValue {
    /// The value as it is emitted.
    pub fn to_message(&self) -> Message {
        match self {
            ControlValue::Float(v) => Message::float(*v),
            ControlValue::Symbol(s) => Message::symbol(s.clone()),
            ControlValue::List(m) => m.clone(),
        }
    }
}

/// Construction arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlArgs {
    /// Numeric range; `None` for non-numeric or unbounded controls.
    pub bounds: Option<Bounds>,
    /// Value stored at declare time, before clamping.
    pub init_value: ControlValue,
    /// Emit the initial value once after configuration.
    pub output_on_load: bool,
    /// Bus delivering values to inlet 0; `None` when unbound.
    pub receive_bus_name: Option<String>,
    /// Bus every emitted value is published on; `None` when unbound.
    pub send_bus_name: Option<String>,
}

impl NodeDef for Control {
    type Args = ControlArgs;

    fn translate_args(&self, raw: &[Token]) -> Result<ControlArgs, NodeError> {
        let name = self.type_name();
        let kind = self.kind;
        let arg = |i| float_arg(raw, i, name);
        // NaN bounds would make every clamp ill-defined.
        let bound = |i: usize| -> Result<Option<f64>, NodeError> {
            match arg(i)? {
                Some(v) if !v.is_finite() => Err(NodeError::invalid(
                    name,
                    format!("argument {} must be a finite bound, got {}", i, v),
                )),
                v => Ok(v),
            }
        };
        match kind {
            ControlKind::NumberBox | ControlKind::HSlider | ControlKind::VSlider => {
                let bounds = Bounds::new(
                    bound(0)?.unwrap_or(0.0),
                    bound(1)?.unwrap_or(kind.default_max()),
                );
                let output_on_load = arg(2)?.unwrap_or(0.0) != 0.0;
                let init = arg(3)?.unwrap_or(0.0);
                Ok(ControlArgs {
                    bounds: Some(bounds),
                    init_value: ControlValue::Float(if output_on_load { init } else { 0.0 }),
                    output_on_load,
                    receive_bus_name: bus_arg(raw, 4),
                    send_bus_name: bus_arg(raw, 5),
                })
            }
            ControlKind::Toggle | ControlKind::HRadio | ControlKind::VRadio => {
                let bounds = Bounds::new(0.0, bound(0)?.unwrap_or(kind.default_max()));
                let output_on_load = arg(1)?.unwrap_or(0.0) != 0.0;
                let init = arg(2)?.unwrap_or(0.0);
                Ok(ControlArgs {
                    bounds: Some(bounds),
                    init_value: ControlValue::Float(if output_on_load { init } else { 0.0 }),
                    output_on_load,
                    receive_bus_name: bus_arg(raw, 3),
                    send_bus_name: bus_arg(raw, 4),
                })
            }
            ControlKind::FloatAtom | ControlKind::SymbolAtom | ControlKind::ListBox => {
                let min = bound(0)?.unwrap_or(0.0);
                let max = bound(1)?.unwrap_or(0.0);
                let (bounds, init_value) = match kind {
                    ControlKind::FloatAtom => {
                        let bounds = (min != 0.0 || max != 0.0).then(|| Bounds::new(min, max));
                        (bounds, ControlValue::Float(0.0))
                    }
                    ControlKind::SymbolAtom => (None, ControlValue::Symbol(String::new())),
                    _ => (None, ControlValue::List(Message::bang())),
                };
                Ok(ControlArgs {
                    bounds,
                    init_value,
                    output_on_load: false,
                    receive_bus_name: bus_arg(raw, 2),
                    send_bus_name: bus_arg(raw, 3),
                })
            }
        }
    }

    fn build(&self, args: &ControlArgs) -> Topology {
        Topology::new(vec![Port::message(0)], vec![Port::message(0)])
            .pushing_messages(args.output_on_load)
    }

    fn declare(&self, args: &ControlArgs, ctx: &mut DeclareCtx<'_>) -> Box<dyn NodeImpl> {
        let store = match (&args.init_value, self.kind) {
            (ControlValue::Float(v), ControlKind::Toggle) => Store::Toggle {
                value: *v,
                max: args.bounds.map_or(1.0, |b| b.max),
            },
            (ControlValue::Float(v), _) => {
                let value = args.bounds.map_or(*v, |b| b.clamp(*v));
                assert_invariant(
                    CONTROL_VALUE_IN_BOUNDS,
                    args.bounds.map_or(true, |b| b.contains(value)),
                    "Initial control value must lie within bounds",
                    Some(self.type_name()),
                );
                Store::Float {
                    value,
                    bounds: args.bounds,
                }
            }
            (ControlValue::Symbol(s), _) => Store::Symbol(s.clone()),
            (ControlValue::List(m), _) => Store::List(m.clone()),
        };
        if let Some(bus) = &args.receive_bus_name {
            ctx.subscribe(bus.clone(), PortId::new(0));
        }
        if args.output_on_load {
            ctx.on_configured();
        }
        Box::new(ControlImpl {
            type_name: self.type_name(),
            store,
            buses: BusBinding {
                send: args.send_bus_name.clone(),
                receive: args.receive_bus_name.clone(),
            },
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Store {
    Float { value: f64, bounds: Option<Bounds> },
    Toggle { value: f64, max: f64 },
    Symbol(String),
    List(Message),
}

impl Store {
    fn to_message(&self) -> Message {
        match self {
            Store::Float { value, .. } | Store::Toggle { value, .. } => Message::float(*value),
            Store::Symbol(s) => Message::symbol(s.clone()),
            Store::List(m) => m.clone(),
        }
    }

    /// Parse a value payload for this variant.
    fn accept(&self, msg: &Message) -> Option<Store> {
        match self {
            Store::Float { bounds, .. } => {
                let v = msg.is_single_float().then(|| msg.read_float(0)).flatten()?;
                let value = bounds.map_or(v, |b| b.clamp(v));
                debug_assert!(bounds.map_or(true, |b| b.contains(value)));
                Some(Store::Float {
                    value,
                    bounds: *bounds,
                })
            }
            Store::Toggle { max, .. } => {
                let value = msg.is_single_float().then(|| msg.read_float(0)).flatten()?;
                Some(Store::Toggle { value, max: *max })
            }
            Store::Symbol(_) => {
                let s = match msg.len() {
                    1 => msg.read_symbol(0),
                    2 if msg.starts_with("symbol") => msg.read_symbol(1),
                    _ => None,
                }?;
                Some(Store::Symbol(s.to_string()))
            }
            Store::List(_) => (!msg.is_empty()).then(|| Store::List(msg.clone())),
        }
    }

    /// Toggle flips between 0 and its max on bang.
    fn on_bang(&mut self) {
        if let Store::Toggle { value, max } = self {
            *value = if *value == 0.0 { *max } else { 0.0 };
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
struct BusBinding {
    send: Option<String>,
    receive: Option<String>,
}

impl BusBinding {
    fn emit(&self, msg: Message, ctx: &mut MessageCtx<'_>) {
        ctx.send(0, msg.clone());
        // A control listening on its own send bus would feed itself forever.
        if let Some(bus) = self.send.as_deref().filter(|b| Some(*b) != self.receive.as_deref()) {
            ctx.publish(bus, msg);
        }
    }

    fn rebind_send(&mut self, bus: Option<String>) {
        self.send = bus;
    }

    fn rebind_receive(&mut self, bus: Option<String>, ctx: &mut MessageCtx<'_>) {
        if let Some(old) = self.receive.take() {
            ctx.unsubscribe(&old, PortId::new(0));
        }
        if let Some(new) = &bus {
            ctx.subscribe(new, PortId::new(0));
        }
        self.receive = bus;
    }
}

struct ControlImpl {
    type_name: &'static str,
    store: Store,
    buses: BusBinding,
}

fn rebind_target(msg: &Message) -> Option<Option<String>> {
    if msg.len() != 2 {
        return None;
    }
    msg.get(1).map(|t| match t {
        Token::Symbol(s) if s == "empty" => None,
        other => Some(other.to_string()),
    })
}

impl NodeImpl for ControlImpl {
    fn configure(&mut self, ctx: &mut MessageCtx<'_>) {
        tracing::debug!(node = self.type_name, value = %self.store.to_message(), "output on load");
        self.buses.emit(self.store.to_message(), ctx);
    }

    fn message(&mut self, inlet: PortId, msg: &Message, ctx: &mut MessageCtx<'_>) {
        if inlet != PortId::new(0) {
            tracing::debug!(node = self.type_name, %inlet, %msg, "dropped message");
            return;
        }

        if msg.is_bang() {
            self.store.on_bang();
            self.buses.emit(self.store.to_message(), ctx);
            return;
        }

        if msg.starts_with("send") {
            if let Some(bus) = rebind_target(msg) {
                self.buses.rebind_send(bus);
                return;
            }
        }
        if msg.starts_with("receive") {
            if let Some(bus) = rebind_target(msg) {
                self.buses.rebind_receive(bus, ctx);
                return;
            }
        }

        if msg.starts_with("set") && msg.len() > 1 {
            match self.store.accept(&msg.shift()) {
                Some(store) => self.store = store,
                None => tracing::debug!(node = self.type_name, %msg, "invalid set payload"),
            }
            return;
        }

        match self.store.accept(msg) {
            Some(store) => {
                self.store = store;
                self.buses.emit(self.store.to_message(), ctx);
            }
            None => tracing::debug!(node = self.type_name, %msg, "dropped message"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harness::NodeHarness;
    use crate::msg;
    use crate::EngineConfig;

    fn args(kind: ControlKind, raw: &[Token]) -> ControlArgs {
        Control::new(kind).translate_args(raw).unwrap()
    }

    fn harness(name: &str, raw: &[Token]) -> NodeHarness {
        NodeHarness::new(name, raw, &[], &EngineConfig::default()).unwrap()
    }

    fn f(v: f64) -> Token {
        Token::Float(v)
    }

    #[test]
    fn number_box_arguments() {
        let a = args(ControlKind::NumberBox, &[f(-11.0), f(11.0), f(0.0), f(22.0)]);
        assert_eq!(a.bounds, Some(Bounds { min: -11.0, max: 11.0 }));
        assert_eq!(a.init_value, ControlValue::Float(0.0));
        assert!(!a.output_on_load);
        assert_eq!(a.receive_bus_name, None);
        assert_eq!(a.send_bus_name, None);

        let raw = [f(-11.0), f(11.0), f(1.0), f(22.0), "RCV".into(), "SND".into()];
        let a = args(ControlKind::NumberBox, &raw);
        assert_eq!(a.init_value, ControlValue::Float(22.0));
        assert!(a.output_on_load);
        assert_eq!(a.receive_bus_name.as_deref(), Some("RCV"));
        assert_eq!(a.send_bus_name.as_deref(), Some("SND"));
    }

    #[test]
    fn toggle_arguments_have_no_min() {
        let a = args(ControlKind::Toggle, &[f(11.0), f(0.0), f(22.0)]);
        assert_eq!(a.bounds, Some(Bounds { min: 0.0, max: 11.0 }));
        assert_eq!(a.init_value, ControlValue::Float(0.0));

        let raw = [f(11.0), f(1.0), f(22.0), "RCV".into(), "SND".into()];
        let a = args(ControlKind::Toggle, &raw);
        assert_eq!(a.init_value, ControlValue::Float(22.0));
        assert!(a.output_on_load);
        assert_eq!(a.send_bus_name.as_deref(), Some("SND"));
    }

    #[test]
    fn atom_arguments() {
        let a = args(ControlKind::SymbolAtom, &[f(-11.0), f(11.0)]);
        assert_eq!(a.receive_bus_name, None);
        assert_eq!(a.init_value, ControlValue::Symbol(String::new()));
        let a = args(ControlKind::SymbolAtom, &[f(-11.0), f(11.0), "RCV".into(), "SND".into()]);
        assert_eq!(a.receive_bus_name.as_deref(), Some("RCV"));
        assert_eq!(a.send_bus_name.as_deref(), Some("SND"));

        assert_eq!(args(ControlKind::FloatAtom, &[]).bounds, None);
        assert_eq!(
            args(ControlKind::FloatAtom, &[f(5.0), f(-5.0)]).bounds,
            Some(Bounds { min: -5.0, max: 5.0 })
        );
        assert_eq!(
            args(ControlKind::ListBox, &[]).init_value,
            ControlValue::List(Message::bang())
        );
    }

    #[test]
    fn symbolic_bound_is_invalid() {
        let err = Control::new(ControlKind::HSlider)
            .translate_args(&["low".into()])
            .unwrap_err();
        assert!(matches!(err, NodeError::InvalidArguments { .. }));
    }

    #[test]
    fn non_finite_bounds_are_invalid() {
        for (kind, raw) in [
            (ControlKind::NumberBox, vec![f(f64::NAN), f(5.0)]),
            (ControlKind::HSlider, vec![f(0.0), f(f64::INFINITY)]),
            (ControlKind::Toggle, vec![f(f64::NAN)]),
            (ControlKind::FloatAtom, vec![f(f64::NEG_INFINITY), f(1.0)]),
        ] {
            let err = Control::new(kind).translate_args(&raw).unwrap_err();
            assert!(matches!(err, NodeError::InvalidArguments { .. }), "{:?}", kind);
        }
    }

    #[test]
    fn build_marks_output_on_load() {
        let control = Control::new(ControlKind::NumberBox);
        let quiet = args(ControlKind::NumberBox, &[f(0.0), f(1.0), f(0.0), f(0.0)]);
        let loud = args(ControlKind::NumberBox, &[f(0.0), f(1.0), f(1.0), f(0.0)]);
        assert!(!control.build(&quiet).is_pushing_messages);
        assert!(control.build(&loud).is_pushing_messages);
        assert_eq!(control.build(&loud).inlets, vec![Port::message(0)]);
        assert_eq!(control.build(&loud).outlets, vec![Port::message(0)]);
    }

    #[test]
    fn every_variant_outputs_on_load_once() {
        for (name, raw) in [
            ("nbx", vec![f(0.0), f(127.0), f(1.0), f(42.0)]),
            ("hsl", vec![f(0.0), f(127.0), f(1.0), f(42.0)]),
            ("vsl", vec![f(0.0), f(127.0), f(1.0), f(42.0)]),
            ("tgl", vec![f(127.0), f(1.0), f(42.0)]),
            ("hradio", vec![f(127.0), f(1.0), f(42.0)]),
            ("vradio", vec![f(127.0), f(1.0), f(42.0)]),
        ] {
            let mut h = harness(name, &raw);
            assert_eq!(h.take(0), vec![msg![42.0]], "{}", name);
            assert!(h.take(0).is_empty());
        }
    }

    #[test]
    fn initial_value_is_clamped_when_stored() {
        let mut h = harness("nbx", &[f(-11.0), f(11.0), f(1.0), f(22.0)]);
        assert_eq!(h.take(0), vec![msg![11.0]]);
    }

    #[test]
    fn number_box_clamps() {
        let mut h = harness("nbx", &[f(-1.5), f(12.0), f(0.0), f(0.0)]);
        h.send(PortId::new(0), msg![2.9]);
        h.send(PortId::new(0), msg![0.123]);
        assert_eq!(h.take(0), vec![msg![2.9], msg![0.123]]);

        h.send(PortId::new(0), msg![-9.0]);
        h.send(PortId::new(0), msg![-111.0]);
        h.send(PortId::new(0), msg![12.1]);
        assert_eq!(h.take(0), vec![msg![-1.5], msg![-1.5], msg![12.0]]);

        h.send(PortId::new(0), Message::bang());
        assert_eq!(h.take(0), vec![msg![12.0]]);

        h.send(PortId::new(0), msg!["set", 14.0]);
        assert!(h.take(0).is_empty());
        h.send(PortId::new(0), Message::bang());
        assert_eq!(h.take(0), vec![msg![12.0]]);

        h.send(PortId::new(0), msg!["set", 2.55]);
        h.send(PortId::new(0), Message::bang());
        assert_eq!(h.take(0), vec![msg![2.55]]);
    }

    #[test]
    fn sliders_and_radios_forward_values() {
        for name in ["hsl", "vsl"] {
            let mut h = harness(name, &[f(-120.0), f(1000.0), f(0.0), f(0.0)]);
            h.send(PortId::new(0), msg![2.9]);
            h.send(PortId::new(0), msg![-111.0]);
            h.send(PortId::new(0), Message::bang());
            h.send(PortId::new(0), msg!["set", 789.0]);
            h.send(PortId::new(0), Message::bang());
            assert_eq!(
                h.take(0),
                vec![msg![2.9], msg![-111.0], msg![-111.0], msg![789.0]]
            );
        }
        let mut h = harness("hradio", &[f(7.0), f(0.0), f(0.0)]);
        h.send(PortId::new(0), msg![3.0]);
        h.send(PortId::new(0), msg![9.0]);
        assert_eq!(h.take(0), vec![msg![3.0], msg![7.0]]);
    }

    #[test]
    fn toggle_passes_values_and_flips_on_bang() {
        let mut h = harness("tgl", &[f(12.0), f(0.0), f(0.0)]);
        h.send(PortId::new(0), msg![2.9]);
        h.send(PortId::new(0), msg![0.9]);
        h.send(PortId::new(0), msg![-111.0]);
        assert_eq!(h.take(0), vec![msg![2.9], msg![0.9], msg![-111.0]]);

        h.send(PortId::new(0), Message::bang());
        h.send(PortId::new(0), Message::bang());
        assert_eq!(h.take(0), vec![msg![0.0], msg![12.0]]);

        h.send(PortId::new(0), msg!["set", 0.0]);
        h.send(PortId::new(0), Message::bang());
        assert_eq!(h.take(0), vec![msg![12.0]]);
    }

    #[test]
    fn atoms_store_and_emit() {
        let mut h = harness("floatatom", &[]);
        h.send(PortId::new(0), Message::bang());
        h.send(PortId::new(0), msg![333.0]);
        h.send(PortId::new(0), msg![666.0]);
        h.send(PortId::new(0), Message::bang());
        h.send(PortId::new(0), msg!["set", 999.0]);
        h.send(PortId::new(0), Message::bang());
        assert_eq!(
            h.take(0),
            vec![msg![0.0], msg![333.0], msg![666.0], msg![666.0], msg![999.0]]
        );

        let mut h = harness("symbolatom", &[]);
        h.send(PortId::new(0), Message::bang());
        h.send(PortId::new(0), msg!["bla"]);
        h.send(PortId::new(0), msg!["oip oip;oipoipoip"]);
        h.send(PortId::new(0), Message::bang());
        h.send(PortId::new(0), msg!["set", "hello"]);
        h.send(PortId::new(0), Message::bang());
        h.send(PortId::new(0), msg![12.0]);
        assert_eq!(
            h.take(0),
            vec![
                msg![""],
                msg!["bla"],
                msg!["oip oip;oipoipoip"],
                msg!["oip oip;oipoipoip"],
                msg!["hello"],
            ]
        );

        let mut h = harness("listbox", &[]);
        h.send(PortId::new(0), Message::bang());
        h.send(PortId::new(0), msg!["bla", 909.0]);
        h.send(PortId::new(0), msg![123.0, "hello"]);
        h.send(PortId::new(0), Message::bang());
        h.send(PortId::new(0), msg!["set", "hello", 666.0]);
        h.send(PortId::new(0), Message::bang());
        assert_eq!(
            h.take(0),
            vec![
                Message::bang(),
                msg!["bla", 909.0],
                msg![123.0, "hello"],
                msg![123.0, "hello"],
                msg!["hello", 666.0],
            ]
        );
    }

    #[test]
    fn bound_buses_are_used() {
        let mut h = harness(
            "nbx",
            &[f(0.0), f(1000.0), f(0.0), f(0.0), "TO".into(), "FROM".into()],
        );
        assert_eq!(h.subscriptions(), vec![("TO".to_string(), PortId::new(0))]);

        h.publish("TO", msg![666.0]);
        assert_eq!(h.take(0), vec![msg![666.0]]);
        assert_eq!(h.take_published(), vec![("FROM".to_string(), msg![666.0])]);
    }

    #[test]
    fn rebinding_buses_at_runtime() {
        let mut h = harness("floatatom", &[]);
        h.publish("TO", msg![666.0]);
        assert!(h.take(0).is_empty());

        h.send(PortId::new(0), msg!["receive", "TO"]);
        h.publish("TO", msg![888.0]);
        assert_eq!(h.take(0), vec![msg![888.0]]);
        assert!(h.take_published().is_empty());

        h.send(PortId::new(0), msg!["send", "FROM"]);
        h.send(PortId::new(0), msg![999.0]);
        assert_eq!(h.take(0), vec![msg![999.0]]);
        assert_eq!(h.take_published(), vec![("FROM".to_string(), msg![999.0])]);

        h.send(PortId::new(0), msg!["receive", "empty"]);
        h.publish("TO", msg![1.0]);
        assert!(h.take(0).is_empty());
        assert!(h.subscriptions().is_empty());
    }

    #[test]
    fn toggle_bang_publishes_max() {
        let mut h = harness("tgl", &[f(1000.0), f(0.0), f(0.0), "TO".into(), "FROM".into()]);
        h.publish("TO", Message::bang());
        assert_eq!(h.take(0), vec![msg![1000.0]]);
        assert_eq!(h.take_published(), vec![("FROM".to_string(), msg![1000.0])]);
    }

    #[test]
    fn same_send_and_receive_bus_does_not_feed_back() {
        let mut h = harness("floatatom", &[f(0.0), f(0.0), "X".into(), "X".into()]);
        h.send(PortId::new(0), msg![1.0]);
        assert_eq!(h.take(0), vec![msg![1.0]]);
        assert!(h.take_published().is_empty());
    }

    #[test]
    fn wrong_payloads_keep_state() {
        let mut h = harness("nbx", &[f(0.0), f(10.0), f(1.0), f(5.0)]);
        h.take(0);
        h.send(PortId::new(0), msg!["hello"]);
        h.send(PortId::new(0), msg!["set", "x"]);
        h.send(PortId::new(0), msg![1.0, 2.0]);
        assert!(h.take(0).is_empty());
        h.send(PortId::new(0), Message::bang());
        assert_eq!(h.take(0), vec![msg![5.0]]);
    }
}
