//! Built-in node types.

pub mod bus;
pub mod controls;
pub mod filters;
pub mod oscillators;
pub mod print;
pub mod route;
pub mod sig;

use crate::message::Token;
use crate::node::NodeError;
use crate::registry::NodeRegistry;

/// Register every built-in node type.
pub fn register_all(registry: &mut NodeRegistry) {
    for filter in filters::RealFilter::all() {
        registry.register(filter.type_name(), filter);
    }
    for osc in oscillators::Oscillator::all() {
        registry.register(osc.type_name(), osc);
    }
    for control in controls::Control::all() {
        registry.register(control.type_name(), control);
    }
    registry.register("route", route::Route);
    registry.register("print", print::Print);
    registry.register("send", bus::SendBus);
    registry.register("receive", bus::ReceiveBus);
    registry.register("sig~", sig::Sig);
}

/// Numeric argument at `index`; `None` when absent.
pub(crate) fn float_arg(
    raw: &[Token],
    index: usize,
    node_type: &str,
) -> Result<Option<f64>, NodeError> {
    match raw.get(index) {
        None => Ok(None),
        Some(Token::Float(v)) => Ok(Some(*v)),
        Some(Token::Symbol(s)) => Err(NodeError::invalid(
            node_type,
            format!("argument {} must be a number, got {:?}", index, s),
        )),
    }
}

/// Bus name argument at `index`; absent or `"empty"` means unbound.
pub(crate) fn bus_arg(raw: &[Token], index: usize) -> Option<String> {
    match raw.get(index) {
        None => None,
        Some(Token::Symbol(s)) if s == "empty" || s.is_empty() => None,
        Some(token) => Some(token.to_string()),
    }
}
