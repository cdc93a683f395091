//! Trait-based node type definitions.
//!
//! A node type is described by [`NodeDef`]: construction arguments become a
//! validated args record, the record becomes a [`Topology`], and at link time
//! the record plus [`LinkInfo`] become a running instance ([`NodeImpl`]).

#![forbid(unsafe_code)]

use crate::graph::{PortId, Topology};
use crate::message::{Message, Token};
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Validated construction arguments with their concrete type erased.
pub type ErasedArgs = Arc<dyn Any + Send + Sync>;

/// Errors raised while constructing nodes.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum NodeError {
    /// Construction arguments could not be made sense of.
    #[error("invalid arguments for {node_type}: {reason}")]
    InvalidArguments {
        /// Type being constructed.
        node_type: String,
        /// What was wrong.
        reason: String,
    },
    /// No node type is registered under this name.
    #[error("unknown node type: {0}")]
    UnknownNodeType(String),
    /// Erased args did not belong to the node type handling them.
    #[error("args type mismatch in {0}")]
    ArgsTypeMismatch(String),
}

impl NodeError {
    /// Shorthand for [`NodeError::InvalidArguments`].
    pub fn invalid(node_type: &str, reason: impl Into<String>) -> Self {
        NodeError::InvalidArguments {
            node_type: node_type.to_string(),
            reason: reason.into(),
        }
    }
}

/// Generic node definition; implement this for your node types.
pub trait NodeDef: Send + Sync + 'static {
    /// Validated argument record.
    type Args: Clone + fmt::Debug + Send + Sync + 'static;

    /// Validate raw construction arguments, applying defaults where the
    /// domain tolerates omission.
    fn translate_args(&self, raw: &[Token]) -> Result<Self::Args, NodeError>;

    /// Port map for the given arguments.
    fn build(&self, args: &Self::Args) -> Topology;

    /// Shadow message inlet standing in for a signal inlet.
    fn reroute_message_connection(&self, _inlet: PortId) -> Option<PortId> {
        None
    }

    /// Create the instance. Link information is available through `ctx`.
    fn declare(&self, args: &Self::Args, ctx: &mut DeclareCtx<'_>) -> Box<dyn NodeImpl>;
}

/// Object-safe node definition used by the registry and graph.
pub trait NodeDefDyn: Send + Sync {
    /// See [`NodeDef::translate_args`].
    fn translate_args(&self, raw: &[Token]) -> Result<ErasedArgs, NodeError>;
    /// See [`NodeDef::build`].
    fn build(&self, args: &(dyn Any + Send + Sync)) -> Result<Topology, NodeError>;
    /// See [`NodeDef::reroute_message_connection`].
    fn reroute_message_connection(&self, inlet: PortId) -> Option<PortId>;
    /// See [`NodeDef::declare`].
    fn declare(
        &self,
        args: &(dyn Any + Send + Sync),
        ctx: &mut DeclareCtx<'_>,
    ) -> Result<Box<dyn NodeImpl>, NodeError>;
}

impl<T: NodeDef> NodeDefDyn for T {
    fn translate_args(&self, raw: &[Token]) -> Result<ErasedArgs, NodeError> {
        let args = <T as NodeDef>::translate_args(self, raw)?;
        Ok(Arc::new(args))
    }

    fn build(&self, args: &(dyn Any + Send + Sync)) -> Result<Topology, NodeError> {
        let typed = downcast_args::<T>(args)?;
        Ok(<T as NodeDef>::build(self, typed))
    }

    fn reroute_message_connection(&self, inlet: PortId) -> Option<PortId> {
        <T as NodeDef>::reroute_message_connection(self, inlet)
    }

    fn declare(
        &self,
        args: &(dyn Any + Send + Sync),
        ctx: &mut DeclareCtx<'_>,
    ) -> Result<Box<dyn NodeImpl>, NodeError> {
        let typed = downcast_args::<T>(args)?;
        Ok(<T as NodeDef>::declare(self, typed, ctx))
    }
}

fn downcast_args<T: NodeDef>(args: &(dyn Any + Send + Sync)) -> Result<&T::Args, NodeError> {
    // A mismatch means args were paired with the wrong definition.
    args.downcast_ref::<T::Args>()
        .ok_or_else(|| NodeError::ArgsTypeMismatch(std::any::type_name::<T>().to_string()))
}

/// A running node instance.
pub trait NodeImpl: Send {
    /// Deferred initialization, run once after global configuration and
    /// before the first tick or message. Only called when registered through
    /// [`DeclareCtx::on_configured`].
    fn configure(&mut self, _ctx: &mut MessageCtx<'_>) {}

    /// One sample. `inputs` is indexed by signal inlet, `outputs` by signal
    /// outlet.
    fn tick(&mut self, _inputs: &[f64], _outputs: &mut [f64], _sample_rate: f64) {}

    /// One inbound discrete event.
    fn message(&mut self, inlet: PortId, msg: &Message, ctx: &mut MessageCtx<'_>);
}

/// Which inlets of a node have a wired signal source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkInfo {
    signal_inlets: Vec<usize>,
}

impl LinkInfo {
    /// Link info listing the signal-wired inlet indices.
    pub fn new(mut signal_inlets: Vec<usize>) -> Self {
        signal_inlets.sort_unstable();
        signal_inlets.dedup();
        Self { signal_inlets }
    }

    /// True if a signal source is wired to inlet `index`.
    pub fn has_signal_source(&self, index: usize) -> bool {
        self.signal_inlets.binary_search(&index).is_ok()
    }
}

/// Context handed to [`NodeDef::declare`].
#[derive(Debug)]
pub struct DeclareCtx<'a> {
    link: &'a LinkInfo,
    wants_configure: bool,
    subscriptions: Vec<(String, PortId)>,
}

impl<'a> DeclareCtx<'a> {
    /// Context over the given link info.
    pub fn new(link: &'a LinkInfo) -> Self {
        Self {
            link,
            wants_configure: false,
            subscriptions: Vec::new(),
        }
    }

    /// True if a signal source is wired to inlet `index`.
    pub fn has_signal_source(&self, index: usize) -> bool {
        self.link.has_signal_source(index)
    }

    /// Register the deferred post-configuration callback.
    pub fn on_configured(&mut self) {
        self.wants_configure = true;
    }

    /// Subscribe `inlet` of this node to `bus` before the first event.
    pub fn subscribe(&mut self, bus: impl Into<String>, inlet: PortId) {
        self.subscriptions.push((bus.into(), inlet));
    }

    /// True if [`on_configured`](Self::on_configured) was called.
    pub fn wants_configure(&self) -> bool {
        self.wants_configure
    }

    /// Drain the declare-time subscriptions.
    pub fn take_subscriptions(&mut self) -> Vec<(String, PortId)> {
        std::mem::take(&mut self.subscriptions)
    }
}

/// Side effects produced by a message handler, applied in order by the host.
#[derive(Debug, Clone, PartialEq)]
pub enum Emission {
    /// Send on an outlet.
    Outlet(usize, Message),
    /// Publish on a named bus.
    Publish(String, Message),
    /// Subscribe an inlet of the emitting node to a bus.
    Subscribe(String, PortId),
    /// Remove a subscription of the emitting node.
    Unsubscribe(String, PortId),
}

/// Context handed to [`NodeImpl::message`] and [`NodeImpl::configure`].
#[derive(Debug)]
pub struct MessageCtx<'a> {
    sample_rate: f64,
    emissions: &'a mut Vec<Emission>,
}

impl<'a> MessageCtx<'a> {
    /// Context collecting into `emissions`.
    pub fn new(sample_rate: f64, emissions: &'a mut Vec<Emission>) -> Self {
        Self {
            sample_rate,
            emissions,
        }
    }

    /// Global sample rate.
    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    /// Send `msg` on `outlet`.
    pub fn send(&mut self, outlet: usize, msg: Message) {
        self.emissions.push(Emission::Outlet(outlet, msg));
    }

    /// Publish `msg` on `bus`.
    pub fn publish(&mut self, bus: &str, msg: Message) {
        self.emissions.push(Emission::Publish(bus.to_string(), msg));
    }

    /// Subscribe `inlet` to `bus`.
    pub fn subscribe(&mut self, bus: &str, inlet: PortId) {
        self.emissions
            .push(Emission::Subscribe(bus.to_string(), inlet));
    }

    /// Unsubscribe `inlet` from `bus`.
    pub fn unsubscribe(&mut self, bus: &str, inlet: PortId) {
        self.emissions
            .push(Emission::Unsubscribe(bus.to_string(), inlet));
    }
}
