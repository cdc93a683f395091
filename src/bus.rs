//! Named publish/subscribe channels.
//!
//! Nodes never talk to the registry directly; they emit subscribe, unsubscribe
//! and publish requests that the host applies against a [`BusRegistry`].

#![forbid(unsafe_code)]

use crate::graph::{NodeId, PortId};
use std::collections::BTreeMap;

/// A node inlet listening on a bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subscriber {
    /// Listening node.
    pub node: NodeId,
    /// Inlet the bus delivers to.
    pub inlet: PortId,
}

/// Bus name to subscriber bookkeeping.
pub trait BusRegistry: Send {
    /// Add a subscriber. Subscribing twice is a no-op.
    fn subscribe(&mut self, bus: &str, subscriber: Subscriber);
    /// Remove a subscriber if present.
    fn unsubscribe(&mut self, bus: &str, subscriber: Subscriber);
    /// Current subscribers of `bus`, in subscription order.
    fn subscribers(&self, bus: &str) -> Vec<Subscriber>;
}

/// In-process bus registry with ordered fan-out.
#[derive(Debug, Default, Clone)]
pub struct InMemoryBuses {
    buses: BTreeMap<String, Vec<Subscriber>>,
}

impl InMemoryBuses {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of buses with at least one subscriber.
    pub fn bus_names(&self) -> impl Iterator<Item = &str> {
        self.buses
            .iter()
            .filter(|(_, subs)| !subs.is_empty())
            .map(|(name, _)| name.as_str())
    }
}

impl BusRegistry for InMemoryBuses {
    fn subscribe(&mut self, bus: &str, subscriber: Subscriber) {
        let subs = self.buses.entry(bus.to_string()).or_default();
        if !subs.contains(&subscriber) {
            subs.push(subscriber);
        }
    }

    fn unsubscribe(&mut self, bus: &str, subscriber: Subscriber) {
        if let Some(subs) = self.buses.get_mut(bus) {
            subs.retain(|s| *s != subscriber);
            if subs.is_empty() {
                self.buses.remove(bus);
            }
        }
    }

    fn subscribers(&self, bus: &str) -> Vec<Subscriber> {
        self.buses.get(bus).cloned().unwrap_or_default()
    }
}
