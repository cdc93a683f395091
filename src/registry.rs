//! Node type registry: name to definition lookup.

use crate::node::{NodeDef, NodeDefDyn, NodeError};
use crate::nodes;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Registered node types, keyed by type name.
#[derive(Clone, Default)]
pub struct NodeRegistry {
    defs: BTreeMap<String, Arc<dyn NodeDefDyn>>,
}

impl NodeRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every built-in node type.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        nodes::register_all(&mut registry);
        registry
    }

    /// Register `def` under `name`, replacing any previous entry.
    pub fn register<T: NodeDef>(&mut self, name: &str, def: T) {
        if self.defs.insert(name.to_string(), Arc::new(def)).is_some() {
            tracing::debug!(node_type = name, "replaced registered node type");
        }
    }

    /// Look up a node type.
    pub fn get(&self, name: &str) -> Result<Arc<dyn NodeDefDyn>, NodeError> {
        self.defs
            .get(name)
            .cloned()
            .ok_or_else(|| NodeError::UnknownNodeType(name.to_string()))
    }

    /// Registered type names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.defs.keys().map(String::as_str)
    }
}

impl fmt::Debug for NodeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}
