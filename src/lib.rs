//! Node-type contracts for a signal/message dataflow audio graph.
//!
//! Every node type turns construction arguments into typed ports
//! ([`graph::Topology`]) and then into an instance with per-sample
//! (`tick`) and per-event (`message`) behavior ([`node::NodeImpl`]).
//! The [`graph`], [`plan`] and [`rt`] modules form a small reference host
//! that links, configures and drives those instances.

pub mod bus;
pub mod dsl;
pub mod graph;
pub mod harness;
#[doc(hidden)]
pub mod invariant_ppt;
pub mod message;
pub mod node;
pub mod nodes;
pub mod plan;
pub mod registry;
pub mod rt;

use serde::{Deserialize, Serialize};

/// Global engine configuration, known only once the host is configured.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Samples per second.
    pub sample_rate: f64,
    /// Ticks rendered per block by [`rt::render_offline`].
    pub block_size: usize,
    /// Channels written by [`rt::write_wav`].
    pub channel_count: u16,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100.0,
            block_size: 64,
            channel_count: 1,
        }
    }
}

impl EngineConfig {
    /// Config with the given sample rate and the default block size.
    pub fn with_sample_rate(sample_rate: f64) -> Self {
        Self {
            sample_rate,
            ..Self::default()
        }
    }

    /// Reject values no engine can run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.sample_rate.is_finite() && self.sample_rate > 0.0) {
            return Err(ConfigError::InvalidSampleRate(self.sample_rate));
        }
        if self.block_size == 0 {
            return Err(ConfigError::ZeroBlockSize);
        }
        if self.channel_count == 0 {
            return Err(ConfigError::ZeroChannels);
        }
        Ok(())
    }
}

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    /// Sample rate must be finite and positive.
    #[error("invalid sample rate: {0}")]
    InvalidSampleRate(f64),
    /// Block size must be at least one tick.
    #[error("block size must be non-zero")]
    ZeroBlockSize,
    /// At least one output channel.
    #[error("channel count must be non-zero")]
    ZeroChannels,
}
