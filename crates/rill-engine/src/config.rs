//! Host configuration
//!
//! Every field has a default, so an empty document is a valid configuration:
//!
//! ```toml
//! [pool]
//! workers = 4            # 0 = one per CPU core
//! thread_name = "io"
//! idle_wait_ms = 50
//!
//! [event_loop]
//! thread_name = "ui"
//! ```

use crate::error::{ConfigError, ConfigResult};
use serde::Deserialize;
use std::time::Duration;

/// Worker pool settings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Number of worker threads (0 = number of CPU cores)
    pub workers: usize,

    /// Thread name prefix; workers are named `{thread_name}-{index}`
    pub thread_name: String,

    /// Upper bound on how long an idle worker sleeps before re-checking for shutdown
    pub idle_wait_ms: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: 0,
            thread_name: "rill-pool".to_string(),
            idle_wait_ms: 50,
        }
    }
}

impl PoolConfig {
    /// Config with an explicit worker count
    pub fn with_workers(workers: usize) -> Self {
        Self {
            workers,
            ..Self::default()
        }
    }

    /// Resolved worker count
    pub fn worker_count(&self) -> usize {
        if self.workers == 0 {
            num_cpus::get()
        } else {
            self.workers
        }
    }

    /// Idle wait as a duration (at least 1ms)
    pub fn idle_wait(&self) -> Duration {
        Duration::from_millis(self.idle_wait_ms.max(1))
    }
}

/// Event loop settings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EventLoopConfig {
    /// Name of the loop thread
    pub thread_name: String,
}

impl Default for EventLoopConfig {
    fn default() -> Self {
        Self {
            thread_name: "rill-event-loop".to_string(),
        }
    }
}

/// Top-level configuration for the in-process hosts
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RillConfig {
    /// Worker pool settings
    pub pool: PoolConfig,

    /// Event loop settings
    pub event_loop: EventLoopConfig,
}

impl RillConfig {
    /// Parse a TOML document
    pub fn from_toml_str(text: &str) -> ConfigResult<Self> {
        toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))
    }
}
