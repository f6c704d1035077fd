//! Study-lock configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Distributed study-lock settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockConfig {
    /// How long an acquired lock is held before it expires, in milliseconds.
    #[serde(default = "default_duration_ms")]
    pub duration_ms: u64,
    /// How long an acquisition waits before failing with a timeout, in
    /// milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl LockConfig {
    /// Lock hold duration.
    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }

    /// Acquisition timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            duration_ms: default_duration_ms(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

fn default_duration_ms() -> u64 {
    20_000
}

fn default_timeout_ms() -> u64 {
    10_000
}
