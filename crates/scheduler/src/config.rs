// SPDX-License-Identifier: LGPL-2.1-or-later
// Copyright (C) 2025 LabPool Contributors
//
// This file is part of LabPool.
//
// LabPool is free software: you can redistribute it and/or modify
// it under the terms of the GNU Lesser General Public License as published by
// the Free Software Foundation, either version 2.1 of the License, or
// (at your option) any later version.
//
// LabPool is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Lesser General Public License for more details.
//
// You should have received a copy of the GNU Lesser General Public License
// along with LabPool. If not, see <https://www.gnu.org/licenses/>.

//! Scheduler configuration.
//!
//! Priority: explicit config in code, then `LABPOOL_*` environment
//! variables, then defaults.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Environment variable overriding the expiry scan interval (milliseconds).
pub const ENV_EXPIRY_TICK_MS: &str = "LABPOOL_EXPIRY_TICK_MS";
/// Environment variable overriding the default shutdown deadline (milliseconds).
pub const ENV_SHUTDOWN_DEADLINE_MS: &str = "LABPOOL_SHUTDOWN_DEADLINE_MS";

const DEFAULT_EXPIRY_TICK_MS: u64 = 1_000;
const DEFAULT_SHUTDOWN_DEADLINE_MS: u64 = 5_000;

/// Tunables of the lease scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Interval between expiry scans over active leases
    #[serde(default = "default_expiry_tick_ms")]
    pub expiry_tick_ms: u64,
    /// Deadline for draining workers on stop when the caller gives none
    #[serde(default = "default_shutdown_deadline_ms")]
    pub shutdown_deadline_ms: u64,
}

fn default_expiry_tick_ms() -> u64 {
    DEFAULT_EXPIRY_TICK_MS
}

fn default_shutdown_deadline_ms() -> u64 {
    DEFAULT_SHUTDOWN_DEADLINE_MS
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        SchedulerConfig {
            expiry_tick_ms: DEFAULT_EXPIRY_TICK_MS,
            shutdown_deadline_ms: DEFAULT_SHUTDOWN_DEADLINE_MS,
        }
    }
}

impl SchedulerConfig {
    /// Defaults overridden by `LABPOOL_*` environment variables.
    pub fn from_env() -> Self {
        let mut config = SchedulerConfig::default();
        if let Some(ms) = read_env_ms(ENV_EXPIRY_TICK_MS) {
            config.expiry_tick_ms = ms;
        }
        if let Some(ms) = read_env_ms(ENV_SHUTDOWN_DEADLINE_MS) {
            config.shutdown_deadline_ms = ms;
        }
        config
    }

    /// Expiry scan interval.
    pub fn expiry_tick(&self) -> Duration {
        Duration::from_millis(self.expiry_tick_ms.max(1))
    }

    /// Default stop deadline.
    pub fn shutdown_deadline(&self) -> Duration {
        Duration::from_millis(self.shutdown_deadline_ms)
    }
}

fn read_env_ms(key: &str) -> Option<u64> {
    std::env::var(key).ok()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = SchedulerConfig::default();
        assert_eq!(config.expiry_tick(), Duration::from_secs(1));
        assert_eq!(config.shutdown_deadline(), Duration::from_secs(5));
    }

    #[test]
    fn deserializes_with_partial_fields() {
        let config: SchedulerConfig = serde_json::from_str(r#"{"expiry_tick_ms": 250}"#).unwrap();
        assert_eq!(config.expiry_tick_ms, 250);
        assert_eq!(config.shutdown_deadline_ms, 5_000);
    }
}
