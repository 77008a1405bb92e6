// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Request timeouts and runtime configuration

use esr_bus::{ConfigError, MailboxConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Deadlines for the two phases of a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestTimeouts {
    /// Time allowed from start until the prepare phase is satisfied
    #[serde(with = "humantime_serde")]
    pub prepare_timeout: Duration,
    /// Time allowed from the end of the prepare phase until durability
    #[serde(with = "humantime_serde")]
    pub commit_timeout: Duration,
}

impl Default for RequestTimeouts {
    fn default() -> Self {
        Self {
            prepare_timeout: Duration::from_secs(2),
            commit_timeout: Duration::from_secs(2),
        }
    }
}

impl RequestTimeouts {
    pub fn new(prepare_timeout: Duration, commit_timeout: Duration) -> Self {
        Self {
            prepare_timeout,
            commit_timeout,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.prepare_timeout.is_zero() || self.commit_timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "request timeouts must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Everything needed to host request management
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub mailbox: MailboxConfig,
    /// Number of request-management shards
    pub shards: usize,
    /// Period of `RequestManagerTimerTick`
    #[serde(with = "humantime_serde")]
    pub tick_interval: Duration,
    pub timeouts: RequestTimeouts,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            mailbox: MailboxConfig::default(),
            shards: 1,
            tick_interval: Duration::from_secs(1),
            timeouts: RequestTimeouts::default(),
        }
    }
}

impl RuntimeConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.mailbox.validate()?;
        self.timeouts.validate()?;
        if self.shards == 0 {
            return Err(ConfigError::Invalid("shards must be positive".into()));
        }
        if self.tick_interval.is_zero() {
            return Err(ConfigError::Invalid("tick_interval must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
