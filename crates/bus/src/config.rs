// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Mailbox configuration

use crate::error::ConfigError;
use crate::ring::MIN_CAPACITY;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tuning for one mailbox (or every shard of a router)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MailboxConfig {
    /// Ring slots; must be a power of two
    pub capacity: usize,
    /// Most messages taken from the ring per dequeue
    pub batch_size: usize,
    /// Empty polls spent spinning before the worker sleeps
    pub spin_iterations: u32,
    /// Sleep between polls once spinning is exhausted
    #[serde(with = "humantime_serde")]
    pub idle_sleep: Duration,
    /// Upper bound on how long `stop` waits for the worker
    #[serde(with = "humantime_serde")]
    pub stop_timeout: Duration,
    /// Log handler invocations that exceed the slow thresholds
    pub watch_slow_messages: bool,
    #[serde(with = "humantime_serde")]
    pub slow_message_threshold: Duration,
    #[serde(with = "humantime_serde")]
    pub very_slow_message_threshold: Duration,
    /// Stop the worker on the first handler fault instead of skipping the message
    pub fail_fast: bool,
    /// Statistics group the mailbox reports under
    pub group: Option<String>,
}

impl Default for MailboxConfig {
    fn default() -> Self {
        Self {
            capacity: 4096,
            batch_size: 64,
            spin_iterations: 100,
            idle_sleep: Duration::from_millis(1),
            stop_timeout: Duration::from_secs(10),
            watch_slow_messages: true,
            slow_message_threshold: Duration::from_millis(48),
            very_slow_message_threshold: Duration::from_secs(7),
            fail_fast: false,
            group: None,
        }
    }
}

impl MailboxConfig {
    /// Parse from a TOML document
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity < MIN_CAPACITY || !self.capacity.is_power_of_two() {
            return Err(ConfigError::Invalid(format!(
                "capacity must be a power of two of at least {MIN_CAPACITY}, got {}",
                self.capacity
            )));
        }
        if self.batch_size == 0 {
            return Err(ConfigError::Invalid("batch_size must be positive".into()));
        }
        if self.very_slow_message_threshold < self.slow_message_threshold {
            return Err(ConfigError::Invalid(
                "very_slow_message_threshold must not be below slow_message_threshold".into(),
            ));
        }
        Ok(())
    }

    pub fn with_capacity(self, capacity: usize) -> Self {
        Self { capacity, ..self }
    }

    pub fn with_fail_fast(self, fail_fast: bool) -> Self {
        Self { fail_fast, ..self }
    }

    pub fn with_stop_timeout(self, stop_timeout: Duration) -> Self {
        Self {
            stop_timeout,
            ..self
        }
    }

    pub fn with_slow_thresholds(self, slow: Duration, very_slow: Duration) -> Self {
        Self {
            watch_slow_messages: true,
            slow_message_threshold: slow,
            very_slow_message_threshold: very_slow,
            ..self
        }
    }
}
