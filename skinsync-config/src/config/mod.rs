//! Engine configuration.
//!
//! # Sub-modules
//!
//! - [`env_vars`]: `${SKINSYNC_*}` substitution for source credentials
//! - [`persistence`]: `impl Config` methods for load/save/path resolution
//! - [`source`]: the [`ConfigSource`](source::ConfigSource) re-read seam

pub mod env_vars;
pub mod persistence;
pub mod source;

use crate::defaults;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One remote location that serves the three bundle artifacts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceConfig {
    /// Base URL the artifact filenames are appended to
    pub base_url: String,

    /// Optional bearer credential sent with every artifact request.
    ///
    /// May reference environment variables as `${SKINSYNC_TOKEN}`; the raw
    /// value is what gets saved, the substituted one is what gets sent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
}

impl SourceConfig {
    /// Create a source without a credential.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            credential: None,
        }
    }

    /// Builder-style credential setter.
    pub fn with_credential(mut self, credential: impl Into<String>) -> Self {
        self.credential = Some(credential.into());
        self
    }

    /// Credential with environment references substituted.
    ///
    /// Blank credentials are treated as absent so no empty `Authorization`
    /// header is ever sent.
    pub fn resolved_credential(&self) -> Option<String> {
        let raw = self.credential.as_deref()?.trim();
        if raw.is_empty() {
            return None;
        }
        let resolved = env_vars::substitute_variables(raw);
        if resolved.trim().is_empty() {
            None
        } else {
            Some(resolved)
        }
    }
}

/// Configuration supplied by the external settings collaborator.
///
/// Exactly three fields: the ordered source chain, the destination patterns,
/// and the sync poll interval.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    /// Remote sources, tried in order until one serves all three artifacts
    #[serde(default = "crate::defaults::sources")]
    pub sources: Vec<SourceConfig>,

    /// Glob-style page addresses that receive injection (`*` matches anything)
    #[serde(default = "crate::defaults::destination_patterns")]
    pub destination_patterns: Vec<String>,

    /// Minutes between recurring sync cycles (1–1440)
    #[serde(default = "crate::defaults::poll_interval_minutes")]
    pub poll_interval_minutes: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sources: defaults::sources(),
            destination_patterns: defaults::destination_patterns(),
            poll_interval_minutes: defaults::poll_interval_minutes(),
        }
    }
}

impl Config {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a remote source to the end of the fallback chain
    pub fn with_source(mut self, source: SourceConfig) -> Self {
        self.sources.push(source);
        self
    }

    /// Add a destination pattern
    pub fn with_destination(mut self, pattern: impl Into<String>) -> Self {
        self.destination_patterns.push(pattern.into());
        self
    }

    /// Set the poll interval in minutes (clamped by [`Self::normalize`])
    pub fn with_poll_interval(mut self, minutes: u32) -> Self {
        self.poll_interval_minutes = minutes;
        self
    }

    /// Poll interval as a `Duration`, clamped to the accepted bounds.
    pub fn poll_interval(&self) -> Duration {
        let minutes = self.poll_interval_minutes.clamp(
            defaults::MIN_POLL_INTERVAL_MINUTES,
            defaults::MAX_POLL_INTERVAL_MINUTES,
        );
        Duration::from_secs(u64::from(minutes) * 60)
    }

    /// Clamp out-of-range values into their accepted bounds.
    ///
    /// Called after every load so a hand-edited file can't produce a zero or
    /// multi-day poll interval.
    pub fn normalize(&mut self) {
        let clamped = self.poll_interval_minutes.clamp(
            defaults::MIN_POLL_INTERVAL_MINUTES,
            defaults::MAX_POLL_INTERVAL_MINUTES,
        );
        if clamped != self.poll_interval_minutes {
            log::warn!(
                "poll_interval_minutes {} is outside {}..={}; using {}",
                self.poll_interval_minutes,
                defaults::MIN_POLL_INTERVAL_MINUTES,
                defaults::MAX_POLL_INTERVAL_MINUTES,
                clamped
            );
            self.poll_interval_minutes = clamped;
        }
    }

    /// Check field values that cannot be repaired by clamping.
    ///
    /// An empty source chain or pattern list is valid here: a fresh install
    /// has neither. Operations that need them report
    /// [`ConfigError::EmptySources`] / [`ConfigError::EmptyPatterns`] themselves.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (index, source) in self.sources.iter().enumerate() {
            if source.base_url.trim().is_empty() {
                return Err(ConfigError::Validation(format!(
                    "sources[{index}].base_url is empty"
                )));
            }
        }
        for (index, pattern) in self.destination_patterns.iter().enumerate() {
            if pattern.trim().is_empty() {
                return Err(ConfigError::Validation(format!(
                    "destination_patterns[{index}] is empty"
                )));
            }
        }
        Ok(())
    }
}
