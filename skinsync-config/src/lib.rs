//! Configuration system for the skinsync asset synchronization engine.
//!
//! This crate provides configuration loading, saving, validation, and default
//! values. It includes:
//!
//! - The [`Config`] struct: the remote source chain, destination patterns,
//!   and the poll interval
//! - YAML persistence with atomic saves
//! - `${SKINSYNC_*}` substitution for source credentials
//! - The [`ConfigSource`] trait used by callers that must re-read configuration
//!   on every sync cycle and page evaluation

pub mod config;
pub mod defaults;
pub mod error;

pub use config::env_vars::{is_env_var_allowed, substitute_variables};
pub use config::source::{ConfigSource, FileConfigSource};
pub use config::{Config, SourceConfig};
pub use error::ConfigError;
