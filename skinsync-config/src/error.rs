//! Typed error variants for the skinsync-config crate.
//!
//! Config I/O goes through `anyhow` at the application boundary; these
//! variants let library consumers match on the specific failure mode. A
//! `ConfigError` is fatal to the operation that triggered it and nothing else.

use thiserror::Error;

/// Errors that can occur when loading, saving, or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An I/O error occurred reading or writing the config file.
    #[error("I/O error reading config: {0}")]
    Io(#[from] std::io::Error),

    /// The config file contained invalid YAML that could not be parsed.
    #[error("YAML parse error in config: {0}")]
    Parse(#[from] serde_yaml_ng::Error),

    /// No remote sources are configured, so there is nothing to fetch from.
    #[error("No remote sources configured")]
    EmptySources,

    /// No destination patterns are configured, so no page can be a target.
    #[error("No destination patterns configured")]
    EmptyPatterns,

    /// A field value failed semantic validation.
    ///
    /// The inner string describes which field is invalid and why.
    #[error("Config validation error: {0}")]
    Validation(String),
}
