//! Where configuration comes from on each read.
//!
//! Configuration is never cached by the engine: the orchestrator asks its
//! [`ConfigSource`] at the start of every cycle, and pages ask at every
//! evaluation, so edits made by the settings collaborator apply on the next
//! read without any reload signal.

use super::Config;
use anyhow::Result;
use std::path::PathBuf;

/// Supplies the current configuration.
pub trait ConfigSource: Send + Sync {
    /// Read the configuration as it is right now.
    fn current(&self) -> Result<Config>;
}

/// Re-reads a YAML config file on every call.
#[derive(Debug, Clone)]
pub struct FileConfigSource {
    path: PathBuf,
}

impl FileConfigSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Source backed by the default `~/.config/skinsync/config.yaml`.
    pub fn default_path() -> Self {
        Self::new(Config::config_path())
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

impl ConfigSource for FileConfigSource {
    fn current(&self) -> Result<Config> {
        Config::load_from(&self.path)
    }
}

/// A fixed configuration, for embedding and tests.
impl ConfigSource for Config {
    fn current(&self) -> Result<Config> {
        Ok(self.clone())
    }
}
