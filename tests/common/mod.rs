//! Shared integration test helpers for skinsync.
//!
//! Include with `mod common;` at the top of each test file that needs it.
//! The `#[allow(dead_code)]` keeps files that use only some helpers quiet.

#![allow(dead_code)]

use parking_lot::Mutex;
use skinsync::BackgroundService;
use skinsync_config::{Config, ConfigSource, SourceConfig};
use skinsync_sync::{BundleStore, SyncOrchestrator, Transport, TransportError};
use std::collections::HashMap;
use std::sync::Arc;

pub const SOURCE: &str = "https://cdn.example.com/skins/";

/// Remote sources served from memory. Unpublished URLs answer 503.
#[derive(Default)]
pub struct FakeSources {
    bodies: Mutex<HashMap<String, String>>,
}

impl FakeSources {
    pub fn publish(&self, style: &str, script: &str, version_json: &str) {
        let mut bodies = self.bodies.lock();
        bodies.insert(format!("{SOURCE}style.css"), style.to_string());
        bodies.insert(format!("{SOURCE}script.js"), script.to_string());
        bodies.insert(format!("{SOURCE}version.json"), version_json.to_string());
    }
}

impl Transport for FakeSources {
    fn get(&self, url: &str, _credential: Option<&str>) -> Result<String, TransportError> {
        self.bodies
            .lock()
            .get(url)
            .cloned()
            .ok_or_else(|| TransportError::Status {
                url: url.to_string(),
                status: 503,
            })
    }
}

pub type TestService = BackgroundService<Arc<FakeSources>>;

/// Config with the fake source and one destination pattern.
pub fn config() -> Config {
    Config::new()
        .with_source(SourceConfig::new(SOURCE))
        .with_destination("https://app.example.com/*")
}

/// Service over fake sources, an in-memory store, and `config_source`.
pub fn service_with(
    config_source: impl ConfigSource + 'static,
) -> (Arc<TestService>, Arc<FakeSources>) {
    let sources = Arc::new(FakeSources::default());
    let orchestrator = Arc::new(SyncOrchestrator::new(
        "1.0.0",
        Arc::clone(&sources),
        Arc::new(BundleStore::in_memory()),
    ));
    let service = Arc::new(BackgroundService::new(orchestrator, Arc::new(config_source)));
    (service, sources)
}
