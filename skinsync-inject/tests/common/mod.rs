//! Shared fakes for skinsync-inject integration tests.
//!
//! Include with `mod common;` at the top of a test file. The
//! `#[allow(dead_code)]` keeps files that use only some helpers quiet.

#![allow(dead_code)]

use skinsync_inject::{
    InjectionCoordinator, InjectionError, PageDocument, RelayRequest, RelayResponse, ScriptRelay,
    SuppressionHandle,
};
use skinsync_sync::{BundleStore, fallback};
use std::collections::HashMap;
use std::sync::Arc;

/// In-memory destination document.
#[derive(Default)]
pub struct FakePage {
    pub address: String,
    pub style: Option<String>,
    pub style_writes: usize,
    /// (selector, attribute) -> value
    pub attributes: HashMap<(String, String), String>,
    /// Derived UI built by enhancements
    pub badges: Vec<String>,
    /// Handle from the coordinator, checked on every write
    pub observer: Option<SuppressionHandle>,
    /// Writes that happened while suppression was not active
    pub unsuppressed_writes: usize,
}

impl FakePage {
    pub fn at(address: &str) -> Self {
        Self {
            address: address.to_string(),
            ..Self::default()
        }
    }

    fn record_write(&mut self) {
        if !self.observer.as_ref().is_some_and(SuppressionHandle::is_active) {
            self.unsuppressed_writes += 1;
        }
    }
}

impl PageDocument for FakePage {
    fn address(&self) -> String {
        self.address.clone()
    }

    fn has_style_block(&self) -> bool {
        self.style.is_some()
    }

    fn replace_style_block(&mut self, css: &str) -> Result<(), InjectionError> {
        self.record_write();
        self.style = Some(css.to_string());
        self.style_writes += 1;
        Ok(())
    }

    fn remove_style_block(&mut self) -> Result<(), InjectionError> {
        self.record_write();
        self.style = None;
        Ok(())
    }

    fn has_attribute(&self, selector: &str, attribute: &str) -> bool {
        self.attributes
            .contains_key(&(selector.to_string(), attribute.to_string()))
    }

    fn set_attribute(
        &mut self,
        selector: &str,
        attribute: &str,
        value: &str,
    ) -> Result<(), InjectionError> {
        self.record_write();
        self.attributes.insert(
            (selector.to_string(), attribute.to_string()),
            value.to_string(),
        );
        Ok(())
    }
}

/// Relay that records every script it is handed.
#[derive(Default)]
pub struct RecordingRelay {
    pub executed: Vec<RelayRequest>,
    pub fail_with: Option<String>,
}

impl ScriptRelay for RecordingRelay {
    fn execute(&mut self, request: RelayRequest) -> Result<RelayResponse, InjectionError> {
        let id = request.id;
        self.executed.push(request);
        Ok(match &self.fail_with {
            Some(error) => RelayResponse::failed(id, error.clone()),
            None => RelayResponse::ok(id),
        })
    }
}

pub type TestCoordinator = InjectionCoordinator<FakePage, RecordingRelay, Arc<BundleStore>>;

/// Store-ready bundle with the given text.
pub fn store_with(style: &str, script: &str) -> Arc<BundleStore> {
    let store = Arc::new(BundleStore::in_memory());
    publish(&store, style, script);
    store
}

/// Replace the store's bundle with new text.
pub fn publish(store: &BundleStore, style: &str, script: &str) {
    let mut bundle = fallback::builtin_bundle();
    bundle.style_text = style.to_string();
    bundle.script_text = script.to_string();
    store.replace_bundle(bundle).expect("in-memory store write");
}

/// Coordinator on `address` whose page observes the coordinator's suppression flag.
pub fn coordinator_at(address: &str, store: Arc<BundleStore>) -> TestCoordinator {
    let mut coordinator =
        InjectionCoordinator::new(FakePage::at(address), RecordingRelay::default(), store);
    let handle = coordinator.suppression();
    coordinator.document_mut().observer = Some(handle);
    coordinator
}

pub fn patterns(list: &[&str]) -> Vec<String> {
    list.iter().map(|p| p.to_string()).collect()
}
