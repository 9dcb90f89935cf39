//! Seams between the coordinator and the page it runs in.

use crate::error::InjectionError;
use crate::protocol::{RelayRequest, RelayResponse};
use skinsync_sync::{Bundle, BundleStore};
use std::sync::Arc;

/// The loaded destination document, as seen by one coordinator.
pub trait PageDocument {
    /// Full current address, including query and fragment.
    fn address(&self) -> String;

    /// Whether the coordinator's style block is still present.
    fn has_style_block(&self) -> bool;

    /// Replace the coordinator's style block, creating it at the front of the
    /// document's style order if missing.
    fn replace_style_block(&mut self, css: &str) -> Result<(), InjectionError>;

    /// Remove the coordinator's style block if present.
    fn remove_style_block(&mut self) -> Result<(), InjectionError>;

    fn has_attribute(&self, selector: &str, attribute: &str) -> bool;

    fn set_attribute(
        &mut self,
        selector: &str,
        attribute: &str,
        value: &str,
    ) -> Result<(), InjectionError>;
}

/// Privileged executor that runs script text in the page's own context.
pub trait ScriptRelay {
    /// Run `request.source` and report the outcome.
    ///
    /// `Err` means the relay itself was unreachable; a script that ran and
    /// threw is an `Ok` response with `success == false`.
    fn execute(&mut self, request: RelayRequest) -> Result<RelayResponse, InjectionError>;
}

/// Read-only access to the current bundle.
pub trait BundleSource {
    fn current_bundle(&self) -> Option<Arc<Bundle>>;
}

impl BundleSource for BundleStore {
    fn current_bundle(&self) -> Option<Arc<Bundle>> {
        BundleStore::current_bundle(self)
    }
}

impl<T: BundleSource + ?Sized> BundleSource for Arc<T> {
    fn current_bundle(&self) -> Option<Arc<Bundle>> {
        (**self).current_bundle()
    }
}
