//! Per-page injection coordinator.
//!
//! One coordinator lives for the lifetime of one loaded page. It moves
//! `Unevaluated → (NotTarget | Evaluating) → (Injected | Skipped)` and
//! re-enters `Evaluating` from `Injected` on soft navigation: a fragment
//! change or a structural document mutation.
//!
//! Re-arm requests are debounced on the trailing edge (the last request
//! wins and fires once the page has been quiet for [`DEBOUNCE_WINDOW`]).
//! Mutation notifications caused by the coordinator's own writes are
//! dropped while a write is in progress and for [`SUPPRESSION_GRACE`]
//! afterwards, since observers deliver asynchronously.

use crate::error::InjectionError;
use crate::extractor::{self, normalize_hostname};
use crate::page::{BundleSource, PageDocument, ScriptRelay};
use crate::pattern::DestinationMatcher;
use crate::protocol::RelayRequest;
use sha2::{Digest, Sha256};
use skinsync_sync::Bundle;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Trailing-edge quiet period before a re-arm request fires.
pub const DEBOUNCE_WINDOW: Duration = Duration::from_millis(250);

/// How long mutation notifications stay ignored after the coordinator's own writes.
pub const SUPPRESSION_GRACE: Duration = Duration::from_millis(100);

/// Attribute marking an element whose derived UI has already been built.
pub const ENHANCED_MARKER: &str = "data-skinsync-enhanced";

/// Where a page is in its injection lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageState {
    Unevaluated,
    /// Address matched no destination pattern
    NotTarget,
    Evaluating,
    Injected,
    /// Matched, but nothing was (fully) applied
    Skipped,
}

/// Page-local record that makes re-application idempotent.
///
/// Never persisted or shared between pages.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InjectionState {
    /// Both style and script were applied for the current logical view
    pub injected: bool,
    /// Hash of the last fully applied style + script text, for inspection
    pub last_applied_hash: Option<String>,
}

impl InjectionState {
    pub fn new() -> Self {
        Self::default()
    }
}

/// The bundle subset to apply to one hostname.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InjectionPlan {
    pub style: String,
    pub script: String,
    /// SHA-256 of the style text alone
    pub style_hash: String,
    /// SHA-256 of style followed by script
    pub hash: String,
}

fn sha256_hex(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}

impl InjectionPlan {
    /// Narrow `bundle` to `hostname`, logging any malformed domain blocks.
    pub fn for_bundle(bundle: &Bundle, hostname: &str) -> Self {
        let (style, style_errors) =
            extractor::extract_with_diagnostics(&bundle.style_text, hostname);
        let (script, script_errors) =
            extractor::extract_with_diagnostics(&bundle.script_text, hostname);
        for error in style_errors.iter().chain(&script_errors) {
            log::warn!("Bundle {}: {} (block skipped)", bundle.asset_version(), error);
        }

        Self {
            style_hash: sha256_hex(&[&style]),
            hash: sha256_hex(&[&style, &script]),
            style,
            script,
        }
    }

    /// Nothing but whitespace in both texts.
    pub fn is_empty(&self) -> bool {
        self.style.trim().is_empty() && self.script.trim().is_empty()
    }
}

/// Shared view of whether the coordinator is currently writing to the document.
///
/// Clone it into a mutation observer so notifications raised during the
/// coordinator's own writes can be dropped at the source.
#[derive(Debug, Clone, Default)]
pub struct SuppressionHandle {
    writing: Arc<AtomicBool>,
}

impl SuppressionHandle {
    pub fn is_active(&self) -> bool {
        self.writing.load(Ordering::SeqCst)
    }

    fn begin(&self) -> WriteGuard {
        self.writing.store(true, Ordering::SeqCst);
        WriteGuard {
            writing: Arc::clone(&self.writing),
        }
    }
}

/// Clears the writing flag however the write ends.
struct WriteGuard {
    writing: Arc<AtomicBool>,
}

impl Drop for WriteGuard {
    fn drop(&mut self) {
        self.writing.store(false, Ordering::SeqCst);
    }
}

/// Hostname of `address`, normalized; empty when the address has none.
fn hostname_of(address: &str) -> String {
    url::Url::parse(address)
        .ok()
        .and_then(|url| url.host_str().map(normalize_hostname))
        .unwrap_or_default()
}

/// Applies the current bundle to one loaded page.
pub struct InjectionCoordinator<D, R, B> {
    document: D,
    relay: R,
    bundles: B,
    state: PageState,
    injection: InjectionState,
    /// Style hash currently in the document's style block
    applied_style_hash: Option<String>,
    next_request_id: u64,
    /// When a pending re-arm fires
    rearm_deadline: Option<Instant>,
    suppression: SuppressionHandle,
    /// End of the grace window after the last write
    suppressed_until: Option<Instant>,
}

impl<D: PageDocument, R: ScriptRelay, B: BundleSource> InjectionCoordinator<D, R, B> {
    pub fn new(document: D, relay: R, bundles: B) -> Self {
        Self {
            document,
            relay,
            bundles,
            state: PageState::Unevaluated,
            injection: InjectionState::new(),
            applied_style_hash: None,
            next_request_id: 1,
            rearm_deadline: None,
            suppression: SuppressionHandle::default(),
            suppressed_until: None,
        }
    }

    /// Start from an existing injection state instead of a fresh one.
    pub fn with_state(mut self, injection: InjectionState) -> Self {
        self.injection = injection;
        self
    }

    pub fn state(&self) -> PageState {
        self.state
    }

    pub fn injection_state(&self) -> &InjectionState {
        &self.injection
    }

    pub fn document(&self) -> &D {
        &self.document
    }

    pub fn document_mut(&mut self) -> &mut D {
        &mut self.document
    }

    pub fn relay(&self) -> &R {
        &self.relay
    }

    pub fn relay_mut(&mut self) -> &mut R {
        &mut self.relay
    }

    pub fn suppression(&self) -> SuppressionHandle {
        self.suppression.clone()
    }

    /// Whether a re-arm request is waiting for its debounce window.
    pub fn rearm_pending(&self) -> bool {
        self.rearm_deadline.is_some()
    }

    /// Evaluate `address` against `patterns` and inject if it is a destination.
    pub fn evaluate(&mut self, address: &str, patterns: &[String]) -> PageState {
        self.evaluate_at(address, patterns, Instant::now())
    }

    /// [`evaluate`](Self::evaluate) with an explicit clock reading.
    pub fn evaluate_at(&mut self, address: &str, patterns: &[String], now: Instant) -> PageState {
        let matcher = match DestinationMatcher::new(patterns) {
            Ok(matcher) => matcher,
            Err(e) => {
                log::warn!("Destination patterns unusable, treating page as non-target: {}", e);
                return self.settle(PageState::NotTarget);
            }
        };
        if !matcher.matches(address) {
            log::debug!("{} is not a destination", address);
            return self.settle(PageState::NotTarget);
        }
        if self.injection.injected {
            log::trace!("{} already injected for this view", address);
            return self.settle(PageState::Injected);
        }

        self.state = PageState::Evaluating;
        let Some(bundle) = self.bundles.current_bundle() else {
            log::info!("No bundle available yet for {}", address);
            return self.settle(PageState::Skipped);
        };

        let hostname = hostname_of(address);
        let plan = InjectionPlan::for_bundle(&bundle, &hostname);
        if plan.is_empty() {
            log::debug!(
                "Bundle {} has no content for '{}'",
                bundle.asset_version(),
                hostname
            );
            return self.settle(PageState::Skipped);
        }

        let (style_result, script_result) = {
            let _writing = self.suppression.begin();
            (self.write_style(&plan), self.run_script(&plan))
        };
        self.suppressed_until = Some(now + SUPPRESSION_GRACE);

        if let Err(e) = &style_result {
            log::warn!("Style injection failed on '{}': {}", hostname, e);
        }
        if let Err(e) = &script_result {
            log::warn!(
                "Script injection failed on '{}' (will retry on next re-evaluation): {}",
                hostname,
                e
            );
        }
        if style_result.is_err() || script_result.is_err() {
            return self.settle(PageState::Skipped);
        }

        log::info!(
            "Injected bundle {} into '{}'",
            bundle.asset_version(),
            hostname
        );
        self.injection.injected = true;
        self.injection.last_applied_hash = Some(plan.hash);
        self.settle(PageState::Injected)
    }

    /// The address fragment changed without a reload.
    pub fn on_fragment_change(&mut self, now: Instant) {
        log::debug!("Fragment change, re-arm scheduled");
        self.schedule_rearm(now);
    }

    /// The document body changed structurally.
    ///
    /// Returns whether the notification scheduled a re-arm; notifications
    /// during or just after the coordinator's own writes are dropped.
    pub fn on_document_mutation(&mut self, now: Instant) -> bool {
        if self.suppression.is_active() || self.suppressed_until.is_some_and(|until| now < until) {
            log::trace!("Ignoring self-caused document mutation");
            return false;
        }
        if !matches!(self.state, PageState::Injected | PageState::Skipped) {
            return false;
        }
        self.schedule_rearm(now);
        true
    }

    /// Fire a pending re-arm whose debounce window has elapsed.
    ///
    /// Returns the new state when a re-evaluation ran.
    pub fn poll(&mut self, patterns: &[String], now: Instant) -> Option<PageState> {
        let deadline = self.rearm_deadline?;
        if now < deadline {
            return None;
        }
        self.rearm_deadline = None;
        self.injection.injected = false;
        let address = self.document.address();
        Some(self.evaluate_at(&address, patterns, now))
    }

    /// Build derived UI on `selector` once.
    ///
    /// Skips if the element already carries [`ENHANCED_MARKER`]; otherwise runs
    /// `build` and then sets the marker. Returns whether `build` ran.
    pub fn apply_enhancement<F>(&mut self, selector: &str, build: F) -> Result<bool, InjectionError>
    where
        F: FnOnce(&mut D) -> Result<(), InjectionError>,
    {
        self.apply_enhancement_at(selector, build, Instant::now())
    }

    /// [`apply_enhancement`](Self::apply_enhancement) with an explicit clock reading.
    pub fn apply_enhancement_at<F>(
        &mut self,
        selector: &str,
        build: F,
        now: Instant,
    ) -> Result<bool, InjectionError>
    where
        F: FnOnce(&mut D) -> Result<(), InjectionError>,
    {
        if self.document.has_attribute(selector, ENHANCED_MARKER) {
            return Ok(false);
        }
        let result = {
            let _writing = self.suppression.begin();
            build(&mut self.document)
                .and_then(|()| self.document.set_attribute(selector, ENHANCED_MARKER, "true"))
        };
        self.suppressed_until = Some(now + SUPPRESSION_GRACE);
        result.map(|()| true)
    }

    fn settle(&mut self, state: PageState) -> PageState {
        self.state = state;
        state
    }

    fn schedule_rearm(&mut self, now: Instant) {
        self.rearm_deadline = Some(now + DEBOUNCE_WINDOW);
    }

    fn write_style(&mut self, plan: &InjectionPlan) -> Result<(), InjectionError> {
        if plan.style.trim().is_empty() {
            if self.document.has_style_block() {
                self.document.remove_style_block()?;
            }
            self.applied_style_hash = None;
            return Ok(());
        }
        if self.applied_style_hash.as_deref() == Some(plan.style_hash.as_str())
            && self.document.has_style_block()
        {
            log::trace!("Style unchanged, skipping write");
            return Ok(());
        }
        self.document.replace_style_block(&plan.style)?;
        self.applied_style_hash = Some(plan.style_hash.clone());
        Ok(())
    }

    fn run_script(&mut self, plan: &InjectionPlan) -> Result<(), InjectionError> {
        if plan.script.trim().is_empty() {
            return Ok(());
        }
        let id = self.next_request_id;
        self.next_request_id += 1;

        let response = self.relay.execute(RelayRequest {
            id,
            source: plan.script.clone(),
        })?;
        if response.id != id {
            return Err(InjectionError::RelayMismatch {
                expected: id,
                actual: response.id,
            });
        }
        if response.success {
            Ok(())
        } else {
            Err(InjectionError::Script {
                message: response
                    .error
                    .unwrap_or_else(|| "script reported failure".to_string()),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::RelayResponse;
    use skinsync_sync::{BundleStore, fallback};
    use std::collections::HashSet;

    const ADDRESS: &str = "https://www.a.com/app";

    #[derive(Default)]
    struct Doc {
        style: Option<String>,
        style_writes: usize,
        attributes: HashSet<(String, String)>,
        reject_style: bool,
    }

    impl PageDocument for Doc {
        fn address(&self) -> String {
            ADDRESS.to_string()
        }
        fn has_style_block(&self) -> bool {
            self.style.is_some()
        }
        fn replace_style_block(&mut self, css: &str) -> Result<(), InjectionError> {
            if self.reject_style {
                return Err(InjectionError::Style("read-only document".to_string()));
            }
            self.style = Some(css.to_string());
            self.style_writes += 1;
            Ok(())
        }
        fn remove_style_block(&mut self) -> Result<(), InjectionError> {
            self.style = None;
            Ok(())
        }
        fn has_attribute(&self, selector: &str, attribute: &str) -> bool {
            self.attributes
                .contains(&(selector.to_string(), attribute.to_string()))
        }
        fn set_attribute(
            &mut self,
            selector: &str,
            attribute: &str,
            _: &str,
        ) -> Result<(), InjectionError> {
            self.attributes
                .insert((selector.to_string(), attribute.to_string()));
            Ok(())
        }
    }

    #[derive(Default)]
    struct Relay {
        executed: Vec<RelayRequest>,
        fail_with: Option<String>,
        echo_wrong_id: bool,
    }

    impl ScriptRelay for Relay {
        fn execute(&mut self, request: RelayRequest) -> Result<RelayResponse, InjectionError> {
            let id = if self.echo_wrong_id { request.id + 1 } else { request.id };
            self.executed.push(request);
            Ok(match &self.fail_with {
                Some(error) => RelayResponse::failed(id, error.clone()),
                None => RelayResponse::ok(id),
            })
        }
    }

    fn store_with(style: &str, script: &str) -> Arc<BundleStore> {
        let store = BundleStore::in_memory();
        let mut bundle = fallback::builtin_bundle();
        bundle.style_text = style.to_string();
        bundle.script_text = script.to_string();
        store.replace_bundle(bundle).unwrap();
        Arc::new(store)
    }

    fn patterns() -> Vec<String> {
        vec!["https://www.a.com/*".to_string()]
    }

    fn coordinator(store: Arc<BundleStore>) -> InjectionCoordinator<Doc, Relay, Arc<BundleStore>> {
        InjectionCoordinator::new(Doc::default(), Relay::default(), store)
    }

    #[test]
    fn test_non_matching_address_is_not_target() {
        let mut c = coordinator(store_with("g{}", "run();"));
        assert_eq!(c.evaluate("https://b.com/", &patterns()), PageState::NotTarget);
        assert_eq!(c.document().style_writes, 0);
        assert!(c.relay().executed.is_empty());
    }

    #[test]
    fn test_empty_patterns_is_not_target() {
        let mut c = coordinator(store_with("g{}", "run();"));
        assert_eq!(c.evaluate(ADDRESS, &[]), PageState::NotTarget);
    }

    #[test]
    fn test_injects_host_subset() {
        let style = "g{}\n/* @domain a.com */a{}/* @end-domain *//* @domain b.com */b{}/* @end-domain */";
        let mut c = coordinator(store_with(style, "run();"));

        assert_eq!(c.evaluate(ADDRESS, &patterns()), PageState::Injected);
        let css = c.document().style.clone().unwrap();
        assert!(css.contains("g{}") && css.contains("a{}"));
        assert!(!css.contains("b{}"));
        assert_eq!(c.relay().executed.len(), 1);
        assert_eq!(c.relay().executed[0].source, "run();");
        assert!(c.injection_state().injected);
        assert!(c.injection_state().last_applied_hash.is_some());
    }

    #[test]
    fn test_second_evaluate_is_noop_while_injected() {
        let mut c = coordinator(store_with("g{}", "run();"));
        c.evaluate(ADDRESS, &patterns());
        assert_eq!(c.evaluate(ADDRESS, &patterns()), PageState::Injected);
        assert_eq!(c.document().style_writes, 1);
        assert_eq!(c.relay().executed.len(), 1);
    }

    #[test]
    fn test_no_bundle_is_skipped() {
        let mut c = coordinator(Arc::new(BundleStore::in_memory()));
        assert_eq!(c.evaluate(ADDRESS, &patterns()), PageState::Skipped);
    }

    #[test]
    fn test_empty_content_is_skipped() {
        let mut c = coordinator(store_with("/* @domain b.com */b{}/* @end-domain */", "  \n"));
        assert_eq!(c.evaluate(ADDRESS, &patterns()), PageState::Skipped);
        assert!(c.relay().executed.is_empty());
    }

    #[test]
    fn test_script_failure_keeps_style_and_stays_retryable() {
        let mut c = coordinator(store_with("g{}", "boom();"));
        c.relay_mut().fail_with = Some("ReferenceError: boom".to_string());

        assert_eq!(c.evaluate(ADDRESS, &patterns()), PageState::Skipped);
        assert_eq!(c.document().style.as_deref(), Some("g{}"));
        assert!(!c.injection_state().injected);

        c.relay_mut().fail_with = None;
        assert_eq!(c.evaluate(ADDRESS, &patterns()), PageState::Injected);
        assert_eq!(c.relay().executed.len(), 2);
        // Unchanged style with the block still present is not rewritten.
        assert_eq!(c.document().style_writes, 1);
    }

    #[test]
    fn test_style_failure_does_not_block_script() {
        let mut c = coordinator(store_with("g{}", "run();"));
        c.document_mut().reject_style = true;
        assert_eq!(c.evaluate(ADDRESS, &patterns()), PageState::Skipped);
        assert_eq!(c.relay().executed.len(), 1);
    }

    #[test]
    fn test_relay_id_mismatch_is_a_failure() {
        let mut c = coordinator(store_with("", "run();"));
        c.relay_mut().echo_wrong_id = true;
        assert_eq!(c.evaluate(ADDRESS, &patterns()), PageState::Skipped);
        assert!(!c.injection_state().injected);
    }

    #[test]
    fn test_request_ids_increase() {
        let mut c = coordinator(store_with("", "run();"));
        c.evaluate(ADDRESS, &patterns());
        let now = Instant::now() + Duration::from_secs(1);
        c.on_fragment_change(now);
        c.poll(&patterns(), now + DEBOUNCE_WINDOW);
        let ids: Vec<u64> = c.relay().executed.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn test_applied_hash_records_host_plan() {
        let store = store_with("g{}\n/* @domain a.com */a{}/* @end-domain */", "run();");
        let expected = InjectionPlan::for_bundle(&store.current_bundle().unwrap(), "a.com").hash;
        let mut c = coordinator(store);

        assert_eq!(c.injection_state().last_applied_hash, None);
        c.evaluate(ADDRESS, &patterns());
        assert_eq!(c.injection_state().last_applied_hash, Some(expected));
    }

    #[test]
    fn test_enhancement_grace_uses_caller_clock() {
        let mut c = coordinator(store_with("g{}", ""));
        let t0 = Instant::now() + Duration::from_secs(60);
        c.evaluate_at(ADDRESS, &patterns(), t0);

        let at = t0 + Duration::from_secs(5);
        assert!(c.apply_enhancement_at("#subject", |_| Ok(()), at).unwrap());
        assert!(!c.on_document_mutation(at + SUPPRESSION_GRACE - Duration::from_millis(1)));
        assert!(c.on_document_mutation(at + SUPPRESSION_GRACE));
    }

    #[test]
    fn test_preinjected_state_skips_application() {
        let state = InjectionState {
            injected: true,
            last_applied_hash: None,
        };
        let mut c = coordinator(store_with("g{}", "run();")).with_state(state);
        assert_eq!(c.evaluate(ADDRESS, &patterns()), PageState::Injected);
        assert!(c.relay().executed.is_empty());
    }
}
