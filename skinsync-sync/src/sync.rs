//! Sync orchestration: fetch, compare, store.
//!
//! One cycle moves `Idle → Fetching → (Applying | Skipping) → Idle`, or
//! `Fetching → Failed → Idle` when no source could be used. Triggers that
//! arrive while a cycle is in flight are coalesced into it. Failures never
//! touch a stored bundle; an empty store is seeded with the built-in fallback
//! so destinations always have something to inject.

use crate::bundle::{Bundle, BundleOrigin, PendingUpdate, VersionDescriptor};
use crate::error::FetchError;
use crate::fallback;
use crate::fetcher::{RawArtifacts, SourceFetcher, Transport};
use crate::http::HttpTransport;
use crate::store::{BundleStore, StoreState};
use crate::version;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use skinsync_config::Config;
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};

/// Where the orchestrator is in its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    Idle,
    Fetching,
    Applying,
    Skipping,
    Failed,
}

/// What started a cycle. Only used for logging; every trigger runs the same cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncTrigger {
    /// Process start
    Startup,
    /// First run after installation
    Installed,
    /// Recurring poll timer
    Timer,
    /// Explicit "sync now" request
    OnDemand,
}

impl fmt::Display for SyncTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SyncTrigger::Startup => "startup",
            SyncTrigger::Installed => "installed",
            SyncTrigger::Timer => "timer",
            SyncTrigger::OnDemand => "on-demand",
        };
        f.write_str(name)
    }
}

/// Result of one cycle, surfaced as data to callers and the UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// A newer bundle (or the first one) was stored
    Applied {
        /// Asset version now in the store
        version: String,
        /// Source that served it
        base_url: String,
    },
    /// The fetched bundle was not newer and was discarded
    Skipped {
        /// Asset version that was fetched
        fetched: String,
        /// Asset version kept in the store
        installed: String,
    },
    /// No usable bundle was fetched; the store's bundle was kept
    Failed {
        /// Description of the failure
        error: String,
        /// Whether the built-in fallback had to be seeded into an empty store
        seeded_fallback: bool,
    },
    /// Another cycle was already in flight; this trigger joined it
    Coalesced,
}

/// Clears the in-flight flag and returns the phase to `Idle` however the cycle ends.
struct InFlightGuard<'a> {
    flag: &'a AtomicBool,
    phase: &'a Mutex<SyncPhase>,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        *self.phase.lock() = SyncPhase::Idle;
        self.flag.store(false, AtomicOrdering::SeqCst);
    }
}

/// Drives the fetcher and owns all writes to the bundle store.
pub struct SyncOrchestrator<T: Transport = HttpTransport> {
    /// Host application version (set by the binary crate)
    host_version: String,
    fetcher: SourceFetcher<T>,
    store: Arc<BundleStore>,
    phase: Mutex<SyncPhase>,
    /// Whether a cycle is currently in progress
    in_flight: AtomicBool,
    /// Last cycle result (shared for UI access)
    last_outcome: Mutex<Option<CycleOutcome>>,
}

impl<T: Transport> SyncOrchestrator<T> {
    /// Create an orchestrator for the given host version.
    ///
    /// Pass `env!("CARGO_PKG_VERSION")` from the binary crate so required
    /// host versions are compared against the application, not this crate.
    pub fn new(host_version: impl Into<String>, transport: T, store: Arc<BundleStore>) -> Self {
        Self {
            host_version: host_version.into(),
            fetcher: SourceFetcher::new(transport),
            store,
            phase: Mutex::new(SyncPhase::Idle),
            in_flight: AtomicBool::new(false),
            last_outcome: Mutex::new(None),
        }
    }

    pub fn store(&self) -> &Arc<BundleStore> {
        &self.store
    }

    pub fn host_version(&self) -> &str {
        &self.host_version
    }

    pub fn transport(&self) -> &T {
        self.fetcher.transport()
    }

    pub fn phase(&self) -> SyncPhase {
        *self.phase.lock()
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(AtomicOrdering::SeqCst)
    }

    pub fn last_outcome(&self) -> Option<CycleOutcome> {
        self.last_outcome.lock().clone()
    }

    /// Start a cycle for `trigger` unless one is already running.
    pub fn trigger(&self, trigger: SyncTrigger, config: &Config) -> CycleOutcome {
        log::debug!("Sync triggered ({})", trigger);
        let outcome = self.run_cycle(config);
        if outcome == CycleOutcome::Coalesced {
            log::debug!("Sync trigger ({}) coalesced into in-flight cycle", trigger);
        }
        outcome
    }

    /// Run one fetch → compare → store cycle.
    ///
    /// Blocks on the network. Returns [`CycleOutcome::Coalesced`] immediately
    /// when another cycle is in flight.
    pub fn run_cycle(&self, config: &Config) -> CycleOutcome {
        if self
            .in_flight
            .compare_exchange(false, true, AtomicOrdering::SeqCst, AtomicOrdering::SeqCst)
            .is_err()
        {
            return CycleOutcome::Coalesced;
        }
        let _guard = InFlightGuard {
            flag: &self.in_flight,
            phase: &self.phase,
        };

        self.set_phase(SyncPhase::Fetching);
        let outcome = match self.fetch_and_parse(config) {
            Ok((artifacts, descriptor)) => self.adopt_or_discard(artifacts, descriptor),
            Err(error) => self.fail(error),
        };

        *self.last_outcome.lock() = Some(outcome.clone());
        outcome
    }

    /// Seed the built-in fallback if the store holds nothing at all.
    ///
    /// Returns whether seeding happened.
    pub fn seed_if_empty(&self) -> bool {
        if !self.store.is_empty() {
            return false;
        }
        let mut seeded = false;
        let result = self.store.update(|state| {
            if state.bundle.is_none() {
                state.bundle = Some(Arc::new(fallback::builtin_bundle()));
                seeded = true;
            }
        });
        if let Err(e) = result {
            log::error!("Failed to persist built-in fallback bundle: {}", e);
        }
        if seeded {
            log::info!("Seeded store with built-in fallback bundle");
        }
        seeded
    }

    fn set_phase(&self, phase: SyncPhase) {
        *self.phase.lock() = phase;
    }

    fn fetch_and_parse(
        &self,
        config: &Config,
    ) -> Result<(RawArtifacts, VersionDescriptor), CycleError> {
        let artifacts = self.fetcher.fetch_bundle(&config.sources)?;
        let descriptor = VersionDescriptor::from_json(&artifacts.version_text).map_err(|e| {
            CycleError::Descriptor {
                base_url: artifacts.base_url.clone(),
                message: e.to_string(),
            }
        })?;
        Ok((artifacts, descriptor))
    }

    fn adopt_or_discard(
        &self,
        artifacts: RawArtifacts,
        descriptor: VersionDescriptor,
    ) -> CycleOutcome {
        let now = Utc::now();
        let current = self.store.snapshot();
        let installed = current.bundle.as_deref();

        let adopt = match installed {
            None => true,
            Some(bundle) if bundle.is_builtin() => true,
            Some(bundle) => version::is_newer(&descriptor.asset_version, bundle.asset_version()),
        };
        let pending = self.pending_update_for(&descriptor, &current, now);

        let outcome = if adopt {
            self.set_phase(SyncPhase::Applying);
            log::info!(
                "Adopting bundle {} from {} (was {})",
                descriptor.asset_version,
                artifacts.base_url,
                installed.map_or("nothing", |b| b.asset_version())
            );
            CycleOutcome::Applied {
                version: descriptor.asset_version.clone(),
                base_url: artifacts.base_url.clone(),
            }
        } else {
            self.set_phase(SyncPhase::Skipping);
            let installed_version =
                installed.map_or(String::new(), |b| b.asset_version().to_string());
            log::info!(
                "Fetched bundle {} is not newer than installed {}; discarding",
                descriptor.asset_version,
                installed_version
            );
            CycleOutcome::Skipped {
                fetched: descriptor.asset_version.clone(),
                installed: installed_version,
            }
        };

        let new_bundle = adopt.then(|| Bundle {
            style_text: artifacts.style_text,
            script_text: artifacts.script_text,
            version: descriptor,
            fetched_at: now,
            origin: BundleOrigin::Remote {
                base_url: artifacts.base_url,
            },
        });

        let result = self.store.update(|state| {
            if let Some(bundle) = new_bundle {
                state.bundle = Some(Arc::new(bundle));
            }
            state.last_successful_fetch = Some(now);
            state.pending_update = pending;
        });
        if let Err(e) = result {
            log::error!("Failed to persist bundle store: {}", e);
        }

        outcome
    }

    /// Decide the pending update notice after fetching `descriptor`.
    ///
    /// A notice already pending for the same requirement keeps its original
    /// timestamp; a requirement the host satisfies clears any notice.
    fn pending_update_for(
        &self,
        descriptor: &VersionDescriptor,
        current: &StoreState,
        now: DateTime<Utc>,
    ) -> Option<PendingUpdate> {
        let existing = current.pending_update.as_ref();
        match version::compare(&descriptor.required_host_version, &self.host_version) {
            Ok(Ordering::Greater) => {
                if let Some(pending) = existing
                    && pending.required_host_version == descriptor.required_host_version
                {
                    return Some(pending.clone());
                }
                log::info!(
                    "Bundle requires host version {} (running {}); recording update notice",
                    descriptor.required_host_version,
                    self.host_version
                );
                Some(PendingUpdate {
                    required_host_version: descriptor.required_host_version.clone(),
                    update_url: descriptor.update_url.clone(),
                    changelog_url: descriptor.changelog_url.clone(),
                    noticed_at: now,
                })
            }
            Ok(_) => None,
            Err(e) => {
                log::warn!("Required host version not comparable: {}", e);
                existing.cloned()
            }
        }
    }

    fn fail(&self, error: CycleError) -> CycleOutcome {
        self.set_phase(SyncPhase::Failed);
        log::warn!("Sync cycle failed (non-fatal, keeping stored bundle): {}", error);
        let seeded_fallback = self.seed_if_empty();
        CycleOutcome::Failed {
            error: error.to_string(),
            seeded_fallback,
        }
    }
}

/// Why a cycle produced no bundle.
#[derive(Debug, thiserror::Error)]
enum CycleError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("Source '{base_url}' served an unusable version descriptor: {message}")]
    Descriptor { base_url: String, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use skinsync_config::SourceConfig;
    use std::collections::HashMap;

    const SOURCE: &str = "https://cdn.example.com/";

    #[derive(Default)]
    struct FakeTransport {
        bodies: Mutex<HashMap<String, String>>,
        calls: Mutex<usize>,
    }

    impl FakeTransport {
        fn publish(&self, version_json: &str) {
            let mut bodies = self.bodies.lock();
            bodies.insert(format!("{SOURCE}style.css"), "body{}".to_string());
            bodies.insert(format!("{SOURCE}script.js"), "void 0;".to_string());
            bodies.insert(format!("{SOURCE}version.json"), version_json.to_string());
        }
    }

    impl Transport for FakeTransport {
        fn get(&self, url: &str, _credential: Option<&str>) -> Result<String, TransportError> {
            *self.calls.lock() += 1;
            self.bodies
                .lock()
                .get(url)
                .cloned()
                .ok_or_else(|| TransportError::Network {
                    url: url.to_string(),
                    message: "offline".to_string(),
                })
        }
    }

    fn config() -> Config {
        Config::new().with_source(SourceConfig::new(SOURCE))
    }

    fn orchestrator() -> SyncOrchestrator<FakeTransport> {
        SyncOrchestrator::new(
            "1.0.0",
            FakeTransport::default(),
            Arc::new(BundleStore::in_memory()),
        )
    }

    #[test]
    fn test_first_fetch_applies() {
        let sync = orchestrator();
        sync.transport().publish(r#"{"version":"1.0.0"}"#);

        let outcome = sync.run_cycle(&config());
        assert_eq!(
            outcome,
            CycleOutcome::Applied {
                version: "1.0.0".to_string(),
                base_url: SOURCE.to_string()
            }
        );
        assert_eq!(sync.phase(), SyncPhase::Idle);
        assert!(!sync.is_in_flight());
        assert_eq!(sync.last_outcome(), Some(outcome));
        assert!(sync.store().last_successful_fetch().is_some());
    }

    #[test]
    fn test_failure_on_empty_store_seeds_fallback() {
        let sync = orchestrator();
        let outcome = sync.run_cycle(&config());
        assert!(matches!(
            outcome,
            CycleOutcome::Failed {
                seeded_fallback: true,
                ..
            }
        ));
        assert!(sync.store().current_bundle().unwrap().is_builtin());
        assert!(sync.store().last_successful_fetch().is_none());
    }

    #[test]
    fn test_no_sources_seeds_fallback() {
        let sync = orchestrator();
        let outcome = sync.run_cycle(&Config::new());
        match outcome {
            CycleOutcome::Failed {
                error,
                seeded_fallback,
            } => {
                assert!(seeded_fallback);
                assert!(error.contains("No remote sources"), "{error}");
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(*sync.transport().calls.lock(), 0);
    }

    #[test]
    fn test_fallback_replaced_by_any_release() {
        let sync = orchestrator();
        sync.run_cycle(&config());
        sync.transport().publish(r#"{"version":"0.0.1"}"#);
        assert!(matches!(sync.run_cycle(&config()), CycleOutcome::Applied { .. }));
        assert!(!sync.store().current_bundle().unwrap().is_builtin());
    }

    #[test]
    fn test_bad_descriptor_keeps_store() {
        let sync = orchestrator();
        sync.transport().publish(r#"{"version":"1.0.0"}"#);
        sync.run_cycle(&config());

        sync.transport().publish(r#"{"version":"latest"}"#);
        let outcome = sync.run_cycle(&config());
        assert!(matches!(
            outcome,
            CycleOutcome::Failed {
                seeded_fallback: false,
                ..
            }
        ));
        assert_eq!(sync.store().current_bundle().unwrap().asset_version(), "1.0.0");
    }

    #[test]
    fn test_pending_update_lifecycle() {
        let sync = orchestrator();
        sync.transport().publish(
            r#"{"version":"1.0.0","requiredHostVersion":"2.0","updateUrl":"https://example.com/get"}"#,
        );
        sync.run_cycle(&config());
        let first = sync.store().pending_update().unwrap();
        assert_eq!(first.required_host_version, "2.0");
        assert_eq!(first.update_url.as_deref(), Some("https://example.com/get"));

        // Same requirement: notice kept with its original timestamp.
        sync.run_cycle(&config());
        assert_eq!(sync.store().pending_update().unwrap().noticed_at, first.noticed_at);

        // Requirement the host satisfies clears the notice.
        sync.transport()
            .publish(r#"{"version":"1.0.1","requiredHostVersion":"1.0"}"#);
        sync.run_cycle(&config());
        assert!(sync.store().pending_update().is_none());
    }

    #[test]
    fn test_pending_update_does_not_block_adoption() {
        let sync = orchestrator();
        sync.transport()
            .publish(r#"{"version":"3.0.0","requiredHostVersion":"99"}"#);
        assert!(matches!(sync.run_cycle(&config()), CycleOutcome::Applied { .. }));
        assert!(sync.store().pending_update().is_some());
    }

    #[test]
    fn test_in_flight_trigger_is_coalesced() {
        let sync = orchestrator();
        sync.in_flight.store(true, AtomicOrdering::SeqCst);
        assert_eq!(
            sync.trigger(SyncTrigger::Timer, &config()),
            CycleOutcome::Coalesced
        );
        assert_eq!(*sync.transport().calls.lock(), 0);
    }
}
