//! Persistent last-known-good bundle store.
//!
//! The store owns the current [`Bundle`], the last successful fetch time, and
//! any pending update notice. Readers take an `Arc` snapshot of the whole
//! state; writers build a new state and swap it in, so a reader can never
//! observe a half-written bundle.
//!
//! The record is persisted as JSON under [`STORE_KEY`] so a restart recovers
//! the last-known-good bundle without a network round trip.

use crate::bundle::{Bundle, PendingUpdate};
use crate::error::StoreError;
use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Stable key the store record is persisted under.
pub const STORE_KEY: &str = "skinsync.bundle";

/// Key/value persistence used by [`BundleStore`].
pub trait StorageBackend: Send + Sync {
    /// Read the value stored under `key`, if any.
    fn read(&self, key: &str) -> std::io::Result<Option<String>>;
    /// Replace the value stored under `key`.
    fn write(&self, key: &str, value: &str) -> std::io::Result<()>;
}

/// One JSON file per key inside a directory.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl StorageBackend for FileStorage {
    fn read(&self, key: &str) -> std::io::Result<Option<String>> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Uses atomic write pattern: writes to a temp file first, then renames
    /// to the final path, so a failed write never corrupts the stored record.
    fn write(&self, key: &str, value: &str) -> std::io::Result<()> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(key);
        let temp_path = self.dir.join(format!("{key}.json.tmp"));
        fs::write(&temp_path, value)?;
        fs::rename(&temp_path, &path)
    }
}

/// Process-local storage for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StorageBackend for MemoryStorage {
    fn read(&self, key: &str) -> std::io::Result<Option<String>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> std::io::Result<()> {
        self.entries.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }
}

impl<S: StorageBackend + ?Sized> StorageBackend for Arc<S> {
    fn read(&self, key: &str) -> std::io::Result<Option<String>> {
        (**self).read(key)
    }

    fn write(&self, key: &str, value: &str) -> std::io::Result<()> {
        (**self).write(key, value)
    }
}

/// Everything the store holds, swapped as one unit.
#[derive(Debug, Clone, Default)]
pub struct StoreState {
    /// Current bundle, shared with readers
    pub bundle: Option<Arc<Bundle>>,
    /// Last time a fetch cycle retrieved artifacts, whether or not they were adopted
    pub last_successful_fetch: Option<DateTime<Utc>>,
    /// Requirement for a newer host application, if one was noticed
    pub pending_update: Option<PendingUpdate>,
}

/// On-disk layout of [`StoreState`].
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PersistedRecord {
    #[serde(default)]
    bundle: Option<Bundle>,
    /// SHA-256 over the bundle's style text followed by its script text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    content_hash: Option<String>,
    #[serde(default)]
    last_successful_fetch: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pending_update: Option<PendingUpdate>,
}

/// Compute the lowercase hex SHA-256 of a bundle's text content.
pub fn content_hash(bundle: &Bundle) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bundle.style_text.as_bytes());
    hasher.update(bundle.script_text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Persistent store for the current bundle.
pub struct BundleStore {
    state: ArcSwap<StoreState>,
    backend: Box<dyn StorageBackend>,
    /// Serializes writers so concurrent updates can't lose each other's changes
    write_lock: Mutex<()>,
}

impl std::fmt::Debug for BundleStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BundleStore")
            .field("state", &self.state.load_full())
            .finish_non_exhaustive()
    }
}

impl BundleStore {
    /// Open the store, recovering any persisted record.
    ///
    /// An unreadable, unparsable, or hash-mismatched record is logged and
    /// discarded; the store then starts empty rather than failing.
    pub fn open(backend: impl StorageBackend + 'static) -> Self {
        let state = Self::recover(&backend);
        Self {
            state: ArcSwap::from_pointee(state),
            backend: Box::new(backend),
            write_lock: Mutex::new(()),
        }
    }

    /// Store with no persistence beyond this process.
    pub fn in_memory() -> Self {
        Self::open(MemoryStorage::new())
    }

    fn recover(backend: &dyn StorageBackend) -> StoreState {
        let raw = match backend.read(STORE_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return StoreState::default(),
            Err(e) => {
                log::warn!("Failed to read persisted bundle store: {}", e);
                return StoreState::default();
            }
        };

        let record: PersistedRecord = match serde_json::from_str(&raw) {
            Ok(record) => record,
            Err(e) => {
                log::warn!("Discarding unparsable bundle store record: {}", e);
                return StoreState::default();
            }
        };

        let bundle = match (record.bundle, record.content_hash) {
            (Some(bundle), Some(expected)) if content_hash(&bundle) != expected => {
                log::warn!(
                    "Discarding persisted bundle {}: content hash mismatch",
                    bundle.asset_version()
                );
                None
            }
            (bundle, _) => bundle,
        };

        if let Some(ref bundle) = bundle {
            log::info!(
                "Recovered bundle {} fetched at {}",
                bundle.asset_version(),
                bundle.fetched_at.to_rfc3339()
            );
        }

        StoreState {
            bundle: bundle.map(Arc::new),
            last_successful_fetch: record.last_successful_fetch,
            pending_update: record.pending_update,
        }
    }

    /// Snapshot of the whole store state.
    pub fn snapshot(&self) -> Arc<StoreState> {
        self.state.load_full()
    }

    /// Current bundle, if any.
    pub fn current_bundle(&self) -> Option<Arc<Bundle>> {
        self.state.load().bundle.clone()
    }

    pub fn is_empty(&self) -> bool {
        self.state.load().bundle.is_none()
    }

    pub fn pending_update(&self) -> Option<PendingUpdate> {
        self.state.load().pending_update.clone()
    }

    pub fn last_successful_fetch(&self) -> Option<DateTime<Utc>> {
        self.state.load().last_successful_fetch
    }

    /// Replace the current bundle whole.
    pub fn replace_bundle(&self, bundle: Bundle) -> Result<(), StoreError> {
        self.update(|state| state.bundle = Some(Arc::new(bundle)))
    }

    /// Apply `change` to a copy of the state, swap it in, then persist it.
    ///
    /// The in-memory swap happens even when persistence fails: serving the
    /// new bundle for the rest of this process beats serving nothing. The
    /// persistence error is still returned.
    pub fn update<F>(&self, change: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut StoreState),
    {
        let _guard = self.write_lock.lock();
        let mut next = StoreState::clone(&self.state.load());
        change(&mut next);
        let next = Arc::new(next);
        self.state.store(Arc::clone(&next));
        self.persist(&next)
    }

    fn persist(&self, state: &StoreState) -> Result<(), StoreError> {
        let record = PersistedRecord {
            bundle: state.bundle.as_deref().cloned(),
            content_hash: state.bundle.as_deref().map(content_hash),
            last_successful_fetch: state.last_successful_fetch,
            pending_update: state.pending_update.clone(),
        };
        let json = serde_json::to_string_pretty(&record)?;
        self.backend.write(STORE_KEY, &json)?;
        Ok(())
    }
}
