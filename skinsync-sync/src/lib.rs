//! Background synchronization for skinsync bundles.
//!
//! Provides:
//! - `http`: HTTP agent, URL validation, and the production [`Transport`](fetcher::Transport)
//! - `fetcher`: ordered multi-source retrieval of the three bundle artifacts
//! - `version`: dotted-numeric version parsing and comparison
//! - `bundle`: the `Bundle`, `VersionDescriptor`, and `PendingUpdate` data model
//! - `fallback`: the built-in bundle seeded when nothing else is available
//! - `store`: the persistent last-known-good bundle store
//! - `sync`: the orchestrator tying fetch, compare, and store together

pub mod bundle;
pub mod error;
pub mod fallback;
pub mod fetcher;
pub mod http;
pub mod store;
pub mod sync;
pub mod version;

pub use bundle::{Bundle, BundleOrigin, PendingUpdate, VersionDescriptor};
pub use error::{FetchError, ParseError, StoreError, TransportError};
pub use fetcher::{ArtifactKind, RawArtifacts, SourceFetcher, Transport};
pub use http::HttpTransport;
pub use store::{BundleStore, FileStorage, MemoryStorage, STORE_KEY, StorageBackend, StoreState};
pub use sync::{CycleOutcome, SyncOrchestrator, SyncPhase, SyncTrigger};
