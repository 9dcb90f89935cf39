//! Typed error types for skinsync-sync.
//!
//! None of these cross the orchestrator boundary as errors: fetch and parse
//! failures are logged and folded into a [`CycleOutcome`](crate::CycleOutcome).

use crate::fetcher::ArtifactKind;
use skinsync_config::ConfigError;
use thiserror::Error;

/// A single artifact request failed.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The URL was rejected before any request was made.
    #[error("Invalid source URL '{url}': {reason}")]
    InvalidUrl {
        /// The offending URL.
        url: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The server answered with a non-success status.
    #[error("HTTP {status} from '{url}'")]
    Status {
        /// Requested URL.
        url: String,
        /// HTTP status code.
        status: u16,
    },

    /// DNS, connection, TLS, or timeout failure.
    #[error("Request to '{url}' failed: {message}")]
    Network {
        /// Requested URL.
        url: String,
        /// Underlying error description.
        message: String,
    },

    /// The response body could not be read or exceeded the size limit.
    #[error("Failed to read body from '{url}': {message}")]
    Body {
        /// Requested URL.
        url: String,
        /// Underlying error description.
        message: String,
    },
}

/// Retrieving a bundle from the configured source chain failed.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The source list was empty or otherwise unusable.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// One artifact from one source failed; the whole source is abandoned.
    #[error("Source '{base_url}' failed fetching {artifact}: {source}")]
    Source {
        /// Base URL of the abandoned source.
        base_url: String,
        /// Which artifact failed.
        artifact: ArtifactKind,
        /// Underlying transport failure.
        #[source]
        source: TransportError,
    },

    /// Every configured source failed.
    #[error("All {attempts} source(s) exhausted; last error: {last}")]
    AllSourcesExhausted {
        /// Number of sources tried.
        attempts: usize,
        /// The failure of the final source.
        last: Box<FetchError>,
    },
}

/// Malformed version string or version descriptor.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseError {
    /// A version string is not dot-separated non-negative integers.
    #[error("Invalid version '{input}': {reason}")]
    InvalidVersion {
        /// The rejected input.
        input: String,
        /// Description of the first bad component.
        reason: String,
    },

    /// The version artifact is not a valid descriptor document.
    #[error("Invalid version descriptor: {0}")]
    InvalidDescriptor(String),
}

/// Persisting the bundle store failed.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Reading or writing the backing storage failed.
    #[error("Bundle store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The store record could not be serialized.
    #[error("Bundle store serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}
