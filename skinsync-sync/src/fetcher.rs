//! Ordered multi-source artifact retrieval.
//!
//! Each source is an atomic unit: all three artifacts must come from the same
//! source, so a failure on any one of them abandons that source and moves on
//! to the next. Sources are tried sequentially, never raced.

use crate::error::{FetchError, TransportError};
use crate::http;
use skinsync_config::{ConfigError, SourceConfig};
use std::fmt;

/// Network seam between the fetcher and the outside world.
pub trait Transport: Send + Sync {
    /// Retrieve `url` as text, sending `credential` as a bearer token when present.
    fn get(&self, url: &str, credential: Option<&str>) -> Result<String, TransportError>;
}

impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    fn get(&self, url: &str, credential: Option<&str>) -> Result<String, TransportError> {
        (**self).get(url, credential)
    }
}

/// The three artifacts every source serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Style,
    Script,
    Version,
}

impl ArtifactKind {
    /// All artifacts, in retrieval order.
    pub const ALL: [ArtifactKind; 3] = [
        ArtifactKind::Style,
        ArtifactKind::Script,
        ArtifactKind::Version,
    ];

    /// Fixed filename under the source base URL.
    pub fn filename(&self) -> &'static str {
        match self {
            ArtifactKind::Style => "style.css",
            ArtifactKind::Script => "script.js",
            ArtifactKind::Version => "version.json",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.filename())
    }
}

/// Unparsed artifacts, all from one source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawArtifacts {
    pub style_text: String,
    pub script_text: String,
    pub version_text: String,
    /// Base URL of the source that served them
    pub base_url: String,
}

/// Retrieves bundles from an ordered source chain.
pub struct SourceFetcher<T: Transport> {
    transport: T,
}

impl<T: Transport> SourceFetcher<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Fetch all three artifacts from the first source that serves them all.
    ///
    /// # Errors
    ///
    /// - [`FetchError::Config`] if `sources` is empty
    /// - [`FetchError::AllSourcesExhausted`] carrying the last source's failure
    ///   when every source failed
    pub fn fetch_bundle(&self, sources: &[SourceConfig]) -> Result<RawArtifacts, FetchError> {
        if sources.is_empty() {
            return Err(ConfigError::EmptySources.into());
        }

        let mut last_error = None;
        for (index, source) in sources.iter().enumerate() {
            match self.fetch_from(source) {
                Ok(artifacts) => {
                    if index > 0 {
                        log::info!(
                            "Fetched bundle from fallback source #{} ({})",
                            index + 1,
                            source.base_url
                        );
                    }
                    return Ok(artifacts);
                }
                Err(e) => {
                    log::warn!("Source #{} unusable: {}", index + 1, e);
                    last_error = Some(e);
                }
            }
        }

        // Non-empty source list, so at least one error was recorded.
        let last = last_error.unwrap_or(FetchError::Config(ConfigError::EmptySources));
        Err(FetchError::AllSourcesExhausted {
            attempts: sources.len(),
            last: Box::new(last),
        })
    }

    /// Fetch the three artifacts from a single source.
    fn fetch_from(&self, source: &SourceConfig) -> Result<RawArtifacts, FetchError> {
        let credential = source.resolved_credential();
        let fetch = |artifact: ArtifactKind| -> Result<String, FetchError> {
            let url = http::artifact_url(&source.base_url, artifact.filename());
            log::debug!("GET {}", url);
            self.transport
                .get(&url, credential.as_deref())
                .map_err(|e| FetchError::Source {
                    base_url: source.base_url.clone(),
                    artifact,
                    source: e,
                })
        };

        let style_text = fetch(ArtifactKind::Style)?;
        let script_text = fetch(ArtifactKind::Script)?;
        let version_text = fetch(ArtifactKind::Version)?;

        Ok(RawArtifacts {
            style_text,
            script_text,
            version_text,
            base_url: source.base_url.clone(),
        })
    }
}
