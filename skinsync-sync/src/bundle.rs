//! Bundle data model.
//!
//! Field names serialize in camelCase to match the wire format of the version
//! artifact and the persisted store layout.

use crate::error::ParseError;
use crate::version;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Required host version assumed when a descriptor omits the field.
fn default_required_host_version() -> String {
    "0".to_string()
}

/// Contents of the `version.json` artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionDescriptor {
    /// Version of the style and script text
    #[serde(rename = "version")]
    pub asset_version: String,
    /// Minimum host application version this bundle expects
    #[serde(default = "default_required_host_version")]
    pub required_host_version: String,
    /// Where the user can get the required host version (opaque)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_url: Option<String>,
    /// Release notes for the required host version (opaque)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changelog_url: Option<String>,
}

impl VersionDescriptor {
    /// Parse a descriptor from the raw `version.json` text.
    ///
    /// The asset version must be a valid dotted-numeric string: a bundle whose
    /// version can't be compared could never be superseded once stored.
    pub fn from_json(text: &str) -> Result<Self, ParseError> {
        let descriptor: VersionDescriptor = serde_json::from_str(text)
            .map_err(|e| ParseError::InvalidDescriptor(e.to_string()))?;
        version::parse_version(&descriptor.asset_version)?;
        Ok(descriptor)
    }
}

/// Where a stored bundle came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BundleOrigin {
    /// Compiled into the binary; used when no remote bundle was ever fetched.
    BuiltIn,
    /// Fetched from a configured source.
    Remote {
        /// Base URL of the source that served all three artifacts.
        #[serde(rename = "baseUrl")]
        base_url: String,
    },
}

/// One versioned set of style and script text.
///
/// Immutable once stored: a newer fetch produces a new `Bundle` that replaces
/// this one whole.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bundle {
    /// Raw style source, possibly containing domain blocks
    pub style_text: String,
    /// Raw script source, possibly containing domain blocks
    pub script_text: String,
    /// Descriptor fetched alongside the text
    pub version: VersionDescriptor,
    /// When the bundle was fetched (or built, for the fallback)
    pub fetched_at: DateTime<Utc>,
    /// Provenance of the bundle
    pub origin: BundleOrigin,
}

impl Bundle {
    pub fn is_builtin(&self) -> bool {
        matches!(self.origin, BundleOrigin::BuiltIn)
    }

    /// Asset version of the bundle text.
    pub fn asset_version(&self) -> &str {
        &self.version.asset_version
    }
}

/// A fetched bundle needs a newer host application than the running one.
///
/// Written to the store for the notification collaborator to surface; the
/// engine itself never acts on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingUpdate {
    pub required_host_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changelog_url: Option<String>,
    /// When the requirement was first seen
    pub noticed_at: DateTime<Utc>,
}
