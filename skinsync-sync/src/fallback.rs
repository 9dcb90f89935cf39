//! Built-in fallback bundle.
//!
//! Seeded into an empty store when a sync cycle fails, so destinations always
//! have something to inject on first run or without connectivity.

use crate::bundle::{Bundle, BundleOrigin, VersionDescriptor};
use chrono::Utc;

/// Asset version of the built-in bundle. Any real remote version is newer.
pub const FALLBACK_VERSION: &str = "0.0.0";

const FALLBACK_STYLE: &str = include_str!("../assets/fallback.css");
const FALLBACK_SCRIPT: &str = include_str!("../assets/fallback.js");

/// Build the fallback bundle, timestamped now.
pub fn builtin_bundle() -> Bundle {
    Bundle {
        style_text: FALLBACK_STYLE.to_string(),
        script_text: FALLBACK_SCRIPT.to_string(),
        version: VersionDescriptor {
            asset_version: FALLBACK_VERSION.to_string(),
            required_host_version: "0".to_string(),
            update_url: None,
            changelog_url: None,
        },
        fetched_at: Utc::now(),
        origin: BundleOrigin::BuiltIn,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version;

    #[test]
    fn test_builtin_is_marked() {
        let bundle = builtin_bundle();
        assert!(bundle.is_builtin());
        assert!(!bundle.style_text.is_empty());
        assert!(!bundle.script_text.is_empty());
    }

    #[test]
    fn test_any_release_is_newer() {
        assert!(version::is_newer("0.0.1", FALLBACK_VERSION));
        assert!(!version::is_newer("0", FALLBACK_VERSION));
    }
}
