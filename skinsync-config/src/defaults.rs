//! Default value functions for configuration.
//!
//! Used as `#[serde(default = "crate::defaults::...")]` attributes on
//! [`Config`](crate::Config) fields and by its `Default` impl.

/// Default poll interval between sync cycles, in minutes.
pub const POLL_INTERVAL_MINUTES: u32 = 30;

/// Smallest accepted poll interval, in minutes.
pub const MIN_POLL_INTERVAL_MINUTES: u32 = 1;

/// Largest accepted poll interval (one day), in minutes.
pub const MAX_POLL_INTERVAL_MINUTES: u32 = 1440;

pub fn poll_interval_minutes() -> u32 {
    POLL_INTERVAL_MINUTES
}

/// Source chain written into a freshly created config file.
///
/// Empty: a new install has nowhere to fetch from until the user adds a source,
/// and runs on the built-in fallback bundle meanwhile.
pub fn sources() -> Vec<crate::SourceConfig> {
    Vec::new()
}

pub fn destination_patterns() -> Vec<String> {
    Vec::new()
}
