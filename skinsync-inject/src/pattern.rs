//! Destination pattern matching.
//!
//! A pattern is a glob over the full page address: `*` matches any run of
//! characters (including none, and across `/`, `?` and `#`), everything else
//! matches literally, and the match is anchored at both ends.

use regex::Regex;
use skinsync_config::ConfigError;

/// Compiled set of destination patterns.
#[derive(Debug, Clone)]
pub struct DestinationMatcher {
    patterns: Vec<(String, Regex)>,
}

/// Translate one glob into an anchored regex source string.
fn glob_to_regex(pattern: &str) -> String {
    let body = pattern
        .split('*')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(".*");
    format!("(?s)^{body}$")
}

impl DestinationMatcher {
    /// Compile `patterns`.
    ///
    /// # Errors
    ///
    /// [`ConfigError::EmptyPatterns`] when no non-blank pattern is given.
    pub fn new(patterns: &[String]) -> Result<Self, ConfigError> {
        let mut compiled = Vec::with_capacity(patterns.len());
        for pattern in patterns.iter().map(|p| p.trim()).filter(|p| !p.is_empty()) {
            let regex = Regex::new(&glob_to_regex(pattern)).map_err(|e| {
                ConfigError::Validation(format!("destination pattern '{pattern}': {e}"))
            })?;
            compiled.push((pattern.to_string(), regex));
        }

        if compiled.is_empty() {
            return Err(ConfigError::EmptyPatterns);
        }
        Ok(Self { patterns: compiled })
    }

    /// First pattern matching `address`, if any.
    pub fn matching_pattern(&self, address: &str) -> Option<&str> {
        self.patterns
            .iter()
            .find(|(_, regex)| regex.is_match(address))
            .map(|(pattern, _)| pattern.as_str())
    }

    pub fn matches(&self, address: &str) -> bool {
        self.matching_pattern(address).is_some()
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

/// One-shot check of `address` against `patterns`.
pub fn is_destination(address: &str, patterns: &[String]) -> Result<bool, ConfigError> {
    Ok(DestinationMatcher::new(patterns)?.matches(address))
}
