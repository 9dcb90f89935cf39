//! Dotted-numeric version comparison.
//!
//! Versions are dot-separated non-negative integers of any arity. Shorter
//! sequences compare as if zero-padded, so `1.0` and `1.0.0` are equal.
//! Unparsable input never counts as newer.

use crate::error::ParseError;
use std::cmp::Ordering;
use std::fmt;

/// A parsed version: one integer per dotted component.
#[derive(Debug, Clone)]
pub struct Version {
    components: Vec<u64>,
}

impl Version {
    pub fn components(&self) -> &[u64] {
        &self.components
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.components.len().max(other.components.len());
        for i in 0..len {
            let a = self.components.get(i).copied().unwrap_or(0);
            let b = other.components.get(i).copied().unwrap_or(0);
            match a.cmp(&b) {
                Ordering::Equal => continue,
                decided => return decided,
            }
        }
        Ordering::Equal
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.components.iter().map(u64::to_string).collect();
        write!(f, "{}", parts.join("."))
    }
}

impl std::str::FromStr for Version {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_version(s)
    }
}

/// Parse a dotted-numeric version string.
///
/// Surrounding whitespace and a single leading `v` (as in release tags) are
/// accepted. Every component must be one or more ASCII digits.
pub fn parse_version(input: &str) -> Result<Version, ParseError> {
    let invalid = |reason: String| ParseError::InvalidVersion {
        input: input.to_string(),
        reason,
    };

    let trimmed = input.trim();
    let trimmed = trimmed.strip_prefix('v').unwrap_or(trimmed);
    if trimmed.is_empty() {
        return Err(invalid("empty version".to_string()));
    }

    let mut components = Vec::new();
    for (index, part) in trimmed.split('.').enumerate() {
        if part.is_empty() {
            return Err(invalid(format!("component {} is empty", index + 1)));
        }
        // u64::from_str accepts a leading '+', which is not a version digit.
        if !part.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid(format!(
                "component {} ('{}') is not a non-negative integer",
                index + 1,
                part
            )));
        }
        let value = part.parse::<u64>().map_err(|e| {
            invalid(format!("component {} ('{}'): {}", index + 1, part, e))
        })?;
        components.push(value);
    }

    Ok(Version { components })
}

/// Compare two version strings component-wise.
pub fn compare(a: &str, b: &str) -> Result<Ordering, ParseError> {
    Ok(parse_version(a)?.cmp(&parse_version(b)?))
}

/// Whether `candidate` is strictly newer than `installed`.
///
/// Returns `false` when either side fails to parse; the condition is logged
/// rather than raised, so a malformed remote version never triggers an
/// update.
pub fn is_newer(candidate: &str, installed: &str) -> bool {
    match compare(candidate, installed) {
        Ok(ordering) => ordering == Ordering::Greater,
        Err(e) => {
            log::warn!("Version comparison skipped: {}", e);
            false
        }
    }
}
