//! Domain block extraction.
//!
//! Bundle text may carry host-specific regions delimited by comment markers
//! that are valid in both CSS and JavaScript:
//!
//! ```text
//! /* @domain example.com */
//! ...host-specific rules...
//! /* @end-domain */
//! ```
//!
//! Everything outside a region is global content. Regions do not nest: an
//! open marker inside an open region terminates the first region as
//! malformed and its body is dropped.

use crate::error::ParseError;
use regex::Regex;
use std::sync::LazyLock;

/// Matches `/* @domain <host> */` (capture 1 = host) or `/* @end-domain */`.
static MARKER_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"/\*\s*@(?:domain\s+([^\s*]+)|end-domain)\s*\*/")
        .expect("domain marker regex is a compile-time constant and must be valid")
});

/// One well-formed host-specific region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainBlock {
    /// Normalized hostname from the open marker
    pub hostname: String,
    /// Text between the markers, unmodified
    pub body: String,
}

/// Bundle text split into global content and domain blocks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedText {
    /// Text with every marker and block body removed, order preserved
    pub global: String,
    pub blocks: Vec<DomainBlock>,
    pub errors: Vec<ParseError>,
}

/// Lowercase a hostname and strip a leading `www.`.
pub fn normalize_hostname(hostname: &str) -> String {
    let lower = hostname.trim().to_ascii_lowercase();
    match lower.strip_prefix("www.") {
        Some(rest) => rest.to_string(),
        None => lower,
    }
}

/// Split `raw` into global content and well-formed domain blocks.
///
/// Malformed regions are reported in [`ParsedText::errors`] and skipped.
pub fn parse_blocks(raw: &str) -> ParsedText {
    let mut parsed = ParsedText::default();
    // Start of the global span not yet copied
    let mut cursor = 0;
    // (hostname, body start, marker start) of the region being read
    let mut open: Option<(String, usize, usize)> = None;

    for caps in MARKER_PATTERN.captures_iter(raw) {
        let Some(marker) = caps.get(0) else {
            continue;
        };

        match caps.get(1) {
            Some(host) => {
                match open.take() {
                    Some((hostname, _, offset)) => {
                        parsed
                            .errors
                            .push(ParseError::UnterminatedBlock { hostname, offset });
                    }
                    None => parsed.global.push_str(&raw[cursor..marker.start()]),
                }
                open = Some((
                    normalize_hostname(host.as_str()),
                    marker.end(),
                    marker.start(),
                ));
            }
            None => {
                match open.take() {
                    Some((hostname, body_start, _)) => parsed.blocks.push(DomainBlock {
                        hostname,
                        body: raw[body_start..marker.start()].to_string(),
                    }),
                    None => {
                        parsed.global.push_str(&raw[cursor..marker.start()]);
                        parsed.errors.push(ParseError::StrayClose {
                            offset: marker.start(),
                        });
                    }
                }
                cursor = marker.end();
            }
        }
    }

    // A block left open at end of text has no known end, so everything after
    // its marker belongs to it and is dropped. Never promote it to global.
    match open {
        Some((hostname, _, offset)) => parsed
            .errors
            .push(ParseError::UnterminatedBlock { hostname, offset }),
        None => parsed.global.push_str(&raw[cursor..]),
    }

    parsed
}

/// Extract the content that applies to `hostname`, with parse diagnostics.
///
/// The result is the global content followed by the bodies of every block
/// for `hostname`, in order of appearance, each joined by a newline. With no
/// matching block the result is the global content alone.
pub fn extract_with_diagnostics(raw: &str, hostname: &str) -> (String, Vec<ParseError>) {
    let host = normalize_hostname(hostname);
    let parsed = parse_blocks(raw);

    let mut text = parsed.global;
    for block in parsed.blocks.iter().filter(|b| b.hostname == host) {
        text.push('\n');
        text.push_str(&block.body);
    }
    (text, parsed.errors)
}

/// Extract the content that applies to `hostname`.
///
/// See [`extract_with_diagnostics`]; malformed blocks are silently skipped.
pub fn extract(raw: &str, hostname: &str) -> String {
    extract_with_diagnostics(raw, hostname).0
}
