//! Error types for extraction and injection.
//!
//! Both are recovered inside the coordinator: a malformed block is skipped
//! and an injection failure leaves the page retryable.

use thiserror::Error;

/// A malformed domain block. Only the offending block is lost.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseError {
    /// An open marker was not closed before the next open marker or end of text.
    #[error("Unterminated @domain block for '{hostname}' at byte {offset}")]
    UnterminatedBlock { hostname: String, offset: usize },

    /// A close marker appeared outside any block.
    #[error("Stray @end-domain marker at byte {offset}")]
    StrayClose { offset: usize },
}

/// Failures while applying a bundle to a page.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InjectionError {
    /// The document rejected the style block write.
    #[error("Failed to write style block: {0}")]
    Style(String),

    /// The relay ran the script and it failed in the page context.
    #[error("Script execution failed: {message}")]
    Script { message: String },

    /// The relay could not be reached.
    #[error("Script relay unavailable: {0}")]
    Relay(String),

    /// The relay answered with a response for a different request.
    #[error("Relay answered request {expected} with response for {actual}")]
    RelayMismatch { expected: u64, actual: u64 },
}
