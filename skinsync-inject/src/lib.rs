//! Per-page injection for skinsync bundles.
//!
//! Provides domain-block extraction of the bundle subset relevant to one
//! destination, destination matching, the page/background message protocol,
//! and the per-page injection coordinator with its re-arm debounce and
//! self-mutation suppression.

pub mod coordinator;
pub mod error;
pub mod extractor;
pub mod page;
pub mod pattern;
pub mod protocol;

pub use coordinator::{
    DEBOUNCE_WINDOW, ENHANCED_MARKER, InjectionCoordinator, InjectionPlan, InjectionState,
    PageState, SUPPRESSION_GRACE, SuppressionHandle,
};
pub use error::{InjectionError, ParseError};
pub use extractor::{
    DomainBlock, ParsedText, extract, extract_with_diagnostics, normalize_hostname, parse_blocks,
};
pub use page::{BundleSource, PageDocument, ScriptRelay};
pub use pattern::{DestinationMatcher, is_destination};
pub use protocol::{
    BackgroundRequest, BackgroundResponse, RelayRequest, RelayResponse, ResponsePayload,
};
