//! JSON message types crossing the page/background boundary and the
//! coordinator/relay boundary.
//!
//! Pages and on-demand controls send a [`BackgroundRequest`] and receive
//! exactly one [`BackgroundResponse`]. No error crosses the boundary as
//! anything but data: every response carries `success` and `error`.

use serde::{Deserialize, Serialize};
use skinsync_sync::{Bundle, CycleOutcome, PendingUpdate};

/// A request sent to the background process.
///
/// Tagged with `type` for easy JSON dispatch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum BackgroundRequest {
    /// Run a sync cycle now.
    SyncNow {},

    /// Return the current bundle and any pending update notice.
    CurrentBundle {},

    /// Check whether an address is a configured destination.
    IsDestination {
        /// Full page address including query and fragment.
        address: String,
    },
}

/// Request-specific response data.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind")]
pub enum ResponsePayload {
    /// Result of a `SyncNow` request.
    Synced {
        /// One of `applied`, `skipped`, `failed`, `coalesced`.
        status: String,
        /// Asset version in the store after the cycle, when known.
        version: Option<String>,
    },

    /// Result of a `CurrentBundle` request.
    Bundle {
        bundle: Option<Bundle>,
        pending_update: Option<PendingUpdate>,
    },

    /// Result of an `IsDestination` request.
    Destination {
        matches: bool,
    },
}

/// The single response to a [`BackgroundRequest`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BackgroundResponse {
    pub success: bool,
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<ResponsePayload>,
}

impl BackgroundResponse {
    pub fn ok(payload: ResponsePayload) -> Self {
        Self {
            success: true,
            error: None,
            payload: Some(payload),
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            payload: None,
        }
    }

    /// Describe a finished sync cycle.
    ///
    /// A failed cycle is still answered with its payload so callers can see
    /// which version stayed installed.
    pub fn from_outcome(outcome: &CycleOutcome, installed: Option<&str>) -> Self {
        let installed = installed.map(str::to_string);
        let (status, version, error) = match outcome {
            CycleOutcome::Applied { version, .. } => ("applied", Some(version.clone()), None),
            CycleOutcome::Skipped { installed, .. } => {
                ("skipped", Some(installed.clone()), None)
            }
            CycleOutcome::Failed { error, .. } => ("failed", installed, Some(error.clone())),
            CycleOutcome::Coalesced => ("coalesced", installed, None),
        };
        Self {
            success: error.is_none(),
            error,
            payload: Some(ResponsePayload::Synced {
                status: status.to_string(),
                version,
            }),
        }
    }
}

/// Script text handed to the privileged relay for execution in the page context.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RelayRequest {
    /// Correlates the response with this request.
    pub id: u64,
    /// Script source to run.
    pub source: String,
}

/// The relay's report for one [`RelayRequest`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RelayResponse {
    pub id: u64,
    pub success: bool,
    pub error: Option<String>,
}

impl RelayResponse {
    pub fn ok(id: u64) -> Self {
        Self {
            id,
            success: true,
            error: None,
        }
    }

    pub fn failed(id: u64, error: impl Into<String>) -> Self {
        Self {
            id,
            success: false,
            error: Some(error.into()),
        }
    }
}
