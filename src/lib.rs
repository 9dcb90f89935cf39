//! skinsync keeps destination sites skinned with a remotely published,
//! versioned bundle of style and script text.
//!
//! The workspace crates carry the engine:
//! - `skinsync-config`: sources, destination patterns, poll interval
//! - `skinsync-sync`: multi-source fetch, version comparison, last-known-good store
//! - `skinsync-inject`: domain-block extraction and per-page injection
//!
//! This crate adds the background service, logging, and the CLI.

pub mod cli;
pub mod debug;
pub mod service;

pub use service::{BackgroundService, Envelope, HOST_VERSION, ServiceHandle};
