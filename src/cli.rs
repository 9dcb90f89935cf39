//! Command-line interface for skinsync.
//!
//! Every subcommand goes through the same [`BackgroundService`] the `run`
//! loop uses, so the CLI observes exactly what a page or settings UI would.

use crate::service::{BackgroundService, HOST_VERSION, ServiceHandle};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use log::LevelFilter;
use serde::Serialize;
use skinsync_config::{Config, ConfigSource, FileConfigSource};
use skinsync_inject::{BackgroundRequest, BackgroundResponse, ResponsePayload, extract};
use skinsync_sync::{
    BundleStore, CycleOutcome, FileStorage, HttpTransport, SyncOrchestrator, SyncTrigger,
};
use std::path::PathBuf;
use std::sync::Arc;

/// skinsync - keep destination sites skinned with a remote style/script bundle
#[derive(Parser)]
#[command(name = "skinsync")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (default: ~/.config/skinsync/config.yaml)
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Log level (takes precedence over RUST_LOG)
    #[arg(long, value_enum, value_name = "LEVEL", global = true)]
    pub log_level: Option<LogLevel>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run one sync cycle now
    Sync,

    /// Run the background service (startup sync plus recurring timer) until Ctrl-C
    Run,

    /// Print the stored bundle and any pending update notice as JSON
    Show,

    /// Print the part of the stored bundle that applies to a host
    Extract {
        /// Destination hostname (a leading `www.` is ignored)
        #[arg(long)]
        host: String,

        /// Which artifact to extract from
        #[arg(long, value_enum, default_value_t = ArtifactChoice::Style)]
        kind: ArtifactChoice,
    },

    /// Check whether a page address is a configured destination
    Match {
        /// Full address including query and fragment
        address: String,
    },

    /// Answer one JSON-encoded background request, e.g. '{"type":"CurrentBundle"}'
    Request {
        json: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn to_filter(self) -> LevelFilter {
        match self {
            LogLevel::Off => LevelFilter::Off,
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ArtifactChoice {
    Style,
    Script,
}

/// Service wired to the real network and the on-disk store.
pub fn build_service(config: impl ConfigSource + 'static) -> BackgroundService {
    let store = Arc::new(BundleStore::open(FileStorage::new(Config::data_dir())));
    let orchestrator = Arc::new(SyncOrchestrator::new(
        HOST_VERSION,
        HttpTransport::new(),
        store,
    ));
    BackgroundService::new(orchestrator, Arc::new(config))
}

fn print_json(value: &impl Serialize) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to encode output")?;
    println!("{json}");
    Ok(())
}

/// Run the parsed command. Returns the process exit code.
pub async fn execute(cli: Cli) -> Result<i32> {
    let config = match &cli.config {
        Some(path) => FileConfigSource::new(path),
        None => FileConfigSource::default_path(),
    };
    log::debug!("Using config file {}", config.path().display());
    let service = build_service(config);

    match cli.command {
        Commands::Sync => {
            let outcome = service.sync(SyncTrigger::OnDemand).await?;
            let installed = service.store().current_bundle();
            print_json(&BackgroundResponse::from_outcome(
                &outcome,
                installed.as_deref().map(|b| b.asset_version()),
            ))?;
            Ok(i32::from(matches!(outcome, CycleOutcome::Failed { .. })))
        }
        Commands::Run => {
            let (_handle, requests) = ServiceHandle::channel();
            service
                .run(requests, async {
                    if let Err(e) = tokio::signal::ctrl_c().await {
                        log::error!("Failed to listen for Ctrl-C: {}", e);
                    }
                })
                .await?;
            Ok(0)
        }
        Commands::Show => {
            print_json(&service.handle(BackgroundRequest::CurrentBundle {}).await)?;
            Ok(0)
        }
        Commands::Extract { host, kind } => {
            let Some(bundle) = service.store().current_bundle() else {
                eprintln!("No bundle stored yet; run `skinsync sync` first");
                return Ok(1);
            };
            let raw = match kind {
                ArtifactChoice::Style => &bundle.style_text,
                ArtifactChoice::Script => &bundle.script_text,
            };
            println!("{}", extract(raw, &host));
            Ok(0)
        }
        Commands::Match { address } => {
            let response = service
                .handle(BackgroundRequest::IsDestination { address })
                .await;
            print_json(&response)?;
            let matched = matches!(
                response.payload,
                Some(ResponsePayload::Destination { matches: true })
            );
            Ok(i32::from(!matched))
        }
        Commands::Request { json } => {
            println!("{}", service.handle_json(&json).await);
            Ok(0)
        }
    }
}
