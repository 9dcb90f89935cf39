//! Background service: owns the orchestrator and answers page requests.
//!
//! The service loop is cooperative. A sync cycle runs to completion on the
//! blocking pool before the next timer tick or request is serviced, and each
//! request gets exactly one response. Configuration is re-read from the
//! [`ConfigSource`] on every cycle and every request.

use anyhow::{Context, Result};
use skinsync_config::{Config, ConfigSource};
use skinsync_inject::{BackgroundRequest, BackgroundResponse, ResponsePayload, is_destination};
use skinsync_sync::{
    BundleStore, CycleOutcome, HttpTransport, SyncOrchestrator, SyncTrigger, Transport,
};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;

/// Version of the running host application.
pub const HOST_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Pending requests the service loop will buffer before senders wait.
const REQUEST_QUEUE_DEPTH: usize = 32;

/// A request paired with the channel its single response goes back on.
pub struct Envelope {
    pub request: BackgroundRequest,
    pub reply: oneshot::Sender<BackgroundResponse>,
}

/// Client side of a running service loop.
#[derive(Clone)]
pub struct ServiceHandle {
    tx: mpsc::Sender<Envelope>,
}

impl ServiceHandle {
    /// Create a handle and the receiver to pass to [`BackgroundService::run`].
    pub fn channel() -> (Self, mpsc::Receiver<Envelope>) {
        let (tx, rx) = mpsc::channel(REQUEST_QUEUE_DEPTH);
        (Self { tx }, rx)
    }

    /// Send `request` and wait for its response.
    pub async fn request(&self, request: BackgroundRequest) -> Result<BackgroundResponse> {
        let (reply, response) = oneshot::channel();
        self.tx
            .send(Envelope { request, reply })
            .await
            .map_err(|_| anyhow::anyhow!("Background service is not running"))?;
        response
            .await
            .context("Background service dropped the request")
    }
}

/// Last-resort response line when a response cannot be serialized.
fn encoding_failure(error: impl std::fmt::Display) -> String {
    serde_json::json!({
        "success": false,
        "error": format!("Failed to encode response: {error}"),
    })
    .to_string()
}

/// The long-lived background process.
pub struct BackgroundService<T: Transport + 'static = HttpTransport> {
    orchestrator: Arc<SyncOrchestrator<T>>,
    config: Arc<dyn ConfigSource>,
}

impl<T: Transport + 'static> BackgroundService<T> {
    pub fn new(orchestrator: Arc<SyncOrchestrator<T>>, config: Arc<dyn ConfigSource>) -> Self {
        Self {
            orchestrator,
            config,
        }
    }

    pub fn orchestrator(&self) -> &Arc<SyncOrchestrator<T>> {
        &self.orchestrator
    }

    pub fn store(&self) -> &Arc<BundleStore> {
        self.orchestrator.store()
    }

    /// Run one sync cycle on the blocking pool.
    ///
    /// An unreadable configuration fails the cycle before any fetch, but an
    /// empty store is still seeded with the built-in fallback.
    pub async fn sync(&self, trigger: SyncTrigger) -> Result<CycleOutcome> {
        let config = match self.config.current() {
            Ok(config) => config,
            Err(e) => {
                self.orchestrator.seed_if_empty();
                return Err(e.context("Failed to read configuration for sync"));
            }
        };

        let orchestrator = Arc::clone(&self.orchestrator);
        tokio::task::spawn_blocking(move || orchestrator.trigger(trigger, &config))
            .await
            .context("Sync cycle task panicked")
    }

    /// Answer one request. Never fails: errors become `success: false`.
    pub async fn handle(&self, request: BackgroundRequest) -> BackgroundResponse {
        match request {
            BackgroundRequest::SyncNow {} => match self.sync(SyncTrigger::OnDemand).await {
                Ok(outcome) => {
                    let installed = self.store().current_bundle();
                    BackgroundResponse::from_outcome(
                        &outcome,
                        installed.as_deref().map(|b| b.asset_version()),
                    )
                }
                Err(e) => BackgroundResponse::failure(format!("{e:#}")),
            },
            BackgroundRequest::CurrentBundle {} => {
                let snapshot = self.store().snapshot();
                BackgroundResponse::ok(ResponsePayload::Bundle {
                    bundle: snapshot.bundle.as_deref().cloned(),
                    pending_update: snapshot.pending_update.clone(),
                })
            }
            BackgroundRequest::IsDestination { address } => {
                let matches = self.config.current().and_then(|config| {
                    is_destination(&address, &config.destination_patterns)
                        .map_err(anyhow::Error::from)
                });
                match matches {
                    Ok(matches) => BackgroundResponse::ok(ResponsePayload::Destination { matches }),
                    Err(e) => BackgroundResponse::failure(format!("{e:#}")),
                }
            }
        }
    }

    /// Answer one JSON-encoded request with a JSON-encoded response.
    pub async fn handle_json(&self, line: &str) -> String {
        let response = match serde_json::from_str::<BackgroundRequest>(line) {
            Ok(request) => self.handle(request).await,
            Err(e) => BackgroundResponse::failure(format!("Malformed request: {e}")),
        };
        serde_json::to_string(&response).unwrap_or_else(encoding_failure)
    }

    /// Current poll interval, falling back to the default when config is unreadable.
    fn poll_interval(&self) -> Duration {
        match self.config.current() {
            Ok(config) => config.poll_interval(),
            Err(e) => {
                log::warn!("Using default poll interval: {:#}", e);
                Config::default().poll_interval()
            }
        }
    }

    /// Run the startup cycle, then serve timer ticks and requests until `shutdown`.
    pub async fn run(
        &self,
        mut requests: mpsc::Receiver<Envelope>,
        shutdown: impl Future<Output = ()>,
    ) -> Result<()> {
        tokio::pin!(shutdown);

        let startup = if self.store().is_empty() {
            SyncTrigger::Installed
        } else {
            SyncTrigger::Startup
        };
        self.log_cycle(startup).await;

        let mut next_tick = Instant::now() + self.poll_interval();
        log::info!(
            "Background service running; next sync in {}s",
            self.poll_interval().as_secs()
        );

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    log::info!("Background service shutting down");
                    break;
                }
                _ = tokio::time::sleep_until(next_tick) => {
                    self.log_cycle(SyncTrigger::Timer).await;
                    next_tick = Instant::now() + self.poll_interval();
                }
                Some(envelope) = requests.recv() => {
                    let response = self.handle(envelope.request).await;
                    if envelope.reply.send(response).is_err() {
                        log::debug!("Requester went away before its response was sent");
                    }
                }
            }
        }
        Ok(())
    }

    async fn log_cycle(&self, trigger: SyncTrigger) {
        match self.sync(trigger).await {
            Ok(outcome) => log::debug!("Sync ({}) finished: {:?}", trigger, outcome),
            Err(e) => log::warn!("Sync ({}) did not run: {:#}", trigger, e),
        }
    }
}
