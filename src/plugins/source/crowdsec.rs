//! CrowdSec local API stream client
//!
//! Keeps an in-memory copy of the active decisions by polling
//! `/v1/decisions/stream`. The first pull (`startup=true`) returns every
//! active decision; later pulls (`startup=false`) only return what changed
//! since the previous one.
//!
//! # Example
//!
//! ```ignore
//! use galle_bouncer::plugins::source::{CrowdSecConfig, CrowdSecStreamClient, DecisionSource};
//!
//! let client = CrowdSecStreamClient::new(CrowdSecConfig::from(&sync_config), http);
//! client.establish().await?;
//! println!("{} active bans", client.current_decisions().len());
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::config::SyncConfig;
use crate::error::SourceError;
use crate::models::{DecisionSet, DecisionStream};
use crate::sync::HttpClient;

use super::DecisionSource;

/// Path of the streaming endpoint, relative to the LAPI URL
pub const STREAM_PATH: &str = "v1/decisions/stream";

/// CrowdSec stream client configuration
#[derive(Debug, Clone)]
pub struct CrowdSecConfig {
    /// Base URL of the local API
    pub lapi_url: String,
    /// Bouncer API key
    pub api_key: String,
    /// Delay between two delta pulls
    pub pull_interval: Duration,
    /// Decision scopes to keep
    pub scopes: Vec<String>,
    /// Decision types to keep
    pub decision_types: Vec<String>,
}

impl From<&SyncConfig> for CrowdSecConfig {
    fn from(config: &SyncConfig) -> Self {
        Self {
            lapi_url: config.crowdsec_lapi_url.clone(),
            api_key: config.crowdsec_api_key.clone(),
            pull_interval: config.poll_interval,
            scopes: config.stream.scopes.clone(),
            decision_types: config.stream.decision_types.clone(),
        }
    }
}

/// State shared with the background refresh task
#[derive(Debug)]
struct StreamState {
    config: CrowdSecConfig,
    http: HttpClient,
    decisions: RwLock<DecisionSet>,
}

impl StreamState {
    fn stream_url(&self) -> String {
        format!(
            "{}/{}",
            self.config.lapi_url.trim_end_matches('/'),
            STREAM_PATH
        )
    }

    /// Fetch one batch and merge it into the set
    async fn pull(&self, startup: bool) -> Result<(), SourceError> {
        let body = self
            .http
            .get_with_api_key(
                &self.stream_url(),
                &self.config.api_key,
                &[("startup", if startup { "true" } else { "false" })],
            )
            .await?;

        let stream: DecisionStream = serde_json::from_slice(&body)
            .map_err(|e| SourceError::Other(format!("Malformed decision stream: {}", e)))?;

        self.apply(stream, startup, Utc::now());
        Ok(())
    }

    /// Merge a batch: deletions first, then the additions that pass the filters
    ///
    /// A startup batch is the full state, so it replaces the set.
    fn apply(&self, stream: DecisionStream, startup: bool, now: DateTime<Utc>) {
        let mut decisions = self
            .decisions
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        if startup {
            *decisions = DecisionSet::new();
        }

        let mut removed = 0usize;
        for decision in stream.deleted.unwrap_or_default() {
            if decisions.remove(&decision.value).is_some() {
                removed += 1;
            }
        }

        let mut added = 0usize;
        for decision in stream.new.unwrap_or_default() {
            if !decision.matches(&self.config.scopes, &self.config.decision_types) {
                debug!(
                    ip = %decision.value,
                    scope = %decision.scope,
                    decision_type = %decision.decision_type,
                    "Skipping decision"
                );
                continue;
            }
            decisions.insert(decision.with_expiry_from(now));
            added += 1;
        }

        if added > 0 || removed > 0 {
            info!(
                added = added,
                removed = removed,
                total = decisions.len(),
                "Decisions updated"
            );
        }
    }
}

/// CrowdSec LAPI stream client
pub struct CrowdSecStreamClient {
    state: Arc<StreamState>,
    started: AtomicBool,
    shutdown_tx: broadcast::Sender<()>,
}

impl CrowdSecStreamClient {
    /// Create a new client; nothing is fetched until [`DecisionSource::establish`]
    pub fn new(config: CrowdSecConfig, http: HttpClient) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            state: Arc::new(StreamState {
                config,
                http,
                decisions: RwLock::new(DecisionSet::new()),
            }),
            started: AtomicBool::new(false),
            shutdown_tx,
        }
    }

    /// Get the client configuration
    pub fn config(&self) -> &CrowdSecConfig {
        &self.state.config
    }

    /// Stop the background refresh task
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    fn spawn_refresh(&self) {
        let state = self.state.clone();
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(state.config.pull_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // First tick completes immediately; the startup pull already ran
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        debug!("Decision stream refresh stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        if let Err(e) = state.pull(false).await {
                            warn!(error = %e, "Failed to pull decision updates");
                        }
                    }
                }
            }
        });
    }
}

impl Drop for CrowdSecStreamClient {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for CrowdSecStreamClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrowdSecStreamClient")
            .field("lapi_url", &self.state.config.lapi_url)
            .field("started", &self.started.load(Ordering::SeqCst))
            .finish()
    }
}

#[async_trait]
impl DecisionSource for CrowdSecStreamClient {
    fn name(&self) -> &str {
        "crowdsec"
    }

    async fn establish(&self) -> Result<(), SourceError> {
        self.state.pull(true).await?;

        if !self.started.swap(true, Ordering::SeqCst) {
            self.spawn_refresh();
        }
        Ok(())
    }

    fn current_decisions(&self) -> DecisionSet {
        self.state
            .decisions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .without_expired(Utc::now())
    }
}
