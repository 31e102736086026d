//! Synchronization scheduler
//!
//! Connects to the decision source once at startup, retrying transient
//! failures with a fixed backoff, then pushes the current ban list on a
//! fixed interval until shutdown. The interval never backs off: a failed
//! push is simply retried by the next tick.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, error, info};

use crate::config::{RetryConfig, SyncConfig};
use crate::error::{SourceError, SyncError};
use crate::otel::{outcome, Metrics};
use crate::plugins::sink::EnforcementSink;
use crate::plugins::source::DecisionSource;

use super::cycle::SyncCycle;
use super::retry::RetryManager;

/// Configuration for the sync scheduler
#[derive(Debug, Clone, PartialEq)]
pub struct SchedulerConfig {
    /// Delay between the end of one push and the start of the next
    pub poll_interval: Duration,
    /// Retry policy while connecting to the source
    pub startup_retry: RetryConfig,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(10),
            startup_retry: RetryConfig::default(),
        }
    }
}

impl From<&SyncConfig> for SchedulerConfig {
    fn from(config: &SyncConfig) -> Self {
        Self {
            poll_interval: config.poll_interval,
            startup_retry: config.startup_retry.clone(),
        }
    }
}

/// Startup connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Establishment not finished yet
    Connecting,
    /// Source is live, steady state reached
    Connected,
    /// Establishment failed for good
    Failed,
}

/// Sync scheduler driving one source and one sink
pub struct SyncScheduler {
    config: SchedulerConfig,
    cycle: SyncCycle,
    retry: RetryManager,
    metrics: Option<Metrics>,
    state: ConnectionState,
    shutdown_rx: broadcast::Receiver<()>,
}

impl SyncScheduler {
    /// Create a new sync scheduler
    ///
    /// # Arguments
    ///
    /// * `config` - Scheduler configuration
    /// * `source` - Decision source to connect to and snapshot
    /// * `sink` - Enforcement point receiving the ban list
    /// * `shutdown_rx` - Broadcast receiver for shutdown signal
    pub fn new(
        config: SchedulerConfig,
        source: Arc<dyn DecisionSource>,
        sink: Arc<dyn EnforcementSink>,
        shutdown_rx: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            retry: RetryManager::new(config.startup_retry.clone()),
            cycle: SyncCycle::new(source, sink),
            config,
            metrics: None,
            state: ConnectionState::Connecting,
            shutdown_rx,
        }
    }

    /// Record connection and push metrics
    pub fn with_metrics(self, metrics: Metrics) -> Self {
        Self {
            cycle: self.cycle.with_metrics(metrics.clone()),
            metrics: Some(metrics),
            ..self
        }
    }

    /// Current connection state
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Get the scheduler configuration
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Connect to the decision source
    ///
    /// Timeouts are retried with the configured fixed backoff; a rejected
    /// API key or any other error ends establishment. Returns
    /// [`SyncError::Cancelled`] if shutdown is requested first.
    pub async fn establish(&mut self) -> Result<(), SyncError> {
        self.state = ConnectionState::Connecting;

        let source = self.cycle.source().clone();
        let metrics = self.metrics.clone();
        info!(source = source.name(), "Connecting to decision source");

        let attempt = move || {
            let source = source.clone();
            let metrics = metrics.clone();
            async move {
                let result = source.establish().await;
                if let Some(ref metrics) = metrics {
                    metrics.record_connect_attempt(match &result {
                        Ok(()) => outcome::SUCCESS,
                        Err(SourceError::Forbidden) => outcome::FORBIDDEN,
                        Err(SourceError::Timeout(_)) => outcome::TIMEOUT,
                        Err(SourceError::Other(_)) => outcome::ERROR,
                    });
                }
                result
            }
        };

        let result = tokio::select! {
            _ = self.shutdown_rx.recv() => {
                info!("Shutdown signal received while connecting to crowdsec");
                return Err(SyncError::Cancelled);
            }
            result = self.retry.execute(attempt) => result,
        };

        match result {
            Ok(()) => {
                self.state = ConnectionState::Connected;
                info!("Crowdsec connection successful");
                Ok(())
            }
            Err(SourceError::Forbidden) => {
                self.state = ConnectionState::Failed;
                error!("Connection to crowdsec forbidden: API key not accepted");
                Err(SourceError::Forbidden.into())
            }
            Err(err) => {
                self.state = ConnectionState::Failed;
                error!(error = %err, "Connection to crowdsec failed");
                Err(err.into())
            }
        }
    }

    /// Run the scheduler
    ///
    /// Establishes the source connection, then pushes the ban list every
    /// `poll_interval` until shutdown. Cycles never overlap: each push is
    /// followed by a full interval of sleep. Returns `Ok(())` on shutdown
    /// and an error only when establishment fails.
    pub async fn run(mut self) -> Result<(), SyncError> {
        match self.establish().await {
            Ok(()) => {}
            Err(SyncError::Cancelled) => return Ok(()),
            Err(err) => return Err(err),
        }

        info!(
            target_url = %self.cycle.sink().target(),
            poll_interval_secs = self.config.poll_interval.as_secs(),
            "Starting ban list synchronization"
        );

        loop {
            tokio::select! {
                _ = self.shutdown_rx.recv() => {
                    info!("Shutdown signal received, abandoning ban list push");
                    break;
                }
                outcome = self.cycle.run() => {
                    debug!(success = outcome.is_success(), "Cycle finished");
                }
            }

            tokio::select! {
                _ = self.shutdown_rx.recv() => {
                    info!("Shutdown signal received, stopping synchronization");
                    break;
                }
                _ = tokio::time::sleep(self.config.poll_interval) => {}
            }
        }

        info!("Ban list synchronization stopped");
        Ok(())
    }
}
