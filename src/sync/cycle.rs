//! One synchronization step
//!
//! Snapshot the source, build the full-replace payload, push it once.
//! Failures are reported in the returned [`CycleOutcome`] and never retried
//! here; the next scheduled cycle is the retry.

use std::sync::Arc;
use tracing::{error, info};

use crate::error::PushError;
use crate::models::ban_set_payload;
use crate::otel::{outcome, Metrics};
use crate::plugins::sink::EnforcementSink;
use crate::plugins::source::DecisionSource;

/// Outcome of one push attempt
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// The sink accepted the ban list
    Pushed { decisions: usize },
    /// The push failed
    Failed(PushError),
}

impl CycleOutcome {
    /// Whether the sink accepted the ban list
    pub fn is_success(&self) -> bool {
        matches!(self, CycleOutcome::Pushed { .. })
    }
}

/// Snapshot-and-push step shared by every tick of the scheduler
pub struct SyncCycle {
    source: Arc<dyn DecisionSource>,
    sink: Arc<dyn EnforcementSink>,
    metrics: Option<Metrics>,
}

impl SyncCycle {
    /// Create a new cycle
    pub fn new(source: Arc<dyn DecisionSource>, sink: Arc<dyn EnforcementSink>) -> Self {
        Self {
            source,
            sink,
            metrics: None,
        }
    }

    /// Record push metrics
    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// The decision source
    pub fn source(&self) -> &Arc<dyn DecisionSource> {
        &self.source
    }

    /// The enforcement sink
    pub fn sink(&self) -> &Arc<dyn EnforcementSink> {
        &self.sink
    }

    /// Push the current decision set once
    pub async fn run(&self) -> CycleOutcome {
        let snapshot = self.source.current_decisions();
        let payload = ban_set_payload(&snapshot);

        match self.sink.replace_ban_set(&payload).await {
            Ok(()) => {
                info!(decisions = snapshot.len(), "Galle ban list successfully updated");
                if let Some(ref metrics) = self.metrics {
                    metrics.record_push(outcome::SUCCESS);
                    metrics.record_decisions(snapshot.len());
                }
                CycleOutcome::Pushed {
                    decisions: snapshot.len(),
                }
            }
            Err(err) => {
                let label = match err {
                    PushError::Connection(ref reason) => {
                        error!(
                            url = %self.sink.target(),
                            error = %reason,
                            "Could not connect to galle"
                        );
                        outcome::CONNECTION_ERROR
                    }
                    PushError::Status(status) => {
                        error!(
                            url = %self.sink.target(),
                            status = status,
                            "Galle ban list update failed"
                        );
                        outcome::STATUS_ERROR
                    }
                };
                if let Some(ref metrics) = self.metrics {
                    metrics.record_push(label);
                }
                CycleOutcome::Failed(err)
            }
        }
    }
}
