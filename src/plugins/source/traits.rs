//! Decision source trait definition

use async_trait::async_trait;

use crate::error::SourceError;
use crate::models::DecisionSet;

/// Trait for upstream decision sources
///
/// A source owns a live subscription to the upstream feed. The loop only
/// ever calls [`establish`](DecisionSource::establish) once and then reads
/// snapshots, so any background refresh is the source's own business.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DecisionSource: Send + Sync {
    /// Get the source name (used in logs)
    fn name(&self) -> &str;

    /// Open and validate the upstream subscription
    ///
    /// # Returns
    ///
    /// - `Ok(())` once the feed is live
    /// - `Err(SourceError::Forbidden)` if the credentials were rejected
    /// - `Err(SourceError::Timeout)` if the upstream could not be reached in time
    /// - `Err(SourceError::Other)` for anything else
    async fn establish(&self) -> Result<(), SourceError>;

    /// Latest known decision set
    ///
    /// Never performs network I/O.
    fn current_decisions(&self) -> DecisionSet;
}
