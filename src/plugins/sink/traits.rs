//! Enforcement sink trait definition

use async_trait::async_trait;

use crate::error::PushError;
use crate::models::BanSetPayload;

/// Trait for downstream enforcement points
///
/// A sink accepts a full replace of its ban list. It keeps no state
/// between calls, so sending the same payload twice is harmless.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EnforcementSink: Send + Sync {
    /// Where the ban list is sent (used in logs)
    fn target(&self) -> &str;

    /// Replace the whole ban list
    async fn replace_ban_set(&self, payload: &BanSetPayload) -> Result<(), PushError>;
}
