//! Decision source plugins
//!
//! - [`traits`]: The `DecisionSource` trait the scheduler depends on
//! - [`crowdsec`]: CrowdSec local API stream client
//!
//! # Example
//!
//! ```ignore
//! use galle_bouncer::plugins::source::{CrowdSecConfig, CrowdSecStreamClient, DecisionSource};
//!
//! let source = CrowdSecStreamClient::new(CrowdSecConfig::from(&sync_config), http);
//! source.establish().await?;
//! let snapshot = source.current_decisions();
//! ```

pub mod crowdsec;
pub mod traits;

// Re-export main types
pub use crowdsec::{CrowdSecConfig, CrowdSecStreamClient, STREAM_PATH};
pub use traits::DecisionSource;

#[cfg(test)]
pub use traits::MockDecisionSource;
