//! Ban list synchronization
//!
//! # Components
//!
//! - [`http_client`]: Shared HTTP client for the upstream and downstream calls
//! - [`retry`]: Fixed-backoff retry manager for the startup connection
//! - [`cycle`]: One snapshot-and-push step
//! - [`scheduler`]: Startup connection state machine and the steady-state loop
//!
//! # Example
//!
//! ```ignore
//! use galle_bouncer::sync::{SchedulerConfig, SyncScheduler};
//!
//! let (shutdown_tx, shutdown_rx) = tokio::sync::broadcast::channel(1);
//! let scheduler = SyncScheduler::new(
//!     SchedulerConfig::from(&sync_config),
//!     source,
//!     sink,
//!     shutdown_rx,
//! );
//! scheduler.run().await?;
//! ```

pub mod cycle;
pub mod http_client;
pub mod retry;
pub mod scheduler;

// Re-export main types for convenience
pub use cycle::{CycleOutcome, SyncCycle};
pub use http_client::{HttpClient, API_KEY_HEADER};
pub use retry::RetryManager;
pub use scheduler::{ConnectionState, SchedulerConfig, SyncScheduler};
