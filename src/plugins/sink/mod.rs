//! Enforcement sink plugins
//!
//! - [`traits`]: The `EnforcementSink` trait the synchronization cycle pushes to
//! - [`galle`]: Galle control endpoint

pub mod galle;
pub mod traits;

// Re-export main types
pub use galle::GalleSink;
pub use traits::EnforcementSink;

#[cfg(test)]
pub use traits::MockEnforcementSink;
