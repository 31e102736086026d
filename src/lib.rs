//! galle-bouncer - Keeps a Galle ban list in sync with CrowdSec decisions
//!
//! The bouncer subscribes to the CrowdSec local API decision stream and, on
//! a fixed interval, pushes the complete set of banned IPs to a Galle
//! control endpoint as a full replace.

pub mod config;
pub mod error;
pub mod models;
pub mod otel;
pub mod plugins;
pub mod sync;
