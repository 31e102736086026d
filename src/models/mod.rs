//! Domain models for galle-bouncer
//!
//! This module contains the decision data received from CrowdSec and the
//! payload pushed to Galle.

pub mod decision;
pub mod payload;

// Re-export commonly used types
pub use decision::{parse_go_duration, Decision, DecisionSet, DecisionStream};
pub use payload::{ban_set_payload, BanSetPayload, BAN_SET_VERB, IP_SEPARATOR};
