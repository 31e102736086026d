//! Galle control payload
//!
//! The only place that knows how a decision set is encoded for the
//! enforcement endpoint.

use serde::Serialize;

use super::DecisionSet;

/// Verb asking Galle to replace its whole ban list
pub const BAN_SET_VERB: &str = "ban_set";

/// Separator between IPs in the `ips` field
pub const IP_SEPARATOR: &str = "-";

/// Full-replace command sent to the enforcement endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BanSetPayload {
    /// Always [`BAN_SET_VERB`]
    pub verb: String,

    /// Every banned IP joined with [`IP_SEPARATOR`]
    pub ips: String,
}

/// Build the full-replace payload for a snapshot
pub fn ban_set_payload(decisions: &DecisionSet) -> BanSetPayload {
    BanSetPayload {
        verb: BAN_SET_VERB.to_string(),
        ips: decisions.ips().collect::<Vec<_>>().join(IP_SEPARATOR),
    }
}
