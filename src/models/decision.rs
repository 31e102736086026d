//! Decision-related domain models
//!
//! A [`Decision`] is one directive from the CrowdSec local API. The bouncer
//! only needs the IP it applies to; the remaining fields are carried along
//! for logging and expiry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// One upstream decision
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    /// Upstream identifier
    #[serde(default)]
    pub id: i64,

    /// Who produced the decision (crowdsec, cscli, CAPI, lists, ...)
    #[serde(default)]
    pub origin: String,

    /// Remediation type (ban, captcha, ...)
    #[serde(rename = "type", default)]
    pub decision_type: String,

    /// Scope of `value` (Ip, Range, ...)
    #[serde(default)]
    pub scope: String,

    /// The IP address (key of the decision set)
    pub value: String,

    /// Remaining lifetime as a Go duration string (e.g. `3h59m58.2s`)
    #[serde(default)]
    pub duration: String,

    /// Scenario that triggered the decision
    #[serde(default)]
    pub scenario: String,

    /// Absolute expiry computed when the decision was received
    #[serde(skip)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl Decision {
    /// Create a ban decision for an IP with no expiry
    pub fn ban(ip: impl Into<String>) -> Self {
        Self {
            id: 0,
            origin: String::new(),
            decision_type: "ban".to_string(),
            scope: "Ip".to_string(),
            value: ip.into(),
            duration: String::new(),
            scenario: String::new(),
            expires_at: None,
        }
    }

    /// Resolve the relative `duration` against `now`
    ///
    /// Decisions whose duration cannot be parsed never expire.
    pub fn with_expiry_from(mut self, now: DateTime<Utc>) -> Self {
        self.expires_at = parse_go_duration(&self.duration)
            .and_then(|d| chrono::Duration::from_std(d).ok())
            .map(|d| now + d);
        self
    }

    /// Check whether the decision has expired at `now`
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        matches!(self.expires_at, Some(at) if at <= now)
    }

    /// Check whether scope and type are in the accepted lists (case-insensitive)
    pub fn matches(&self, scopes: &[String], decision_types: &[String]) -> bool {
        scopes.iter().any(|s| s.eq_ignore_ascii_case(&self.scope))
            && decision_types
                .iter()
                .any(|t| t.eq_ignore_ascii_case(&self.decision_type))
    }
}

/// All currently active decisions, keyed by IP
///
/// Iteration is in ascending IP string order so snapshots of the same
/// content always serialize identically.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecisionSet {
    decisions: BTreeMap<String, Decision>,
}

impl DecisionSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of decisions
    pub fn len(&self) -> usize {
        self.decisions.len()
    }

    /// Whether the set is empty
    pub fn is_empty(&self) -> bool {
        self.decisions.is_empty()
    }

    /// Insert a decision, replacing any previous one for the same IP
    pub fn insert(&mut self, decision: Decision) -> Option<Decision> {
        self.decisions.insert(decision.value.clone(), decision)
    }

    /// Remove the decision for an IP
    pub fn remove(&mut self, ip: &str) -> Option<Decision> {
        self.decisions.remove(ip)
    }

    /// Whether an IP is in the set
    pub fn contains(&self, ip: &str) -> bool {
        self.decisions.contains_key(ip)
    }

    /// Get the decision for an IP
    pub fn get(&self, ip: &str) -> Option<&Decision> {
        self.decisions.get(ip)
    }

    /// Iterate over the IPs
    pub fn ips(&self) -> impl Iterator<Item = &str> {
        self.decisions.keys().map(String::as_str)
    }

    /// Copy of the set without the decisions expired at `now`
    pub fn without_expired(&self, now: DateTime<Utc>) -> DecisionSet {
        self.decisions
            .values()
            .filter(|d| !d.is_expired(now))
            .cloned()
            .collect()
    }
}

impl FromIterator<Decision> for DecisionSet {
    fn from_iter<I: IntoIterator<Item = Decision>>(iter: I) -> Self {
        let mut set = DecisionSet::new();
        for decision in iter {
            set.insert(decision);
        }
        set
    }
}

/// One batch from `/v1/decisions/stream`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionStream {
    /// Decisions added since the previous pull
    #[serde(default)]
    pub new: Option<Vec<Decision>>,

    /// Decisions removed since the previous pull
    #[serde(default)]
    pub deleted: Option<Vec<Decision>>,
}

/// Parse a Go `time.Duration` string such as `4h`, `3h59m58.2s` or `150ms`
///
/// Negative durations are clamped to zero. Returns `None` for malformed input.
pub fn parse_go_duration(input: &str) -> Option<Duration> {
    let s = input.trim();
    let (negative, mut rest) = match s.strip_prefix('-') {
        Some(r) => (true, r),
        None => (false, s.strip_prefix('+').unwrap_or(s)),
    };

    if rest.is_empty() {
        return None;
    }
    if rest == "0" {
        return Some(Duration::ZERO);
    }

    let mut total_nanos = 0f64;
    while !rest.is_empty() {
        let num_end = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        if num_end == 0 {
            return None;
        }
        let value: f64 = rest[..num_end].parse().ok()?;
        rest = &rest[num_end..];

        let unit_end = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let nanos_per_unit = match &rest[..unit_end] {
            "h" => 3_600_000_000_000.0,
            "m" => 60_000_000_000.0,
            "s" => 1_000_000_000.0,
            "ms" => 1_000_000.0,
            "us" | "µs" => 1_000.0,
            "ns" => 1.0,
            _ => return None,
        };
        total_nanos += value * nanos_per_unit;
        rest = &rest[unit_end..];
    }

    if negative {
        return Some(Duration::ZERO);
    }
    Some(Duration::from_nanos(total_nanos.round() as u64))
}
