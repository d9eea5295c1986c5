//! Time-bounded access decisions and their specificity order.
//!
//! Decisions sort most specific first so that a linear scan of a sorted
//! collection finds the applicable rule:
//!
//! 1. deeper patterns first; if `a.pattern.contains(b.pattern)` then `a` is at
//!    least as deep as `b`, so a rule always sorts ahead of the rules it contains
//! 2. DENY before GRANT for patterns of the same depth
//! 3. remaining fields as a stable tie-break, so the order agrees with `Eq`

use crate::pattern::AccessRequestPattern;
use crate::time::Timestamp;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::net::IpAddr;

/// Verdict carried by a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    /// Traffic may be forwarded
    Grant,
    /// Traffic must be dropped
    Deny,
}

impl Action {
    fn ordinal(self) -> u32 {
        match self {
            Action::Grant => 0,
            Action::Deny => 1,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Grant => f.write_str("GRANT"),
            Action::Deny => f.write_str("DENY"),
        }
    }
}

/// A GRANT or DENY verdict for a pattern, valid until a point in time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccessDecision {
    pattern: AccessRequestPattern,
    action: Action,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    next_hop: Option<IpAddr>,
    valid_until: Timestamp,
}

impl AccessDecision {
    /// Create a decision.
    pub fn new(
        pattern: AccessRequestPattern,
        action: Action,
        next_hop: Option<IpAddr>,
        valid_until: Timestamp,
    ) -> Self {
        Self {
            pattern,
            action,
            next_hop,
            valid_until,
        }
    }

    /// GRANT forwarding to `next_hop`.
    pub fn grant(pattern: AccessRequestPattern, next_hop: IpAddr, valid_until: Timestamp) -> Self {
        Self::new(pattern, Action::Grant, Some(next_hop), valid_until)
    }

    /// DENY without a next hop.
    pub fn deny(pattern: AccessRequestPattern, valid_until: Timestamp) -> Self {
        Self::new(pattern, Action::Deny, None, valid_until)
    }

    /// Pattern the decision applies to.
    pub fn pattern(&self) -> &AccessRequestPattern {
        &self.pattern
    }

    /// Verdict.
    pub fn action(&self) -> Action {
        self.action
    }

    /// Downstream enforcement point, if any.
    pub fn next_hop(&self) -> Option<IpAddr> {
        self.next_hop
    }

    /// End of validity.
    pub fn valid_until(&self) -> Timestamp {
        self.valid_until
    }

    /// Whether the verdict is GRANT.
    pub fn is_granting(&self) -> bool {
        self.action == Action::Grant
    }

    /// Whether `now` is before the end of validity.
    pub fn is_valid_at(&self, now: Timestamp) -> bool {
        now < self.valid_until
    }

    /// Copy of this decision with a new end of validity.
    pub fn renewed(&self, valid_until: Timestamp) -> Self {
        Self {
            valid_until,
            ..self.clone()
        }
    }

    /// Canonical bytes: pattern, action ordinal, next hop octets, expiry.
    pub fn signing_data(&self) -> Vec<u8> {
        let mut out = self.pattern.signing_data();
        out.extend_from_slice(&self.action.ordinal().to_be_bytes());
        match self.next_hop {
            Some(IpAddr::V4(v4)) => out.extend_from_slice(&v4.octets()),
            Some(IpAddr::V6(v6)) => out.extend_from_slice(&v6.octets()),
            None => {}
        }
        out.extend_from_slice(&self.valid_until.to_be_bytes());
        out
    }
}

impl Ord for AccessDecision {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .pattern
            .depth()
            .cmp(&self.pattern.depth())
            .then_with(|| other.action.cmp(&self.action))
            .then_with(|| self.pattern.cmp(&other.pattern))
            .then_with(|| self.next_hop.cmp(&other.next_hop))
            .then_with(|| self.valid_until.cmp(&other.valid_until))
    }
}

impl PartialOrd for AccessDecision {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for AccessDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.action, self.pattern)?;
        if let Some(next_hop) = self.next_hop {
            write!(f, " via {next_hop}")?;
        }
        write!(f, " until {}", self.valid_until)
    }
}
