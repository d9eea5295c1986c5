//! Access policies: a pattern, a verdict and the predicate that gates it.

use crate::predicate::PolicyPredicate;
use palisade_core::{AccessDecision, AccessRequestPattern, Action, AttributeSet, Timestamp};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::time::Duration;

/// Validity of the DENY issued while a policy cannot be evaluated.
pub const FALLBACK_DENY_VALIDITY: Duration = Duration::from_secs(60);

/// Policy administered for the decision point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessPolicy {
    pattern: AccessRequestPattern,
    action: Action,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    next_hop: Option<IpAddr>,
    predicate: PolicyPredicate,
}

impl AccessPolicy {
    /// Create a policy.
    pub fn new(
        pattern: AccessRequestPattern,
        action: Action,
        next_hop: Option<IpAddr>,
        predicate: PolicyPredicate,
    ) -> Self {
        Self {
            pattern,
            action,
            next_hop,
            predicate,
        }
    }

    /// Pattern the policy decides on.
    pub fn pattern(&self) -> &AccessRequestPattern {
        &self.pattern
    }

    /// Gate of the policy.
    pub fn predicate(&self) -> &PolicyPredicate {
        &self.predicate
    }

    /// Derive a decision from the current attributes.
    ///
    /// A satisfied predicate yields the configured verdict, an unsatisfied one
    /// a DENY; both are valid as long as the predicate result. When the
    /// predicate cannot be evaluated the policy denies for
    /// [`FALLBACK_DENY_VALIDITY`].
    pub fn evaluate(&self, attributes: &AttributeSet, now: Timestamp) -> AccessDecision {
        match self.predicate.evaluate(attributes) {
            Ok(evaluation) if evaluation.positive => AccessDecision::new(
                self.pattern.clone(),
                self.action,
                self.next_hop,
                evaluation.valid_until,
            ),
            Ok(evaluation) => AccessDecision::deny(self.pattern.clone(), evaluation.valid_until),
            Err(error) => {
                tracing::debug!(pattern = %self.pattern, %error, "policy not evaluable, denying");
                AccessDecision::deny(
                    self.pattern.clone(),
                    now.saturating_add(FALLBACK_DENY_VALIDITY),
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predicate::NumericOperator;
    use palisade_core::{EtherType, MacAddress, PolicyAttribute};
    use std::net::Ipv4Addr;

    const HOP: IpAddr = IpAddr::V4(Ipv4Addr::new(192, 168, 0, 61));

    fn policy() -> AccessPolicy {
        AccessPolicy::new(
            AccessRequestPattern::ethernet(
                MacAddress::new([0, 0xe0, 0x4c, 0x68, 0x02, 0x40]),
                MacAddress::new([0, 0xe0, 0x4c, 0x68, 0x02, 0x69]),
                EtherType::IPV4,
            ),
            Action::Grant,
            Some(HOP),
            PolicyPredicate::numeric("load", NumericOperator::LessThan, 80),
        )
    }

    fn load(value: i64) -> AttributeSet {
        [PolicyAttribute::long(
            "load",
            Timestamp::EPOCH,
            Timestamp::from_millis(9_000),
            value,
        )]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_satisfied_policy_grants() {
        let decision = policy().evaluate(&load(20), Timestamp::from_millis(100));
        assert_eq!(decision.action(), Action::Grant);
        assert_eq!(decision.next_hop(), Some(HOP));
        assert_eq!(decision.valid_until(), Timestamp::from_millis(9_000));
    }

    #[test]
    fn test_unsatisfied_policy_denies_without_hop() {
        let decision = policy().evaluate(&load(95), Timestamp::from_millis(100));
        assert_eq!(decision.action(), Action::Deny);
        assert_eq!(decision.next_hop(), None);
        assert_eq!(decision.valid_until(), Timestamp::from_millis(9_000));
    }

    #[test]
    fn test_missing_attribute_falls_back_to_deny() {
        let now = Timestamp::from_millis(100);
        let decision = policy().evaluate(&AttributeSet::new(), now);
        assert_eq!(decision.action(), Action::Deny);
        assert_eq!(decision.valid_until(), Timestamp::from_millis(60_100));
        assert_eq!(decision.pattern(), policy().pattern());
    }
}
