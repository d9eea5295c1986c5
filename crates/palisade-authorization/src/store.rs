//! Sorted storage of access decisions.
//!
//! Two write modes share one ordering. Enforcement points keep at most one
//! decision per pattern ([`DecisionStore::insert`]). The decision point keeps
//! every distinct decision, so a DENY and a GRANT over the same pattern can
//! coexist, and swaps out exact instances ([`DecisionStore::replace`]).

use palisade_core::{AccessDecision, AccessRequestPattern, Timestamp};
use parking_lot::RwLock;
use std::collections::BTreeSet;

/// Decisions in specificity order.
#[derive(Debug, Default)]
pub struct DecisionStore {
    decisions: RwLock<BTreeSet<AccessDecision>>,
}

impl DecisionStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `decision`, replacing any decision for the same pattern.
    ///
    /// Returns the replaced decision.
    pub fn insert(&self, decision: AccessDecision) -> Option<AccessDecision> {
        let mut decisions = self.decisions.write();
        let replaced = decisions
            .iter()
            .find(|existing| existing.pattern() == decision.pattern())
            .cloned();
        if let Some(replaced) = &replaced {
            decisions.remove(replaced);
        }
        decisions.insert(decision);
        replaced
    }

    /// Add `decision` alongside whatever is stored. Returns `false` when the
    /// identical decision was already present.
    pub fn add(&self, decision: AccessDecision) -> bool {
        self.decisions.write().insert(decision)
    }

    /// Swap `previous` for `decision` under one lock. Only that exact
    /// instance is removed; other decisions over the same pattern stay.
    pub fn replace(&self, previous: Option<&AccessDecision>, decision: AccessDecision) {
        let mut decisions = self.decisions.write();
        if let Some(previous) = previous {
            decisions.remove(previous);
        }
        decisions.insert(decision);
    }

    /// First decision, in specificity order, that is valid at `now`, whose
    /// pattern `pattern` contains, and that passes `filter`.
    pub fn first_match(
        &self,
        pattern: &AccessRequestPattern,
        now: Timestamp,
        filter: impl Fn(&AccessDecision) -> bool,
    ) -> Option<AccessDecision> {
        self.decisions
            .read()
            .iter()
            .find(|decision| {
                decision.is_valid_at(now) && pattern.contains(decision.pattern()) && filter(decision)
            })
            .cloned()
    }

    /// Drop decisions that are no longer valid at `now`. Returns how many were
    /// dropped.
    pub fn remove_expired(&self, now: Timestamp) -> usize {
        let mut decisions = self.decisions.write();
        let before = decisions.len();
        decisions.retain(|decision| decision.is_valid_at(now));
        before - decisions.len()
    }

    /// Copy of every stored decision in specificity order.
    pub fn snapshot(&self) -> Vec<AccessDecision> {
        self.decisions.read().iter().cloned().collect()
    }

    /// Number of stored decisions.
    pub fn len(&self) -> usize {
        self.decisions.read().len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.decisions.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use palisade_core::{EtherType, IpProtocol, MacAddress};
    use std::net::{IpAddr, Ipv4Addr};

    const HOP: IpAddr = IpAddr::V4(Ipv4Addr::new(192, 168, 0, 61));

    fn eth() -> AccessRequestPattern {
        AccessRequestPattern::ethernet(
            MacAddress::new([0, 0xe0, 0x4c, 0x68, 0x02, 0x40]),
            MacAddress::new([0, 0xe0, 0x4c, 0x68, 0x02, 0x69]),
            EtherType::IPV4,
        )
    }

    fn ip_eth() -> AccessRequestPattern {
        AccessRequestPattern::ip(
            IpAddr::V4(Ipv4Addr::new(192, 168, 0, 60)),
            HOP,
            IpProtocol::UDP,
        )
        .with_enclosed(eth())
        .unwrap()
    }

    fn at(ms: u64) -> Timestamp {
        Timestamp::from_millis(ms)
    }

    #[test]
    fn test_insert_replaces_same_pattern() {
        let store = DecisionStore::new();
        assert!(store.insert(AccessDecision::grant(eth(), HOP, at(100))).is_none());
        let replaced = store.insert(AccessDecision::deny(eth(), at(200))).unwrap();
        assert!(replaced.is_granting());
        assert_eq!(store.len(), 1);
        assert!(!store.snapshot()[0].is_granting());
    }

    #[test]
    fn test_added_deny_and_grant_coexist() {
        let store = DecisionStore::new();
        assert!(store.add(AccessDecision::deny(eth(), at(100))));
        assert!(store.add(AccessDecision::grant(eth(), HOP, at(100))));
        assert!(!store.add(AccessDecision::deny(eth(), at(100))));
        assert_eq!(store.len(), 2);

        let found = store.first_match(&eth(), at(0), |_| true).unwrap();
        assert!(!found.is_granting());
    }

    #[test]
    fn test_replace_removes_only_the_given_instance() {
        let store = DecisionStore::new();
        let grant = AccessDecision::grant(eth(), HOP, at(100));
        store.add(AccessDecision::deny(eth(), at(100)));
        store.add(grant.clone());

        store.replace(Some(&grant), grant.renewed(at(300)));
        assert_eq!(store.len(), 2);
        assert!(store
            .snapshot()
            .iter()
            .any(|d| d.is_granting() && d.valid_until() == at(300)));
        assert!(store.snapshot().iter().any(|d| !d.is_granting()));

        store.replace(None, AccessDecision::deny(ip_eth(), at(100)));
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn test_most_specific_match_wins() {
        let store = DecisionStore::new();
        store.insert(AccessDecision::grant(eth(), HOP, at(100)));
        store.insert(AccessDecision::deny(ip_eth(), at(100)));

        let traffic = AccessRequestPattern::udp(1, 2).with_enclosed(ip_eth()).unwrap();
        let found = store.first_match(&traffic, at(0), |_| true).unwrap();
        assert_eq!(found.pattern(), &ip_eth());

        let granting = store
            .first_match(&traffic, at(0), AccessDecision::is_granting)
            .unwrap();
        assert_eq!(granting.pattern(), &eth());
    }

    #[test]
    fn test_expired_decisions_never_match() {
        let store = DecisionStore::new();
        store.insert(AccessDecision::grant(eth(), HOP, at(100)));
        assert!(store.first_match(&eth(), at(99), |_| true).is_some());
        assert!(store.first_match(&eth(), at(100), |_| true).is_none());
        assert_eq!(store.remove_expired(at(100)), 1);
        assert!(store.is_empty());
    }
}
