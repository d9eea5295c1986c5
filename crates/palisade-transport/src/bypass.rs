//! Frame classes that pass an enforcement point without authorization.
//!
//! Address resolution, ICMPv4 diagnostics and IEC 61850 Sampled Values are
//! let through unconditionally; the latter because protection traffic cannot
//! wait for a decision round trip.

use palisade_core::{EtherType, Frame, IpProtocol};
use serde::{Deserialize, Serialize};
use std::fmt;

const ETHERNET_HEADER_LEN: usize = 14;
const VLAN_TAG_LEN: usize = 4;
const IPV4_PROTOCOL_OFFSET: usize = ETHERNET_HEADER_LEN + 9;

/// One class of frames that bypasses access control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BypassRule {
    /// ARP (ethertype 0x0806)
    Arp,
    /// ICMP over IPv4
    Icmpv4,
    /// Sampled Values (ethertype 0x88ba), optionally behind one 802.1Q tag
    SampledValues,
}

impl BypassRule {
    /// Whether `frame` belongs to this class.
    pub fn matches(self, frame: &Frame) -> bool {
        let bytes = frame.as_bytes();
        match self {
            BypassRule::Arp => frame.ether_type() == Some(EtherType::ARP),
            BypassRule::Icmpv4 => {
                frame.ether_type() == Some(EtherType::IPV4)
                    && bytes.get(IPV4_PROTOCOL_OFFSET) == Some(&IpProtocol::ICMP.0)
            }
            BypassRule::SampledValues => match frame.ether_type() {
                Some(EtherType::SAMPLED_VALUES) => true,
                Some(EtherType::VLAN) => {
                    let inner = ETHERNET_HEADER_LEN + VLAN_TAG_LEN - 2;
                    bytes.get(inner..inner + 2).is_some_and(|tag| {
                        u16::from_be_bytes([tag[0], tag[1]]) == EtherType::SAMPLED_VALUES.0
                    })
                }
                _ => false,
            },
        }
    }
}

impl fmt::Display for BypassRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BypassRule::Arp => "arp",
            BypassRule::Icmpv4 => "icmpv4",
            BypassRule::SampledValues => "sampled_values",
        })
    }
}

/// Disjunction of bypass rules. The empty predicate matches nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BypassPredicate {
    rules: Vec<BypassRule>,
}

impl BypassPredicate {
    /// Predicate that never matches.
    pub fn none() -> Self {
        Self::default()
    }

    /// ARP, ICMPv4 and Sampled Values.
    pub fn standard() -> Self {
        BypassPredicate::from(BypassRule::Arp)
            .or(BypassRule::Icmpv4)
            .or(BypassRule::SampledValues)
    }

    /// Matches whatever `self` or `other` matches.
    pub fn or(mut self, other: impl Into<BypassPredicate>) -> Self {
        for rule in other.into().rules {
            if !self.rules.contains(&rule) {
                self.rules.push(rule);
            }
        }
        self
    }

    /// Whether any rule matches `frame`.
    pub fn matches(&self, frame: &Frame) -> bool {
        self.rules.iter().any(|rule| rule.matches(frame))
    }

    /// Rules in the order they were added.
    pub fn rules(&self) -> &[BypassRule] {
        &self.rules
    }
}

impl From<BypassRule> for BypassPredicate {
    fn from(rule: BypassRule) -> Self {
        Self { rules: vec![rule] }
    }
}

impl FromIterator<BypassRule> for BypassPredicate {
    fn from_iter<I: IntoIterator<Item = BypassRule>>(iter: I) -> Self {
        iter.into_iter().fold(Self::none(), |predicate, rule| predicate.or(rule))
    }
}
