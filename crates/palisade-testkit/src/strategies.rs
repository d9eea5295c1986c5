//! Property test strategies for patterns and decisions.
//!
//! Values are drawn from deliberately small domains so that random pairs are
//! often equal or nested, which is where containment gets interesting.

use palisade_core::{
    AccessDecision, AccessRequestPattern, Action, EtherType, IpProtocol, MacAddress, Timestamp,
};
use proptest::prelude::*;
use std::net::{IpAddr, Ipv4Addr};

pub use proptest;

/// One of three MAC addresses.
pub fn arb_mac() -> impl Strategy<Value = MacAddress> {
    (0u8..3).prop_map(|n| MacAddress::new([0x02, 0, 0, 0, 0, n]))
}

/// One of three IPv4 addresses.
pub fn arb_ip() -> impl Strategy<Value = IpAddr> {
    (1u8..4).prop_map(|n| IpAddr::V4(Ipv4Addr::new(10, 0, 0, n)))
}

/// Ethernet layer over the small domain.
pub fn arb_ethernet() -> impl Strategy<Value = AccessRequestPattern> {
    (arb_mac(), arb_mac())
        .prop_map(|(source, destination)| {
            AccessRequestPattern::ethernet(source, destination, EtherType::IPV4)
        })
}

/// IP / Ethernet chain over the small domain.
pub fn arb_ip_chain() -> impl Strategy<Value = AccessRequestPattern> {
    (arb_ethernet(), arb_ip(), arb_ip()).prop_map(|(ethernet, source, destination)| {
        AccessRequestPattern::ip(source, destination, IpProtocol::UDP)
            .with_enclosed(ethernet)
            .expect("ip over ethernet")
    })
}

/// UDP / IP / Ethernet chain over the small domain.
pub fn arb_udp_chain() -> impl Strategy<Value = AccessRequestPattern> {
    (arb_ip_chain(), 1u16..3, 1u16..3).prop_map(|(ip, source, destination)| {
        AccessRequestPattern::udp(source, destination)
            .with_enclosed(ip)
            .expect("udp over ip")
    })
}

/// Ethernet, IP / Ethernet or UDP / IP / Ethernet chain.
pub fn arb_chain() -> impl Strategy<Value = AccessRequestPattern> {
    prop_oneof![arb_ethernet(), arb_ip_chain(), arb_udp_chain()]
}

/// Chain, or the top layer of one on its own.
pub fn arb_pattern() -> impl Strategy<Value = AccessRequestPattern> {
    prop_oneof![
        arb_chain(),
        arb_chain().prop_map(|chain| chain.isolated()),
    ]
}

/// Decision over [`arb_pattern`] with a GRANT or DENY verdict.
pub fn arb_decision() -> impl Strategy<Value = AccessDecision> {
    (arb_pattern(), any::<bool>(), arb_ip(), 1u64..100).prop_map(
        |(pattern, grant, hop, until)| {
            let until = Timestamp::from_millis(until * 1_000);
            if grant {
                AccessDecision::new(pattern, Action::Grant, Some(hop), until)
            } else {
                AccessDecision::deny(pattern, until)
            }
        },
    )
}
