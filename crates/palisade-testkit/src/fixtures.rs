//! Lab topology: one decision point and two enforcement points, "blue" and
//! "black", each guarding one host.

use palisade_core::{
    AccessDecision, AccessRequestPattern, EtherType, IpProtocol, MacAddress, Timestamp,
};
use std::net::{IpAddr, Ipv4Addr};

/// Decision point.
pub const PDP: IpAddr = IpAddr::V4(Ipv4Addr::new(192, 168, 0, 1));
/// Enforcement point in front of the blue host.
pub const PEP_BLUE: IpAddr = IpAddr::V4(Ipv4Addr::new(192, 168, 0, 60));
/// Enforcement point in front of the black host.
pub const PEP_BLACK: IpAddr = IpAddr::V4(Ipv4Addr::new(192, 168, 0, 61));

/// Blue host IP.
pub const HOST_BLUE: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 60);
/// Black host IP.
pub const HOST_BLACK: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 61);

/// Blue host MAC.
pub const MAC_BLUE: MacAddress = MacAddress::new([0x00, 0xe0, 0x4c, 0x68, 0x02, 0x40]);
/// Black host MAC.
pub const MAC_BLACK: MacAddress = MacAddress::new([0x00, 0xe0, 0x4c, 0x68, 0x02, 0x69]);

/// Ethernet layer of IPv4 traffic from blue to black.
pub fn blue_to_black_ethernet() -> AccessRequestPattern {
    AccessRequestPattern::ethernet(MAC_BLUE, MAC_BLACK, EtherType::IPV4)
}

/// Ethernet layer of IPv4 traffic from black to blue.
pub fn black_to_blue_ethernet() -> AccessRequestPattern {
    AccessRequestPattern::ethernet(MAC_BLACK, MAC_BLUE, EtherType::IPV4)
}

/// IP / Ethernet chain of UDP traffic from blue to black.
pub fn blue_to_black_ip() -> AccessRequestPattern {
    AccessRequestPattern::ip(HOST_BLUE.into(), HOST_BLACK.into(), IpProtocol::UDP)
        .with_enclosed(blue_to_black_ethernet())
        .expect("ip over ethernet")
}

/// Full chain of a UDP flow from blue to black.
pub fn blue_to_black_udp(source_port: u16, destination_port: u16) -> AccessRequestPattern {
    AccessRequestPattern::udp(source_port, destination_port)
        .with_enclosed(blue_to_black_ip())
        .expect("udp over ip")
}

/// GRANT for blue to black traffic, forwarded to the black enforcement point.
pub fn grant_blue_to_black(valid_until: Timestamp) -> AccessDecision {
    AccessDecision::grant(blue_to_black_ethernet(), PEP_BLACK, valid_until)
}

/// GRANT for black to blue traffic, forwarded to the blue enforcement point.
pub fn grant_black_to_blue(valid_until: Timestamp) -> AccessDecision {
    AccessDecision::grant(black_to_blue_ethernet(), PEP_BLUE, valid_until)
}
