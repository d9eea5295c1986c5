//! Link and network layer identifiers used by traffic patterns.

use crate::errors::PalisadeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// 48-bit IEEE 802 hardware address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MacAddress([u8; 6]);

impl MacAddress {
    /// Broadcast address `ff:ff:ff:ff:ff:ff`.
    pub const BROADCAST: MacAddress = MacAddress([0xff; 6]);

    /// Wrap raw octets.
    pub const fn new(octets: [u8; 6]) -> Self {
        Self(octets)
    }

    /// Raw octets.
    pub const fn octets(&self) -> [u8; 6] {
        self.0
    }

    /// Read an address from the first six bytes of `bytes`.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, PalisadeError> {
        let octets: [u8; 6] = bytes
            .get(..6)
            .and_then(|prefix| prefix.try_into().ok())
            .ok_or_else(|| PalisadeError::invalid("MAC address needs 6 bytes"))?;
        Ok(Self(octets))
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

impl FromStr for MacAddress {
    type Err = PalisadeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut octets = [0u8; 6];
        let mut parts = s.split([':', '-']);
        for octet in &mut octets {
            let part = parts
                .next()
                .ok_or_else(|| PalisadeError::invalid(format!("MAC address too short: {s}")))?;
            *octet = u8::from_str_radix(part, 16)
                .map_err(|_| PalisadeError::invalid(format!("bad MAC octet '{part}' in {s}")))?;
        }
        if parts.next().is_some() {
            return Err(PalisadeError::invalid(format!("MAC address too long: {s}")));
        }
        Ok(Self(octets))
    }
}

impl Serialize for MacAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MacAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// Ethernet II payload type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EtherType(pub u16);

impl EtherType {
    /// Internet Protocol version 4
    pub const IPV4: EtherType = EtherType(0x0800);
    /// Address Resolution Protocol
    pub const ARP: EtherType = EtherType(0x0806);
    /// IEEE 802.1Q VLAN tag
    pub const VLAN: EtherType = EtherType(0x8100);
    /// Internet Protocol version 6
    pub const IPV6: EtherType = EtherType(0x86dd);
    /// IEC 61850-9-2 Sampled Values
    pub const SAMPLED_VALUES: EtherType = EtherType(0x88ba);
}

impl fmt::Display for EtherType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:04x}", self.0)
    }
}

/// IP protocol / IPv6 next-header number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IpProtocol(pub u8);

impl IpProtocol {
    /// Internet Control Message Protocol
    pub const ICMP: IpProtocol = IpProtocol(1);
    /// Transmission Control Protocol
    pub const TCP: IpProtocol = IpProtocol(6);
    /// User Datagram Protocol
    pub const UDP: IpProtocol = IpProtocol(17);
    /// ICMP for IPv6
    pub const ICMPV6: IpProtocol = IpProtocol(58);
}

impl fmt::Display for IpProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::ICMP => f.write_str("icmp"),
            Self::TCP => f.write_str("tcp"),
            Self::UDP => f.write_str("udp"),
            Self::ICMPV6 => f.write_str("icmpv6"),
            IpProtocol(other) => write!(f, "proto-{other}"),
        }
    }
}
