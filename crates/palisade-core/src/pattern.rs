//! Hierarchical traffic patterns and the containment relation.
//!
//! A pattern is one protocol layer plus an optional *enclosed* pattern for the
//! layer that carries it. Patterns derived from captured traffic form a total
//! chain such as `udp / ip / eth`; rule patterns may stop early (an isolated
//! `ip` pattern says nothing about the link layer).
//!
//! [`AccessRequestPattern::contains`] is a preorder: `traffic.contains(rule)`
//! holds when the rule's chain matches a contiguous run of the traffic's chain
//! starting at some layer, so deeper rules are more specific.

use crate::errors::{PalisadeError, Result};
use crate::net::{EtherType, IpProtocol, MacAddress};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;

/// Fields of a single protocol layer.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PatternLayer {
    /// Ethernet II header
    Ethernet {
        /// Source hardware address
        source: MacAddress,
        /// Destination hardware address
        destination: MacAddress,
        /// Payload type
        ether_type: EtherType,
    },
    /// IPv4 or IPv6 header
    Ip {
        /// Source address
        source: IpAddr,
        /// Destination address
        destination: IpAddr,
        /// Carried protocol
        protocol: IpProtocol,
    },
    /// UDP header
    Udp {
        /// Source port
        source_port: u16,
        /// Destination port
        destination_port: u16,
    },
    /// TCP header
    Tcp {
        /// Source port
        source_port: u16,
        /// Destination port
        destination_port: u16,
    },
}

impl PatternLayer {
    /// Position in the protocol stack; an enclosed layer must sit strictly below.
    fn rank(&self) -> u8 {
        match self {
            Self::Ethernet { .. } => 0,
            Self::Ip { .. } => 1,
            Self::Udp { .. } | Self::Tcp { .. } => 2,
        }
    }

    fn tag(&self) -> u8 {
        match self {
            Self::Ethernet { .. } => 0x01,
            Self::Ip { .. } => 0x02,
            Self::Udp { .. } => 0x03,
            Self::Tcp { .. } => 0x04,
        }
    }

    fn write_signing_data(&self, out: &mut Vec<u8>) {
        out.push(self.tag());
        match self {
            Self::Ethernet {
                source,
                destination,
                ether_type,
            } => {
                out.extend_from_slice(&source.octets());
                out.extend_from_slice(&destination.octets());
                out.extend_from_slice(&ether_type.0.to_be_bytes());
            }
            Self::Ip {
                source,
                destination,
                protocol,
            } => {
                write_ip(out, source);
                write_ip(out, destination);
                out.push(protocol.0);
            }
            Self::Udp {
                source_port,
                destination_port,
            }
            | Self::Tcp {
                source_port,
                destination_port,
            } => {
                out.extend_from_slice(&source_port.to_be_bytes());
                out.extend_from_slice(&destination_port.to_be_bytes());
            }
        }
    }
}

fn write_ip(out: &mut Vec<u8>, address: &IpAddr) {
    match address {
        IpAddr::V4(v4) => {
            out.push(4);
            out.extend_from_slice(&v4.octets());
        }
        IpAddr::V6(v6) => {
            out.push(6);
            out.extend_from_slice(&v6.octets());
        }
    }
}

impl fmt::Display for PatternLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ethernet {
                source,
                destination,
                ether_type,
            } => write!(f, "eth({source} -> {destination}, {ether_type})"),
            Self::Ip {
                source,
                destination,
                protocol,
            } => write!(f, "ip({source} -> {destination}, {protocol})"),
            Self::Udp {
                source_port,
                destination_port,
            } => write!(f, "udp({source_port} -> {destination_port})"),
            Self::Tcp {
                source_port,
                destination_port,
            } => write!(f, "tcp({source_port} -> {destination_port})"),
        }
    }
}

/// Immutable, possibly nested traffic descriptor.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "PatternRepr", into = "PatternRepr")]
pub struct AccessRequestPattern {
    layer: PatternLayer,
    enclosed: Option<Box<AccessRequestPattern>>,
}

impl AccessRequestPattern {
    /// Isolated pattern for a single layer.
    pub fn isolated_layer(layer: PatternLayer) -> Self {
        Self {
            layer,
            enclosed: None,
        }
    }

    /// Isolated Ethernet pattern.
    pub fn ethernet(source: MacAddress, destination: MacAddress, ether_type: EtherType) -> Self {
        Self::isolated_layer(PatternLayer::Ethernet {
            source,
            destination,
            ether_type,
        })
    }

    /// Isolated IP pattern.
    pub fn ip(source: IpAddr, destination: IpAddr, protocol: IpProtocol) -> Self {
        Self::isolated_layer(PatternLayer::Ip {
            source,
            destination,
            protocol,
        })
    }

    /// Isolated UDP pattern.
    pub fn udp(source_port: u16, destination_port: u16) -> Self {
        Self::isolated_layer(PatternLayer::Udp {
            source_port,
            destination_port,
        })
    }

    /// Isolated TCP pattern.
    pub fn tcp(source_port: u16, destination_port: u16) -> Self {
        Self::isolated_layer(PatternLayer::Tcp {
            source_port,
            destination_port,
        })
    }

    /// Attach `carrier` as the enclosed pattern, replacing any existing one.
    ///
    /// Fails if `carrier` does not sit strictly lower in the protocol stack,
    /// for example an Ethernet pattern enclosing an IP pattern.
    pub fn with_enclosed(self, carrier: AccessRequestPattern) -> Result<Self> {
        if carrier.layer.rank() >= self.layer.rank() {
            return Err(PalisadeError::invalid(format!(
                "{} cannot be enclosed by {}",
                carrier.layer, self.layer
            )));
        }
        Ok(Self {
            layer: self.layer,
            enclosed: Some(Box::new(carrier)),
        })
    }

    /// Fields of the outermost layer of this pattern.
    pub fn layer(&self) -> &PatternLayer {
        &self.layer
    }

    /// Carrier pattern, if any.
    pub fn enclosed(&self) -> Option<&AccessRequestPattern> {
        self.enclosed.as_deref()
    }

    /// Whether this pattern has no enclosed pattern.
    pub fn is_isolated(&self) -> bool {
        self.enclosed.is_none()
    }

    /// This pattern without its enclosed pattern.
    pub fn isolated(&self) -> Self {
        Self::isolated_layer(self.layer.clone())
    }

    /// Number of layers in the enclosure chain.
    pub fn depth(&self) -> usize {
        self.layers().count()
    }

    /// Layers from this pattern down through its carriers.
    pub fn layers(&self) -> impl Iterator<Item = &PatternLayer> {
        std::iter::successors(Some(self), |pattern| pattern.enclosed()).map(|pattern| &pattern.layer)
    }

    /// Equality ignoring enclosed patterns.
    pub fn isolated_eq(&self, other: &Self) -> bool {
        self.layer == other.layer
    }

    /// Whether traffic matching `other` is matched by this pattern's chain.
    pub fn contains(&self, other: &Self) -> bool {
        self.contains_from(other, true)
    }

    fn contains_from(&self, other: &Self, allow_gaps: bool) -> bool {
        if self.isolated_eq(other) {
            match (&self.enclosed, &other.enclosed) {
                (_, None) => return true,
                (Some(own), Some(theirs)) if own.contains_from(theirs, false) => return true,
                _ => {}
            }
        }
        match &self.enclosed {
            Some(own) if allow_gaps => own.contains_from(other, true),
            _ => false,
        }
    }

    /// Canonical bytes signed on behalf of this pattern.
    pub fn signing_data(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.depth() * 40);
        self.write_signing_data(&mut out);
        out
    }

    /// Append the canonical bytes of the whole chain to `out`.
    pub fn write_signing_data(&self, out: &mut Vec<u8>) {
        for layer in self.layers() {
            layer.write_signing_data(out);
        }
    }
}

impl fmt::Display for AccessRequestPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, layer) in self.layers().enumerate() {
            if index > 0 {
                f.write_str(" / ")?;
            }
            write!(f, "{layer}")?;
        }
        Ok(())
    }
}

/// Wire shape of a pattern; converted through the checked constructors.
#[derive(Serialize, Deserialize)]
struct PatternRepr {
    layer: PatternLayer,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    enclosed: Option<Box<PatternRepr>>,
}

impl TryFrom<PatternRepr> for AccessRequestPattern {
    type Error = PalisadeError;

    fn try_from(repr: PatternRepr) -> Result<Self> {
        let pattern = AccessRequestPattern::isolated_layer(repr.layer);
        match repr.enclosed {
            Some(carrier) => pattern.with_enclosed(AccessRequestPattern::try_from(*carrier)?),
            None => Ok(pattern),
        }
    }
}

impl From<AccessRequestPattern> for PatternRepr {
    fn from(pattern: AccessRequestPattern) -> Self {
        PatternRepr {
            layer: pattern.layer,
            enclosed: pattern
                .enclosed
                .map(|carrier| Box::new(PatternRepr::from(*carrier))),
        }
    }
}
