//! Raw link-layer frames and pattern derivation.
//!
//! [`derive_pattern`] decodes an Ethernet II frame into the full enclosure
//! chain `transport / ip / eth`, stopping at the deepest layer it understands.

use crate::errors::{PalisadeError, Result};
use crate::net::{EtherType, IpProtocol, MacAddress};
use crate::pattern::AccessRequestPattern;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

const ETHERNET_HEADER_LEN: usize = 14;
const IPV4_MIN_HEADER_LEN: usize = 20;
const IPV6_HEADER_LEN: usize = 40;

/// Unmodified captured frame bytes.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Frame(#[serde(with = "hex")] Vec<u8>);

impl Frame {
    /// Wrap captured bytes.
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Captured bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Length in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the frame has no bytes.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Ethertype of the outer header, if the frame is long enough.
    pub fn ether_type(&self) -> Option<EtherType> {
        read_u16(&self.0, 12).map(EtherType)
    }

    /// Unwrap the captured bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

impl From<Vec<u8>> for Frame {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for Frame {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Frame({} bytes)", self.0.len())
    }
}

fn read_u16(bytes: &[u8], offset: usize) -> Option<u16> {
    let pair = bytes.get(offset..offset + 2)?;
    Some(u16::from_be_bytes([pair[0], pair[1]]))
}

fn truncated(layer: &str, frame: &[u8]) -> PalisadeError {
    PalisadeError::invalid(format!("truncated {layer} header in {}-byte frame", frame.len()))
}

/// Derive the full enclosure chain of a captured Ethernet II frame.
pub fn derive_pattern(frame: &[u8]) -> Result<AccessRequestPattern> {
    if frame.len() < ETHERNET_HEADER_LEN {
        return Err(truncated("ethernet", frame));
    }
    let destination = MacAddress::from_slice(&frame[0..6])?;
    let source = MacAddress::from_slice(&frame[6..12])?;
    let ether_type = EtherType(u16::from_be_bytes([frame[12], frame[13]]));
    let ethernet = AccessRequestPattern::ethernet(source, destination, ether_type);

    let network = &frame[ETHERNET_HEADER_LEN..];
    let (ip, transport) = match ether_type {
        EtherType::IPV4 => ipv4_layer(network, frame)?,
        EtherType::IPV6 => ipv6_layer(network, frame)?,
        _ => return Ok(ethernet),
    };
    let ip = ip.with_enclosed(ethernet)?;

    match transport {
        Some((IpProtocol::UDP, segment)) => {
            let (source_port, destination_port) = ports(segment, "udp", frame)?;
            AccessRequestPattern::udp(source_port, destination_port).with_enclosed(ip)
        }
        Some((IpProtocol::TCP, segment)) => {
            let (source_port, destination_port) = ports(segment, "tcp", frame)?;
            AccessRequestPattern::tcp(source_port, destination_port).with_enclosed(ip)
        }
        _ => Ok(ip),
    }
}

type NetworkLayer<'a> = (AccessRequestPattern, Option<(IpProtocol, &'a [u8])>);

fn ipv4_layer<'a>(packet: &'a [u8], frame: &[u8]) -> Result<NetworkLayer<'a>> {
    if packet.len() < IPV4_MIN_HEADER_LEN {
        return Err(truncated("ipv4", frame));
    }
    let header_len = usize::from(packet[0] & 0x0f) * 4;
    if packet[0] >> 4 != 4 || header_len < IPV4_MIN_HEADER_LEN || packet.len() < header_len {
        return Err(PalisadeError::invalid("malformed ipv4 header"));
    }
    let protocol = IpProtocol(packet[9]);
    let source = Ipv4Addr::new(packet[12], packet[13], packet[14], packet[15]);
    let destination = Ipv4Addr::new(packet[16], packet[17], packet[18], packet[19]);
    let pattern = AccessRequestPattern::ip(source.into(), destination.into(), protocol);

    // only the first fragment carries the transport header
    let fragment_offset = u16::from_be_bytes([packet[6], packet[7]]) & 0x1fff;
    let transport = (fragment_offset == 0).then(|| (protocol, &packet[header_len..]));
    Ok((pattern, transport))
}

fn ipv6_layer<'a>(packet: &'a [u8], frame: &[u8]) -> Result<NetworkLayer<'a>> {
    if packet.len() < IPV6_HEADER_LEN {
        return Err(truncated("ipv6", frame));
    }
    let protocol = IpProtocol(packet[6]);
    let mut source = [0u8; 16];
    source.copy_from_slice(&packet[8..24]);
    let mut destination = [0u8; 16];
    destination.copy_from_slice(&packet[24..40]);
    let pattern = AccessRequestPattern::ip(
        IpAddr::V6(Ipv6Addr::from(source)),
        IpAddr::V6(Ipv6Addr::from(destination)),
        protocol,
    );
    Ok((pattern, Some((protocol, &packet[IPV6_HEADER_LEN..]))))
}

fn ports(segment: &[u8], layer: &str, frame: &[u8]) -> Result<(u16, u16)> {
    match (read_u16(segment, 0), read_u16(segment, 2)) {
        (Some(source), Some(destination)) => Ok((source, destination)),
        _ => Err(truncated(layer, frame)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::PatternLayer;

    fn ethernet_header(ether_type: u16) -> Vec<u8> {
        let mut frame = vec![0x00, 0xe0, 0x4c, 0x68, 0x02, 0x69];
        frame.extend_from_slice(&[0x00, 0xe0, 0x4c, 0x68, 0x02, 0x40]);
        frame.extend_from_slice(&ether_type.to_be_bytes());
        frame
    }

    fn ipv4_udp_frame() -> Vec<u8> {
        let mut frame = ethernet_header(0x0800);
        frame.extend_from_slice(&[
            0x45, 0x00, 0x00, 0x20, 0x00, 0x00, 0x40, 0x00, 0x40, 17, 0x00, 0x00, 192, 168, 0, 60,
            192, 168, 0, 61,
        ]);
        frame.extend_from_slice(&[0x27, 0x10, 0x27, 0x11, 0x00, 0x0c, 0x00, 0x00]);
        frame.extend_from_slice(b"ping");
        frame
    }

    #[test]
    fn test_derive_udp_chain() {
        let pattern = derive_pattern(&ipv4_udp_frame()).unwrap();
        let layers: Vec<_> = pattern.layers().cloned().collect();
        assert_eq!(layers.len(), 3);
        assert_eq!(
            layers[0],
            PatternLayer::Udp {
                source_port: 10000,
                destination_port: 10001
            }
        );
        assert!(matches!(
            layers[1],
            PatternLayer::Ip { protocol: IpProtocol::UDP, .. }
        ));
        assert_eq!(
            layers[2],
            PatternLayer::Ethernet {
                source: "00:e0:4c:68:02:40".parse().unwrap(),
                destination: "00:e0:4c:68:02:69".parse().unwrap(),
                ether_type: EtherType::IPV4,
            }
        );
    }

    #[test]
    fn test_derive_non_ip_stops_at_link_layer() {
        let mut frame = ethernet_header(0x0806);
        frame.extend_from_slice(&[0u8; 28]);
        let pattern = derive_pattern(&frame).unwrap();
        assert!(pattern.is_isolated());
        assert_eq!(Frame::new(frame).ether_type(), Some(EtherType::ARP));
    }

    #[test]
    fn test_derive_icmp_stops_at_network_layer() {
        let mut frame = ipv4_udp_frame();
        frame[14 + 9] = 1;
        let pattern = derive_pattern(&frame).unwrap();
        assert_eq!(pattern.depth(), 2);
    }

    #[test]
    fn test_derive_non_first_fragment_has_no_ports() {
        let mut frame = ipv4_udp_frame();
        frame[14 + 6] = 0x00;
        frame[14 + 7] = 0x10;
        assert_eq!(derive_pattern(&frame).unwrap().depth(), 2);
    }

    #[test]
    fn test_truncated_frames_are_rejected() {
        assert!(derive_pattern(&[0u8; 10]).is_err());
        let frame = ipv4_udp_frame();
        assert!(derive_pattern(&frame[..20]).is_err());
        assert!(derive_pattern(&frame[..35]).is_err());
    }

    #[test]
    fn test_derive_ipv6_tcp() {
        let mut frame = ethernet_header(0x86dd);
        let mut header = vec![0x60, 0, 0, 0, 0, 20, 6, 64];
        header.extend_from_slice(&Ipv6Addr::LOCALHOST.octets());
        header.extend_from_slice(&Ipv6Addr::LOCALHOST.octets());
        frame.extend_from_slice(&header);
        frame.extend_from_slice(&[0x00, 0x16, 0xc3, 0x50]);
        let pattern = derive_pattern(&frame).unwrap();
        assert_eq!(
            pattern.layer(),
            &PatternLayer::Tcp {
                source_port: 22,
                destination_port: 50000
            }
        );
        assert_eq!(pattern.depth(), 3);
    }
}
