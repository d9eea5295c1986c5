//! Raw Ethernet II frame builders.

use crate::fixtures::{HOST_BLACK, HOST_BLUE, MAC_BLACK, MAC_BLUE};
use palisade_core::{EtherType, Frame, IpProtocol, MacAddress};
use std::net::Ipv4Addr;

/// Ethernet II frame around `payload`.
pub fn ethernet_frame(
    source: MacAddress,
    destination: MacAddress,
    ether_type: EtherType,
    payload: &[u8],
) -> Frame {
    let mut bytes = Vec::with_capacity(14 + payload.len());
    bytes.extend_from_slice(&destination.octets());
    bytes.extend_from_slice(&source.octets());
    bytes.extend_from_slice(&ether_type.0.to_be_bytes());
    bytes.extend_from_slice(payload);
    Frame::new(bytes)
}

/// Minimal IPv4 header (no options, checksum left at zero) followed by
/// `payload`.
pub fn ipv4_packet(
    source: Ipv4Addr,
    destination: Ipv4Addr,
    protocol: IpProtocol,
    payload: &[u8],
) -> Vec<u8> {
    let total_len = u16::try_from(20 + payload.len()).expect("packet fits");
    let mut packet = vec![0x45, 0x00];
    packet.extend_from_slice(&total_len.to_be_bytes());
    packet.extend_from_slice(&[0x00, 0x00, 0x00, 0x00, 64, protocol.0, 0x00, 0x00]);
    packet.extend_from_slice(&source.octets());
    packet.extend_from_slice(&destination.octets());
    packet.extend_from_slice(payload);
    packet
}

/// UDP datagram inside IPv4 inside Ethernet.
pub fn udp_frame(
    (source_mac, destination_mac): (MacAddress, MacAddress),
    (source_ip, destination_ip): (Ipv4Addr, Ipv4Addr),
    (source_port, destination_port): (u16, u16),
    payload: &[u8],
) -> Frame {
    let udp_len = u16::try_from(8 + payload.len()).expect("datagram fits");
    let mut datagram = Vec::with_capacity(usize::from(udp_len));
    datagram.extend_from_slice(&source_port.to_be_bytes());
    datagram.extend_from_slice(&destination_port.to_be_bytes());
    datagram.extend_from_slice(&udp_len.to_be_bytes());
    datagram.extend_from_slice(&[0x00, 0x00]);
    datagram.extend_from_slice(payload);
    let packet = ipv4_packet(source_ip, destination_ip, IpProtocol::UDP, &datagram);
    ethernet_frame(source_mac, destination_mac, EtherType::IPV4, &packet)
}

/// UDP frame from the blue host to the black host.
pub fn blue_to_black_udp_frame(source_port: u16, destination_port: u16) -> Frame {
    udp_frame(
        (MAC_BLUE, MAC_BLACK),
        (HOST_BLUE, HOST_BLACK),
        (source_port, destination_port),
        b"measurement",
    )
}

/// UDP frame from the black host to the blue host.
pub fn black_to_blue_udp_frame(source_port: u16, destination_port: u16) -> Frame {
    udp_frame(
        (MAC_BLACK, MAC_BLUE),
        (HOST_BLACK, HOST_BLUE),
        (source_port, destination_port),
        b"reply",
    )
}

/// ICMPv4 echo request from blue to black.
pub fn icmp_echo_frame() -> Frame {
    let echo = [0x08, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x01];
    let packet = ipv4_packet(HOST_BLUE, HOST_BLACK, IpProtocol::ICMP, &echo);
    ethernet_frame(MAC_BLUE, MAC_BLACK, EtherType::IPV4, &packet)
}

/// Broadcast ARP request from blue for the black host.
pub fn arp_request_frame() -> Frame {
    let mut arp = vec![0x00, 0x01, 0x08, 0x00, 0x06, 0x04, 0x00, 0x01];
    arp.extend_from_slice(&MAC_BLUE.octets());
    arp.extend_from_slice(&HOST_BLUE.octets());
    arp.extend_from_slice(&[0u8; 6]);
    arp.extend_from_slice(&HOST_BLACK.octets());
    ethernet_frame(MAC_BLUE, MacAddress::BROADCAST, EtherType::ARP, &arp)
}

/// IEC 61850 Sampled Values frame, optionally behind an 802.1Q tag.
pub fn sampled_values_frame(vlan_tagged: bool) -> Frame {
    let destination = MacAddress::new([0x01, 0x0c, 0xcd, 0x04, 0x00, 0x01]);
    let sv = [0x40, 0x00, 0x00, 0x08, 0x00, 0x00, 0x00, 0x00];
    if vlan_tagged {
        let mut tagged = vec![0x80, 0x05];
        tagged.extend_from_slice(&EtherType::SAMPLED_VALUES.0.to_be_bytes());
        tagged.extend_from_slice(&sv);
        ethernet_frame(MAC_BLUE, destination, EtherType::VLAN, &tagged)
    } else {
        ethernet_frame(MAC_BLUE, destination, EtherType::SAMPLED_VALUES, &sv)
    }
}
