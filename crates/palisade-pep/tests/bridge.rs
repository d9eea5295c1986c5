//! Bridges driven through in-memory frame interfaces

use palisade_authentication::RequestConfig;
use palisade_pep::{BridgeConfig, ForwardingBridge, NetworkBridge};
use palisade_testkit::*;
use palisade_transport::{BypassPredicate, BypassRule, ChannelFrameInterface, FrameInterface, UdpOptions};
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::Duration;

const LOCALHOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);
const WAIT: Duration = Duration::from_secs(2);
const QUIET: Duration = Duration::from_millis(200);

/// Bridge config on ephemeral ports, with a decision point nobody answers for.
fn isolated(bypass: BypassPredicate) -> BridgeConfig {
    BridgeConfig {
        message_ingress_port: 0,
        message_egress_port: 0,
        udp: UdpOptions {
            reuse_address: true,
            poll_interval_ms: 10,
        },
        requests: RequestConfig {
            retries: 0,
            timeout_ms: 50,
        },
        bypass,
        ..BridgeConfig::new(LOCALHOST, IpAddr::V4(Ipv4Addr::new(127, 0, 0, 254)))
    }
}

struct Segments {
    secure_host: ChannelFrameInterface,
    insecure_host: ChannelFrameInterface,
    secure: Arc<dyn FrameInterface>,
    insecure: Arc<dyn FrameInterface>,
}

fn segments() -> Segments {
    let (secure_host, secure) = ChannelFrameInterface::pair();
    let (insecure_host, insecure) = ChannelFrameInterface::pair();
    Segments {
        secure_host,
        insecure_host,
        secure: Arc::new(secure),
        insecure: Arc::new(insecure),
    }
}

#[test]
fn test_bypass_traffic_crosses_both_ways() {
    let segments = segments();
    let mut bridge = NetworkBridge::open(
        isolated(BypassPredicate::standard()),
        segments.secure.clone(),
        segments.insecure.clone(),
        Arc::new(SystemClock),
    )
    .unwrap();

    segments.secure_host.send(&arp_request_frame()).unwrap();
    assert_eq!(
        segments.insecure_host.receive(WAIT).unwrap(),
        Some(arp_request_frame())
    );

    segments.insecure_host.send(&sampled_values_frame(true)).unwrap();
    assert_eq!(
        segments.secure_host.receive(WAIT).unwrap(),
        Some(sampled_values_frame(true))
    );

    bridge.close();
}

#[test]
fn test_insecure_traffic_without_bypass_is_dropped() {
    let segments = segments();
    let _bridge = NetworkBridge::open(
        isolated(BypassPredicate::from(BypassRule::Arp)),
        segments.secure.clone(),
        segments.insecure.clone(),
        Arc::new(SystemClock),
    )
    .unwrap();

    segments.insecure_host.send(&icmp_echo_frame()).unwrap();
    segments.insecure_host.send(&blue_to_black_udp_frame(1, 2)).unwrap();
    assert_eq!(segments.secure_host.receive(QUIET).unwrap(), None);
}

#[test]
fn test_unauthorized_frame_never_reaches_insecure_side() {
    let segments = segments();
    let bridge = NetworkBridge::open(
        isolated(BypassPredicate::none()),
        segments.secure.clone(),
        segments.insecure.clone(),
        Arc::new(SystemClock),
    )
    .unwrap();

    segments.secure_host.send(&blue_to_black_udp_frame(1, 2)).unwrap();
    segments.secure_host.send(&arp_request_frame()).unwrap();
    assert_eq!(segments.insecure_host.receive(QUIET).unwrap(), None);
    assert!(bridge.controller().manager().outgoing_decisions().is_empty());
}

#[test]
fn test_forwarding_bridge_copies_everything() {
    let segments = segments();
    let mut bridge = ForwardingBridge::open(
        segments.secure.clone(),
        segments.insecure.clone(),
        Duration::from_millis(10),
    )
    .unwrap();

    segments.secure_host.send(&blue_to_black_udp_frame(1, 2)).unwrap();
    assert_eq!(
        segments.insecure_host.receive(WAIT).unwrap(),
        Some(blue_to_black_udp_frame(1, 2))
    );
    segments.insecure_host.send(&black_to_blue_udp_frame(2, 1)).unwrap();
    assert_eq!(
        segments.secure_host.receive(WAIT).unwrap(),
        Some(black_to_blue_udp_frame(2, 1))
    );

    bridge.close();
    segments.secure_host.send(&arp_request_frame()).unwrap();
    assert_eq!(segments.insecure_host.receive(QUIET).unwrap(), None);
}

#[test]
fn test_clashing_message_ports_are_rejected() {
    let segments = segments();
    let config = BridgeConfig {
        message_ingress_port: 10_500,
        message_egress_port: 10_500,
        ..isolated(BypassPredicate::none())
    };
    assert!(NetworkBridge::open(config, segments.secure, segments.insecure, Arc::new(SystemClock)).is_err());
}
