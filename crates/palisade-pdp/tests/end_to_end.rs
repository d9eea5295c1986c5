//! Decision point and two enforcement points over loopback UDP
//!
//! Every node uses the same message ingress port on its own loopback address,
//! the way real nodes share the standard port on their own hosts.

use palisade_authentication::{CryptoConfig, RequestConfig, TrustedKey};
use palisade_core::{AccessDecision, EncodedKey, Frame, SystemClock};
use palisade_pdp::{PdpConfig, PdpService, StaticDecision};
use palisade_pep::{BridgeConfig, NetworkBridge};
use palisade_testkit::*;
use palisade_transport::{bind_udp, BypassPredicate, ChannelFrameInterface, FrameInterface, UdpOptions};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

const AUTHORITY: IpAddr = IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1));
const BLUE: IpAddr = IpAddr::V4(Ipv4Addr::new(127, 0, 0, 2));
const BLACK: IpAddr = IpAddr::V4(Ipv4Addr::new(127, 0, 0, 3));

fn options() -> UdpOptions {
    UdpOptions {
        reuse_address: true,
        poll_interval_ms: 10,
    }
}

/// A port free on every node address.
fn shared_port() -> u16 {
    let probe = bind_udp(SocketAddr::new(AUTHORITY, 0), &options()).unwrap();
    probe.local_addr().unwrap().port()
}

fn rule(decision: AccessDecision) -> StaticDecision {
    StaticDecision {
        pattern: decision.pattern().clone(),
        action: decision.action(),
        next_hop: decision.next_hop(),
        validity_ms: 10_000,
    }
}

struct Node {
    bridge: NetworkBridge,
    host: ChannelFrameInterface,
    _far: ChannelFrameInterface,
}

fn enforcement_point(scope: IpAddr, port: u16, crypto: &CryptoConfig) -> Node {
    let (host, secure) = ChannelFrameInterface::pair();
    let (far, insecure) = ChannelFrameInterface::pair();
    let config = BridgeConfig {
        message_ingress_port: port,
        message_egress_port: 0,
        udp: options(),
        requests: RequestConfig {
            retries: 3,
            timeout_ms: 1_000,
        },
        crypto: crypto.clone(),
        bypass: BypassPredicate::none(),
        ..BridgeConfig::new(scope, AUTHORITY)
    };
    let secure: Arc<dyn FrameInterface> = Arc::new(secure);
    let insecure: Arc<dyn FrameInterface> = Arc::new(insecure);
    let bridge = NetworkBridge::open(config, secure, insecure, Arc::new(SystemClock)).unwrap();
    Node {
        bridge,
        host,
        _far: far,
    }
}

/// Keep sending `frame` into `from` until it comes out at `to`.
fn deliver(from: &Node, to: &Node, frame: &Frame) -> bool {
    let deadline = Instant::now() + Duration::from_secs(10);
    while Instant::now() < deadline {
        from.host.send(frame).unwrap();
        if let Some(received) = to.host.receive(Duration::from_millis(200)).unwrap() {
            return &received == frame;
        }
    }
    false
}

fn lab(crypto: CryptoConfig) -> (PdpService, Node, Node) {
    let port = shared_port();
    let pdp = PdpService::open(
        &PdpConfig {
            bind: AUTHORITY,
            message_ingress_port: port,
            message_egress_port: 0,
            udp: options(),
            crypto: crypto.clone(),
            static_decisions: vec![rule(AccessDecision::grant(
                blue_to_black_ethernet(),
                BLACK,
                Timestamp::EPOCH,
            ))],
            ..PdpConfig::default()
        },
        Arc::new(SystemClock),
    )
    .unwrap();
    let blue = enforcement_point(BLUE, port, &crypto);
    let black = enforcement_point(BLACK, port, &crypto);
    (pdp, blue, black)
}

#[test]
fn test_granted_traffic_crosses_the_overlay() {
    let (_pdp, blue, black) = lab(CryptoConfig::default());

    let frame = blue_to_black_udp_frame(4000, 5000);
    assert!(deliver(&blue, &black, &frame));

    let incoming = black.bridge.controller().manager().incoming_decisions();
    assert_eq!(incoming.len(), 1);
    assert_eq!(incoming[0].pattern(), &blue_to_black_ethernet());
    assert!(blue
        .bridge
        .controller()
        .authentication()
        .knows(AUTHORITY, "Ed25519"));
}

#[test]
fn test_reverse_direction_is_denied() {
    let (_pdp, blue, black) = lab(CryptoConfig::default());

    let frame = black_to_blue_udp_frame(5000, 4000);
    black.host.send(&frame).unwrap();
    assert_eq!(blue.host.receive(Duration::from_secs(1)).unwrap(), None);

    let decisions = black.bridge.controller().manager().outgoing_decisions();
    assert!(decisions.iter().all(|decision| !decision.is_granting()));
}

#[test]
fn test_overlay_with_pre_shared_hmac_key() {
    let trusted_keys = [AUTHORITY, BLUE, BLACK]
        .into_iter()
        .map(|host| TrustedKey {
            host,
            key: EncodedKey::new("HmacSHA512/256", vec![7; 64]),
        })
        .collect();
    let crypto = CryptoConfig {
        shared_key: Some("07".repeat(64)),
        trusted_keys,
        ..CryptoConfig::for_algorithm("HmacSHA512/256")
    };
    let (_pdp, blue, black) = lab(crypto);
    assert!(deliver(&blue, &black, &blue_to_black_udp_frame(1, 2)));
}
