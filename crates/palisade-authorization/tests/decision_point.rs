//! Decision point behaviour without a network

use assert_matches::assert_matches;
use palisade_authentication::AuthenticationClient;
use palisade_authorization::{
    AccessPolicy, AuthorizationController, DecisionStore, NumericOperator, PolicyPredicate,
};
use palisade_core::{
    AccessControlMessage, AccessDecision, Action, MessagePayload, PalisadeError, PhysicalClock,
    PolicyAttribute,
};
use palisade_crypto::Ed25519Authenticator;
use palisade_testkit::strategies::{arb_chain, arb_decision};
use palisade_testkit::*;
use proptest::prelude::*;
use std::net::IpAddr;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const START: Timestamp = Timestamp::from_millis(5_000_000);

fn later(secs: u64) -> Timestamp {
    START.saturating_add(Duration::from_secs(secs))
}

fn signer() -> AuthenticationClient {
    AuthenticationClient::new(
        Box::new(Ed25519Authenticator::new()),
        RecordingEgress::<AccessControlMessage>::new(),
    )
    .unwrap()
}

struct Harness {
    controller: AuthorizationController,
    sent: Arc<RecordingEgress<AccessControlMessage>>,
}

fn harness(clock: Arc<dyn PhysicalClock>) -> Harness {
    let sent = RecordingEgress::<AccessControlMessage>::new();
    let authentication = Arc::new(
        AuthenticationClient::new(Box::new(Ed25519Authenticator::new()), sent.clone()).unwrap(),
    );
    Harness {
        controller: AuthorizationController::new(authentication, sent.clone(), clock),
        sent,
    }
}

/// Signed message from `host`, whose key the controller already trusts.
fn from_trusted(
    controller: &AuthorizationController,
    host: IpAddr,
    payload: MessagePayload,
) -> AccessControlMessage {
    let client = signer();
    controller
        .authentication()
        .trust(host, &client.verification_key().unwrap())
        .unwrap();
    client
        .sign_message(&AccessControlMessage::new(PDP, payload))
        .unwrap()
        .from_source(host)
}

fn load_policy(limit: i64) -> AccessPolicy {
    AccessPolicy::new(
        blue_to_black_ethernet(),
        Action::Grant,
        Some(PEP_BLACK),
        PolicyPredicate::numeric("load", NumericOperator::LessThan, limit),
    )
}

#[test]
fn test_grant_goes_to_next_hop_before_requester() {
    let clock = Arc::new(ManualClock::new(START));
    let Harness { controller, sent } = harness(clock);
    controller.add_decision(grant_blue_to_black(later(10)));

    let request = from_trusted(
        &controller,
        PEP_BLUE,
        MessagePayload::AccessRequest(blue_to_black_udp(4000, 5000)),
    );
    controller.handle_request(&request).unwrap();

    let replies = sent.items();
    let destinations: Vec<_> = replies.iter().map(AccessControlMessage::destination).collect();
    assert_eq!(destinations, vec![PEP_BLACK, PEP_BLUE]);
    for reply in &replies {
        assert!(reply.is_signed());
        assert_matches!(reply.payload(), MessagePayload::AccessDecision(decision)
            if decision == &grant_blue_to_black(later(10)));
    }
}

#[test]
fn test_deny_goes_to_requester_only() {
    let clock = Arc::new(ManualClock::new(START));
    let Harness { controller, sent } = harness(clock);

    let request = from_trusted(
        &controller,
        PEP_BLUE,
        MessagePayload::AccessRequest(blue_to_black_udp(4000, 5000)),
    );
    controller.handle_request(&request).unwrap();

    let replies = sent.items();
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].destination(), PEP_BLUE);
    assert_matches!(replies[0].payload(), MessagePayload::AccessDecision(decision) => {
        assert!(!decision.is_granting());
        assert_eq!(decision.pattern(), &blue_to_black_udp(4000, 5000));
        assert_eq!(decision.valid_until(), later(60));
    });
}

#[test]
fn test_deny_beats_grant_over_the_same_pattern() {
    let clock = Arc::new(ManualClock::new(START));
    let Harness { controller, sent: _ } = harness(clock);
    controller.add_decision(AccessDecision::deny(blue_to_black_ethernet(), later(10)));
    controller.add_decision(grant_blue_to_black(later(10)));
    assert_eq!(controller.decisions().len(), 2);

    let decision = controller.decide(&blue_to_black_udp(4000, 5000));
    assert!(!decision.is_granting(), "{decision}");
    assert_eq!(decision.pattern(), &blue_to_black_ethernet());
}

#[test]
fn test_most_specific_grant_leaves_outer_layers_denied() {
    let clock = Arc::new(ManualClock::new(START));
    let Harness { controller, sent: _ } = harness(clock);
    let flow = blue_to_black_udp(10000, 10001);
    controller.add_decision(AccessDecision::grant(flow.clone(), PEP_BLACK, later(10)));

    let isolated = controller.decide(&blue_to_black_ethernet());
    assert!(!isolated.is_granting());
    assert_eq!(isolated.pattern(), &blue_to_black_ethernet());
    assert_eq!(isolated.valid_until(), later(60));

    let granted = controller.decide(&flow);
    assert!(granted.is_granting());
    assert_eq!(granted.pattern(), &flow);
    assert_eq!(granted.next_hop(), Some(PEP_BLACK));
}

#[test]
fn test_unverified_request_is_not_answered() {
    let clock = Arc::new(ManualClock::new(START));
    let Harness { controller, sent } = harness(clock);
    controller.add_decision(grant_blue_to_black(later(10)));

    let genuine = from_trusted(
        &controller,
        PEP_BLUE,
        MessagePayload::AccessRequest(blue_to_black_udp(4000, 5000)),
    );
    let impostor = signer();
    let forged = impostor
        .sign_message(&AccessControlMessage::access_request(PDP, blue_to_black_udp(4000, 5000)))
        .unwrap()
        .from_source(PEP_BLUE);

    assert_matches!(
        controller.handle_request(&forged),
        Err(PalisadeError::PermissionDenied { .. })
    );
    assert!(sent.is_empty());
    controller.handle_request(&genuine).unwrap();
    assert_eq!(sent.len(), 2);
}

#[test]
fn test_attributes_drive_policy_decisions() {
    let clock = Arc::new(ManualClock::new(START));
    let Harness { controller, sent: _ } = harness(clock.clone());
    controller.add_policy(load_policy(80));

    // no attributes yet
    let pending = controller.decide(&blue_to_black_udp(1, 2));
    assert!(!pending.is_granting());
    assert_eq!(pending.valid_until(), later(60));

    let request = controller.attribute_request(PEP_BLUE).unwrap().unwrap();
    assert_eq!(request.destination(), PEP_BLUE);
    assert!(request.is_signed());
    assert_matches!(request.payload(), MessagePayload::AttributeExchangeRequest(ids)
        if ids == &vec!["load".to_string()]);

    let light = from_trusted(
        &controller,
        PEP_BLUE,
        MessagePayload::AttributeExchange(vec![PolicyAttribute::long(
            "load",
            START,
            later(5),
            42,
        )]),
    );
    controller.handle_request(&light).unwrap();
    let granted = controller.decide(&blue_to_black_udp(1, 2));
    assert!(granted.is_granting());
    assert_eq!(granted.next_hop(), Some(PEP_BLACK));
    assert_eq!(granted.valid_until(), later(5));

    controller.update_attributes([PolicyAttribute::long("load", START, later(3), 95)]);
    let denied = controller.decide(&blue_to_black_udp(1, 2));
    assert!(!denied.is_granting());
    assert_eq!(denied.valid_until(), later(3));
    assert_eq!(controller.decisions().len(), 1);
}

#[test]
fn test_policy_updates_keep_other_rules_on_the_pattern() {
    let clock = Arc::new(ManualClock::new(START));
    let Harness { controller, sent: _ } = harness(clock);
    let lockdown = AccessDecision::deny(blue_to_black_ethernet(), later(100));
    controller.add_decision(lockdown.clone());
    controller.add_policy(load_policy(80));

    for load in [42, 95, 10] {
        controller.update_attributes([PolicyAttribute::long("load", START, later(5), load)]);
        assert_eq!(controller.decisions().len(), 2);
        assert!(controller.decisions().contains(&lockdown));
        assert!(!controller.decide(&blue_to_black_udp(1, 2)).is_granting());
    }
}

#[test]
fn test_unverified_attributes_are_ignored() {
    let clock = Arc::new(ManualClock::new(START));
    let Harness { controller, sent: _ } = harness(clock);
    controller.add_policy(load_policy(80));
    // PEP_BLUE is known, but under a different key than the forger's
    from_trusted(
        &controller,
        PEP_BLUE,
        MessagePayload::AccessRequest(blue_to_black_ethernet()),
    );

    let forged = signer()
        .sign_message(&AccessControlMessage::new(
            PDP,
            MessagePayload::AttributeExchange(vec![PolicyAttribute::long(
                "load",
                START,
                later(5),
                1,
            )]),
        ))
        .unwrap()
        .from_source(PEP_BLUE);
    assert_matches!(
        controller.handle_request(&forged),
        Err(PalisadeError::PermissionDenied { .. })
    );
    assert!(!controller.decide(&blue_to_black_ethernet()).is_granting());
}

#[test]
fn test_no_policies_no_attribute_request() {
    let Harness { controller, sent: _ } = harness(Arc::new(SystemClock));
    assert!(controller.attribute_request(PEP_BLUE).unwrap().is_none());
}

#[test]
fn test_static_decision_stays_valid() {
    let clock: Arc<dyn PhysicalClock> = Arc::new(SystemClock);
    let Harness { controller, sent: _ } = harness(clock.clone());
    controller
        .add_static_decision(
            grant_blue_to_black(Timestamp::EPOCH),
            Duration::from_millis(200),
        )
        .unwrap();

    for _ in 0..3 {
        thread::sleep(Duration::from_millis(250));
        let decision = controller.decide(&blue_to_black_udp(1, 2));
        assert!(decision.is_granting(), "{decision}");
        assert!(decision.valid_until() > clock.now());
    }
    controller.shutdown();
}

#[test]
fn test_refresher_rejects_short_validity() {
    let Harness { controller, sent: _ } = harness(Arc::new(SystemClock));
    assert_matches!(
        controller.add_static_decision(
            grant_blue_to_black(Timestamp::EPOCH),
            Duration::from_millis(10)
        ),
        Err(PalisadeError::Invalid { .. })
    );
}

#[test]
fn test_policy_from_toml() {
    let policy: AccessPolicy = toml::from_str(
        r#"
        action = "GRANT"
        next_hop = "192.168.0.61"

        [pattern.layer]
        type = "ethernet"
        source = "00:e0:4c:68:02:40"
        destination = "00:e0:4c:68:02:69"
        ether_type = 2048

        [predicate]
        type = "and"

        [predicate.left]
        type = "numeric"
        identifier = "load"
        operator = "less_than"
        reference = 80

        [predicate.right]
        type = "numeric"
        identifier = "voltage"
        operator = "equal"
        reference = 230
        "#,
    )
    .unwrap();

    assert_eq!(policy.pattern(), &blue_to_black_ethernet());
    assert_eq!(
        policy.predicate().to_string(),
        "(load < 80 AND voltage = 230)"
    );
    let attributes = [
        PolicyAttribute::long("load", START, later(4), 10),
        PolicyAttribute::long("voltage", START, later(9), 230),
    ]
    .into_iter()
    .collect();
    assert_eq!(
        policy.evaluate(&attributes, START),
        grant_blue_to_black(later(4))
    );
}

#[test]
fn test_policy_json_matches_toml_shape() {
    let json = serde_json::to_value(load_policy(80)).unwrap();
    assert_eq!(json["action"], "GRANT");
    assert_eq!(json["next_hop"], "192.168.0.61");
    assert_eq!(json["pattern"]["layer"]["type"], "ethernet");
    assert_eq!(json["predicate"]["operator"], "less_than");
    let back: AccessPolicy = serde_json::from_value(json).unwrap();
    assert_eq!(back, load_policy(80));
}

proptest! {
    #[test]
    fn prop_store_answers_with_most_specific_valid_match(
        decisions in proptest::collection::vec(arb_decision(), 0..12),
        traffic in arb_chain(),
        now in 0u64..100,
    ) {
        let now = Timestamp::from_millis(now * 1_000);
        let store = DecisionStore::new();
        for decision in decisions {
            store.add(decision);
        }
        let candidates: Vec<AccessDecision> = store
            .snapshot()
            .into_iter()
            .filter(|d| d.is_valid_at(now) && traffic.contains(d.pattern()))
            .collect();

        match store.first_match(&traffic, now, |_| true) {
            None => prop_assert!(candidates.is_empty()),
            Some(found) => {
                for other in &candidates {
                    let (depth, other_depth) = (found.pattern().depth(), other.pattern().depth());
                    prop_assert!(depth >= other_depth);
                    if depth == other_depth && !other.is_granting() {
                        prop_assert!(!found.is_granting());
                    }
                }
            }
        }
    }
}
