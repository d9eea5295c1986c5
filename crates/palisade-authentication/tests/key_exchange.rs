//! Key exchange between two clients over an in-memory network

use palisade_authentication::{AuthenticationClient, RequestConfig};
use palisade_core::{AccessControlMessage, EncodedKey, MessagePayload};
use palisade_crypto::{
    Authenticator, CasaAuthenticator, Ed25519Authenticator, RsaAuthenticator, RsaDigest, Signer,
    Verifier,
};
use std::net::{IpAddr, Ipv4Addr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const PEP: IpAddr = IpAddr::V4(Ipv4Addr::new(192, 168, 0, 10));
const PDP: IpAddr = IpAddr::V4(Ipv4Addr::new(192, 168, 0, 1));

struct Node {
    address: IpAddr,
    client: Arc<AuthenticationClient>,
    outbox: Receiver<AccessControlMessage>,
}

fn node(address: IpAddr, authenticator: Box<dyn Authenticator>) -> Node {
    let (tx, outbox) = mpsc::channel();
    let client = AuthenticationClient::new(authenticator, Arc::new(tx))
        .unwrap()
        .with_request_config(RequestConfig {
            retries: 3,
            timeout_ms: 200,
        });
    Node {
        address,
        client: Arc::new(client),
        outbox,
    }
}

/// Deliver queued messages between both nodes until `done` is set.
fn pump(a: Node, b: Node, done: Arc<AtomicBool>) -> thread::JoinHandle<Vec<AccessControlMessage>> {
    thread::spawn(move || {
        let mut delivered = Vec::new();
        while !done.load(Ordering::SeqCst) {
            for (from, to) in [(&a, &b), (&b, &a)] {
                while let Ok(message) = from.outbox.try_recv() {
                    assert_eq!(message.destination(), to.address);
                    let received = message.from_source(from.address);
                    to.client.handle_message(&received);
                    delivered.push(received);
                }
            }
            thread::sleep(Duration::from_millis(2));
        }
        delivered
    })
}

fn signed_decision_request(sender: &AuthenticationClient) -> AccessControlMessage {
    let request = AccessControlMessage::key_exchange_request(PDP, "unused");
    sender.sign_message(&request).unwrap().from_source(PEP)
}

#[test]
fn test_first_message_triggers_key_exchange() {
    for authenticator in [
        Box::new(Ed25519Authenticator::new()) as Box<dyn Authenticator>,
        Box::new(CasaAuthenticator::new()),
        Box::new(RsaAuthenticator::new(RsaDigest::Sha256).with_key_bits(1024)),
    ] {
        let algorithm = authenticator.algorithm_identifier().to_string();
        let pep = node(PEP, authenticator);
        let pdp = node(PDP, Box::new(Ed25519Authenticator::new()));
        let pep_client = pep.client.clone();
        let pdp_client = pdp.client.clone();

        let done = Arc::new(AtomicBool::new(false));
        let network = pump(pep, pdp, done.clone());

        let message = signed_decision_request(&pep_client);
        assert!(pdp_client.verify_message(&message), "{algorithm}");
        assert!(pdp_client.knows(PEP, &algorithm));

        // cached: no further exchange for the next message
        assert!(pdp_client.verify_message(&signed_decision_request(&pep_client)));

        done.store(true, Ordering::SeqCst);
        let delivered = network.join().unwrap();
        let requests = delivered
            .iter()
            .filter(|m| matches!(m.payload(), MessagePayload::KeyExchangeRequest(_)))
            .count();
        assert_eq!(requests, 1, "{algorithm}");
    }
}

#[test]
fn test_tampered_message_fails_after_exchange() {
    let pep = node(PEP, Box::new(Ed25519Authenticator::new()));
    let pdp = node(PDP, Box::new(Ed25519Authenticator::new()));
    let pep_client = pep.client.clone();
    let pdp_client = pdp.client.clone();
    let done = Arc::new(AtomicBool::new(false));
    let network = pump(pep, pdp, done.clone());

    let genuine = signed_decision_request(&pep_client);
    let signature = genuine.signature().cloned().unwrap();
    let forged = AccessControlMessage::key_exchange_request(PDP, "altered")
        .with_signature(signature)
        .from_source(PEP);
    assert!(!pdp_client.verify_message(&forged));
    assert!(pdp_client.verify_message(&genuine));

    done.store(true, Ordering::SeqCst);
    network.join().unwrap();
}

#[test]
fn test_silent_host_fails_verification() {
    let (tx, _outbox) = mpsc::channel();
    let client = AuthenticationClient::new(Box::new(Ed25519Authenticator::new()), Arc::new(tx))
        .unwrap()
        .with_request_config(RequestConfig {
            retries: 1,
            timeout_ms: 20,
        });
    let mut sender = Ed25519Authenticator::new();
    sender.initialize_key_pair().unwrap();
    let request = AccessControlMessage::key_exchange_request(PDP, "Ed25519");
    let message = request
        .with_signature(sender.sign(&request.signing_data()).unwrap())
        .from_source(PEP);

    assert!(!client.verify_message(&message));
    assert!(!client.knows(PEP, "Ed25519"));
}

#[test]
fn test_key_without_valid_self_signature_is_not_installed() {
    let (tx, _outbox) = mpsc::channel();
    let client =
        AuthenticationClient::new(Box::new(Ed25519Authenticator::new()), Arc::new(tx)).unwrap();

    let mut advertised = Ed25519Authenticator::new();
    advertised.initialize_key_pair().unwrap();
    let mut impostor = Ed25519Authenticator::new();
    impostor.initialize_key_pair().unwrap();

    let exchange = AccessControlMessage::key_exchange(PDP, advertised.verification_key().unwrap());
    let signature = impostor.sign(&exchange.signing_data()).unwrap();
    client.process_key_exchange(&exchange.with_signature(signature).from_source(PEP));
    assert!(!client.knows(PEP, "Ed25519"));

    // unsigned
    client.process_key_exchange(&exchange.clone().from_source(PEP));
    assert!(!client.knows(PEP, "Ed25519"));

    let signature = advertised.sign(&exchange.signing_data()).unwrap();
    client.process_key_exchange(&exchange.with_signature(signature).from_source(PEP));
    assert!(client.knows(PEP, "Ed25519"));
}

#[test]
fn test_known_key_is_not_replaced() {
    let (tx, _outbox) = mpsc::channel();
    let client =
        AuthenticationClient::new(Box::new(Ed25519Authenticator::new()), Arc::new(tx)).unwrap();

    let mut pinned = Ed25519Authenticator::new();
    pinned.initialize_key_pair().unwrap();
    client.trust(PEP, &pinned.verification_key().unwrap()).unwrap();

    let mut other = Ed25519Authenticator::new();
    other.initialize_key_pair().unwrap();
    let exchange = AccessControlMessage::key_exchange(PDP, other.verification_key().unwrap());
    let signature = other.sign(&exchange.signing_data()).unwrap();
    client.process_key_exchange(&exchange.with_signature(signature).from_source(PEP));

    let request = AccessControlMessage::key_exchange_request(PDP, "Ed25519");
    let from_other = request
        .with_signature(other.sign(&request.signing_data()).unwrap())
        .from_source(PEP);
    assert!(!client.verify_message(&from_other));
    let from_pinned = request
        .with_signature(pinned.sign(&request.signing_data()).unwrap())
        .from_source(PEP);
    assert!(client.verify_message(&from_pinned));
}

#[test]
fn test_answers_key_request_with_self_signed_key() {
    let (tx, outbox) = mpsc::channel();
    let client =
        AuthenticationClient::new(Box::new(Ed25519Authenticator::new()), Arc::new(tx)).unwrap();
    let request = AccessControlMessage::key_exchange_request(PDP, "Ed25519").from_source(PEP);
    client.process_key_exchange_request(&request);

    let response = outbox.try_recv().unwrap();
    assert_eq!(response.destination(), PEP);
    let MessagePayload::KeyExchange(key) = response.payload() else {
        panic!("expected key exchange, got {response}");
    };
    assert_eq!(key, &client.verification_key().unwrap());

    let mut verifier = Ed25519Authenticator::new();
    verifier
        .set_verification_key(&EncodedKey::new("Ed25519", key.key().to_vec()))
        .unwrap();
    let signature = response.signature().unwrap();
    assert!(verifier.verify(&response.signing_data(), signature).unwrap());
}
