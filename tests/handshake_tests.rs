//! Full approval handshake through the public API: request creation,
//! sealed payload, binding, and the degenerate paths.

use std::collections::HashMap;

use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine as _;
use sidekey::chain::ChainName;
use sidekey::session::request::seal_to_public;
use sidekey::session::{
    PendingRequest, RequestBroker, SealedSessionCodec, SessionConstraints, WalletSession,
};
use sidekey::vault::{StaticKeyProvider, Vault};
use tempfile::TempDir;

fn test_vault(dir: &TempDir) -> Vault {
    Vault::with_provider(
        dir.path().to_path_buf(),
        Box::new(StaticKeyProvider([42u8; 32])),
    )
}

fn approval_payload(chain_id: u64) -> String {
    serde_json::json!({
        "address": "0x52908400098527886E0F7030069857D2E4169EE7",
        "chainId": chain_id,
        "session": { "token": "handshake-session-token" },
        "delegate": {
            "privateKey": "0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef",
            "attestation": "delegated signing key",
            "signature": "0xfeedface"
        }
    })
    .to_string()
}

#[test]
fn broker_link_key_opens_the_bound_payload() {
    let dir = TempDir::new().unwrap();
    let vault = test_vault(&dir);
    let broker = RequestBroker::new(&vault, "https://approve.example.org/grant");

    let ticket = broker
        .create_request(
            "ops",
            ChainName::Polygon,
            &SessionConstraints::default(),
            None,
            None,
        )
        .unwrap();

    // Play the approver: take the public key out of the link and seal to it
    let params: HashMap<String, String> = ticket
        .approval_url
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    let sealed = seal_to_public(&params["key"], approval_payload(137).as_bytes());

    let session = SealedSessionCodec::new(&vault)
        .bind(&ticket.request_id.to_string(), &B64.encode(sealed))
        .unwrap();

    assert_eq!(session.wallet, "ops");
    assert_eq!(session.session_token, "handshake-session-token");
    assert_eq!(session.chain, ChainName::Polygon);

    // Bound session is durable; the pending request is consumed
    assert!(WalletSession::load(&vault, "ops").is_ok());
    assert!(PendingRequest::load(&vault, &ticket.request_id.to_string()).is_err());
}

#[test]
fn binding_twice_consumes_the_request() {
    let dir = TempDir::new().unwrap();
    let vault = test_vault(&dir);
    let broker = RequestBroker::new(&vault, "https://approve.example.org/grant");

    let ticket = broker
        .create_request(
            "ops",
            ChainName::Polygon,
            &SessionConstraints::default(),
            None,
            None,
        )
        .unwrap();
    let request = PendingRequest::load(&vault, &ticket.request_id.to_string()).unwrap();
    let sealed = seal_to_public(
        &request.handshake_key().unwrap().public_b64(),
        approval_payload(137).as_bytes(),
    );

    let codec = SealedSessionCodec::new(&vault);
    codec
        .bind(&ticket.request_id.to_string(), &B64.encode(&sealed))
        .unwrap();
    // The one-shot request is gone; replaying the same ciphertext fails
    assert!(codec
        .bind(&ticket.request_id.to_string(), &B64.encode(&sealed))
        .is_err());
}

#[test]
fn payload_for_the_wrong_chain_never_binds() {
    let dir = TempDir::new().unwrap();
    let vault = test_vault(&dir);
    let broker = RequestBroker::new(&vault, "https://approve.example.org/grant");

    let ticket = broker
        .create_request(
            "ops",
            ChainName::Amoy,
            &SessionConstraints::default(),
            None,
            None,
        )
        .unwrap();
    let request = PendingRequest::load(&vault, &ticket.request_id.to_string()).unwrap();
    let sealed = seal_to_public(
        &request.handshake_key().unwrap().public_b64(),
        approval_payload(137).as_bytes(),
    );

    let err = SealedSessionCodec::new(&vault)
        .bind(&ticket.request_id.to_string(), &B64.encode(sealed))
        .unwrap_err();
    assert!(err.to_string().contains("chain mismatch"));

    // The failed bind leaves no session behind
    assert!(WalletSession::load(&vault, "ops").is_err());
}

#[test]
fn tampered_ciphertext_is_rejected() {
    let dir = TempDir::new().unwrap();
    let vault = test_vault(&dir);
    let broker = RequestBroker::new(&vault, "https://approve.example.org/grant");

    let ticket = broker
        .create_request(
            "ops",
            ChainName::Polygon,
            &SessionConstraints::default(),
            None,
            None,
        )
        .unwrap();
    let request = PendingRequest::load(&vault, &ticket.request_id.to_string()).unwrap();
    let mut sealed = seal_to_public(
        &request.handshake_key().unwrap().public_b64(),
        approval_payload(137).as_bytes(),
    );
    let last = sealed.len() - 1;
    sealed[last] ^= 0x01;

    let err = SealedSessionCodec::new(&vault)
        .bind(&ticket.request_id.to_string(), &B64.encode(sealed))
        .unwrap_err();
    assert!(err.to_string().contains("invalid session payload"));
}
