//! Property tests for the authentication gate.
//!
//! These validate the verifier's invariants over generated credentials and
//! arbitrary header bytes.

use axum::body::Body;
use axum::http::{header, HeaderValue, Request};
use proptest::prelude::*;
use std::sync::Arc;
use std::time::Duration;

use auth_gate::auth::{
    authenticated_session, encode_header, AuthGate, AuthRejection, BasicCredentials,
    CredentialVerifier, ExtensionSessionSink,
};
use auth_gate::core::config::CredentialFields;
use auth_gate::store::InMemoryCredentialStore;
use auth_gate::{CredentialRecord, SessionPolicy};

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

fn gate_with(records: Vec<CredentialRecord>) -> AuthGate {
    let store = Arc::new(InMemoryCredentialStore::from_records(
        records,
        CredentialFields::default(),
    ));
    let verifier = CredentialVerifier::new(
        store,
        CredentialFields::default(),
        SessionPolicy::default(),
        Duration::from_secs(1),
    );
    AuthGate::new(verifier, Arc::new(ExtensionSessionSink), "api-gateway")
}

fn request_with(value: HeaderValue) -> Request<Body> {
    let mut request = Request::builder().uri("/").body(Body::empty()).unwrap();
    request.headers_mut().insert(header::AUTHORIZATION, value);
    request
}

// Strategy: usernames never contain ':' and are never empty
fn arb_username() -> impl Strategy<Value = String> {
    prop::string::string_regex("[A-Za-z0-9._@-]{1,24}").unwrap()
}

// Strategy: secrets may contain anything printable, including ':'
fn arb_secret() -> impl Strategy<Value = String> {
    prop::string::string_regex("[ -~]{0,40}").unwrap()
}

// Strategy: any byte sequence an HTTP header value can carry, including non-ASCII
fn arb_header_bytes() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(
        prop_oneof![Just(b'\t'), 0x20u8..0x7fu8, 0x80u8..=0xffu8],
        0..64,
    )
}

proptest! {
    /// Property: a stored record with a matching secret always admits with the default session
    #[test]
    fn proptest_matching_credentials_admit(username in arb_username(), secret in arb_secret()) {
        let gate = gate_with(vec![CredentialRecord::new(username.clone(), secret.clone())]);
        let header = encode_header(&username, &secret);
        let mut request = request_with(HeaderValue::from_str(&header).unwrap());

        let session = runtime().block_on(gate.authenticate(&mut request)).unwrap();
        prop_assert_eq!(session.organization_id.as_str(), "default");
        prop_assert_eq!(session.rate_limit, 5);
        prop_assert_eq!(session.rate_period_seconds, 10);
        prop_assert!(authenticated_session(&request).is_some());
    }

    /// Property: unknown usernames are rejected with "not found" and no session is attached
    #[test]
    fn proptest_unknown_user_rejected(username in arb_username(), secret in arb_secret()) {
        let gate = gate_with(vec![]);
        let header = encode_header(&username, &secret);
        let mut request = request_with(HeaderValue::from_str(&header).unwrap());

        let rejection = runtime().block_on(gate.authenticate(&mut request)).unwrap_err();
        prop_assert_eq!(&rejection, &AuthRejection::UserNotFound);
        prop_assert!(rejection.message().contains("not found"));
        prop_assert!(authenticated_session(&request).is_none());
    }

    /// Property: a secret that differs from the stored hash is rejected and nothing is attached
    #[test]
    fn proptest_mismatched_secret_rejected(
        username in arb_username(),
        stored in arb_secret(),
        supplied in arb_secret(),
    ) {
        prop_assume!(stored != supplied);
        let gate = gate_with(vec![CredentialRecord::new(username.clone(), stored)]);
        let header = encode_header(&username, &supplied);
        let mut request = request_with(HeaderValue::from_str(&header).unwrap());

        let rejection = runtime().block_on(gate.authenticate(&mut request)).unwrap_err();
        prop_assert_eq!(&rejection, &AuthRejection::WrongPassword);
        prop_assert_eq!(rejection.message(), "Wrong Password.");
        prop_assert!(authenticated_session(&request).is_none());
    }

    /// Property: decoding arbitrary bytes never panics
    #[test]
    fn proptest_decode_arbitrary_text_never_panics(value in any::<String>()) {
        let _ = BasicCredentials::decode(&value);
    }

    /// Property: arbitrary header bytes are rejected gracefully or admitted only for alice
    #[test]
    fn proptest_arbitrary_header_bytes_never_crash(bytes in arb_header_bytes()) {
        let gate = gate_with(vec![CredentialRecord::new("alice", "correcthash")]);
        let mut request = request_with(HeaderValue::from_bytes(&bytes).unwrap());

        match runtime().block_on(gate.authenticate(&mut request)) {
            Ok(_) => {
                let creds = BasicCredentials::decode(std::str::from_utf8(&bytes).unwrap()).unwrap();
                prop_assert_eq!(creds.username.as_str(), "alice");
                prop_assert_eq!(creds.secret.as_str(), "correcthash");
            }
            Err(rejection) => {
                prop_assert!(rejection.status_code().is_client_error());
                prop_assert!(authenticated_session(&request).is_none());
            }
        }
    }

    /// Property: random base64 payloads without a separator are format errors
    #[test]
    fn proptest_payload_without_separator_is_format_error(payload in "[A-Za-z0-9 ]{0,32}") {
        let encoded = format!("Basic {}", base64_encode(payload.as_bytes()));
        let result = BasicCredentials::decode(&encoded);
        prop_assert!(result.is_err());
    }
}

fn base64_encode(bytes: &[u8]) -> String {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD.encode(bytes)
}
