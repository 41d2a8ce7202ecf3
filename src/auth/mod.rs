//! # Basic Authentication
//!
//! Header decoding, credential verification, rejection responses and the
//! session handoff to the host.

pub mod basic;
pub mod middleware;
pub mod rejection;
pub mod session;
pub mod verifier;

pub use basic::{encode_header, BasicCredentials, FormatError};
pub use middleware::{basic_auth_middleware, require_basic_auth, AuthGate};
pub use rejection::{reject, AuthRejection};
pub use session::{
    authenticated_session, session_key, AuthenticatedSession, ExtensionSessionSink, SessionRegistry,
    SessionRegistryConfig, SessionSink,
};
pub use verifier::CredentialVerifier;
