//! # Authentication Middleware
//!
//! [`AuthGate`] ties the verifier to the host's session handoff: it reads the
//! `Authorization` header, verifies it, and on success hands the session to the
//! injected [`SessionSink`]. A rejected request is never mutated.
//!
//! [`basic_auth_middleware`] runs the gate in front of an axum router and
//! answers rejections itself, so protected handlers only see authenticated
//! requests.

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::{self, Next},
    response::Response,
    Router,
};
use std::sync::Arc;
use tracing::{debug, instrument};

use super::basic::FormatError;
use super::rejection::AuthRejection;
use super::session::SessionSink;
use super::verifier::{decode_header, CredentialVerifier};
use crate::core::types::{RequestDeadline, SessionDescriptor};
use crate::observability::logging::{audit_authentication, AuditOutcome, CorrelationId};

/// Header carrying a host-supplied correlation ID
pub const CORRELATION_ID_HEADER: &str = "x-correlation-id";

/// Verifier plus session handoff
pub struct AuthGate {
    verifier: CredentialVerifier,
    sink: Arc<dyn SessionSink>,
    realm: String,
}

impl AuthGate {
    pub fn new(verifier: CredentialVerifier, sink: Arc<dyn SessionSink>, realm: impl Into<String>) -> Self {
        Self {
            verifier,
            sink,
            realm: realm.into(),
        }
    }

    /// Realm advertised in `WWW-Authenticate` challenges
    pub fn realm(&self) -> &str {
        &self.realm
    }

    pub fn verifier(&self) -> &CredentialVerifier {
        &self.verifier
    }

    /// Authenticate one request.
    ///
    /// On success the session has already been attached through the sink; the
    /// returned copy is for callers that also report it (the forward-auth
    /// endpoint). A [`RequestDeadline`] extension, when present, bounds the
    /// store lookup.
    #[instrument(skip_all, fields(correlation_id))]
    pub async fn authenticate(&self, request: &mut Request) -> Result<SessionDescriptor, AuthRejection> {
        let correlation_id = correlation_id(request.headers());
        tracing::Span::current().record("correlation_id", correlation_id.as_str());

        let raw_header = match authorization_header(request.headers()) {
            Ok(raw) => raw,
            Err(rejection) => {
                audit_rejection(&correlation_id, None, &rejection);
                return Err(rejection);
            }
        };

        let credentials = match decode_header(raw_header.as_deref()) {
            Ok(credentials) => credentials,
            Err(rejection) => {
                audit_rejection(&correlation_id, None, &rejection);
                return Err(rejection);
            }
        };

        let deadline = request.extensions().get::<RequestDeadline>().copied();
        match self.verifier.verify_credentials(&credentials, deadline).await {
            Ok(session) => {
                let raw_header = raw_header.unwrap_or_default();
                self.sink
                    .attach_session(request, session.clone(), &raw_header, true);
                audit_authentication(
                    &correlation_id,
                    Some(&credentials.username),
                    AuditOutcome::Success,
                    None,
                );
                debug!(username = %credentials.username, "Passed authentication");
                Ok(session)
            }
            Err(rejection) => {
                audit_rejection(&correlation_id, Some(&credentials.username), &rejection);
                Err(rejection)
            }
        }
    }
}

fn authorization_header(headers: &HeaderMap) -> Result<Option<String>, AuthRejection> {
    match headers.get(AUTHORIZATION) {
        Some(value) => value
            .to_str()
            .map(|v| Some(v.to_string()))
            .map_err(|_| AuthRejection::InvalidFormat(FormatError::NotAscii)),
        None => Ok(None),
    }
}

fn correlation_id(headers: &HeaderMap) -> CorrelationId {
    headers
        .get(CORRELATION_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .map(|value| CorrelationId::from_string(value.to_string()))
        .unwrap_or_default()
}

fn audit_rejection(correlation_id: &CorrelationId, username: Option<&str>, rejection: &AuthRejection) {
    let outcome = if rejection.status_code().is_server_error() {
        AuditOutcome::Failure
    } else {
        AuditOutcome::Denied
    };
    audit_authentication(correlation_id, username, outcome, Some(rejection.kind()));
}

/// Axum middleware function for Basic authentication
pub async fn basic_auth_middleware(
    State(gate): State<Arc<AuthGate>>,
    mut request: Request,
    next: Next,
) -> Response {
    match gate.authenticate(&mut request).await {
        Ok(_) => next.run(request).await,
        Err(rejection) => rejection.into_challenge_response(gate.realm()),
    }
}

/// Put every route of `router` behind the gate
pub fn require_basic_auth<S>(router: Router<S>, gate: Arc<AuthGate>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router.layer(middleware::from_fn_with_state(gate, basic_auth_middleware))
}
