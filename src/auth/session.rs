//! # Session Handoff
//!
//! The host decides how an authenticated session is attached to a request.
//! The gate only talks to a [`SessionSink`]; two sinks ship with the crate:
//!
//! - [`ExtensionSessionSink`] stores the session in the request extensions,
//!   where later axum layers and handlers pick it up.
//! - [`SessionRegistry`] also keeps issued sessions in a bounded concurrent map
//!   keyed by a digest of the normalised Authorization header, the way gateways
//!   key sessions by token. Entries expire after a TTL and the oldest are
//!   evicted once the registry is full.

use async_trait::async_trait;
use axum::extract::{FromRequestParts, Request};
use axum::http::request::Parts;
use axum::http::StatusCode;
use dashmap::DashMap;
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::core::types::SessionDescriptor;

/// Session attached to an authenticated request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedSession {
    pub session: SessionDescriptor,

    /// Hex SHA-256 of the normalised Authorization header value
    pub session_key: String,

    /// Override flag the session was recorded with
    pub global_override: bool,
}

/// Derive the session key for a raw Authorization header value.
///
/// The value is normalised first, so scheme case, surrounding whitespace and
/// a missing `Basic` prefix all map onto the same key. The raw value embeds
/// the credentials, so only its digest is kept.
pub fn session_key(raw_header_value: &str) -> String {
    hex::encode(Sha256::digest(normalized_header(raw_header_value).as_bytes()))
}

/// `basic <token>` with the scheme lowercased and whitespace collapsed
fn normalized_header(raw_header_value: &str) -> String {
    let parts: Vec<&str> = raw_header_value.split_whitespace().collect();
    match parts.as_slice() {
        [token] => format!("basic {}", token),
        [scheme, rest @ ..] if scheme.eq_ignore_ascii_case("basic") => {
            format!("basic {}", rest.join(" "))
        }
        other => other.join(" "),
    }
}

/// Attaches an authenticated session to a request on behalf of the host
pub trait SessionSink: Send + Sync {
    fn attach_session(
        &self,
        request: &mut Request,
        session: SessionDescriptor,
        raw_header_value: &str,
        global_override: bool,
    );
}

/// Stores the session in the request extensions
#[derive(Debug, Clone, Copy, Default)]
pub struct ExtensionSessionSink;

impl SessionSink for ExtensionSessionSink {
    fn attach_session(
        &self,
        request: &mut Request,
        session: SessionDescriptor,
        raw_header_value: &str,
        global_override: bool,
    ) {
        request.extensions_mut().insert(AuthenticatedSession {
            session,
            session_key: session_key(raw_header_value),
            global_override,
        });
    }
}

/// Session registry limits
#[derive(Debug, Clone)]
pub struct SessionRegistryConfig {
    /// Maximum number of recorded sessions
    pub max_sessions: usize,

    /// How long a recorded session stays valid
    pub ttl: Duration,
}

impl Default for SessionRegistryConfig {
    fn default() -> Self {
        Self {
            max_sessions: 10_000,
            ttl: Duration::from_secs(3600),
        }
    }
}

#[derive(Debug, Clone)]
struct RegistryEntry {
    session: AuthenticatedSession,
    recorded_at: Instant,
}

impl RegistryEntry {
    fn new(session: AuthenticatedSession) -> Self {
        Self {
            session,
            recorded_at: Instant::now(),
        }
    }

    fn is_expired(&self, ttl: Duration) -> bool {
        self.recorded_at.elapsed() >= ttl
    }
}

/// Keyed store of issued sessions
#[derive(Debug, Default)]
pub struct SessionRegistry {
    config: SessionRegistryConfig,
    sessions: DashMap<String, RegistryEntry>,
    evictions: AtomicU64,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: SessionRegistryConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Live session recorded for an Authorization header value
    pub fn get(&self, raw_header_value: &str) -> Option<AuthenticatedSession> {
        let key = session_key(raw_header_value);
        let entry = self.sessions.get(&key)?;
        if !entry.is_expired(self.config.ttl) {
            return Some(entry.session.clone());
        }

        drop(entry);
        self.sessions.remove(&key);
        None
    }

    /// Drop the session recorded for an Authorization header value
    pub fn revoke(&self, raw_header_value: &str) -> bool {
        self.sessions.remove(&session_key(raw_header_value)).is_some()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Sessions evicted to stay within `max_sessions`
    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    /// Remove expired sessions, returning how many were dropped
    pub fn purge_expired(&self) -> usize {
        let ttl = self.config.ttl;
        let expired: Vec<String> = self
            .sessions
            .iter()
            .filter(|entry| entry.value().is_expired(ttl))
            .map(|entry| entry.key().clone())
            .collect();

        let mut purged = 0;
        for key in expired {
            if self.sessions.remove(&key).is_some() {
                purged += 1;
            }
        }
        purged
    }

    /// Make room for one more session
    fn evict_if_needed(&self) {
        if self.sessions.len() < self.config.max_sessions {
            return;
        }

        self.purge_expired();
        let current = self.sessions.len();
        if current < self.config.max_sessions {
            return;
        }

        // Keep 90% of max_sessions, oldest go first
        let evict_count = std::cmp::max(current.saturating_sub(self.config.max_sessions * 9 / 10), 1);
        let mut by_age: Vec<(String, Instant)> = self
            .sessions
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().recorded_at))
            .collect();
        by_age.sort_by_key(|(_, recorded_at)| *recorded_at);

        let mut evicted = 0;
        for (key, _) in by_age.into_iter().take(evict_count) {
            if self.sessions.remove(&key).is_some() {
                evicted += 1;
            }
        }

        self.evictions.fetch_add(evicted, Ordering::Relaxed);
        info!(evicted, "Evicted oldest sessions from registry");
    }
}

impl SessionSink for SessionRegistry {
    /// Records the session and mirrors the stored one into the request extensions.
    ///
    /// Without `global_override` a live session already on record is kept as is.
    fn attach_session(
        &self,
        request: &mut Request,
        session: SessionDescriptor,
        raw_header_value: &str,
        global_override: bool,
    ) {
        let key = session_key(raw_header_value);
        let incoming = AuthenticatedSession {
            session,
            session_key: key.clone(),
            global_override,
        };

        if !self.sessions.contains_key(&key) {
            self.evict_if_needed();
        }

        let stored = {
            let mut entry = self
                .sessions
                .entry(key)
                .or_insert_with(|| RegistryEntry::new(incoming.clone()));
            if global_override || entry.is_expired(self.config.ttl) {
                *entry = RegistryEntry::new(incoming);
            }
            entry.session.clone()
        };

        debug!(sessions = self.sessions.len(), "Session recorded");
        request.extensions_mut().insert(stored);
    }
}

impl<T: SessionSink + ?Sized> SessionSink for Arc<T> {
    fn attach_session(
        &self,
        request: &mut Request,
        session: SessionDescriptor,
        raw_header_value: &str,
        global_override: bool,
    ) {
        (**self).attach_session(request, session, raw_header_value, global_override)
    }
}

/// Session attached by the gate, if any
pub fn authenticated_session(request: &Request) -> Option<&AuthenticatedSession> {
    request.extensions().get::<AuthenticatedSession>()
}

/// Handlers behind the gate can take the session as an argument
#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedSession
where
    S: Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedSession>()
            .cloned()
            .ok_or(StatusCode::UNAUTHORIZED)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::SessionPolicy;
    use axum::body::Body;

    fn request() -> Request {
        axum::http::Request::builder().uri("/").body(Body::empty()).unwrap()
    }

    fn session(org: &str) -> SessionDescriptor {
        SessionPolicy {
            organization_id: org.to_string(),
            ..Default::default()
        }
        .issue()
    }

    #[test]
    fn test_session_key_is_hex_digest() {
        let key = session_key("Basic YWxpY2U6eA==");
        assert_eq!(key.len(), 64);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(key, session_key("Basic Ym9iOng="));
        assert!(!key.contains("YWxpY2U6eA"));
    }

    #[test]
    fn test_extension_sink_attaches_session() {
        let mut req = request();
        ExtensionSessionSink.attach_session(&mut req, session("default"), "Basic abc", true);

        let attached = authenticated_session(&req).unwrap();
        assert_eq!(attached.session.organization_id, "default");
        assert_eq!(attached.session_key, session_key("Basic abc"));
        assert!(attached.global_override);
    }

    #[test]
    fn test_registry_global_override_replaces() {
        let registry = SessionRegistry::new();
        registry.attach_session(&mut request(), session("first"), "Basic abc", true);
        registry.attach_session(&mut request(), session("second"), "Basic abc", true);

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("Basic abc").unwrap().session.organization_id, "second");
    }

    #[test]
    fn test_registry_without_override_keeps_existing() {
        let registry = SessionRegistry::new();
        registry.attach_session(&mut request(), session("first"), "Basic abc", true);

        let mut req = request();
        registry.attach_session(&mut req, session("second"), "Basic abc", false);

        assert_eq!(registry.get("Basic abc").unwrap().session.organization_id, "first");
        let mirrored = authenticated_session(&req).unwrap();
        assert_eq!(mirrored.session.organization_id, "first");
        assert!(mirrored.global_override);
    }

    #[test]
    fn test_registry_revoke() {
        let registry = SessionRegistry::new();
        registry.attach_session(&mut request(), session("default"), "Basic abc", true);

        assert!(registry.revoke("Basic abc"));
        assert!(!registry.revoke("Basic abc"));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_session_key_ignores_scheme_case_and_spacing() {
        let key = session_key("Basic YWxpY2U6eA==");
        assert_eq!(session_key("basic YWxpY2U6eA=="), key);
        assert_eq!(session_key("BASIC    YWxpY2U6eA=="), key);
        assert_eq!(session_key("  Basic\tYWxpY2U6eA==  "), key);
        assert_eq!(session_key("YWxpY2U6eA=="), key);
    }

    #[test]
    fn test_registry_one_entry_per_credentials() {
        let registry = SessionRegistry::new();
        for spaces in 1..=50 {
            let header = format!("Basic{}YWxpY2U6eA==", " ".repeat(spaces));
            registry.attach_session(&mut request(), session("default"), &header, true);
        }
        registry.attach_session(&mut request(), session("default"), "bAsIc YWxpY2U6eA==", true);

        assert_eq!(registry.len(), 1);
        assert!(registry.get("Basic YWxpY2U6eA==").is_some());
    }

    #[test]
    fn test_registry_evicts_oldest_when_full() {
        let registry = SessionRegistry::with_config(SessionRegistryConfig {
            max_sessions: 3,
            ttl: Duration::from_secs(60),
        });
        for token in ["a", "b", "c", "d"] {
            registry.attach_session(&mut request(), session("default"), &format!("Basic {}", token), true);
            std::thread::sleep(Duration::from_millis(2));
        }

        assert!(registry.len() <= 3);
        assert_eq!(registry.evictions(), 1);
        assert!(registry.get("Basic a").is_none());
        assert!(registry.get("Basic d").is_some());

        // Re-attaching a recorded key does not evict
        registry.attach_session(&mut request(), session("default"), "Basic d", true);
        assert_eq!(registry.evictions(), 1);
    }

    #[test]
    fn test_registry_sessions_expire() {
        let registry = SessionRegistry::with_config(SessionRegistryConfig {
            max_sessions: 10,
            ttl: Duration::from_millis(20),
        });
        registry.attach_session(&mut request(), session("first"), "Basic abc", true);
        registry.attach_session(&mut request(), session("other"), "Basic xyz", true);
        std::thread::sleep(Duration::from_millis(40));

        assert!(registry.get("Basic abc").is_none());

        // An expired entry is replaced even without override
        let mut req = request();
        registry.attach_session(&mut req, session("second"), "Basic abc", false);
        assert_eq!(
            authenticated_session(&req).unwrap().session.organization_id,
            "second"
        );

        assert_eq!(registry.purge_expired(), 1);
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_extractor() {
        let mut req = request();
        ExtensionSessionSink.attach_session(&mut req, session("default"), "Basic abc", true);
        let (mut parts, _) = req.into_parts();

        let extracted = AuthenticatedSession::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(extracted.session.rate_limit, 5);

        let (mut bare, _) = request().into_parts();
        assert_eq!(
            AuthenticatedSession::from_request_parts(&mut bare, &()).await,
            Err(StatusCode::UNAUTHORIZED)
        );
    }
}
