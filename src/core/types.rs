//! # Core Types
//!
//! Data carried through a single authentication: the stored credential, the
//! session handed to the host on success, and the optional deadline the host
//! can attach to a request.

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Stored username/secret-hash pair used for verification.
///
/// Records are provisioned by an external process; the gate only reads them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialRecord {
    /// Primary key in the credential table
    pub username: String,

    /// Stored secret hash, compared verbatim with the supplied secret
    pub hash: String,
}

impl CredentialRecord {
    pub fn new(username: impl Into<String>, hash: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            hash: hash.into(),
        }
    }

    /// Whether the supplied secret matches the stored hash
    pub fn matches(&self, secret: &str) -> bool {
        self.hash == secret
    }
}

/// Per-request authenticated-session metadata handed to the host gateway.
///
/// Built fresh for every successful authentication. The host owns it for the
/// remainder of the request and enforces the rate limit it describes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescriptor {
    /// Organization the session belongs to
    pub organization_id: String,

    /// Requests allowed per period
    pub rate_limit: u32,

    /// Length of the rate-limit period in seconds
    pub rate_period_seconds: u64,
}

/// Policy values stamped onto every session the gate issues
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionPolicy {
    pub organization_id: String,
    pub rate_limit: u32,
    pub rate_period_seconds: u64,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self {
            organization_id: "default".to_string(),
            rate_limit: 5,
            rate_period_seconds: 10,
        }
    }
}

impl SessionPolicy {
    /// Build a new session descriptor from this policy
    pub fn issue(&self) -> SessionDescriptor {
        SessionDescriptor {
            organization_id: self.organization_id.clone(),
            rate_limit: self.rate_limit,
            rate_period_seconds: self.rate_period_seconds,
        }
    }
}

/// Deadline for processing a request, attached by the host as a request extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestDeadline(pub Instant);

impl RequestDeadline {
    /// Deadline `budget` from now
    pub fn after(budget: Duration) -> Self {
        Self(Instant::now() + budget)
    }

    /// Time left before the deadline, zero once it has passed
    pub fn remaining(&self) -> Duration {
        self.0.saturating_duration_since(Instant::now())
    }
}
