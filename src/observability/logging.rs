//! # Structured Logging
//!
//! Tracing subscriber setup and audit events for authentication outcomes.
//!
//! ## Key Features
//! - JSON or human-readable output, selected by configuration
//! - `RUST_LOG` takes precedence over the configured level
//! - Audit events on a dedicated target, carrying a correlation ID
//!
//! Audit events never include secrets or raw Authorization header values.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;

use crate::core::config::{LogConfig, LogFormat};
use crate::core::error::{GateError, GateResult};

/// Target used for audit events, so they can be routed separately
pub const AUDIT_TARGET: &str = "auth_gate::audit";

/// Correlation ID for tracking a request across the host and the gate
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CorrelationId(String);

impl CorrelationId {
    /// Generate a new correlation ID
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Reuse an ID supplied by the host
    pub fn from_string(id: String) -> Self {
        Self(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Outcome of an audited authentication
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditOutcome {
    Success,
    Failure,
    Denied,
}

impl AuditOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
            Self::Denied => "denied",
        }
    }
}

/// Emit an audit event for one authentication attempt
pub fn audit_authentication(
    correlation_id: &CorrelationId,
    username: Option<&str>,
    outcome: AuditOutcome,
    reason: Option<&str>,
) {
    match outcome {
        AuditOutcome::Success => info!(
            target: AUDIT_TARGET,
            event_type = "authentication",
            correlation_id = %correlation_id,
            username = username.unwrap_or("-"),
            outcome = outcome.as_str(),
            "Authentication succeeded"
        ),
        AuditOutcome::Failure | AuditOutcome::Denied => warn!(
            target: AUDIT_TARGET,
            event_type = "authentication",
            correlation_id = %correlation_id,
            username = username.unwrap_or("-"),
            outcome = outcome.as_str(),
            reason = reason.unwrap_or("-"),
            "Authentication rejected"
        ),
    }
}

/// Build the filter from `RUST_LOG`, falling back to the configured level
pub fn build_filter(config: &LogConfig) -> GateResult<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }

    let mut directives = vec![format!("auth_gate={}", config.level)];
    directives.extend(
        config
            .targets
            .iter()
            .map(|(target, level)| format!("{}={}", target, level)),
    );

    EnvFilter::try_new(directives.join(","))
        .map_err(|e| GateError::config(format!("Invalid log filter: {}", e)))
}

/// Install the global tracing subscriber
pub fn init_tracing(config: &LogConfig) -> GateResult<()> {
    let filter = build_filter(config)?;
    let registry = tracing_subscriber::registry().with(filter);

    let result = match config.format {
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_file(true)
                    .with_line_number(true)
                    .json(),
            )
            .try_init(),
        LogFormat::Text => registry
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .try_init(),
    };

    result.map_err(|e| GateError::internal(format!("Failed to install tracing subscriber: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_correlation_ids_are_unique() {
        let a = CorrelationId::new();
        let b = CorrelationId::new();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 36);
        assert_eq!(
            CorrelationId::from_string("req-1".to_string()).to_string(),
            "req-1"
        );
    }

    #[test]
    fn test_build_filter_from_config() {
        let mut config = LogConfig::default();
        config
            .targets
            .insert("tower_http".to_string(), "debug".to_string());
        assert!(build_filter(&config).is_ok());
    }

    #[test]
    fn test_audit_outcome_serialization() {
        assert_eq!(serde_json::to_string(&AuditOutcome::Denied).unwrap(), "\"denied\"");
        assert_eq!(AuditOutcome::Success.as_str(), "success");
    }
}
