//! # Observability
//!
//! Logging setup and audit events.

pub mod logging;

pub use logging::{audit_authentication, init_tracing, AuditOutcome, CorrelationId, AUDIT_TARGET};
