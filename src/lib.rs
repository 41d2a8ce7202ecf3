//! # Auth Gate - Core Library Crate
//!
//! HTTP Basic authentication for an API gateway. Credentials are looked up in a
//! key-value store (DynamoDB, Redis or in-memory), the supplied secret is
//! compared with the stored hash, and on success a session descriptor is handed
//! to the host through an injected [`SessionSink`](auth::SessionSink).
//!
//! The gate can run in front of an axum router ([`auth::require_basic_auth`])
//! or as a standalone forward-auth service ([`GateServer`]).
//!
//! ## Module Layout
//! - `core`: configuration, errors, shared types
//! - `store`: credential store trait and backends
//! - `auth`: header decoding, verification, rejections, session handoff
//! - `observability`: tracing setup and audit events
//! - `gateway`: forward-auth HTTP server

/// Configuration, error types and the data carried through an authentication
pub mod core;

/// Credential stores
pub mod store;

/// Basic authentication: decoding, verification, middleware
pub mod auth;

/// Logging and audit events
pub mod observability;

/// Forward-auth HTTP server
pub mod gateway;

pub use crate::core::config::GateConfig;
pub use crate::core::error::{GateError, GateResult};
pub use crate::core::types::{CredentialRecord, RequestDeadline, SessionDescriptor, SessionPolicy};

pub use auth::{AuthGate, AuthRejection, CredentialVerifier};
pub use gateway::server::GateServer;
pub use store::CredentialStore;
