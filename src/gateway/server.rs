//! # Forward-Auth Server
//!
//! Standalone HTTP service for gateways that call out to an external
//! authenticator. The host forwards the incoming request headers to `/auth`;
//! a 200 means "continue" and carries the session, anything else is a
//! rejection whose body is passed straight back to the client.

use axum::{
    extract::{Request, State},
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{any, get},
    Json, Router,
};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

use crate::auth::AuthGate;
use crate::core::config::ServerConfig;
use crate::core::error::{GateError, GateResult};
use crate::core::types::{RequestDeadline, SessionDescriptor};

/// Relative deadline, in milliseconds, the host may send with a forwarded request
pub const REQUEST_DEADLINE_HEADER: &str = "x-request-deadline-ms";

pub const ORG_ID_HEADER: &str = "x-auth-org-id";
pub const RATE_LIMIT_HEADER: &str = "x-ratelimit-limit";
pub const RATE_PERIOD_HEADER: &str = "x-ratelimit-period";

/// Forward-auth HTTP server
pub struct GateServer {
    config: ServerConfig,
    gate: Arc<AuthGate>,
}

impl GateServer {
    pub fn new(config: ServerConfig, gate: Arc<AuthGate>) -> Self {
        Self { config, gate }
    }

    /// Routes served by the forward-auth service
    pub fn router(&self) -> Router {
        Router::new()
            .route("/auth", any(forward_auth))
            .route("/health", get(health_check))
            .layer(TraceLayer::new_for_http())
            .with_state(self.gate.clone())
    }

    /// Bind and serve until `shutdown` resolves
    pub async fn serve<F>(self, shutdown: F) -> GateResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let address = self.config.listen_address();
        let listener = TcpListener::bind(&address)
            .await
            .map_err(|e| GateError::io(format!("Failed to bind {}: {}", address, e)))?;

        info!("Forward-auth server listening on {}", address);

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await?;

        Ok(())
    }
}

/// Authenticate a forwarded request
async fn forward_auth(State(gate): State<Arc<AuthGate>>, mut request: Request) -> Response {
    if request.extensions().get::<RequestDeadline>().is_none() {
        if let Some(deadline) = deadline_from_headers(request.headers()) {
            request.extensions_mut().insert(deadline);
        }
    }

    match gate.authenticate(&mut request).await {
        Ok(session) => session_response(session),
        Err(rejection) => rejection.into_challenge_response(gate.realm()),
    }
}

fn deadline_from_headers(headers: &HeaderMap) -> Option<RequestDeadline> {
    let millis: u64 = headers
        .get(REQUEST_DEADLINE_HEADER)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()?;
    debug!(budget_ms = millis, "Using host-supplied request deadline");
    Some(RequestDeadline::after(Duration::from_millis(millis)))
}

fn session_response(session: SessionDescriptor) -> Response {
    let mut headers = HeaderMap::new();
    if let Ok(org) = HeaderValue::from_str(&session.organization_id) {
        headers.insert(HeaderName::from_static(ORG_ID_HEADER), org);
    }
    headers.insert(
        HeaderName::from_static(RATE_LIMIT_HEADER),
        HeaderValue::from(session.rate_limit),
    );
    headers.insert(
        HeaderName::from_static(RATE_PERIOD_HEADER),
        HeaderValue::from(session.rate_period_seconds),
    );

    (StatusCode::OK, headers, Json(session)).into_response()
}

/// Health check handler
async fn health_check() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "status": "ok",
            "version": env!("CARGO_PKG_VERSION"),
        })),
    )
}
