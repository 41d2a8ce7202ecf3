//! # Auth Gate - Forward-Auth Service
//!
//! Startup sequence:
//! 1. load configuration (`AUTH_GATE_CONFIG`, default `config/auth-gate.yaml`)
//! 2. install the tracing subscriber
//! 3. construct the credential store client once
//! 4. serve `/auth` and `/health` until SIGINT or SIGTERM

use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};

use auth_gate::auth::{AuthGate, CredentialVerifier, ExtensionSessionSink};
use auth_gate::core::config::{CONFIG_PATH_ENV, DEFAULT_CONFIG_PATH};
use auth_gate::observability::init_tracing;
use auth_gate::{store, GateConfig, GateResult, GateServer};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        // The subscriber may not be installed yet
        eprintln!("auth-gate failed: {}", e);
        error!("auth-gate failed: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> GateResult<()> {
    let config_path =
        std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let config = GateConfig::load_from_file(&config_path).await?;

    init_tracing(&config.observability.logging)?;
    info!(config = %config_path, "Starting auth-gate {}", env!("CARGO_PKG_VERSION"));

    let store = store::connect(&config.store).await?;
    let verifier = CredentialVerifier::from_config(store, &config.store, config.session.clone());
    let gate = Arc::new(AuthGate::new(
        verifier,
        Arc::new(ExtensionSessionSink),
        config.auth.realm.clone(),
    ));

    GateServer::new(config.server.clone(), gate)
        .serve(shutdown_signal())
        .await?;

    info!("auth-gate shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
