mod auth;
mod config;
mod dto;
mod error;
mod routes;
mod state;

use std::process::ExitCode;
use std::sync::Arc;

use bmd_core::RemoteBackendFactory;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use crate::config::AppConfig;
use crate::routes::api_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    // Remote collaborators; credentials are bound per request
    let tls = match config.tls() {
        Ok(tls) => tls,
        Err(e) => {
            tracing::error!(error = %e, "invalid TLS configuration");
            return ExitCode::FAILURE;
        }
    };
    let factory = match RemoteBackendFactory::new(config.endpoints.clone(), &tls) {
        Ok(factory) => factory,
        Err(e) => {
            tracing::error!(error = %e, "failed to build HTTP client");
            return ExitCode::FAILURE;
        }
    };
    tracing::info!(
        compute = %config.endpoints.compute_url,
        images = %config.endpoints.image_url,
        networks = %config.endpoints.network_url,
        insecure = config.ssl_no_verify,
        "remote services configured"
    );

    let state = AppState::new(Arc::new(factory));

    let app = api_router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let listener = match tokio::net::TcpListener::bind(config.listen_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(addr = %config.listen_addr, error = %e, "failed to bind listener");
            return ExitCode::FAILURE;
        }
    };

    tracing::info!(addr = %config.listen_addr, "starting bare-metal dashboard API");

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!(error = %e, "server error");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
