mod error;
mod routes;
mod state;

use axum::{extract::State, routing::get, Json, Router};
use serde_json::json;
use sponsorkit_auth::LocalSigner;
use sponsorkit_chain::EnvConfig;
use sponsorkit_common::SecretBytes;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use state::{spawn_task_refresh, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // Missing configuration is fatal at startup.
    let config = EnvConfig::from_env()?;
    let signer = dev_signer()?;
    info!(signer = %signer.address(), "Using local identity provider");

    let state = AppState::from_config(&config, signer).await?;
    let shutdown = state.session().shutdown_token();
    let refresher = spawn_task_refresh(state.app.clone(), state.poll_interval, shutdown.clone());

    let app = Router::new()
        .route("/health", get(health))
        .route("/", get(root))
        .merge(routes::api_router())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state.clone());

    let addr = config.gateway_addr;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Sponsorkit gateway listening on {addr}");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await?;

    state.session().logout().await;
    state.session().shutdown();
    refresher.await?;
    info!("Gateway stopped");
    Ok(())
}

/// Key for the local identity provider. A throwaway key is generated when
/// `DEV_SIGNER_KEY` is unset.
fn dev_signer() -> Result<LocalSigner, Box<dyn std::error::Error>> {
    match std::env::var("DEV_SIGNER_KEY") {
        Ok(raw) if !raw.trim().is_empty() => {
            let bytes = alloy_primitives::hex::decode(raw.trim())?;
            Ok(LocalSigner::from_secret(&SecretBytes(bytes))?)
        }
        _ => {
            warn!("DEV_SIGNER_KEY not set; generating an ephemeral signer");
            Ok(LocalSigner::random())
        }
    }
}

async fn shutdown_signal(shutdown: CancellationToken) {
    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("Shutdown signal received"),
        _ = shutdown.cancelled() => {}
    }
    shutdown.cancel();
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn root(State(state): State<AppState>) -> Json<serde_json::Value> {
    let chain = state.session().chain().await;
    Json(json!({
        "name": "sponsorkit",
        "description": "Gasless smart-wallet session gateway",
        "version": env!("CARGO_PKG_VERSION"),
        "chain_id": chain.as_ref().map(|c| c.chain_id),
        "network": chain.as_ref().map(|c| c.name.clone()),
    }))
}
