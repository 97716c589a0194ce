use std::sync::Arc;

use parley_core::ParleyConfig;
use parley_oauth2::{KeyManager, OAuth2Config};
use parley_server::{app, load_keys, seed};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    parley_core::init_tracing();

    if let Err(e) = run().await {
        error!(error = %e, "Server failed");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), String> {
    // Missing YAML files are fine; environment variables still overlay.
    let config = ParleyConfig::load("dev").map_err(|e| e.to_string())?;
    let oauth2 = OAuth2Config::from_config(&config).map_err(|e| e.to_string())?;

    let keys = Arc::new(KeyManager::new(oauth2.issuer.clone()));
    load_keys(&config, &keys).await;

    let store = seed::dev_store(&config)?;
    let addr: String = config.get_or("server.addr", "0.0.0.0:3000".to_string());

    info!(
        profile = config.profile(),
        issuer = %oauth2.issuer,
        oidc = keys.is_openid_connect_available(),
        "Starting Parley"
    );

    let router = app(oauth2, Arc::new(store), keys);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| format!("failed to bind {addr}: {e}"))?;
    info!(addr = %addr, "Listening");
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| e.to_string())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
    }
    info!("Shutting down");
}
