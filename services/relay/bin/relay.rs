//! Main Entrypoint for the Call Bridge Relay
//!
//! This binary is responsible for:
//! 1. Loading configuration from the environment.
//! 2. Initializing logging.
//! 3. Building the external collaborators (call creation, instructions, agent).
//! 4. Constructing the Axum router.
//! 5. Starting the web server and handling graceful shutdown.

use anyhow::Context;
use callbridge_relay::{
    calls::TwilioCalls,
    config::Config,
    instructions::{HttpInstructionsSource, InstructionsSource},
    router::create_router,
    state::AppState,
    ws::agent::DeepgramConnector,
};
use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use tracing::{info, warn};

/// Listens for the `Ctrl+C` signal to gracefully shut down the server.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal. Shutting down gracefully...");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // --- 1. Load Configuration ---
    let config = Config::from_env().context("Failed to load configuration")?;

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .init();
    info!("Configuration loaded. Initializing application state...");

    // --- 3. Initialize Collaborators ---
    let http = reqwest::Client::builder()
        .user_agent(concat!("callbridge-relay/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to build HTTP client")?;

    let instructions = match &config.instructions_url {
        Some(url) => {
            Some(Arc::new(HttpInstructionsSource::new(http.clone(), url.clone()))
                as Arc<dyn InstructionsSource>)
        }
        None => {
            warn!("INSTRUCTIONS_URL is not set; media streams will be refused.");
            None
        }
    };
    let calls = Arc::new(TwilioCalls::new(http, &config.twilio));
    let agent = Arc::new(DeepgramConnector::new(
        config.agent_url.clone(),
        SecretString::from(config.deepgram_api_key.expose_secret().to_string()),
    ));

    let bind_address = config.bind_address;
    info!(
        agent_url = %config.agent_url,
        stream_url = %config.stream_url(),
        bind_address = %bind_address,
        "Service configured. Starting server..."
    );

    let app_state = Arc::new(AppState {
        config: Arc::new(config),
        calls,
        instructions,
        agent,
    });

    // --- 4. Create Router ---
    let app = create_router(app_state);

    // --- 5. Start Server ---
    let listener = tokio::net::TcpListener::bind(bind_address).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server has shut down.");
    Ok(())
}
