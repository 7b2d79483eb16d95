//! Main Entrypoint for the Hakim API Service
//!
//! This binary is responsible for:
//! 1. Loading configuration from the environment.
//! 2. Initializing the scheduling store and seeding it when configured.
//! 3. Constructing the Axum router and applying middleware.
//! 4. Starting the web server and handling graceful shutdown.

use anyhow::Context;
use hakim_api::{
    config::Config,
    router::create_router,
    seed,
    state::AppState,
};
use hakim_core::{
    availability::AvailabilityResolver,
    store::{MemoryStore, SchedulingStore},
};
use std::{fs, net::SocketAddr, sync::Arc};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

/// Listens for the `Ctrl+C` signal to gracefully shut down the server.
async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
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

    // --- 3. Initialize the Scheduling Store ---
    let store: Arc<dyn SchedulingStore> = Arc::new(MemoryStore::new());
    if let Some(seed_path) = &config.seed_path {
        let count = seed::seed_store(&store, seed_path)
            .await
            .context("Failed to seed the scheduling store")?;
        info!(count, path = %seed_path.display(), "Scheduling store seeded");
    }
    let resolver = Arc::new(AvailabilityResolver::new(store.clone()));

    // --- 4. Load the Base Prompt ---
    let prompt_path = config.prompts_path.join("system_prompt.md");
    let system_prompt = Arc::new(
        fs::read_to_string(&prompt_path)
            .with_context(|| format!("system_prompt.md not found at {}", prompt_path.display()))?,
    );

    let app_state = Arc::new(AppState {
        store,
        resolver,
        http: reqwest::Client::new(),
        system_prompt,
        config: Arc::new(config.clone()),
    });

    // --- 5. Create Router and Apply Middleware ---
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(app_state).layer(cors);

    // --- 6. Start Server ---
    info!(
        model = %config.realtime_model,
        bind_address = %config.bind_address,
        "Service configured. Starting server..."
    );
    let listener = tokio::net::TcpListener::bind(config.bind_address).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server has shut down.");
    Ok(())
}
