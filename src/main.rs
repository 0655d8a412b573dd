// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Irrigation API Server
//!
//! Bridges the irrigation app to the identity provider, a geocoding
//! service, and a weather forecast service.

use irrigation_api::{
    config::Config,
    services::{ForecastClient, GeocodeClient, IdentityClient, RtdbClient},
    AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging
    init_logging();

    // Load configuration from environment
    let config = Config::from_env().expect("Failed to load configuration");
    tracing::info!(port = config.port, "Starting Irrigation API");

    // Initialize the identity provider client (reads the service account key once)
    let identity = Arc::new(
        IdentityClient::from_key_file(&config.service_account_path)
            .expect("Failed to initialize identity provider client"),
    );

    // Realtime database client (crop lists)
    let rtdb = RtdbClient::new(&config.database_url, identity.clone());
    tracing::info!(database = %config.database_url, "Realtime database client initialized");

    // Geocoding and forecast clients
    let geocode = GeocodeClient::new(config.geocode_delay_ms);
    let forecast = ForecastClient::new();

    // Build shared state
    let state = Arc::new(AppState {
        config: config.clone(),
        identity,
        rtdb,
        geocode,
        forecast,
    });

    // Build router
    let app = irrigation_api::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging.
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("irrigation_api=debug".parse().unwrap())
                .add_directive("info".parse().unwrap()),
        )
        .with(format)
        .init();
}
