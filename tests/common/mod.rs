// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use irrigation_api::config::Config;
use irrigation_api::routes::create_router;
use irrigation_api::services::{ForecastClient, GeocodeClient, IdentityClient, RtdbClient};
use irrigation_api::AppState;
use std::sync::Arc;

/// Create a test app with offline mock dependencies.
/// Returns the router and the shared state.
#[allow(dead_code)]
pub fn create_test_app() -> (axum::Router, Arc<AppState>) {
    let config = Config::test_default();

    let identity = Arc::new(IdentityClient::new_mock());
    let rtdb = RtdbClient::new(&config.database_url, identity.clone());
    let geocode = GeocodeClient::new(config.geocode_delay_ms);
    let forecast = ForecastClient::new();

    let state = Arc::new(AppState {
        config,
        identity,
        rtdb,
        geocode,
        forecast,
    });

    (create_router(state.clone()), state)
}

/// Read a response body as JSON.
#[allow(dead_code)]
pub async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body should be readable");
    serde_json::from_slice(&bytes).expect("body should be JSON")
}
