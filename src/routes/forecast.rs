// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Address-to-forecast route.

use crate::error::{AppError, Result};
use crate::models::DailyPrecipitation;
use crate::AppState;
use axum::{extract::State, routing::post, Json, Router};
use serde::Deserialize;
use std::sync::Arc;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/forecast", post(address_forecast))
}

#[derive(Deserialize)]
struct ForecastRequest {
    #[serde(default)]
    address: Option<String>,
}

/// Resolve a free-text address and return its precipitation forecast.
///
/// Two sequential upstream calls: geocode, then forecast. Neither leaves a
/// durable side effect, so a failure in the second needs no compensation.
async fn address_forecast(
    State(state): State<Arc<AppState>>,
    body: Option<Json<ForecastRequest>>,
) -> Result<Json<Vec<DailyPrecipitation>>> {
    let address = body
        .and_then(|Json(request)| request.address)
        .map(|address| address.trim().to_string())
        .filter(|address| !address.is_empty())
        .ok_or_else(|| AppError::BadRequest("Missing 'address' in request".to_string()))?;

    let point = state.geocode.lookup(&address).await?;
    let records = state.forecast.daily_precipitation(point).await?;

    tracing::info!(
        address = %address,
        lat = point.lat,
        lon = point.lon,
        buckets = records.len(),
        "Forecast assembled"
    );

    Ok(Json(records))
}
