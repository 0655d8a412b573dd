// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Geocoding client for resolving free-text addresses to coordinates.
//!
//! Talks to a public Nominatim endpoint. The service's usage policy asks
//! for an identifying User-Agent and low request rates, so every lookup is
//! preceded by a fixed courtesy delay.

use crate::error::AppError;
use reqwest::header::USER_AGENT;
use serde::Deserialize;
use std::time::Duration;

const GEOCODE_API_BASE: &str = "https://nominatim.openstreetmap.org";
const GEOCODE_USER_AGENT: &str = "irrigation-api/0.1 (crop watering assistant)";

/// Resolved coordinates for an address.
#[derive(Debug, Clone, Copy)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

/// Geocoding API client.
#[derive(Clone)]
pub struct GeocodeClient {
    http: reqwest::Client,
    base_url: String,
    courtesy_delay: Duration,
}

impl GeocodeClient {
    /// Create a client with the given pre-call delay.
    pub fn new(courtesy_delay_ms: u64) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: GEOCODE_API_BASE.to_string(),
            courtesy_delay: Duration::from_millis(courtesy_delay_ms),
        }
    }

    /// Resolve an address to coordinates. Takes the first match.
    pub async fn lookup(&self, address: &str) -> Result<GeoPoint, AppError> {
        // Courtesy delay, applied unconditionally (not a backoff).
        tokio::time::sleep(self.courtesy_delay).await;

        let url = format!("{}/search", self.base_url);
        let response = self
            .http
            .get(&url)
            .header(USER_AGENT, GEOCODE_USER_AGENT)
            .query(&[("q", address), ("format", "json"), ("limit", "1")])
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Geocoding request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Upstream(format!(
                "Geocoding failed with HTTP {status}: {body}"
            )));
        }

        let hits: Vec<GeocodeHit> = response
            .json()
            .await
            .map_err(|e| AppError::Upstream(format!("Malformed geocoding response: {e}")))?;

        let hit = hits
            .into_iter()
            .next()
            .ok_or_else(|| AppError::NotFound(format!("No location found for '{address}'")))?;

        let point = hit.into_point()?;

        tracing::debug!(lat = point.lat, lon = point.lon, "Address geocoded");
        Ok(point)
    }
}

/// One geocoding match. The API returns coordinates as decimal strings.
#[derive(Debug, Deserialize)]
struct GeocodeHit {
    lat: String,
    lon: String,
}

impl GeocodeHit {
    fn into_point(self) -> Result<GeoPoint, AppError> {
        let lat = self
            .lat
            .parse::<f64>()
            .map_err(|e| AppError::Upstream(format!("Bad latitude in geocoding result: {e}")))?;
        let lon = self
            .lon
            .parse::<f64>()
            .map_err(|e| AppError::Upstream(format!("Bad longitude in geocoding result: {e}")))?;

        Ok(GeoPoint { lat, lon })
    }
}
