// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Weather forecast client.
//!
//! Fetches the daily precipitation-probability forecast from Open-Meteo.
//! Responses are cached in-process for an hour per coordinate pair, and
//! requests are retried with exponential backoff before a failure is
//! surfaced to the handler.

use crate::error::AppError;
use crate::models::DailyPrecipitation;
use crate::services::geocode::GeoPoint;
use crate::time_utils::{format_utc_rfc3339, parse_day_utc};
use dashmap::DashMap;
use serde::Deserialize;
use std::time::{Duration, Instant};

const FORECAST_API_BASE: &str = "https://api.open-meteo.com/v1";
const FORECAST_DAYS: u32 = 1;
const FORECAST_CACHE_TTL: Duration = Duration::from_secs(60 * 60);
const MAX_ATTEMPTS: u32 = 5;
const BACKOFF_BASE_MS: u64 = 200;

#[derive(Clone)]
struct CachedForecast {
    records: Vec<DailyPrecipitation>,
    expires_at: Instant,
}

/// Forecast API client with an in-process response cache.
pub struct ForecastClient {
    http: reqwest::Client,
    base_url: String,
    cache: DashMap<String, CachedForecast>,
}

impl ForecastClient {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: FORECAST_API_BASE.to_string(),
            cache: DashMap::new(),
        }
    }

    /// Get the precipitation-probability forecast for the configured window.
    ///
    /// Serves from cache when a fresh entry exists for these coordinates;
    /// otherwise fetches with retry and caches the reshaped records.
    pub async fn daily_precipitation(
        &self,
        point: GeoPoint,
    ) -> Result<Vec<DailyPrecipitation>, AppError> {
        let cache_key = format!("{:.4},{:.4}", point.lat, point.lon);

        if let Some(cached) = self.cache.get(&cache_key) {
            if cached.expires_at > Instant::now() {
                tracing::debug!(key = %cache_key, "Forecast served from cache");
                return Ok(cached.records.clone());
            }
        }

        let response = self.fetch_with_retry(point).await?;
        let records = response.into_records()?;

        self.cache.insert(
            cache_key,
            CachedForecast {
                records: records.clone(),
                expires_at: Instant::now() + FORECAST_CACHE_TTL,
            },
        );

        Ok(records)
    }

    async fn fetch_with_retry(&self, point: GeoPoint) -> Result<ForecastResponse, AppError> {
        let mut attempt = 0;

        loop {
            attempt += 1;

            match self.fetch(point).await {
                Ok(response) => return Ok(response),
                Err(e) if attempt < MAX_ATTEMPTS => {
                    tracing::warn!(
                        attempt,
                        max_attempts = MAX_ATTEMPTS,
                        error = %e,
                        "Forecast request failed, retrying"
                    );
                    tokio::time::sleep(backoff_delay(attempt)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn fetch(&self, point: GeoPoint) -> Result<ForecastResponse, AppError> {
        let url = format!("{}/forecast", self.base_url);

        let response = self
            .http
            .get(&url)
            .query(&[
                ("latitude", point.lat.to_string()),
                ("longitude", point.lon.to_string()),
                ("daily", "precipitation_probability_max".to_string()),
                ("forecast_days", FORECAST_DAYS.to_string()),
                ("timezone", "UTC".to_string()),
            ])
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Forecast request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Upstream(format!(
                "Forecast failed with HTTP {status}: {body}"
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::Upstream(format!("Malformed forecast response: {e}")))
    }
}

impl Default for ForecastClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Delay before retry `attempt + 1`, doubling per attempt.
fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_millis(BACKOFF_BASE_MS * 2u64.pow(attempt.saturating_sub(1)))
}

/// Forecast API response, daily block only.
#[derive(Debug, Deserialize)]
struct ForecastResponse {
    daily: DailyBlock,
}

#[derive(Debug, Deserialize)]
struct DailyBlock {
    time: Vec<String>,
    precipitation_probability_max: Vec<f64>,
}

impl ForecastResponse {
    /// Reshape the column-oriented daily block into one record per bucket.
    fn into_records(self) -> Result<Vec<DailyPrecipitation>, AppError> {
        let daily = self.daily;

        if daily.time.len() != daily.precipitation_probability_max.len() {
            return Err(AppError::Upstream(
                "Forecast daily arrays have mismatched lengths".to_string(),
            ));
        }

        daily
            .time
            .into_iter()
            .zip(daily.precipitation_probability_max)
            .map(|(day, probability)| {
                let date = parse_day_utc(&day).ok_or_else(|| {
                    AppError::Upstream(format!("Bad date in forecast response: {day}"))
                })?;

                Ok(DailyPrecipitation {
                    date: format_utc_rfc3339(date),
                    precipitation_probability_max: probability,
                })
            })
            .collect()
    }
}
