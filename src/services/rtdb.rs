// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Realtime database client (read-only).
//!
//! Crop lists live at `users/{uid}/crops`. Reads authenticate with the
//! identity client's cached provider access token.

use crate::error::AppError;
use crate::models::CropValue;
use crate::services::identity::IdentityClient;
use serde_json::Value;
use std::sync::Arc;

/// Realtime database REST client.
#[derive(Clone)]
pub struct RtdbClient {
    http: reqwest::Client,
    base_url: String,
    identity: Arc<IdentityClient>,
}

impl RtdbClient {
    /// Create a client for the database at `base_url` (no trailing slash).
    pub fn new(base_url: &str, identity: Arc<IdentityClient>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            identity,
        }
    }

    /// Fetch and normalize the crop list for one user.
    ///
    /// Absent paths read as JSON `null`, which normalizes to an empty list.
    pub async fn get_crops(&self, uid: &str) -> Result<Vec<Value>, AppError> {
        let access_token = self.identity.access_token().await?;
        let url = format!("{}/users/{}/crops.json", self.base_url, uid);

        let response = self
            .http
            .get(&url)
            .bearer_auth(&access_token)
            .send()
            .await
            .map_err(|e| AppError::Database(format!("Crop read request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Database(format!(
                "Crop read failed with HTTP {status}: {body}"
            )));
        }

        let value: CropValue = response
            .json()
            .await
            .map_err(|e| AppError::Database(format!("Malformed crop value: {e}")))?;

        Ok(value.into_list())
    }
}
