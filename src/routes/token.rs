// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Custom token issuance route.

use crate::error::{AppError, Result};
use crate::AppState;
use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/token", get(issue_token).post(issue_token))
}

/// `uid` can arrive in the JSON body or the query string.
#[derive(Deserialize)]
struct TokenRequest {
    #[serde(default)]
    uid: Option<String>,
}

#[derive(Deserialize)]
struct TokenQuery {
    #[serde(default)]
    uid: Option<String>,
}

#[derive(Serialize)]
struct TokenResponse {
    token: String,
}

/// Mint a short-lived custom token for the requested uid.
///
/// The body takes precedence over the query string. Tokens are minted fresh
/// on every call, never reused.
async fn issue_token(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TokenQuery>,
    body: Option<Json<TokenRequest>>,
) -> Result<Json<TokenResponse>> {
    let uid = body
        .and_then(|Json(request)| request.uid)
        .or(query.uid)
        .filter(|uid| !uid.trim().is_empty())
        .ok_or_else(|| AppError::BadRequest("Missing 'uid' in request".to_string()))?;

    let token = state.identity.mint_custom_token(&uid)?;

    tracing::info!(uid = %uid, "Custom token minted");
    Ok(Json(TokenResponse { token }))
}
