// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Administrative routes: role grants and the crop-user roster.

use crate::error::{AppError, Result};
use crate::models::{ProviderUser, RosterEntry};
use crate::services::identity;
use crate::AppState;
use axum::{
    extract::State,
    http::{header, HeaderMap, Method},
    routing::{any, get},
    Json, Router,
};
use futures_util::TryStreamExt;
use serde::{Deserialize, Serialize};
use std::pin::pin;
use std::sync::Arc;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/admin/grant", any(grant_crop_admin))
        .route("/admin/users", get(list_crop_users))
}

// ─── Role Grant ──────────────────────────────────────────────

#[derive(Deserialize)]
struct GrantRequest {
    #[serde(default)]
    uid: Option<String>,
}

#[derive(Serialize)]
struct GrantResponse {
    message: String,
}

/// Attach the elevated `cropAdmin` claim to an identity.
///
/// POST only; the method is checked here so non-POST calls get the same
/// error body shape as every other failure. Setting the claim twice is a
/// no-op change in the provider.
async fn grant_crop_admin(
    State(state): State<Arc<AppState>>,
    method: Method,
    body: Option<Json<GrantRequest>>,
) -> Result<Json<GrantResponse>> {
    if method != Method::POST {
        return Err(AppError::MethodNotAllowed);
    }

    let uid = body
        .and_then(|Json(request)| request.uid)
        .filter(|uid| !uid.trim().is_empty())
        .ok_or_else(|| AppError::BadRequest("Missing 'uid' in request".to_string()))?;

    state
        .identity
        .set_custom_claims(&uid, &serde_json::json!({ "cropAdmin": true }))
        .await?;

    tracing::info!(uid = %uid, "Crop admin claim granted");
    Ok(Json(GrantResponse {
        message: format!("{uid} is now a crop admin"),
    }))
}

// ─── Roster ──────────────────────────────────────────────────

#[derive(Serialize)]
struct RosterResponse {
    users: Vec<RosterEntry>,
}

/// List every non-internal, non-admin identity with its crop list.
///
/// Requires a valid bearer ID token. Identities stream from the provider
/// page by page; survivors are enriched with one crop read each, in order.
/// Any failure mid-stream aborts the whole response.
async fn list_crop_users(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<RosterResponse>> {
    let token = identity::extract_bearer_token(headers.get(header::AUTHORIZATION))?;
    let caller = state.identity.verify_id_token(token).await?;

    tracing::info!(caller = %caller.uid, "Roster listing requested");

    let mut users = pin!(state.identity.user_stream());
    let mut entries = Vec::new();

    while let Some(user) = users.try_next().await? {
        if !roster_eligible(&user, &state.config.internal_email_domain) {
            continue;
        }

        let crops = state.rtdb.get_crops(&user.local_id).await?;

        entries.push(RosterEntry {
            uid: user.local_id,
            email: user.email,
            display_name: user.display_name,
            crops,
        });
    }

    tracing::debug!(count = entries.len(), "Roster assembled");
    Ok(Json(RosterResponse { users: entries }))
}

/// Roster inclusion predicate. Internal addresses are checked before the
/// claim so an internal admin is excluded for being internal.
fn roster_eligible(user: &ProviderUser, internal_domain: &str) -> bool {
    if user.has_internal_email(internal_domain) {
        return false;
    }
    if user.is_crop_admin() {
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::roster_eligible;
    use crate::models::ProviderUser;

    fn user(email: Option<&str>, claims: Option<&str>) -> ProviderUser {
        ProviderUser {
            local_id: "uid".to_string(),
            email: email.map(str::to_string),
            display_name: Some("Grower".to_string()),
            custom_attributes: claims.map(str::to_string),
        }
    }

    #[test]
    fn internal_addresses_are_excluded() {
        let internal = user(Some("ops@irrigation.internal"), None);
        assert!(!roster_eligible(&internal, "@irrigation.internal"));
    }

    #[test]
    fn existing_admins_are_excluded() {
        let admin = user(Some("amy@example.com"), Some(r#"{"cropAdmin":true}"#));
        assert!(!roster_eligible(&admin, "@irrigation.internal"));
    }

    #[test]
    fn plain_users_survive() {
        let plain = user(Some("amy@example.com"), None);
        assert!(roster_eligible(&plain, "@irrigation.internal"));

        let no_email = user(None, None);
        assert!(roster_eligible(&no_email, "@irrigation.internal"));

        let demoted = user(Some("amy@example.com"), Some(r#"{"cropAdmin":false}"#));
        assert!(roster_eligible(&demoted, "@irrigation.internal"));
    }

    #[test]
    fn internal_admin_is_excluded_once() {
        let both = user(
            Some("ops@irrigation.internal"),
            Some(r#"{"cropAdmin":true}"#),
        );
        assert!(!roster_eligible(&both, "@irrigation.internal"));
    }
}
