// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Identity provider client.
//!
//! Handles:
//! - Custom token minting (signed locally with the service account key)
//! - Custom claim updates (`cropAdmin` marker)
//! - ID token verification against the provider's published JWKS
//! - Paginated account listing, exposed as a lazy stream
//!
//! API calls authenticate with an OAuth2 access token obtained through the
//! JWT-bearer grant; the token is cached in memory and refreshed under a
//! single-flight lock.

use crate::error::AppError;
use crate::models::ProviderUser;
use axum::http::HeaderValue;
use futures_util::{stream, Stream, TryStreamExt};
use jsonwebtoken::{
    decode, decode_header, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use reqwest::header::CACHE_CONTROL;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tokio::sync::{Mutex, RwLock};

const IDENTITY_API_BASE: &str = "https://identitytoolkit.googleapis.com/v1";
const OAUTH_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const SECURETOKEN_JWKS_URL: &str =
    "https://www.googleapis.com/service_accounts/v1/jwk/securetoken@system.gserviceaccount.com";
const SECURETOKEN_ISSUER_PREFIX: &str = "https://securetoken.google.com/";

/// Audience the provider expects inside minted custom tokens.
const CUSTOM_TOKEN_AUDIENCE: &str =
    "https://identitytoolkit.googleapis.com/google.identity.identitytoolkit.v1.IdentityToolkit";

/// Scopes needed for account administration and database reads.
const OAUTH_SCOPES: &str = "https://www.googleapis.com/auth/identitytoolkit \
     https://www.googleapis.com/auth/firebase.database \
     https://www.googleapis.com/auth/userinfo.email";

const TOKEN_TTL_SECS: u64 = 3600;
/// Margin before expiry when the cached access token is refreshed (5 minutes).
const ACCESS_TOKEN_MARGIN: Duration = Duration::from_secs(5 * 60);
const DEFAULT_JWKS_TTL: Duration = Duration::from_secs(300);
const CLOCK_SKEW_SECS: u64 = 60;
const LIST_PAGE_SIZE: u32 = 500;

/// Service account key material, parsed from the JSON key file.
#[derive(Debug, Clone, Deserialize)]
struct ServiceAccountKey {
    project_id: String,
    client_email: String,
    private_key: String,
}

/// Loaded signing credentials.
struct Credentials {
    project_id: String,
    client_email: String,
    signing_key: EncodingKey,
}

#[derive(Clone)]
struct CachedAccessToken {
    token: String,
    expires_at: Instant,
}

#[derive(Clone)]
struct JwksCacheEntry {
    keys_by_kid: HashMap<String, Arc<DecodingKey>>,
    expires_at: Instant,
}

/// Identity provider client. Construct once at startup and share.
pub struct IdentityClient {
    http: reqwest::Client,
    api_base: String,
    oauth_token_url: String,
    jwks_url: String,
    /// None in offline mode: every API call errors, every token is rejected.
    credentials: Option<Credentials>,
    access_cache: RwLock<Option<CachedAccessToken>>,
    access_refresh_lock: Mutex<()>,
    jwks_cache: RwLock<Option<JwksCacheEntry>>,
    jwks_refresh_lock: Mutex<()>,
}

/// Identity confirmed by ID token verification.
#[derive(Debug, Clone)]
pub struct VerifiedIdentity {
    pub uid: String,
    pub email: Option<String>,
}

/// One page of the provider's account listing.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPage {
    #[serde(default)]
    pub users: Vec<ProviderUser>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

impl IdentityClient {
    /// Load signing credentials from a service account key file.
    pub fn from_key_file(path: &str) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed reading service account key {path}: {e}"))?;
        let key: ServiceAccountKey = serde_json::from_str(&raw)
            .map_err(|e| anyhow::anyhow!("malformed service account key {path}: {e}"))?;

        let signing_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
            .map_err(|e| anyhow::anyhow!("invalid RSA private key in {path}: {e}"))?;

        tracing::info!(
            project = %key.project_id,
            client_email = %key.client_email,
            "Identity provider client initialized"
        );

        Ok(Self::build(Some(Credentials {
            project_id: key.project_id,
            client_email: key.client_email,
            signing_key,
        })))
    }

    /// Create an offline client for testing.
    ///
    /// API calls return an upstream error and token verification rejects
    /// every token.
    pub fn new_mock() -> Self {
        Self::build(None)
    }

    fn build(credentials: Option<Credentials>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: IDENTITY_API_BASE.to_string(),
            oauth_token_url: OAUTH_TOKEN_URL.to_string(),
            jwks_url: SECURETOKEN_JWKS_URL.to_string(),
            credentials,
            access_cache: RwLock::new(None),
            access_refresh_lock: Mutex::new(()),
            jwks_cache: RwLock::new(None),
            jwks_refresh_lock: Mutex::new(()),
        }
    }

    fn creds(&self) -> Result<&Credentials, AppError> {
        self.credentials.as_ref().ok_or_else(|| {
            AppError::Upstream("identity provider not configured (offline mode)".to_string())
        })
    }

    // ─── Custom Tokens ───────────────────────────────────────────

    /// Mint a short-lived custom token for the given uid.
    ///
    /// Signed locally with the service account key; no network call. A fresh
    /// token is produced on every invocation.
    pub fn mint_custom_token(&self, uid: &str) -> Result<String, AppError> {
        let creds = self.creds()?;
        let claims = build_custom_token_claims(&creds.client_email, uid, now_unix_secs());

        jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &creds.signing_key)
            .map_err(|e| AppError::Upstream(format!("Failed to sign custom token: {e}")))
    }

    // ─── API Access Token ────────────────────────────────────────

    /// Get a valid OAuth2 access token for provider API calls.
    ///
    /// Cached in memory; a single-flight lock prevents duplicate refreshes.
    pub(crate) async fn access_token(&self) -> Result<String, AppError> {
        if let Some(cached) = self.cached_access_token().await {
            return Ok(cached);
        }

        let _guard = self.access_refresh_lock.lock().await;

        // Another task may have refreshed while we waited on the lock.
        if let Some(cached) = self.cached_access_token().await {
            return Ok(cached);
        }

        let creds = self.creds()?;
        let assertion = build_oauth_assertion(creds)?;

        let response = self
            .http
            .post(&self.oauth_token_url)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("OAuth token request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Upstream(format!(
                "OAuth token exchange failed with HTTP {status}: {body}"
            )));
        }

        let token: OAuthTokenResponse = response
            .json()
            .await
            .map_err(|e| AppError::Upstream(format!("Malformed OAuth token response: {e}")))?;

        let expires_at = Instant::now() + Duration::from_secs(token.expires_in);
        *self.access_cache.write().await = Some(CachedAccessToken {
            token: token.access_token.clone(),
            expires_at,
        });

        tracing::debug!("Provider access token refreshed and cached");
        Ok(token.access_token)
    }

    async fn cached_access_token(&self) -> Option<String> {
        let cache = self.access_cache.read().await;
        cache
            .as_ref()
            .filter(|entry| Instant::now() + ACCESS_TOKEN_MARGIN < entry.expires_at)
            .map(|entry| entry.token.clone())
    }

    // ─── Custom Claims ───────────────────────────────────────────

    /// Attach custom claims to an identity. Replaces the claim set; setting
    /// the same claims twice is a no-op change.
    pub async fn set_custom_claims(
        &self,
        uid: &str,
        claims: &serde_json::Value,
    ) -> Result<(), AppError> {
        let creds = self.creds()?;
        let access_token = self.access_token().await?;

        let url = format!(
            "{}/projects/{}/accounts:update",
            self.api_base, creds.project_id
        );

        let body = serde_json::json!({
            "localId": uid,
            "customAttributes": claims.to_string(),
        });

        let response = self
            .http
            .post(&url)
            .bearer_auth(&access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Claim update request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Upstream(format!(
                "Claim update failed with HTTP {status}: {body}"
            )));
        }

        tracing::info!(uid, "Custom claims updated");
        Ok(())
    }

    // ─── ID Token Verification ───────────────────────────────────

    /// Verify a caller's ID token and return the confirmed identity.
    ///
    /// Signature is checked against the provider's published JWKS; issuer and
    /// audience must match the configured project.
    pub async fn verify_id_token(&self, token: &str) -> Result<VerifiedIdentity, AppError> {
        let creds = self.creds().map_err(|_| {
            AppError::InvalidToken("no verification keys available (offline mode)".to_string())
        })?;

        let header = decode_header(token)
            .map_err(|e| AppError::InvalidToken(format!("invalid JWT header: {e}")))?;

        if header.alg != Algorithm::RS256 {
            return Err(AppError::InvalidToken(format!(
                "unexpected JWT alg: {:?}",
                header.alg
            )));
        }

        let kid = header
            .kid
            .ok_or_else(|| AppError::InvalidToken("missing JWT kid".to_string()))?;

        let decoding_key = self.decoding_key_for_kid(&kid).await?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);
        validation.set_issuer(&[format!("{SECURETOKEN_ISSUER_PREFIX}{}", creds.project_id)]);
        validation.set_audience(&[creds.project_id.as_str()]);
        validation.leeway = CLOCK_SKEW_SECS;

        let token_data = decode::<IdTokenClaims>(token, decoding_key.as_ref(), &validation)
            .map_err(|e| AppError::InvalidToken(format!("JWT validation failed: {e}")))?;

        let claims = token_data.claims;

        tracing::debug!(
            subject = %claims.sub,
            audience = %claims.aud,
            issuer = %claims.iss,
            exp = claims.exp,
            "ID token verified"
        );

        if claims.sub.trim().is_empty() {
            return Err(AppError::InvalidToken("empty sub claim".to_string()));
        }

        Ok(VerifiedIdentity {
            uid: claims.sub,
            email: claims.email,
        })
    }

    async fn decoding_key_for_kid(&self, kid: &str) -> Result<Arc<DecodingKey>, AppError> {
        if let Some(key) = self.lookup_cached_key(kid).await {
            return Ok(key);
        }

        for force_refresh in [false, true] {
            self.refresh_jwks(force_refresh).await?;
            if let Some(key) = self.lookup_cached_key(kid).await {
                return Ok(key);
            }
        }

        Err(AppError::InvalidToken(format!(
            "JWT kid not found in JWKS after refresh: {kid}"
        )))
    }

    async fn lookup_cached_key(&self, kid: &str) -> Option<Arc<DecodingKey>> {
        let cache = self.jwks_cache.read().await;
        let now = Instant::now();
        cache
            .as_ref()
            .filter(|entry| entry.expires_at > now)
            .and_then(|entry| entry.keys_by_kid.get(kid))
            .cloned()
    }

    async fn refresh_jwks(&self, force_refresh: bool) -> Result<(), AppError> {
        let _guard = self.jwks_refresh_lock.lock().await;

        if !force_refresh {
            let cache = self.jwks_cache.read().await;
            if cache
                .as_ref()
                .is_some_and(|entry| entry.expires_at > Instant::now())
            {
                return Ok(());
            }
        }

        tracing::debug!(jwks_url = %self.jwks_url, "Refreshing provider JWKS cache");

        let response = self
            .http
            .get(&self.jwks_url)
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("JWKS request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(AppError::Upstream(format!(
                "JWKS request returned status {}",
                response.status()
            )));
        }

        let ttl = cache_ttl_from_headers(response.headers(), DEFAULT_JWKS_TTL);

        let jwks: Jwks = response
            .json()
            .await
            .map_err(|e| AppError::Upstream(format!("invalid JWKS JSON: {e}")))?;

        let mut keys_by_kid: HashMap<String, Arc<DecodingKey>> = HashMap::new();

        for jwk in jwks.keys {
            if jwk.kty != "RSA" || jwk.kid.trim().is_empty() {
                continue;
            }

            match DecodingKey::from_rsa_components(&jwk.n, &jwk.e) {
                Ok(key) => {
                    keys_by_kid.insert(jwk.kid, Arc::new(key));
                }
                Err(e) => {
                    tracing::warn!(error = %e, kid = %jwk.kid, "Skipping invalid RSA JWKS key");
                }
            }
        }

        if keys_by_kid.is_empty() {
            return Err(AppError::Upstream(
                "JWKS response did not include any usable RSA keys".to_string(),
            ));
        }

        *self.jwks_cache.write().await = Some(JwksCacheEntry {
            keys_by_kid,
            expires_at: Instant::now() + ttl,
        });

        tracing::debug!(ttl_secs = ttl.as_secs(), "Provider JWKS cache refreshed");
        Ok(())
    }

    // ─── Account Listing ─────────────────────────────────────────

    /// Fetch one page of the provider's account listing.
    pub async fn list_users_page(
        &self,
        page_token: Option<&str>,
    ) -> Result<UserPage, AppError> {
        let creds = self.creds()?;
        let access_token = self.access_token().await?;

        let url = format!(
            "{}/projects/{}/accounts:batchGet",
            self.api_base, creds.project_id
        );

        let mut request = self
            .http
            .get(&url)
            .bearer_auth(&access_token)
            .query(&[("maxResults", LIST_PAGE_SIZE.to_string())]);

        if let Some(token) = page_token {
            request = request.query(&[("nextPageToken", token)]);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Account listing request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Upstream(format!(
                "Account listing failed with HTTP {status}: {body}"
            )));
        }

        let mut page: UserPage = response
            .json()
            .await
            .map_err(|e| AppError::Upstream(format!("Malformed account listing page: {e}")))?;

        // The provider signals the last page with an absent or empty token.
        if page.next_page_token.as_deref() == Some("") {
            page.next_page_token = None;
        }

        Ok(page)
    }

    /// All identities known to the provider, as a lazy stream.
    ///
    /// Pages are fetched one at a time as the stream is consumed, so memory
    /// use is bounded by the provider's page size regardless of the total
    /// account count. Page count is unbounded.
    pub fn user_stream(&self) -> impl Stream<Item = Result<ProviderUser, AppError>> + '_ {
        // State: Some(None) = first page, Some(Some(token)) = continuation,
        // None = exhausted.
        stream::try_unfold(Some(None::<String>), move |state| async move {
            let Some(page_token) = state else {
                return Ok::<_, AppError>(None);
            };

            let page = self.list_users_page(page_token.as_deref()).await?;
            let next_state = page.next_page_token.map(Some);

            let users = stream::iter(page.users.into_iter().map(Ok::<_, AppError>));
            Ok(Some((users, next_state)))
        })
        .try_flatten()
    }
}

// ─── Wire Types & Helpers ────────────────────────────────────────

/// Claims of a minted custom token.
#[derive(Debug, Serialize)]
struct CustomTokenClaims {
    iss: String,
    sub: String,
    aud: String,
    iat: u64,
    exp: u64,
    uid: String,
}

fn build_custom_token_claims(client_email: &str, uid: &str, now: u64) -> CustomTokenClaims {
    CustomTokenClaims {
        iss: client_email.to_string(),
        sub: client_email.to_string(),
        aud: CUSTOM_TOKEN_AUDIENCE.to_string(),
        iat: now,
        exp: now + TOKEN_TTL_SECS,
        uid: uid.to_string(),
    }
}

/// Claims of the JWT-bearer grant assertion.
#[derive(Debug, Serialize)]
struct OAuthAssertionClaims {
    iss: String,
    scope: String,
    aud: String,
    iat: u64,
    exp: u64,
}

fn build_oauth_assertion(creds: &Credentials) -> Result<String, AppError> {
    let now = now_unix_secs();
    let claims = OAuthAssertionClaims {
        iss: creds.client_email.clone(),
        scope: OAUTH_SCOPES.to_string(),
        aud: OAUTH_TOKEN_URL.to_string(),
        iat: now,
        exp: now + TOKEN_TTL_SECS,
    };

    jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &creds.signing_key)
        .map_err(|e| AppError::Upstream(format!("Failed to sign OAuth assertion: {e}")))
}

#[derive(Debug, Deserialize)]
struct OAuthTokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Deserialize)]
struct Jwks {
    keys: Vec<Jwk>,
}

#[derive(Debug, Deserialize)]
struct Jwk {
    kid: String,
    kty: String,
    n: String,
    e: String,
}

#[derive(Debug, Deserialize)]
struct IdTokenClaims {
    sub: String,
    aud: String,
    iss: String,
    exp: usize,
    email: Option<String>,
}

/// Extract a bearer token from an Authorization header value.
pub fn extract_bearer_token(auth_header: Option<&HeaderValue>) -> Result<&str, AppError> {
    let value = auth_header
        .ok_or(AppError::Unauthorized)?
        .to_str()
        .map_err(|_| AppError::Unauthorized)?;

    let token = value
        .strip_prefix("Bearer ")
        .ok_or(AppError::Unauthorized)?;

    if token.is_empty() {
        return Err(AppError::Unauthorized);
    }

    Ok(token)
}

fn cache_ttl_from_headers(headers: &reqwest::header::HeaderMap, fallback: Duration) -> Duration {
    headers
        .get(CACHE_CONTROL)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_cache_control_max_age)
        .map(Duration::from_secs)
        .unwrap_or(fallback)
}

fn parse_cache_control_max_age(value: &str) -> Option<u64> {
    for directive in value.split(',') {
        let directive = directive.trim();

        if let Some(raw) = directive.strip_prefix("max-age=") {
            let raw = raw.trim_matches('"');
            if let Ok(seconds) = raw.parse::<u64>() {
                return Some(seconds);
            }
        }
    }

    None
}

fn now_unix_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn custom_token_claims_shape() {
        let claims = build_custom_token_claims("svc@project.example", "user-1", 1_700_000_000);

        assert_eq!(claims.iss, "svc@project.example");
        assert_eq!(claims.sub, "svc@project.example");
        assert_eq!(claims.aud, CUSTOM_TOKEN_AUDIENCE);
        assert_eq!(claims.uid, "user-1");
        assert_eq!(claims.exp, claims.iat + TOKEN_TTL_SECS);
    }

    #[test]
    fn extract_bearer_token_errors() {
        assert!(matches!(
            extract_bearer_token(None),
            Err(AppError::Unauthorized)
        ));

        let bad = HeaderValue::from_static("Basic abc");
        assert!(matches!(
            extract_bearer_token(Some(&bad)),
            Err(AppError::Unauthorized)
        ));

        let empty = HeaderValue::from_static("Bearer ");
        assert!(matches!(
            extract_bearer_token(Some(&empty)),
            Err(AppError::Unauthorized)
        ));

        let ok = HeaderValue::from_static("Bearer abc.def.ghi");
        assert_eq!(extract_bearer_token(Some(&ok)).unwrap(), "abc.def.ghi");
    }

    #[test]
    fn parse_cache_control_max_age_valid() {
        assert_eq!(
            parse_cache_control_max_age("public, max-age=3600"),
            Some(3600)
        );
        assert_eq!(parse_cache_control_max_age("max-age=60"), Some(60));
        assert_eq!(parse_cache_control_max_age("max-age=\"120\""), Some(120));
    }

    #[test]
    fn parse_cache_control_max_age_invalid() {
        assert_eq!(parse_cache_control_max_age("public, immutable"), None);
        assert_eq!(parse_cache_control_max_age("max-age=abc"), None);
        assert_eq!(parse_cache_control_max_age(""), None);
    }

    #[tokio::test]
    async fn mock_client_rejects_tokens_and_calls() {
        let client = IdentityClient::new_mock();

        assert!(matches!(
            client.verify_id_token("whatever").await,
            Err(AppError::InvalidToken(_))
        ));
        assert!(matches!(
            client.mint_custom_token("u1"),
            Err(AppError::Upstream(_))
        ));
    }
}
