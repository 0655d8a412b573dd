//! User models for the identity provider and the roster response.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Identity as returned by the provider's paginated account listing.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderUser {
    /// Provider-assigned opaque identifier
    pub local_id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    /// Custom claims, stored by the provider as a JSON-encoded string
    #[serde(default)]
    pub custom_attributes: Option<String>,
}

impl ProviderUser {
    /// Parse the custom claims attached to this identity.
    ///
    /// A missing or malformed attribute string counts as "no claims".
    pub fn custom_claims(&self) -> serde_json::Map<String, Value> {
        self.custom_attributes
            .as_deref()
            .and_then(|raw| serde_json::from_str(raw).ok())
            .unwrap_or_default()
    }

    /// Whether this identity already holds the elevated `cropAdmin` claim.
    pub fn is_crop_admin(&self) -> bool {
        self.custom_claims()
            .get("cropAdmin")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// Whether the identity's email ends with the given internal suffix.
    pub fn has_internal_email(&self, suffix: &str) -> bool {
        self.email
            .as_deref()
            .is_some_and(|email| email.ends_with(suffix))
    }
}

/// One roster row: identity attributes joined with the crop list.
#[derive(Debug, Clone, Serialize)]
pub struct RosterEntry {
    pub uid: String,
    pub email: Option<String>,
    #[serde(rename = "displayName")]
    pub display_name: Option<String>,
    pub crops: Vec<Value>,
}

/// Crop list value as stored in the realtime database.
///
/// The backing store has no schema for this path, so the value is decoded
/// into an explicit union and normalized to a list. Unrecognized shapes
/// fall back to an empty list rather than an error.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum CropValue {
    List(Vec<Value>),
    Map(serde_json::Map<String, Value>),
    Other(Value),
}

impl CropValue {
    /// Normalize to a flat list of crop records.
    ///
    /// Lists pass through unchanged; maps yield their values in backing-store
    /// order; null and scalars become the empty list.
    pub fn into_list(self) -> Vec<Value> {
        match self {
            CropValue::List(items) => items,
            CropValue::Map(map) => map.into_iter().map(|(_, v)| v).collect(),
            CropValue::Other(_) => Vec::new(),
        }
    }
}
