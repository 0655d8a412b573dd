// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! One-shot bootstrap script: grant the `cropAdmin` claim to a single
//! identity. Intended for manual operator use during initial setup.
//!
//! Fill in `BOOTSTRAP_UID` before running:
//!
//! ```text
//! cargo run --bin grant_admin
//! ```

use irrigation_api::config::Config;
use irrigation_api::services::IdentityClient;

/// The identity to elevate. Intentionally hardcoded; this is a setup tool,
/// not an API.
const BOOTSTRAP_UID: &str = "";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if BOOTSTRAP_UID.is_empty() {
        anyhow::bail!("set BOOTSTRAP_UID in src/bin/grant_admin.rs before running");
    }

    let config = Config::from_env()?;
    let identity = IdentityClient::from_key_file(&config.service_account_path)?;

    identity
        .set_custom_claims(BOOTSTRAP_UID, &serde_json::json!({ "cropAdmin": true }))
        .await?;

    println!("{BOOTSTRAP_UID} is now a crop admin");
    Ok(())
}
