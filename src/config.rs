//! Application configuration loaded from environment variables.
//!
//! Everything here is read once at process startup; handlers never re-read
//! the environment.

use std::env;

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the identity provider service account key file (JSON)
    pub service_account_path: String,
    /// Realtime database root URL (crop lists live under `users/{uid}/crops`)
    pub database_url: String,
    /// Email suffix marking internal accounts, excluded from the roster
    pub internal_email_domain: String,
    /// Courtesy delay before each geocoding call, in milliseconds
    pub geocode_delay_ms: u64,
    /// Frontend URL for CORS
    pub frontend_url: String,
    /// Server port
    pub port: u16,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        Ok(Self {
            service_account_path: env::var("SERVICE_ACCOUNT_PATH")
                .map_err(|_| ConfigError::Missing("SERVICE_ACCOUNT_PATH"))?,
            database_url: env::var("DATABASE_URL")
                .map_err(|_| ConfigError::Missing("DATABASE_URL"))?
                .trim_end_matches('/')
                .to_string(),
            internal_email_domain: env::var("INTERNAL_EMAIL_DOMAIN")
                .unwrap_or_else(|_| "@irrigation.internal".to_string()),
            geocode_delay_ms: env::var("GEOCODE_DELAY_MS")
                .unwrap_or_else(|_| "1000".to_string())
                .parse()
                .unwrap_or(1000),
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
        })
    }

    /// Default config for testing only.
    pub fn test_default() -> Self {
        Self {
            service_account_path: "service-account.test.json".to_string(),
            database_url: "http://localhost:9000".to_string(),
            internal_email_domain: "@irrigation.internal".to_string(),
            geocode_delay_ms: 0,
            frontend_url: "http://localhost:5173".to_string(),
            port: 8080,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_env() {
        env::set_var("SERVICE_ACCOUNT_PATH", "/etc/keys/sa.json");
        env::set_var("DATABASE_URL", "https://crops-db.example.test/");

        let config = Config::from_env().expect("Config should load");

        assert_eq!(config.service_account_path, "/etc/keys/sa.json");
        // Trailing slash is stripped so path joins stay predictable
        assert_eq!(config.database_url, "https://crops-db.example.test");
        assert_eq!(config.geocode_delay_ms, 1000);
        assert_eq!(config.port, 8080);
    }
}
