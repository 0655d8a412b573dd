// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Irrigation API: gateway between the irrigation app and its providers
//!
//! This crate bridges the mobile/web irrigation frontend to the identity
//! provider (token issuance, role grants), a geocoding service, and a
//! weather forecast service.

pub mod config;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use services::{ForecastClient, GeocodeClient, IdentityClient, RtdbClient};
use std::sync::Arc;

/// Shared application state, constructed once at startup.
pub struct AppState {
    pub config: Config,
    pub identity: Arc<IdentityClient>,
    pub rtdb: RtdbClient,
    pub geocode: GeocodeClient,
    pub forecast: ForecastClient,
}
