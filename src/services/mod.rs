// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - external API clients.

pub mod forecast;
pub mod geocode;
pub mod identity;
pub mod rtdb;

pub use forecast::ForecastClient;
pub use geocode::{GeoPoint, GeocodeClient};
pub use identity::{IdentityClient, VerifiedIdentity};
pub use rtdb::RtdbClient;
