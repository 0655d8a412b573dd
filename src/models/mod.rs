// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Data models for the application.

pub mod forecast;
pub mod user;

pub use forecast::DailyPrecipitation;
pub use user::{CropValue, ProviderUser, RosterEntry};
