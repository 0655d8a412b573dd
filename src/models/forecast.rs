//! Forecast records returned to the client.

use serde::Serialize;

/// One daily bucket of the precipitation forecast.
///
/// Serialized record-oriented, one object per bucket.
#[derive(Debug, Clone, Serialize)]
pub struct DailyPrecipitation {
    /// Bucket date as RFC3339 midnight UTC
    pub date: String,
    pub precipitation_probability_max: f64,
}
