//! Current weather for the home view.
//!
//! One lookup per process: position from a [`LocationProvider`], then a single
//! forecast request. The result is only kept in memory.

mod client;
mod codes;
mod location;

pub use client::{ForecastProvider, OpenMeteoClient, DEFAULT_OPEN_METEO_BASE_URL};
pub use codes::{describe, WeatherCondition};
pub use location::{ConfiguredLocation, Coordinates, LocationProvider};

use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WeatherError {
    #[error("Geolocation not supported")]
    LocationUnsupported,

    #[error("Location permission denied")]
    PermissionDenied,

    #[error("Failed to fetch weather: {0}")]
    Request(String),
}

impl WeatherError {
    /// Static message shown in place of the forecast.
    pub fn user_message(&self) -> &'static str {
        match self {
            WeatherError::LocationUnsupported => "Geolocation not supported",
            WeatherError::PermissionDenied => "Location permission denied",
            WeatherError::Request(_) => "Failed to fetch weather",
        }
    }
}

/// Temperatures in °F.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WeatherSnapshot {
    pub temperature: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub code: Option<i64>,
}

impl WeatherSnapshot {
    pub fn condition(&self) -> WeatherCondition {
        describe(self.code)
    }

    /// One-line summary, e.g. `☀️ Currently 72°F, high 75°F, low 56°F. Clear sky.`
    pub fn summary_line(&self) -> String {
        let condition = self.condition();
        format!(
            "{} Currently {}°F, high {}°F, low {}°F. {}.",
            condition.icon,
            rounded(self.temperature),
            rounded(self.high),
            rounded(self.low),
            condition.description
        )
    }
}

/// Halves round toward positive infinity, so -3.5 reads -3 and -0.5 reads 0.
fn rounded(value: Option<f64>) -> String {
    match value {
        Some(v) if v.is_finite() => format!("{}", (v + 0.5).floor() as i64),
        _ => "--".to_string(),
    }
}

/// Looks up the weather once: position first, then the forecast.
pub async fn lookup(
    location: &dyn LocationProvider,
    forecast: &dyn ForecastProvider,
) -> Result<WeatherSnapshot, WeatherError> {
    let position = location.current_position().await?;
    forecast.current_weather(position).await
}
