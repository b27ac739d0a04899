//! Open-Meteo forecast client.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::location::Coordinates;
use super::{WeatherError, WeatherSnapshot};

pub const DEFAULT_OPEN_METEO_BASE_URL: &str = "https://api.open-meteo.com";

#[async_trait]
pub trait ForecastProvider: Send + Sync {
    async fn current_weather(&self, at: Coordinates) -> Result<WeatherSnapshot, WeatherError>;
}

pub struct OpenMeteoClient {
    client: reqwest::Client,
    base_url: String,
}

impl OpenMeteoClient {
    pub fn new(base_url: impl Into<String>, timeout_sec: u64) -> Result<Self, WeatherError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_sec))
            .build()
            .map_err(|e| WeatherError::Request(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl ForecastProvider for OpenMeteoClient {
    async fn current_weather(&self, at: Coordinates) -> Result<WeatherSnapshot, WeatherError> {
        let url = format!("{}/v1/forecast", self.base_url);
        debug!(
            latitude = at.latitude,
            longitude = at.longitude,
            "Fetching current weather"
        );

        let response = self
            .client
            .get(&url)
            .query(&[
                ("latitude", at.latitude.to_string()),
                ("longitude", at.longitude.to_string()),
                ("current_weather", "true".to_string()),
                ("temperature_unit", "fahrenheit".to_string()),
                (
                    "daily",
                    "temperature_2m_max,temperature_2m_min,weathercode".to_string(),
                ),
                ("timezone", "auto".to_string()),
            ])
            .send()
            .await
            .map_err(|e| WeatherError::Request(e.to_string()))?;

        if !response.status().is_success() {
            return Err(WeatherError::Request(format!(
                "Forecast request failed with status {}",
                response.status()
            )));
        }

        let forecast: ForecastResponse = response
            .json()
            .await
            .map_err(|e| WeatherError::Request(format!("Failed to parse forecast: {}", e)))?;
        Ok(forecast.into())
    }
}

#[derive(Debug, Default, Deserialize)]
struct ForecastResponse {
    current_weather: Option<CurrentWeather>,
    daily: Option<Daily>,
}

#[derive(Debug, Deserialize)]
struct CurrentWeather {
    temperature: Option<f64>,
    weathercode: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct Daily {
    #[serde(default)]
    temperature_2m_max: Vec<Option<f64>>,
    #[serde(default)]
    temperature_2m_min: Vec<Option<f64>>,
}

impl From<ForecastResponse> for WeatherSnapshot {
    fn from(forecast: ForecastResponse) -> Self {
        let (temperature, code) = forecast
            .current_weather
            .map(|c| (c.temperature, c.weathercode))
            .unwrap_or((None, None));
        let (high, low) = forecast
            .daily
            .map(|d| {
                (
                    d.temperature_2m_max.first().copied().flatten(),
                    d.temperature_2m_min.first().copied().flatten(),
                )
            })
            .unwrap_or((None, None));
        WeatherSnapshot {
            temperature,
            high,
            low,
            code,
        }
    }
}
