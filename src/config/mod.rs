mod file_config;

pub use file_config::{AiConfig, AuthConfig, FileConfig, WeatherConfig};

use crate::ai::{DEFAULT_GEMINI_BASE_URL, DEFAULT_GEMINI_MODEL};
use crate::server::RequestsLoggingLevel;
use crate::weather::{Coordinates, DEFAULT_OPEN_METEO_BASE_URL};
use anyhow::{bail, Result};
use clap::ValueEnum;
use std::path::PathBuf;

pub const DEFAULT_APP_ID: &str = "notification-receiver";

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub db_dir: Option<PathBuf>,
    pub port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub app_id: Option<String>,
    pub frontend_dir_path: Option<String>,
    pub gemini_api_key: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    // Core settings
    /// Where the databases live. Without it the dashboard reports a configuration error.
    pub db_dir: Option<PathBuf>,
    pub port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub app_id: String,
    pub frontend_dir_path: Option<String>,

    // Feature configs (with defaults)
    pub ai: AiSettings,
    pub weather: WeatherSettings,
    pub auth: AuthSettings,
}

#[derive(Debug, Clone)]
pub struct AiSettings {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub timeout_sec: u64,
}

impl Default for AiSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            model: DEFAULT_GEMINI_MODEL.to_string(),
            timeout_sec: 120,
        }
    }
}

#[derive(Debug, Clone)]
pub struct WeatherSettings {
    pub coordinates: Option<Coordinates>,
    pub base_url: String,
    pub location_permission: bool,
    pub timeout_sec: u64,
}

impl Default for WeatherSettings {
    fn default() -> Self {
        Self {
            coordinates: None,
            base_url: DEFAULT_OPEN_METEO_BASE_URL.to_string(),
            location_permission: true,
            timeout_sec: 30,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AuthSettings {
    pub anonymous_sign_in: bool,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            anonymous_sign_in: true,
        }
    }
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let db_dir = file.db_dir.map(PathBuf::from).or_else(|| cli.db_dir.clone());
        if let Some(db_dir) = &db_dir {
            if !db_dir.exists() {
                bail!("Database directory does not exist: {:?}", db_dir);
            }
            if !db_dir.is_dir() {
                bail!("db_dir is not a directory: {:?}", db_dir);
            }
        }

        let port = file.port.unwrap_or(cli.port);

        let logging_level = file
            .logging_level
            .and_then(|s| parse_logging_level(&s))
            .unwrap_or_else(|| cli.logging_level.clone());

        let app_id = file
            .app_id
            .or_else(|| cli.app_id.clone())
            .unwrap_or_else(|| DEFAULT_APP_ID.to_string());
        if app_id.trim().is_empty() || app_id.contains('/') {
            bail!("Invalid app_id: {:?}", app_id);
        }

        let frontend_dir_path = file
            .frontend_dir_path
            .or_else(|| cli.frontend_dir_path.clone());

        let ai_file = file.ai.unwrap_or_default();
        let ai_defaults = AiSettings::default();
        let ai = AiSettings {
            api_key: ai_file.api_key.or_else(|| cli.gemini_api_key.clone()),
            base_url: ai_file.base_url.unwrap_or(ai_defaults.base_url),
            model: ai_file.model.unwrap_or(ai_defaults.model),
            timeout_sec: ai_file.timeout_sec.unwrap_or(ai_defaults.timeout_sec),
        };

        let weather_file = file.weather.unwrap_or_default();
        let weather_defaults = WeatherSettings::default();
        let coordinates = match (weather_file.latitude, weather_file.longitude) {
            (Some(latitude), Some(longitude)) => Some(Coordinates {
                latitude,
                longitude,
            }),
            (None, None) => None,
            _ => bail!("weather.latitude and weather.longitude must be set together"),
        };
        let weather = WeatherSettings {
            coordinates,
            base_url: weather_file.base_url.unwrap_or(weather_defaults.base_url),
            location_permission: weather_file
                .location_permission
                .unwrap_or(weather_defaults.location_permission),
            timeout_sec: weather_file
                .timeout_sec
                .unwrap_or(weather_defaults.timeout_sec),
        };

        let auth = AuthSettings {
            anonymous_sign_in: file
                .auth
                .and_then(|a| a.anonymous_sign_in)
                .unwrap_or(AuthSettings::default().anonymous_sign_in),
        };

        Ok(Self {
            db_dir,
            port,
            logging_level,
            app_id,
            frontend_dir_path,
            ai,
            weather,
            auth,
        })
    }

    pub fn notifications_db_path(&self) -> Option<PathBuf> {
        self.db_dir.as_ref().map(|dir| dir.join("notifications.db"))
    }

    pub fn auth_db_path(&self) -> Option<PathBuf> {
        self.db_dir.as_ref().map(|dir| dir.join("auth.db"))
    }
}

/// Parses a logging level string into RequestsLoggingLevel.
/// Uses clap's ValueEnum trait for parsing.
fn parse_logging_level(s: &str) -> Option<RequestsLoggingLevel> {
    RequestsLoggingLevel::from_str(s, true).ok()
}
