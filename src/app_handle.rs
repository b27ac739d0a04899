//! Explicit handle to the backing services.
//!
//! Each client is built on first use and shared afterwards. Asking twice never opens
//! a second database or builds a second HTTP client.

use once_cell::sync::OnceCell;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use crate::ai::{GeminiProvider, GenerationOptions, Summarizer};
use crate::auth::{AuthProvider, LocalAuthProvider};
use crate::config::AppConfig;
use crate::home::HomeView;
use crate::notifications::{NotificationStore, SqliteNotificationStore};
use crate::sync::SyncCore;
use crate::weather::{ConfiguredLocation, ForecastProvider, LocationProvider, OpenMeteoClient};
use std::time::Duration;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Notification store is not configured")]
    StoreNotConfigured,

    #[error("Failed to open {what}: {reason}")]
    Open { what: &'static str, reason: String },
}

pub struct AppHandle {
    config: AppConfig,
    store: OnceCell<Arc<dyn NotificationStore>>,
    auth: OnceCell<Arc<dyn AuthProvider>>,
    summarizer: OnceCell<Arc<dyn Summarizer>>,
    location: OnceCell<Arc<dyn LocationProvider>>,
    forecast: OnceCell<Arc<dyn ForecastProvider>>,
    sync_core: OnceCell<Arc<SyncCore>>,
    home_view: OnceCell<Arc<HomeView>>,
}

impl AppHandle {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            store: OnceCell::new(),
            auth: OnceCell::new(),
            summarizer: OnceCell::new(),
            location: OnceCell::new(),
            forecast: OnceCell::new(),
            sync_core: OnceCell::new(),
            home_view: OnceCell::new(),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn store(&self) -> Result<Arc<dyn NotificationStore>, ConfigError> {
        self.store
            .get_or_try_init(|| {
                let path = self
                    .config
                    .notifications_db_path()
                    .ok_or(ConfigError::StoreNotConfigured)?;
                info!("Opening notification store at {:?}...", path);
                let store = SqliteNotificationStore::new(&path).map_err(|e| ConfigError::Open {
                    what: "notification store",
                    reason: format!("{:#}", e),
                })?;
                Ok(Arc::new(store) as Arc<dyn NotificationStore>)
            })
            .cloned()
    }

    /// Identity provider. Without a database directory the identity only lives as long
    /// as the process.
    pub fn auth(&self) -> Result<Arc<dyn AuthProvider>, ConfigError> {
        self.auth
            .get_or_try_init(|| {
                let anonymous_sign_in = self.config.auth.anonymous_sign_in;
                let provider = match self.config.auth_db_path() {
                    Some(path) => {
                        info!("Opening identity store at {:?}...", path);
                        LocalAuthProvider::new(&path, anonymous_sign_in)
                    }
                    None => LocalAuthProvider::in_memory(anonymous_sign_in),
                }
                .map_err(|e| ConfigError::Open {
                    what: "identity store",
                    reason: format!("{:#}", e),
                })?;
                Ok(Arc::new(provider) as Arc<dyn AuthProvider>)
            })
            .cloned()
    }

    pub fn summarizer(&self) -> Arc<dyn Summarizer> {
        self.summarizer
            .get_or_init(|| {
                let ai = &self.config.ai;
                let provider = GeminiProvider::new(&ai.base_url, &ai.model, ai.api_key.clone());
                if provider.is_configured() {
                    info!("AI features enabled with model {}", ai.model);
                } else {
                    warn!("No Gemini API key configured, AI features will explain how to add one");
                }
                Arc::new(provider) as Arc<dyn Summarizer>
            })
            .clone()
    }

    pub fn generation_options(&self) -> GenerationOptions {
        GenerationOptions {
            timeout: Duration::from_secs(self.config.ai.timeout_sec),
        }
    }

    pub fn location(&self) -> Arc<dyn LocationProvider> {
        self.location
            .get_or_init(|| {
                let weather = &self.config.weather;
                Arc::new(ConfiguredLocation::new(
                    weather.coordinates,
                    weather.location_permission,
                )) as Arc<dyn LocationProvider>
            })
            .clone()
    }

    pub fn forecast(&self) -> Result<Arc<dyn ForecastProvider>, ConfigError> {
        self.forecast
            .get_or_try_init(|| {
                let weather = &self.config.weather;
                let client = OpenMeteoClient::new(&weather.base_url, weather.timeout_sec)
                    .map_err(|e| ConfigError::Open {
                        what: "weather client",
                        reason: e.to_string(),
                    })?;
                Ok(Arc::new(client) as Arc<dyn ForecastProvider>)
            })
            .cloned()
    }

    /// The dashboard core. A missing store is not an error here: the core reports it
    /// in its own state.
    pub fn sync_core(&self) -> Result<Arc<SyncCore>, ConfigError> {
        self.sync_core
            .get_or_try_init(|| {
                let store = self.optional_store()?;
                Ok(SyncCore::new(
                    store,
                    self.auth()?,
                    self.summarizer(),
                    self.config.app_id.clone(),
                    self.generation_options(),
                ))
            })
            .cloned()
    }

    pub fn home_view(&self) -> Result<Arc<HomeView>, ConfigError> {
        self.home_view
            .get_or_try_init(|| {
                Ok(HomeView::new(
                    self.optional_store()?,
                    self.auth()?,
                    self.location(),
                    self.forecast()?,
                    self.config.app_id.clone(),
                ))
            })
            .cloned()
    }

    fn optional_store(&self) -> Result<Option<Arc<dyn NotificationStore>>, ConfigError> {
        match self.store() {
            Ok(store) => Ok(Some(store)),
            Err(ConfigError::StoreNotConfigured) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
