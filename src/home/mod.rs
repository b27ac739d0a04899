//! The home view: today's weather and the two newest notifications.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::auth::AuthProvider;
use crate::notifications::{
    CollectionPath, CollectionQuery, Identity, Notification, NotificationStore, Subscription,
};
use crate::sync::SubscriptionSlot;
use crate::weather::{self, ForecastProvider, LocationProvider, WeatherSnapshot};

pub const LOADING_WEATHER_MESSAGE: &str = "Loading weather...";
pub const WIDGET_SIZE: usize = 2;

/// Senders use this value when a print has no preview.
const NO_IMAGE_PLACEHOLDER: &str = "No image found";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WeatherStatus {
    Loading,
    Ready { snapshot: WeatherSnapshot },
    Failed { message: String },
}

impl WeatherStatus {
    pub fn line(&self) -> String {
        match self {
            WeatherStatus::Loading => LOADING_WEATHER_MESSAGE.to_string(),
            WeatherStatus::Ready { snapshot } => snapshot.summary_line(),
            WeatherStatus::Failed { message } => message.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetEntry {
    pub id: String,
    pub file_name: Option<String>,
    pub image_url: Option<String>,
    pub notes: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
}

impl From<&Notification> for WidgetEntry {
    fn from(notification: &Notification) -> Self {
        let text = |key: &str| notification.payload_str(key).map(str::to_string);
        Self {
            id: notification.id.clone(),
            file_name: text("fileName"),
            image_url: text("imageUrl").filter(|url| url != NO_IMAGE_PLACEHOLDER),
            notes: text("notes"),
            timestamp: notification.timestamp,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HomeState {
    pub weather: WeatherStatus,
    /// Absent until there is an identity to read notifications for.
    pub latest: Option<Vec<WidgetEntry>>,
    #[serde(skip)]
    weather_seq: u64,
    #[serde(skip)]
    widget_generation: Option<u64>,
}

impl Default for HomeState {
    fn default() -> Self {
        Self {
            weather: WeatherStatus::Loading,
            latest: None,
            weather_seq: 0,
            widget_generation: None,
        }
    }
}

impl HomeState {
    pub fn weather_line(&self) -> String {
        self.weather.line()
    }
}

pub struct HomeView {
    store: Option<Arc<dyn NotificationStore>>,
    auth: Arc<dyn AuthProvider>,
    location: Arc<dyn LocationProvider>,
    forecast: Arc<dyn ForecastProvider>,
    app_id: String,
    state: Arc<watch::Sender<HomeState>>,
    weather_seq: AtomicU64,
    widget_generation: AtomicU64,
    weather_requested: AtomicBool,
    slot: tokio::sync::Mutex<SubscriptionSlot>,
    shutdown_token: CancellationToken,
    follow_task: Mutex<Option<JoinHandle<()>>>,
}

impl HomeView {
    pub fn new(
        store: Option<Arc<dyn NotificationStore>>,
        auth: Arc<dyn AuthProvider>,
        location: Arc<dyn LocationProvider>,
        forecast: Arc<dyn ForecastProvider>,
        app_id: impl Into<String>,
    ) -> Arc<Self> {
        let (state, _) = watch::channel(HomeState::default());
        Arc::new(Self {
            store,
            auth,
            location,
            forecast,
            app_id: app_id.into(),
            state: Arc::new(state),
            weather_seq: AtomicU64::new(0),
            widget_generation: AtomicU64::new(0),
            weather_requested: AtomicBool::new(false),
            slot: tokio::sync::Mutex::new(SubscriptionSlot::new()),
            shutdown_token: CancellationToken::new(),
            follow_task: Mutex::new(None),
        })
    }

    pub fn state(&self) -> HomeState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<HomeState> {
        self.state.subscribe()
    }

    /// Kicks off the one weather lookup and starts following the identity for the
    /// widget. Calling it again has no effect.
    pub fn start(self: &Arc<Self>) {
        if !self.weather_requested.swap(true, Ordering::SeqCst) {
            let view = self.clone();
            tokio::spawn(async move { view.refresh_weather().await });
        }

        let mut follow_task = match self.follow_task.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if follow_task.is_none() && self.store.is_some() {
            let view = self.clone();
            *follow_task = Some(tokio::spawn(async move { view.follow_identity().await }));
        }
    }

    pub async fn shutdown(&self) {
        self.shutdown_token.cancel();
        let follow_task = match self.follow_task.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(handle) = follow_task {
            if let Err(e) = handle.await {
                warn!("Home identity loop ended abnormally: {}", e);
            }
        }
        self.slot.lock().await.clear().await;
    }

    /// Looks the weather up. Only the result of the latest lookup is kept.
    pub async fn refresh_weather(&self) {
        let seq = self.weather_seq.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.send_modify(|state| {
            state.weather_seq = seq;
            state.weather = WeatherStatus::Loading;
        });

        let status = match weather::lookup(self.location.as_ref(), self.forecast.as_ref()).await {
            Ok(snapshot) => {
                info!("Weather: {}", snapshot.summary_line());
                WeatherStatus::Ready { snapshot }
            }
            Err(e) => {
                warn!("Weather lookup failed: {}", e);
                WeatherStatus::Failed {
                    message: e.user_message().to_string(),
                }
            }
        };

        self.state.send_if_modified(|state| {
            if state.weather_seq != seq {
                debug!(seq, "Discarding stale weather result");
                return false;
            }
            state.weather = status;
            true
        });
    }

    async fn follow_identity(self: Arc<Self>) {
        let mut identities = self.auth.watch();
        loop {
            let current = identities.borrow_and_update().clone();
            self.on_identity(current).await;

            tokio::select! {
                _ = self.shutdown_token.cancelled() => break,
                changed = identities.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
    }

    async fn on_identity(&self, identity: Option<Identity>) {
        let mut slot = self.slot.lock().await;
        slot.clear().await;

        let (Some(store), Some(identity)) = (self.store.clone(), identity) else {
            self.state.send_modify(|state| {
                state.latest = None;
                state.widget_generation = None;
            });
            return;
        };

        let generation = self.widget_generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.send_modify(|state| {
            state.latest = Some(Vec::new());
            state.widget_generation = Some(generation);
        });

        let query = CollectionQuery::newest(
            CollectionPath::new(self.app_id.clone(), identity),
            WIDGET_SIZE,
        );
        let state = self.state.clone();
        slot.replace(generation, move |token| {
            watch_latest(store, query, generation, state, token)
        })
        .await;
    }
}

async fn watch_latest(
    store: Arc<dyn NotificationStore>,
    query: CollectionQuery,
    generation: u64,
    state: Arc<watch::Sender<HomeState>>,
    cancellation_token: CancellationToken,
) {
    let mut subscription = Subscription::open(store, query);
    loop {
        tokio::select! {
            _ = cancellation_token.cancelled() => break,
            next = subscription.next_snapshot() => match next {
                Some(Ok(documents)) => {
                    let entries: Vec<WidgetEntry> = documents
                        .into_iter()
                        .map(Notification::from_document)
                        .map(|n| WidgetEntry::from(&n))
                        .collect();
                    state.send_if_modified(|home| {
                        if home.widget_generation != Some(generation) {
                            return false;
                        }
                        home.latest = Some(entries);
                        true
                    });
                }
                Some(Err(e)) => {
                    warn!("Latest-notifications query failed: {}", e);
                    break;
                }
                None => break,
            }
        }
    }
}
