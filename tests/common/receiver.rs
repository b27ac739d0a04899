//! Receiver instances wired to temporary databases and mock services.

use chrono::{DateTime, Utc};
use notification_receiver::ai::{GeminiProvider, GenerationOptions};
use notification_receiver::auth::LocalAuthProvider;
use notification_receiver::home::HomeView;
use notification_receiver::notifications::{
    CollectionPath, CollectionQuery, NotificationStore, SqliteNotificationStore, StoreError,
    StoredDocument, WriteBatch,
};
use notification_receiver::server::{make_app, RequestsLoggingLevel, ServerConfig, ServerState};
use notification_receiver::sync::{SyncCore, ViewState};
use notification_receiver::weather::{ConfiguredLocation, OpenMeteoClient};
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, oneshot};

use super::STATE_TIMEOUT_MS;

pub const TEST_APP_ID: &str = "test-app";

pub fn fields(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {}", other),
    }
}

/// Waits until `predicate` holds for the dashboard state.
pub async fn wait_for_state<F>(core: &SyncCore, predicate: F) -> ViewState
where
    F: Fn(&ViewState) -> bool,
{
    let mut rx = core.subscribe();
    let state = tokio::time::timeout(
        Duration::from_millis(STATE_TIMEOUT_MS),
        rx.wait_for(|s| predicate(s)),
    )
    .await
    .unwrap_or_else(|_| panic!("timed out, last state: {:?}", core.state()))
    .expect("state channel closed");
    state.clone()
}

/// A store whose commits or queries can be made to fail.
pub struct FlakyStore {
    inner: SqliteNotificationStore,
    fail_commits: AtomicBool,
    fail_queries: AtomicBool,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self {
            inner: SqliteNotificationStore::in_memory().expect("Failed to open store"),
            fail_commits: AtomicBool::new(false),
            fail_queries: AtomicBool::new(false),
        }
    }

    pub fn fail_commits(&self, fail: bool) {
        self.fail_commits.store(fail, Ordering::SeqCst);
    }

    pub fn fail_queries(&self, fail: bool) {
        self.fail_queries.store(fail, Ordering::SeqCst);
    }
}

impl NotificationStore for FlakyStore {
    fn add_document(
        &self,
        path: &CollectionPath,
        fields: Map<String, Value>,
        timestamp: Option<DateTime<Utc>>,
    ) -> Result<StoredDocument, StoreError> {
        self.inner.add_document(path, fields, timestamp)
    }

    fn query(&self, query: &CollectionQuery) -> Result<Vec<StoredDocument>, StoreError> {
        if self.fail_queries.load(Ordering::SeqCst) {
            return Err(StoreError::Other("query rejected".to_string()));
        }
        self.inner.query(query)
    }

    fn commit(&self, batch: WriteBatch) -> Result<(), StoreError> {
        if self.fail_commits.load(Ordering::SeqCst) {
            return Err(StoreError::Other("commit rejected".to_string()));
        }
        self.inner.commit(batch)
    }

    fn watch(&self) -> broadcast::Receiver<CollectionPath> {
        self.inner.watch()
    }
}

/// A receiver with its own databases, AI endpoint and HTTP server.
pub struct TestReceiver {
    pub base_url: String,
    pub store: Arc<dyn NotificationStore>,
    pub auth: Arc<LocalAuthProvider>,
    pub sync_core: Arc<SyncCore>,
    pub home_view: Arc<HomeView>,
    _temp_dir: TempDir,
    _shutdown_tx: oneshot::Sender<()>,
}

pub struct TestReceiverOptions {
    pub store: Option<Arc<dyn NotificationStore>>,
    pub gemini_base_url: String,
    pub gemini_api_key: Option<String>,
    pub weather_base_url: String,
    pub location: ConfiguredLocation,
}

impl Default for TestReceiverOptions {
    fn default() -> Self {
        Self {
            store: None,
            gemini_base_url: "http://127.0.0.1:9".to_string(),
            gemini_api_key: Some("test-key".to_string()),
            weather_base_url: "http://127.0.0.1:9".to_string(),
            location: ConfiguredLocation::new(None, true),
        }
    }
}

impl TestReceiver {
    pub async fn spawn() -> Self {
        Self::spawn_with(TestReceiverOptions::default()).await
    }

    /// Builds the receiver, starts the dashboard and waits for the first snapshot.
    pub async fn spawn_with(options: TestReceiverOptions) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let store: Arc<dyn NotificationStore> = match options.store {
            Some(store) => store,
            None => Arc::new(
                SqliteNotificationStore::new(temp_dir.path().join("notifications.db"))
                    .expect("Failed to open store"),
            ),
        };
        let auth = Arc::new(
            LocalAuthProvider::new(temp_dir.path().join("auth.db"), true)
                .expect("Failed to open identity store"),
        );
        let summarizer = Arc::new(GeminiProvider::new(
            options.gemini_base_url,
            "gemini-2.0-flash",
            options.gemini_api_key,
        ));
        let sync_core = SyncCore::new(
            Some(store.clone()),
            auth.clone(),
            summarizer,
            TEST_APP_ID,
            GenerationOptions {
                timeout: Duration::from_secs(5),
            },
        );
        let forecast = Arc::new(
            OpenMeteoClient::new(options.weather_base_url, 5).expect("Failed to build client"),
        );
        let home_view = HomeView::new(
            Some(store.clone()),
            auth.clone(),
            Arc::new(options.location),
            forecast,
            TEST_APP_ID,
        );

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let port = listener.local_addr().unwrap().port();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let config = ServerConfig {
            port,
            requests_logging_level: RequestsLoggingLevel::None,
            frontend_dir_path: None,
        };
        let app = make_app(ServerState::new(
            config,
            Some(store.clone()),
            sync_core.clone(),
            home_view.clone(),
        ));
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .expect("Server failed");
        });

        sync_core.start();
        home_view.start();
        wait_for_state(&sync_core, |s| s.auth_ready && !s.loading).await;

        Self {
            base_url: format!("http://127.0.0.1:{}", port),
            store,
            auth,
            sync_core,
            home_view,
            _temp_dir: temp_dir,
            _shutdown_tx: shutdown_tx,
        }
    }

    pub fn collection_path(&self) -> CollectionPath {
        self.sync_core
            .collection_path()
            .expect("receiver has no identity")
    }

    /// Adds a notification and waits until the dashboard shows it.
    pub async fn add(&self, value: Value, timestamp: Option<DateTime<Utc>>) -> StoredDocument {
        let before = self.sync_core.state().notifications.len();
        let document = self
            .store
            .add_document(&self.collection_path(), fields(value), timestamp)
            .expect("Failed to add document");
        wait_for_state(&self.sync_core, |s| s.notifications.len() > before).await;
        document
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn shutdown(&self) {
        self.home_view.shutdown().await;
        self.sync_core.shutdown().await;
    }
}
