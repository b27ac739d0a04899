use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::ai::{prompts, AiError, GenerationOptions, Summarizer, MISSING_CREDENTIAL_MESSAGE};
use crate::auth::{AuthError, AuthProvider};
use crate::notifications::{
    CollectionPath, CollectionQuery, DocumentRef, Identity, Notification, NotificationStore,
    Subscription, WriteBatch,
};

use super::reducer::{reduce, SyncEvent, AUTH_FAILED_MESSAGE, SUBSCRIPTION_FAILED_MESSAGE};
use super::slot::SubscriptionSlot;
use super::state::{CommandKind, ViewState};

pub const STORE_NOT_CONFIGURED_MESSAGE: &str = "Notification store is not configured. \
Set `db_dir` in the config file or pass --db-dir.";

pub const CLEAR_CONFIRMATION_PROMPT: &str =
    "Are you sure you want to delete all notifications? This cannot be undone.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ClearOutcome {
    /// No identity or no store yet.
    NotReady,
    Declined,
    AlreadyEmpty,
    Cleared { count: usize },
    Failed { reason: String },
}

/// Applies events to the shared view state.
#[derive(Clone)]
pub struct Dispatcher {
    state: Arc<watch::Sender<ViewState>>,
}

impl Dispatcher {
    fn new() -> Self {
        let (state, _) = watch::channel(ViewState::default());
        Self {
            state: Arc::new(state),
        }
    }

    pub fn dispatch(&self, event: SyncEvent) {
        debug!(event = event.name(), "Dispatching");
        self.state.send_modify(|state| *state = reduce(state, event));
    }

    pub fn snapshot(&self) -> ViewState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ViewState> {
        self.state.subscribe()
    }
}

/// Owns the dashboard: follows the signed-in identity, keeps one live subscription on
/// its collection and runs the user commands.
pub struct SyncCore {
    store: Option<Arc<dyn NotificationStore>>,
    auth: Arc<dyn AuthProvider>,
    summarizer: Arc<dyn Summarizer>,
    app_id: String,
    generation_options: GenerationOptions,
    dispatcher: Dispatcher,
    command_seq: AtomicU64,
    subscription_generation: AtomicU64,
    slot: tokio::sync::Mutex<SubscriptionSlot>,
    shutdown_token: CancellationToken,
    auth_task: Mutex<Option<JoinHandle<()>>>,
}

impl SyncCore {
    pub fn new(
        store: Option<Arc<dyn NotificationStore>>,
        auth: Arc<dyn AuthProvider>,
        summarizer: Arc<dyn Summarizer>,
        app_id: impl Into<String>,
        generation_options: GenerationOptions,
    ) -> Arc<Self> {
        Arc::new(Self {
            store,
            auth,
            summarizer,
            app_id: app_id.into(),
            generation_options,
            dispatcher: Dispatcher::new(),
            command_seq: AtomicU64::new(0),
            subscription_generation: AtomicU64::new(0),
            slot: tokio::sync::Mutex::new(SubscriptionSlot::new()),
            shutdown_token: CancellationToken::new(),
            auth_task: Mutex::new(None),
        })
    }

    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    pub fn state(&self) -> ViewState {
        self.dispatcher.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<ViewState> {
        self.dispatcher.subscribe()
    }

    /// Collection the current identity writes to, if there is one.
    pub fn collection_path(&self) -> Option<CollectionPath> {
        self.state()
            .identity
            .map(|identity| CollectionPath::new(self.app_id.clone(), identity))
    }

    /// Starts following the auth provider. Calling it again has no effect.
    pub fn start(self: &Arc<Self>) {
        let mut auth_task = match self.auth_task.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if auth_task.is_some() {
            return;
        }

        if self.store.is_none() {
            error!("No notification store configured, the dashboard stays empty");
            self.dispatcher.dispatch(SyncEvent::ConfigurationError {
                message: STORE_NOT_CONFIGURED_MESSAGE.to_string(),
            });
            return;
        }

        let core = self.clone();
        *auth_task = Some(tokio::spawn(async move { core.follow_identity().await }));
    }

    /// Stops the auth loop and the live subscription, waiting for both.
    pub async fn shutdown(&self) {
        self.shutdown_token.cancel();
        let auth_task = match self.auth_task.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(handle) = auth_task {
            if let Err(e) = handle.await {
                warn!("Auth loop ended abnormally: {}", e);
            }
        }
        self.slot.lock().await.clear().await;
        info!("Sync core stopped");
    }

    async fn follow_identity(self: Arc<Self>) {
        let mut identities = self.auth.watch();
        loop {
            let current = identities.borrow_and_update().clone();
            match current {
                Some(identity) => self.on_identity(identity).await,
                None => {
                    self.on_identity_lost().await;
                    match self.auth.sign_in_anonymously().await {
                        // The new identity arrives through the watch channel
                        Ok(identity) => debug!("Anonymous identity {} created", identity),
                        Err(e) => {
                            error!("Anonymous sign-in failed: {}", e);
                            self.dispatcher.dispatch(SyncEvent::AuthFailed {
                                message: AUTH_FAILED_MESSAGE.to_string(),
                            });
                        }
                    }
                }
            }

            tokio::select! {
                _ = self.shutdown_token.cancelled() => break,
                changed = identities.changed() => {
                    if changed.is_err() {
                        warn!("Auth provider went away");
                        break;
                    }
                }
            }
        }
    }

    async fn on_identity(&self, identity: Identity) {
        let Some(store) = self.store.clone() else {
            return;
        };

        let mut slot = self.slot.lock().await;
        if slot.generation().is_some() && self.state().identity.as_ref() == Some(&identity) {
            return;
        }
        slot.clear().await;

        info!("Listening for notifications of {}", identity);
        self.dispatcher.dispatch(SyncEvent::AuthReady {
            identity: identity.clone(),
        });

        let generation = self.subscription_generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.dispatcher
            .dispatch(SyncEvent::SubscriptionOpened { generation });

        let query = CollectionQuery::all(CollectionPath::new(self.app_id.clone(), identity));
        let dispatcher = self.dispatcher.clone();
        slot.replace(generation, move |token| {
            listen(store, query, generation, dispatcher, token)
        })
        .await;
    }

    async fn on_identity_lost(&self) {
        let mut slot = self.slot.lock().await;
        slot.clear().await;
        if self.state().identity.is_some() {
            self.dispatcher.dispatch(SyncEvent::IdentityCleared);
        }
    }

    pub async fn sign_out(&self) -> Result<(), AuthError> {
        self.auth.sign_out().await
    }

    /// Deletes every notification of the current identity in one atomic batch.
    ///
    /// `confirm` is asked before anything is read; declining leaves the store untouched.
    pub fn clear_all<F>(&self, confirm: F) -> ClearOutcome
    where
        F: FnOnce(&str) -> bool,
    {
        let (Some(store), Some(identity)) = (self.store.as_ref(), self.state().identity) else {
            return ClearOutcome::NotReady;
        };
        if !confirm(CLEAR_CONFIRMATION_PROMPT) {
            return ClearOutcome::Declined;
        }

        let path = CollectionPath::new(self.app_id.clone(), identity);
        let documents = match store.fetch_all(&path) {
            Ok(documents) => documents,
            Err(e) => return self.clear_failed(&path, e.to_string()),
        };
        if documents.is_empty() {
            debug!("Nothing to clear in {}", path);
            return ClearOutcome::AlreadyEmpty;
        }

        let mut batch = WriteBatch::new();
        for document in &documents {
            batch.delete(DocumentRef {
                path: path.clone(),
                id: document.id.clone(),
            });
        }
        let count = batch.len();
        match store.commit(batch) {
            Ok(()) => {
                info!("Cleared {} notifications from {}", count, path);
                ClearOutcome::Cleared { count }
            }
            Err(e) => self.clear_failed(&path, e.to_string()),
        }
    }

    fn clear_failed(&self, path: &CollectionPath, reason: String) -> ClearOutcome {
        error!("Failed to clear {}: {}", path, reason);
        self.dispatcher.dispatch(SyncEvent::ClearFailed);
        ClearOutcome::Failed { reason }
    }

    fn begin_command(&self, kind: CommandKind, title: String) -> u64 {
        let seq = self.command_seq.fetch_add(1, Ordering::SeqCst) + 1;
        self.dispatcher
            .dispatch(SyncEvent::CommandStarted { seq, kind, title });
        seq
    }

    async fn run_command(&self, seq: u64, prompt: String) {
        let event = match self
            .summarizer
            .generate(&prompt, &self.generation_options)
            .await
        {
            Ok(content) => SyncEvent::CommandSucceeded { seq, content },
            Err(AiError::MissingCredential) => SyncEvent::CommandSucceeded {
                seq,
                content: MISSING_CREDENTIAL_MESSAGE.to_string(),
            },
            Err(e) => {
                warn!(seq, provider = self.summarizer.name(), "AI request failed: {}", e);
                SyncEvent::CommandFailed {
                    seq,
                    reason: e.to_string(),
                }
            }
        };
        self.dispatcher.dispatch(event);
    }

    /// Opens the modal for `notification` and waits for the analysis.
    pub async fn analyze(&self, notification: &Notification) {
        let seq = self.begin_command(CommandKind::Analysis, prompts::analysis_title(notification));
        self.run_command(seq, prompts::analysis_prompt(notification))
            .await;
    }

    /// Summarizes the current list. Returns false, doing nothing, when it is empty.
    pub async fn summarize_all(&self) -> bool {
        let notifications = self.state().notifications;
        if notifications.is_empty() {
            return false;
        }
        let seq = self.begin_command(CommandKind::Summary, prompts::summary_title());
        self.run_command(seq, prompts::summary_prompt(&notifications))
            .await;
        true
    }

    /// Like [`SyncCore::analyze`] but returns as soon as the modal is open.
    pub fn start_analysis(self: &Arc<Self>, id: &str) -> Option<JoinHandle<()>> {
        let notification = self.state().find_notification(id).cloned()?;
        let seq = self.begin_command(
            CommandKind::Analysis,
            prompts::analysis_title(&notification),
        );
        let prompt = prompts::analysis_prompt(&notification);
        let core = self.clone();
        Some(tokio::spawn(async move { core.run_command(seq, prompt).await }))
    }

    /// Like [`SyncCore::summarize_all`] but returns as soon as the modal is open.
    pub fn start_summary(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        let notifications = self.state().notifications;
        if notifications.is_empty() {
            return None;
        }
        let seq = self.begin_command(CommandKind::Summary, prompts::summary_title());
        let prompt = prompts::summary_prompt(&notifications);
        let core = self.clone();
        Some(tokio::spawn(async move { core.run_command(seq, prompt).await }))
    }

    pub fn close_modal(&self) {
        self.dispatcher.dispatch(SyncEvent::ModalClosed);
    }
}

async fn listen(
    store: Arc<dyn NotificationStore>,
    query: CollectionQuery,
    generation: u64,
    dispatcher: Dispatcher,
    cancellation_token: CancellationToken,
) {
    let mut subscription = Subscription::open(store, query);
    loop {
        tokio::select! {
            _ = cancellation_token.cancelled() => break,
            next = subscription.next_snapshot() => match next {
                Some(Ok(documents)) => {
                    debug!(generation, count = documents.len(), "Snapshot received");
                    dispatcher.dispatch(SyncEvent::SnapshotReceived { generation, documents });
                }
                Some(Err(e)) => {
                    error!("Subscription on {} failed: {}", subscription.query().path, e);
                    dispatcher.dispatch(SyncEvent::SnapshotFailed {
                        generation,
                        message: SUBSCRIPTION_FAILED_MESSAGE.to_string(),
                    });
                    break;
                }
                None => break,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::LocalAuthProvider;
    use crate::notifications::SqliteNotificationStore;
    use async_trait::async_trait;
    use serde_json::{json, Map, Value};
    use std::time::Duration;

    struct EchoSummarizer;

    #[async_trait]
    impl Summarizer for EchoSummarizer {
        fn name(&self) -> &str {
            "echo"
        }

        fn model(&self) -> &str {
            "echo-1"
        }

        async fn generate(
            &self,
            prompt: &str,
            _options: &GenerationOptions,
        ) -> Result<String, AiError> {
            Ok(format!("{} chars", prompt.len()))
        }
    }

    struct Fixture {
        store: Arc<SqliteNotificationStore>,
        core: Arc<SyncCore>,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(SqliteNotificationStore::in_memory().unwrap());
        let auth = Arc::new(LocalAuthProvider::in_memory(true).unwrap());
        let core = SyncCore::new(
            Some(store.clone()),
            auth,
            Arc::new(EchoSummarizer),
            "test-app",
            GenerationOptions::default(),
        );
        Fixture { store, core }
    }

    fn fields(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    async fn wait_for<F>(core: &SyncCore, predicate: F) -> ViewState
    where
        F: Fn(&ViewState) -> bool,
    {
        let mut rx = core.subscribe();
        let state = tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|s| predicate(s)))
            .await
            .expect("timed out waiting for state")
            .expect("state channel closed");
        state.clone()
    }

    #[tokio::test]
    async fn test_missing_store_is_a_configuration_error() {
        let auth = Arc::new(LocalAuthProvider::in_memory(true).unwrap());
        let core = SyncCore::new(
            None,
            auth,
            Arc::new(EchoSummarizer),
            "test-app",
            GenerationOptions::default(),
        );
        core.start();

        let state = core.state();
        assert!(!state.loading);
        assert!(!state.auth_ready);
        assert_eq!(state.error.as_deref(), Some(STORE_NOT_CONFIGURED_MESSAGE));
        assert_eq!(core.clear_all(|_| true), ClearOutcome::NotReady);
    }

    #[tokio::test]
    async fn test_signs_in_and_follows_the_collection() {
        let Fixture { store, core } = fixture();
        core.start();

        let state = wait_for(&core, |s| s.auth_ready && !s.loading).await;
        assert!(state.notifications.is_empty());
        let path = core.collection_path().unwrap();
        assert_eq!(path.app_id, "test-app");

        store
            .add_document(&path, fields(json!({"source": "bell"})), None)
            .unwrap();
        let state = wait_for(&core, |s| s.notifications.len() == 1).await;
        assert_eq!(state.notifications[0].source.as_deref(), Some("bell"));

        core.shutdown().await;
    }

    #[tokio::test]
    async fn test_auth_failure_sets_banner() {
        let store = Arc::new(SqliteNotificationStore::in_memory().unwrap());
        let auth = Arc::new(LocalAuthProvider::in_memory(false).unwrap());
        let core = SyncCore::new(
            Some(store),
            auth,
            Arc::new(EchoSummarizer),
            "test-app",
            GenerationOptions::default(),
        );
        core.start();

        let state = wait_for(&core, |s| s.auth_ready).await;
        assert!(state.identity.is_none());
        assert!(!state.loading);
        assert_eq!(state.error.as_deref(), Some(AUTH_FAILED_MESSAGE));
        core.shutdown().await;
    }

    #[tokio::test]
    async fn test_clear_all_outcomes() {
        let Fixture { store, core } = fixture();
        assert_eq!(core.clear_all(|_| true), ClearOutcome::NotReady);

        core.start();
        wait_for(&core, |s| s.auth_ready && !s.loading).await;
        let path = core.collection_path().unwrap();

        assert_eq!(core.clear_all(|_| true), ClearOutcome::AlreadyEmpty);

        for i in 0..3 {
            store
                .add_document(&path, fields(json!({"n": i})), None)
                .unwrap();
        }
        wait_for(&core, |s| s.notifications.len() == 3).await;

        let mut prompt = String::new();
        let outcome = core.clear_all(|p| {
            prompt = p.to_string();
            false
        });
        assert_eq!(outcome, ClearOutcome::Declined);
        assert_eq!(prompt, CLEAR_CONFIRMATION_PROMPT);
        assert_eq!(store.fetch_all(&path).unwrap().len(), 3);

        assert_eq!(core.clear_all(|_| true), ClearOutcome::Cleared { count: 3 });
        assert!(store.fetch_all(&path).unwrap().is_empty());
        wait_for(&core, |s| s.notifications.is_empty()).await;

        core.shutdown().await;
    }

    #[tokio::test]
    async fn test_commands_fill_the_modal() {
        let Fixture { store, core } = fixture();
        assert!(!core.summarize_all().await);
        assert!(!core.state().modal.open);

        core.start();
        wait_for(&core, |s| s.auth_ready && !s.loading).await;
        let path = core.collection_path().unwrap();
        store
            .add_document(&path, fields(json!({"source": "bell"})), None)
            .unwrap();
        let state = wait_for(&core, |s| s.notifications.len() == 1).await;

        core.analyze(&state.notifications[0]).await;
        let modal = core.state().modal;
        assert!(modal.open);
        assert!(!modal.loading);
        assert_eq!(
            modal.title,
            "✨ AI Analysis for notification from \"bell\""
        );
        assert!(modal.content.ends_with(" chars"));

        core.close_modal();
        assert!(!core.state().modal.open);

        assert!(core.summarize_all().await);
        assert_eq!(core.state().modal.title, "✨ AI Summary of All Notifications");

        assert!(core.start_analysis("missing").is_none());
        core.shutdown().await;
    }

    #[tokio::test]
    async fn test_sign_out_switches_identity() {
        let Fixture { store, core } = fixture();
        core.start();
        let first = wait_for(&core, |s| s.auth_ready && !s.loading).await;
        let first_identity = first.identity.unwrap();
        let first_path = core.collection_path().unwrap();
        store
            .add_document(&first_path, fields(json!({"who": "first"})), None)
            .unwrap();
        wait_for(&core, |s| s.notifications.len() == 1).await;

        core.sign_out().await.unwrap();
        let second = wait_for(&core, |s| {
            s.identity.is_some() && s.identity.as_ref() != Some(&first_identity) && !s.loading
        })
        .await;
        assert!(second.notifications.is_empty());

        // Writes to the old collection no longer reach the view
        store
            .add_document(&first_path, fields(json!({"who": "late"})), None)
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(core.state().notifications.is_empty());

        core.shutdown().await;
    }
}
