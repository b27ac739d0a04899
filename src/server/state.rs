use axum::extract::FromRef;

use crate::home::HomeView;
use crate::notifications::NotificationStore;
use crate::sync::SyncCore;
use std::sync::Arc;
use std::time::Instant;

use super::ServerConfig;

pub type OptionalNotificationStore = Option<Arc<dyn NotificationStore>>;
pub type GuardedSyncCore = Arc<SyncCore>;
pub type GuardedHomeView = Arc<HomeView>;

#[derive(Clone)]
pub struct ServerState {
    pub config: ServerConfig,
    pub start_time: Instant,
    pub hash: String,
    pub store: OptionalNotificationStore,
    pub sync_core: GuardedSyncCore,
    pub home_view: GuardedHomeView,
}

impl ServerState {
    pub fn new(
        config: ServerConfig,
        store: OptionalNotificationStore,
        sync_core: GuardedSyncCore,
        home_view: GuardedHomeView,
    ) -> Self {
        Self {
            config,
            start_time: Instant::now(),
            hash: env!("GIT_HASH").to_string(),
            store,
            sync_core,
            home_view,
        }
    }
}

impl FromRef<ServerState> for ServerConfig {
    fn from_ref(input: &ServerState) -> Self {
        input.config.clone()
    }
}

impl FromRef<ServerState> for OptionalNotificationStore {
    fn from_ref(input: &ServerState) -> Self {
        input.store.clone()
    }
}

impl FromRef<ServerState> for GuardedSyncCore {
    fn from_ref(input: &ServerState) -> Self {
        input.sync_core.clone()
    }
}

impl FromRef<ServerState> for GuardedHomeView {
    fn from_ref(input: &ServerState) -> Self {
        input.home_view.clone()
    }
}
