//! The single state transition function of the dashboard.
//!
//! Every change to [`ViewState`] goes through [`reduce`], which is pure: it takes the
//! previous state and one event and returns the next state. Async work (auth, store
//! subscriptions, AI calls) only ever produces events.

use crate::notifications::{sort_newest_first, Identity, Notification, StoredDocument};

use super::state::{CommandKind, ModalState, ViewState};

pub const AUTH_FAILED_MESSAGE: &str = "Failed to authenticate anonymously. Check your \
authentication settings to ensure anonymous sign-in is enabled.";

pub const SUBSCRIPTION_FAILED_MESSAGE: &str =
    "Failed to listen for notifications. Check your store permissions and connectivity.";

pub const CLEAR_FAILED_MESSAGE: &str = "Could not clear notifications.";

#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    /// The store cannot be reached at all. Terminal.
    ConfigurationError { message: String },
    /// An identity is available.
    AuthReady { identity: Identity },
    /// Anonymous sign-in was refused.
    AuthFailed { message: String },
    /// The identity went away (sign-out). A new one is expected to follow.
    IdentityCleared,
    SubscriptionOpened { generation: u64 },
    SnapshotReceived {
        generation: u64,
        documents: Vec<StoredDocument>,
    },
    SnapshotFailed { generation: u64, message: String },
    CommandStarted {
        seq: u64,
        kind: CommandKind,
        title: String,
    },
    CommandSucceeded { seq: u64, content: String },
    CommandFailed { seq: u64, reason: String },
    ModalClosed,
    ClearFailed,
}

impl SyncEvent {
    pub fn name(&self) -> &'static str {
        match self {
            SyncEvent::ConfigurationError { .. } => "configuration_error",
            SyncEvent::AuthReady { .. } => "auth_ready",
            SyncEvent::AuthFailed { .. } => "auth_failed",
            SyncEvent::IdentityCleared => "identity_cleared",
            SyncEvent::SubscriptionOpened { .. } => "subscription_opened",
            SyncEvent::SnapshotReceived { .. } => "snapshot_received",
            SyncEvent::SnapshotFailed { .. } => "snapshot_failed",
            SyncEvent::CommandStarted { .. } => "command_started",
            SyncEvent::CommandSucceeded { .. } => "command_succeeded",
            SyncEvent::CommandFailed { .. } => "command_failed",
            SyncEvent::ModalClosed => "modal_closed",
            SyncEvent::ClearFailed => "clear_failed",
        }
    }
}

pub fn reduce(state: &ViewState, event: SyncEvent) -> ViewState {
    let mut next = state.clone();
    match event {
        SyncEvent::ConfigurationError { message } => {
            next.loading = false;
            next.error = Some(message);
        }
        SyncEvent::AuthReady { identity } => {
            next.auth_ready = true;
            next.identity = Some(identity);
        }
        SyncEvent::AuthFailed { message } => {
            next.auth_ready = true;
            next.identity = None;
            next.loading = false;
            next.error = Some(message);
        }
        SyncEvent::IdentityCleared => {
            next.identity = None;
            next.notifications.clear();
            next.generation = None;
            next.loading = true;
        }
        SyncEvent::SubscriptionOpened { generation } => {
            if next.identity.is_none() {
                return next;
            }
            next.generation = Some(generation);
            next.notifications.clear();
            next.loading = true;
        }
        SyncEvent::SnapshotReceived {
            generation,
            documents,
        } => {
            if !is_current(state, generation) {
                return next;
            }
            let mut notifications: Vec<Notification> =
                documents.into_iter().map(Notification::from_document).collect();
            sort_newest_first(&mut notifications);
            next.notifications = notifications;
            next.loading = false;
        }
        SyncEvent::SnapshotFailed {
            generation,
            message,
        } => {
            if !is_current(state, generation) {
                return next;
            }
            next.loading = false;
            next.error = Some(message);
        }
        SyncEvent::CommandStarted { seq, kind, title } => {
            next.modal = ModalState {
                open: true,
                title,
                content: String::new(),
                loading: true,
                kind: Some(kind),
                seq,
            };
        }
        SyncEvent::CommandSucceeded { seq, content } => {
            if !is_awaited(state, seq) {
                return next;
            }
            next.modal.content = content;
            next.modal.loading = false;
        }
        SyncEvent::CommandFailed { seq, reason } => {
            if !is_awaited(state, seq) {
                return next;
            }
            let kind = next.modal.kind.unwrap_or(CommandKind::Analysis);
            next.modal.content = kind.failure_message(&reason);
            next.modal.loading = false;
        }
        SyncEvent::ModalClosed => {
            next.modal = ModalState {
                seq: state.modal.seq,
                ..ModalState::default()
            };
        }
        SyncEvent::ClearFailed => {
            next.error = Some(CLEAR_FAILED_MESSAGE.to_string());
        }
    }
    next
}

fn is_current(state: &ViewState, generation: u64) -> bool {
    state.identity.is_some() && state.generation == Some(generation)
}

fn is_awaited(state: &ViewState, seq: u64) -> bool {
    state.modal.open && state.modal.loading && state.modal.seq == seq
}
