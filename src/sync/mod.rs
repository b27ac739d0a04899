//! Auth, live snapshots and AI commands folded into one view state.

mod reducer;
mod slot;
mod state;
mod sync_core;

pub use reducer::{
    reduce, SyncEvent, AUTH_FAILED_MESSAGE, CLEAR_FAILED_MESSAGE, SUBSCRIPTION_FAILED_MESSAGE,
};
pub use slot::SubscriptionSlot;
pub use state::{CommandKind, ModalState, ViewState};
pub use sync_core::{
    ClearOutcome, Dispatcher, SyncCore, CLEAR_CONFIRMATION_PROMPT, STORE_NOT_CONFIGURED_MESSAGE,
};
