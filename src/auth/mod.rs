//! Anonymous identity provider.
//!
//! Hands out one opaque identity per installation and announces identity changes
//! (sign-in, sign-out) on a watch channel, which the sync core uses to scope and
//! re-scope its subscriptions.

mod local;

pub use local::LocalAuthProvider;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::watch;

use crate::notifications::Identity;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Anonymous sign-in is disabled")]
    AnonymousSignInDisabled,

    #[error("Identity storage error: {0}")]
    Storage(String),
}

#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Create and sign in a new anonymous identity.
    async fn sign_in_anonymously(&self) -> Result<Identity, AuthError>;

    /// Forget the current identity.
    async fn sign_out(&self) -> Result<(), AuthError>;

    /// Receives every identity change. The initial value is the identity currently
    /// signed in, if any.
    fn watch(&self) -> watch::Receiver<Option<Identity>>;
}
