//! Notification Receiver Library
//!
//! This library exposes the internal modules for testing and for the sender CLI.

pub mod ai;
pub mod app_handle;
pub mod auth;
pub mod config;
pub mod home;
pub mod notifications;
pub mod server;
pub mod sqlite_persistence;
pub mod sync;
pub mod weather;

// Re-export commonly used types for convenience
pub use app_handle::{AppHandle, ConfigError};
pub use notifications::{NotificationStore, SqliteNotificationStore};
pub use server::{run_server, RequestsLoggingLevel};
pub use sync::{SyncCore, ViewState};
