//! Notification documents: models, storage and live queries

mod models;
mod schema;
mod sqlite_store;
mod store;

pub use models::{
    sort_newest_first, CollectionPath, Identity, Notification, StoredDocument,
    PRINT_PETITION_SOURCE,
};
pub use sqlite_store::SqliteNotificationStore;
pub use store::{
    CollectionQuery, DocumentRef, NotificationStore, QueryOrder, StoreError, Subscription,
    WriteBatch,
};
