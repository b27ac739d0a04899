//! Notification storage trait and live query subscriptions

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::debug;

use super::models::{CollectionPath, StoredDocument};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Corrupted document {id}: {reason}")]
    Corrupted { id: String, reason: String },

    #[error("Subscription closed")]
    SubscriptionClosed,

    #[error("{0}")]
    Other(String),
}

/// Ordering applied to a collection query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryOrder {
    /// Delivery order; consumers sort themselves.
    Unordered,
    /// Timestamp descending. Documents without a timestamp do not match.
    NewestFirst,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionQuery {
    pub path: CollectionPath,
    pub order: QueryOrder,
    pub limit: Option<usize>,
}

impl CollectionQuery {
    /// Every document of the collection.
    pub fn all(path: CollectionPath) -> Self {
        Self {
            path,
            order: QueryOrder::Unordered,
            limit: None,
        }
    }

    /// The `limit` newest timestamped documents.
    pub fn newest(path: CollectionPath, limit: usize) -> Self {
        Self {
            path,
            order: QueryOrder::NewestFirst,
            limit: Some(limit),
        }
    }
}

/// Reference to a single document, used by write batches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentRef {
    pub path: CollectionPath,
    pub id: String,
}

/// A set of writes committed atomically.
#[derive(Debug, Default)]
pub struct WriteBatch {
    deletes: Vec<DocumentRef>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delete(&mut self, document: DocumentRef) -> &mut Self {
        self.deletes.push(document);
        self
    }

    pub fn deletes(&self) -> &[DocumentRef] {
        &self.deletes
    }

    pub fn len(&self) -> usize {
        self.deletes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deletes.is_empty()
    }
}

/// Trait for notification document storage.
///
/// Every successful mutation must be announced on the channel returned by [`watch`],
/// which is what keeps live [`Subscription`]s up to date.
///
/// [`watch`]: NotificationStore::watch
pub trait NotificationStore: Send + Sync {
    /// Add a document with a store-assigned identifier.
    fn add_document(
        &self,
        path: &CollectionPath,
        fields: Map<String, Value>,
        timestamp: Option<DateTime<Utc>>,
    ) -> Result<StoredDocument, StoreError>;

    /// One-shot query.
    fn query(&self, query: &CollectionQuery) -> Result<Vec<StoredDocument>, StoreError>;

    /// Commit all writes of the batch, or none of them.
    fn commit(&self, batch: WriteBatch) -> Result<(), StoreError>;

    /// Change feed: carries the path of every collection that was modified.
    fn watch(&self) -> broadcast::Receiver<CollectionPath>;

    fn fetch_all(&self, path: &CollectionPath) -> Result<Vec<StoredDocument>, StoreError> {
        self.query(&CollectionQuery::all(path.clone()))
    }
}

/// A live query: yields the full result set once on open and again after every change
/// to the queried collection.
///
/// Dropping the subscription cancels it.
pub struct Subscription {
    store: Arc<dyn NotificationStore>,
    query: CollectionQuery,
    changes: broadcast::Receiver<CollectionPath>,
    primed: bool,
}

impl Subscription {
    pub fn open(store: Arc<dyn NotificationStore>, query: CollectionQuery) -> Self {
        // Subscribe before the first read so no change can slip between the two
        let changes = store.watch();
        Self {
            store,
            query,
            changes,
            primed: false,
        }
    }

    pub fn query(&self) -> &CollectionQuery {
        &self.query
    }

    /// Waits for the next snapshot. Returns `None` once the store has shut down.
    pub async fn next_snapshot(&mut self) -> Option<Result<Vec<StoredDocument>, StoreError>> {
        if !self.primed {
            self.primed = true;
            return Some(self.store.query(&self.query));
        }

        loop {
            match self.changes.recv().await {
                Ok(changed) if changed == self.query.path => {
                    return Some(self.store.query(&self.query));
                }
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(
                        "Subscription on {} lagged by {} changes, re-reading",
                        self.query.path, skipped
                    );
                    return Some(self.store.query(&self.query));
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
