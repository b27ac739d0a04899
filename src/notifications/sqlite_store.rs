use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, Result};
use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{params, Connection};
use serde_json::{Map, Value};
use tokio::sync::broadcast;
use tracing::{debug, info};

use super::models::{CollectionPath, StoredDocument};
use super::schema::NOTIFICATIONS_VERSIONED_SCHEMAS;
use super::store::{CollectionQuery, NotificationStore, QueryOrder, StoreError, WriteBatch};
use crate::sqlite_persistence::open_versioned;

const CHANGE_FEED_CAPACITY: usize = 256;

pub struct SqliteNotificationStore {
    conn: Mutex<Connection>,
    changes: broadcast::Sender<CollectionPath>,
}

impl SqliteNotificationStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let path = db_path.as_ref();
        if !path.exists() {
            info!("Creating new notifications database at {:?}", path);
        }
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open notifications database {:?}", path))?;
        Self::from_connection(conn)
    }

    pub fn in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(mut conn: Connection) -> Result<Self> {
        open_versioned(&mut conn, NOTIFICATIONS_VERSIONED_SCHEMAS, "notifications")?;
        let (changes, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        Ok(Self {
            conn: Mutex::new(conn),
            changes,
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Other("notifications database lock poisoned".to_string()))
    }

    fn announce(&self, path: CollectionPath) {
        // No receivers just means nobody is subscribed right now
        let _ = self.changes.send(path);
    }

    fn row_to_document(row: &rusqlite::Row) -> rusqlite::Result<(String, Option<i64>, String)> {
        Ok((row.get("id")?, row.get("timestamp_ms")?, row.get("fields")?))
    }

    fn decode(
        (id, timestamp_ms, fields): (String, Option<i64>, String),
    ) -> Result<StoredDocument, StoreError> {
        let fields: Map<String, Value> =
            serde_json::from_str(&fields).map_err(|e| StoreError::Corrupted {
                id: id.clone(),
                reason: e.to_string(),
            })?;
        let timestamp = match timestamp_ms {
            Some(ms) => Some(Utc.timestamp_millis_opt(ms).single().ok_or_else(|| {
                StoreError::Corrupted {
                    id: id.clone(),
                    reason: format!("timestamp {} out of range", ms),
                }
            })?),
            None => None,
        };
        Ok(StoredDocument {
            id,
            timestamp,
            fields,
        })
    }
}

impl NotificationStore for SqliteNotificationStore {
    fn add_document(
        &self,
        path: &CollectionPath,
        fields: Map<String, Value>,
        timestamp: Option<DateTime<Utc>>,
    ) -> Result<StoredDocument, StoreError> {
        let id = uuid::Uuid::new_v4().simple().to_string();
        let encoded = Value::Object(fields.clone()).to_string();
        let timestamp_ms = timestamp.map(|t| t.timestamp_millis());

        self.lock()?.execute(
            "INSERT INTO notifications (id, app_id, owner, timestamp_ms, fields) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![id, path.app_id, path.identity.as_str(), timestamp_ms, encoded],
        )?;
        debug!("Added document {} to {}", id, path);
        self.announce(path.clone());

        Ok(StoredDocument {
            id,
            // Round-trip through milliseconds so readers see the same value
            timestamp: timestamp_ms.and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
            fields,
        })
    }

    fn query(&self, query: &CollectionQuery) -> Result<Vec<StoredDocument>, StoreError> {
        let mut sql = String::from(
            "SELECT id, timestamp_ms, fields FROM notifications WHERE app_id = ?1 AND owner = ?2",
        );
        match query.order {
            QueryOrder::Unordered => sql.push_str(" ORDER BY rowid"),
            QueryOrder::NewestFirst => {
                sql.push_str(" AND timestamp_ms IS NOT NULL ORDER BY timestamp_ms DESC, rowid")
            }
        }
        let limit = query
            .limit
            .map(|l| i64::try_from(l).unwrap_or(i64::MAX))
            .unwrap_or(-1);
        sql.push_str(" LIMIT ?3");

        let conn = self.lock()?;
        let mut stmt = conn.prepare_cached(&sql)?;
        let rows = stmt
            .query_map(
                params![query.path.app_id, query.path.identity.as_str(), limit],
                Self::row_to_document,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter().map(Self::decode).collect()
    }

    fn commit(&self, batch: WriteBatch) -> Result<(), StoreError> {
        if batch.is_empty() {
            return Ok(());
        }

        let mut touched: Vec<CollectionPath> = Vec::new();
        {
            let mut conn = self.lock()?;
            let tx = conn.transaction()?;
            for document in batch.deletes() {
                tx.execute(
                    "DELETE FROM notifications WHERE id = ?1 AND app_id = ?2 AND owner = ?3",
                    params![
                        document.id,
                        document.path.app_id,
                        document.path.identity.as_str()
                    ],
                )?;
                if !touched.contains(&document.path) {
                    touched.push(document.path.clone());
                }
            }
            tx.commit()?;
        }

        info!("Committed batch deleting {} documents", batch.len());
        for path in touched {
            self.announce(path);
        }
        Ok(())
    }

    fn watch(&self) -> broadcast::Receiver<CollectionPath> {
        self.changes.subscribe()
    }
}
