use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use tokio::sync::watch;
use tracing::info;

use super::{AuthError, AuthProvider};
use crate::notifications::Identity;
use crate::sqlite_column;
use crate::sqlite_persistence::{open_versioned, Column, SqlType, Table, VersionedSchema};

/// Single-row table holding the signed-in anonymous identity.
const SESSION_TABLE_V1: Table = Table {
    name: "session",
    columns: &[
        sqlite_column!("slot", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("identity", &SqlType::Text, non_null = true),
        sqlite_column!(
            "created_at",
            &SqlType::Integer,
            non_null = true,
            default_value = Some("(cast(strftime('%s','now') as int))")
        ),
    ],
    indices: &[],
};

const AUTH_VERSIONED_SCHEMAS: &[VersionedSchema] = &[VersionedSchema {
    version: 1,
    tables: &[SESSION_TABLE_V1],
    migration: None,
}];

/// Auth provider that persists the anonymous identity in a local SQLite database,
/// so the same collection is used across restarts.
pub struct LocalAuthProvider {
    conn: Mutex<Connection>,
    anonymous_sign_in: bool,
    identity: watch::Sender<Option<Identity>>,
}

impl LocalAuthProvider {
    pub fn new<P: AsRef<Path>>(db_path: P, anonymous_sign_in: bool) -> Result<Self> {
        let conn = Connection::open(db_path.as_ref())
            .with_context(|| format!("Failed to open auth database {:?}", db_path.as_ref()))?;
        Self::from_connection(conn, anonymous_sign_in)
    }

    pub fn in_memory(anonymous_sign_in: bool) -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?, anonymous_sign_in)
    }

    fn from_connection(mut conn: Connection, anonymous_sign_in: bool) -> Result<Self> {
        open_versioned(&mut conn, AUTH_VERSIONED_SCHEMAS, "auth")?;
        let stored: Option<String> = conn
            .query_row("SELECT identity FROM session WHERE slot = 0", [], |row| {
                row.get(0)
            })
            .optional()?;
        if let Some(identity) = &stored {
            info!("Restored anonymous identity {}", identity);
        }
        let (identity, _) = watch::channel(stored.map(Identity::new));
        Ok(Self {
            conn: Mutex::new(conn),
            anonymous_sign_in,
            identity,
        })
    }

    fn with_conn<T>(
        &self,
        f: impl FnOnce(&Connection) -> rusqlite::Result<T>,
    ) -> Result<T, AuthError> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| AuthError::Storage("auth database lock poisoned".to_string()))?;
        f(&conn).map_err(|e| AuthError::Storage(e.to_string()))
    }
}

#[async_trait]
impl AuthProvider for LocalAuthProvider {
    async fn sign_in_anonymously(&self) -> Result<Identity, AuthError> {
        if !self.anonymous_sign_in {
            return Err(AuthError::AnonymousSignInDisabled);
        }

        let identity = Identity::new(uuid::Uuid::new_v4().simple().to_string());
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO session (slot, identity) VALUES (0, ?1)",
                params![identity.as_str()],
            )
        })?;
        info!("Signed in anonymously as {}", identity);
        self.identity.send_replace(Some(identity.clone()));
        Ok(identity)
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        self.with_conn(|conn| conn.execute("DELETE FROM session", []))?;
        if let Some(previous) = self.identity.send_replace(None) {
            info!("Signed out {}", previous);
        }
        Ok(())
    }

    fn watch(&self) -> watch::Receiver<Option<Identity>> {
        self.identity.subscribe()
    }
}
