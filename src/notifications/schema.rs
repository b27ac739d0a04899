//! SQLite schema definitions for the notifications database.

use crate::sqlite_column;
use crate::sqlite_persistence::{Column, SqlType, Table, VersionedSchema};

// =============================================================================
// Version 1 - Notification documents
// =============================================================================

/// One row per document. `fields` holds the sender's JSON object verbatim.
const NOTIFICATIONS_TABLE_V1: Table = Table {
    name: "notifications",
    columns: &[
        sqlite_column!("id", &SqlType::Text, is_primary_key = true),
        sqlite_column!("app_id", &SqlType::Text, non_null = true),
        sqlite_column!("owner", &SqlType::Text, non_null = true),
        sqlite_column!("timestamp_ms", &SqlType::Integer),
        sqlite_column!("fields", &SqlType::Text, non_null = true),
    ],
    indices: &[
        ("idx_notifications_collection", "app_id, owner"),
        (
            "idx_notifications_collection_ts",
            "app_id, owner, timestamp_ms DESC",
        ),
    ],
};

pub const NOTIFICATIONS_VERSIONED_SCHEMAS: &[VersionedSchema] = &[VersionedSchema {
    version: 1,
    tables: &[NOTIFICATIONS_TABLE_V1],
    migration: None,
}];
