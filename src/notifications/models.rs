//! Notification data models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Source tag that marks a 3D-print request carrying a downloadable file `url`.
pub const PRINT_PETITION_SOURCE: &str = "Paige's Print Petitions";

/// Opaque per-session key assigned by the auth provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Location of one identity's notifications collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CollectionPath {
    pub app_id: String,
    pub identity: Identity,
}

impl CollectionPath {
    pub fn new(app_id: impl Into<String>, identity: Identity) -> Self {
        Self {
            app_id: app_id.into(),
            identity,
        }
    }

    /// Path shown to senders when no identity has been assigned yet.
    pub fn placeholder(app_id: &str) -> String {
        format!("/artifacts/{}/users/YOUR_USER_ID/notifications", app_id)
    }
}

impl fmt::Display for CollectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "/artifacts/{}/users/{}/notifications",
            self.app_id, self.identity
        )
    }
}

/// A raw document as held by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub id: String,
    pub timestamp: Option<DateTime<Utc>>,
    pub fields: Map<String, Value>,
}

/// A notification as displayed: fixed envelope plus the sender's untyped payload.
///
/// Serializes to a single flat object, the same shape the sender wrote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl Notification {
    /// Merges the document identifier with its fields. The store identifier always wins
    /// over an `id` field written by the sender.
    pub fn from_document(document: StoredDocument) -> Self {
        let StoredDocument {
            id,
            timestamp,
            mut fields,
        } = document;

        fields.shift_remove("id");
        fields.shift_remove("timestamp");
        let source = match fields.shift_remove("source") {
            Some(Value::String(source)) => Some(source),
            Some(other) => {
                // Non-string sources stay visible in the payload
                fields.insert("source".to_string(), other);
                None
            }
            None => None,
        };

        Self {
            id,
            timestamp,
            source,
            payload: fields,
        }
    }

    pub fn source_or_unknown(&self) -> &str {
        self.source.as_deref().unwrap_or("Unknown")
    }

    pub fn is_print_petition(&self) -> bool {
        self.source.as_deref() == Some(PRINT_PETITION_SOURCE)
    }

    /// The file to open for print petitions.
    pub fn print_file_url(&self) -> Option<&str> {
        if !self.is_print_petition() {
            return None;
        }
        self.payload_str("url")
    }

    pub fn payload_str(&self, key: &str) -> Option<&str> {
        self.payload.get(key).and_then(Value::as_str)
    }

    /// Timestamp used for ordering; missing timestamps count as the epoch.
    pub fn sort_key(&self) -> DateTime<Utc> {
        self.timestamp.unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
    }

    pub fn to_pretty_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }
}

/// Orders newest first. Ties (including all timestamp-less items) keep delivery order.
pub fn sort_newest_first(notifications: &mut [Notification]) {
    notifications.sort_by(|a, b| b.sort_key().cmp(&a.sort_key()));
}
