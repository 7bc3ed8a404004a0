//! Sync-specific types: the remote store trait, its error type, engine
//! options and status, and decoding of the remote document.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::{
    error::SyncError,
    taxonomy::Taxonomy,
    types::{Receipt, SyncSnapshot},
};

// ============================================================================
// RemoteStore — user-provided document store
// ============================================================================

/// How [`RemoteStore::set`] combines the new document with the stored one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Top-level fields present in the new document overwrite the stored
    /// ones; other stored fields are kept.
    Merge,
    /// The stored document is replaced wholesale.
    Replace,
}

/// One JSON document per user, `{receipts, categoryData, updatedAt}`.
///
/// Implementations handle the network; the engine never retries on its own.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Read the user's document once. `Ok(None)` when it does not exist.
    async fn get(&self, user: &str) -> Result<Option<Value>, RemoteError>;

    async fn set(&self, user: &str, doc: Value, mode: WriteMode) -> Result<(), RemoteError>;

    /// Subscribe to the user's document. The first message carries the
    /// current state (`None` when the document does not exist); every later
    /// message follows a write. The subscription ends when the receiver is
    /// dropped.
    async fn watch(&self, user: &str) -> Result<mpsc::UnboundedReceiver<Option<Value>>, RemoteError>;
}

/// Error classification for remote failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteErrorKind {
    /// Network blip, timeout, unavailable backend.
    Transient,
    /// The signed-in user may not read or write this document.
    Permission,
    NotFound,
    Permanent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteError {
    pub message: String,
    pub kind: RemoteErrorKind,
}

impl RemoteError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: RemoteErrorKind::Transient,
        }
    }

    pub fn with_kind(message: impl Into<String>, kind: RemoteErrorKind) -> Self {
        Self {
            message: message.into(),
            kind,
        }
    }
}

impl std::fmt::Display for RemoteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for RemoteError {}

impl From<RemoteError> for SyncError {
    fn from(e: RemoteError) -> Self {
        SyncError::Remote {
            message: e.message,
            kind: e.kind,
        }
    }
}

// ============================================================================
// Options and status
// ============================================================================

pub const DEFAULT_DEBOUNCE_MS: u64 = 2000;
pub const DEFAULT_SETTLE_MS: u64 = 500;

#[derive(Debug, Clone, Default)]
pub struct SyncEngineOptions {
    /// Quiet period before a local change is pushed (default: 2000).
    pub debounce_ms: Option<u64>,
    /// How long after applying a remote document local changes are held
    /// back as possible echoes (default: 500).
    pub settle_ms: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// No signed-in user; every sync operation is a no-op.
    Idle,
    /// Subscribing to the remote document.
    LoadingLocal,
    Active,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SyncStatus {
    pub state: SyncState,
    pub user: Option<String>,
    pub pushing: bool,
    pub pulling: bool,
    pub last_push_time: Option<DateTime<Utc>>,
    pub last_pull_time: Option<DateTime<Utc>>,
}

/// Result of a manual push or pull.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Completed at the given time.
    Synced(DateTime<Utc>),
    /// Pull found no remote document; local state is untouched.
    NoDocument,
    /// No signed-in user.
    Idle,
}

// ============================================================================
// Remote document
// ============================================================================

/// A decoded remote document. Absent fields stay `None` so the matching
/// local store is left alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemoteDocument {
    pub receipts: Option<Vec<Receipt>>,
    pub category_data: Option<Taxonomy>,
    pub updated_at: Option<String>,
}

impl RemoteDocument {
    pub fn decode(value: Value) -> Result<Self, SyncError> {
        let Value::Object(mut map) = value else {
            return Err(SyncError::Decode {
                field: "(root)",
                source: serde::de::Error::custom("expected an object"),
            });
        };
        let receipts = match map.remove("receipts") {
            None | Some(Value::Null) => None,
            Some(v) => Some(
                serde_json::from_value(v).map_err(|source| SyncError::Decode {
                    field: "receipts",
                    source,
                })?,
            ),
        };
        let category_data = match map.remove("categoryData") {
            None | Some(Value::Null) => None,
            Some(v) => Some(serde_json::from_value::<Taxonomy>(v).map_err(|source| {
                SyncError::Decode {
                    field: "categoryData",
                    source,
                }
            })?),
        };
        let updated_at = map
            .remove("updatedAt")
            .and_then(|v| v.as_str().map(str::to_string));
        Ok(Self {
            receipts,
            category_data,
            updated_at,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.receipts.is_none() && self.category_data.is_none()
    }
}

pub(crate) fn encode_snapshot(snapshot: &SyncSnapshot) -> Result<Value, SyncError> {
    serde_json::to_value(snapshot).map_err(SyncError::Encode)
}
