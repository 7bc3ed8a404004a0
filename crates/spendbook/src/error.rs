use thiserror::Error;

use crate::sync::types::RemoteErrorKind;

// ---------------------------------------------------------------------------
// EditError
// ---------------------------------------------------------------------------

/// Why a taxonomy or ledger edit was rejected.
///
/// Every rejection leaves the session state exactly as it was before the call.
/// The `Display` text is meant to be shown to the user as-is.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EditError {
    #[error("Name must not be blank")]
    BlankName,

    #[error("New name is the same as the current name \"{0}\"")]
    SameName(String),

    #[error("Category \"{0}\" already exists")]
    DuplicateCategory(String),

    #[error("Sub-category \"{sub}\" already exists under \"{category}\"")]
    DuplicateSubCategory { category: String, sub: String },

    #[error("Label \"{0}\" already exists")]
    DuplicateLabel(String),

    #[error("Category \"{0}\" does not exist")]
    CategoryNotFound(String),

    #[error("Sub-category \"{sub}\" does not exist under \"{category}\"")]
    SubCategoryNotFound { category: String, sub: String },

    #[error("Label \"{0}\" does not exist")]
    LabelNotFound(String),

    #[error("Category \"{0}\" is reserved and cannot be renamed or deleted")]
    ReservedCategory(String),

    #[error("Cannot reassign {usage} item(s) to \"{target}\": target does not exist")]
    ReassignTargetMissing { target: String, usage: usize },

    #[error("Cannot reassign items of \"{0}\" to itself")]
    ReassignToSelf(String),

    #[error(
        "Sub-category \"{sub}\" under \"{category}\" is used by {usage} item(s); \
         choose another sub-category to reassign them to"
    )]
    SubCategoryInUse {
        category: String,
        sub: String,
        usage: usize,
    },

    #[error("Receipt must have a shop name")]
    EmptyShop,

    #[error("Receipt must contain at least one item")]
    EmptyReceipt,

    #[error("Receipt date \"{0}\" is not a YYYY-MM-DD date")]
    InvalidDate(String),

    #[error("Item #{index} is invalid: {reason}")]
    InvalidItem { index: usize, reason: String },

    #[error("GST rate {0} is outside 0-100")]
    InvalidGstRate(f64),

    #[error("Receipt \"{0}\" already exists")]
    DuplicateReceiptId(String),

    #[error("Receipt \"{0}\" not found")]
    ReceiptNotFound(String),
}

// ---------------------------------------------------------------------------
// StorageError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Failed to encode \"{key}\"")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Key-value backend error: {0}")]
    Backend(String),

    #[cfg(feature = "sqlite")]
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
}

// ---------------------------------------------------------------------------
// BackupError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum BackupError {
    #[error("Backup is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Backup is missing required field \"{0}\"")]
    MissingField(&'static str),

    #[error("Backup field \"{field}\" has the wrong shape: expected {expected}")]
    InvalidShape {
        field: &'static str,
        expected: &'static str,
    },

    #[error("No local backup has been recorded")]
    NoLocalBackup,
}

// ---------------------------------------------------------------------------
// SyncError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Remote store error: {message}")]
    Remote {
        message: String,
        kind: RemoteErrorKind,
    },

    #[error("Remote document field \"{field}\" could not be decoded: {source}")]
    Decode {
        field: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("Snapshot could not be encoded for the remote store: {0}")]
    Encode(#[source] serde_json::Error),
}

// ---------------------------------------------------------------------------
// SpendbookError — top-level rollup
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum SpendbookError {
    #[error(transparent)]
    Edit(#[from] EditError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Backup(#[from] BackupError),

    #[error(transparent)]
    Sync(#[from] SyncError),
}

/// Convenience alias — the default error type is `SpendbookError`.
pub type Result<T, E = SpendbookError> = std::result::Result<T, E>;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
