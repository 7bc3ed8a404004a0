//! Backup — whole-snapshot export/import, independent of remote sync.
//!
//! Two formats share one shape check:
//! - [`BackupFile`]: the user-facing export file
//!   `{receipts, categoryData, exportedAt, version}`.
//! - [`LocalBackup`]: the blob written by persistence on every commit while
//!   auto-backup is on, `{receipts, categoryData, updatedAt, version}`.
//!
//! Both accept only a `receipts` list and a `categoryData` object carrying a
//! `categories` map and a `labels` list. Accepted taxonomies always get the
//! reserved category back.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    error::BackupError,
    taxonomy::Taxonomy,
    types::{Receipt, Snapshot},
};

pub const BACKUP_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupFile {
    pub receipts: Vec<Receipt>,
    pub category_data: Taxonomy,
    pub exported_at: String,
    pub version: u32,
}

impl BackupFile {
    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        Self {
            receipts: snapshot.receipts,
            category_data: snapshot.category_data,
            exported_at: chrono::Utc::now().to_rfc3339(),
            version: BACKUP_VERSION,
        }
    }

    /// Pretty-printed JSON, ready to be written to a file.
    pub fn to_json(&self) -> Result<String, BackupError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse and validate an export file, returning the snapshot it carries.
    pub fn parse(json: &str) -> Result<Snapshot, BackupError> {
        let value: Value = serde_json::from_str(json)?;
        decode_snapshot(value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalBackup {
    pub receipts: Vec<Receipt>,
    pub category_data: Taxonomy,
    #[serde(default)]
    pub updated_at: String,
    #[serde(default)]
    pub version: u32,
}

impl LocalBackup {
    pub(crate) fn parse(json: &str) -> Result<Self, BackupError> {
        let value: Value = serde_json::from_str(json)?;
        let updated_at = value
            .get("updatedAt")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let version = value
            .get("version")
            .and_then(Value::as_u64)
            .and_then(|v| u32::try_from(v).ok())
            .unwrap_or(BACKUP_VERSION);
        let snapshot = decode_snapshot(value)?;
        Ok(Self {
            receipts: snapshot.receipts,
            category_data: snapshot.category_data,
            updated_at,
            version,
        })
    }

    pub fn into_snapshot(self) -> Snapshot {
        Snapshot {
            receipts: self.receipts,
            category_data: self.category_data,
        }
    }
}

fn decode_snapshot(mut value: Value) -> Result<Snapshot, BackupError> {
    if !value.is_object() {
        return Err(BackupError::InvalidShape {
            field: "(root)",
            expected: "an object",
        });
    }
    let receipts = value
        .get_mut("receipts")
        .map(Value::take)
        .ok_or(BackupError::MissingField("receipts"))?;
    if !receipts.is_array() {
        return Err(BackupError::InvalidShape {
            field: "receipts",
            expected: "a list",
        });
    }
    let category_data = value
        .get_mut("categoryData")
        .map(Value::take)
        .ok_or(BackupError::MissingField("categoryData"))?;
    let has_shape = category_data.get("categories").is_some_and(Value::is_object)
        && category_data.get("labels").is_some_and(Value::is_array);
    if !has_shape {
        return Err(BackupError::InvalidShape {
            field: "categoryData",
            expected: "an object with a \"categories\" map and a \"labels\" list",
        });
    }

    let receipts: Vec<Receipt> = serde_json::from_value(receipts)?;
    let mut category_data: Taxonomy = serde_json::from_value(category_data)?;
    category_data.normalize();
    Ok(Snapshot {
        receipts,
        category_data,
    })
}
