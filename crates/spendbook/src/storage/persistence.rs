//! Persistence — write-through snapshot of the session into a
//! [`KeyValueStore`].
//!
//! Two independent blobs hold the ledger and the taxonomy. When auto-backup
//! is on, a third blob carries a combined timestamped copy of both, which
//! [`Session::restore_from_local_backup`](crate::session::Session::restore_from_local_backup)
//! reads back.
//!
//! Reads never fail: a missing or corrupt blob is replaced by its built-in
//! default and logged. Writes that fail are logged and dropped; the in-memory
//! state stays authoritative for the rest of the session.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::{
    backup::{LocalBackup, BACKUP_VERSION},
    error::{Result, StorageError},
    taxonomy::Taxonomy,
    types::Receipt,
};

use super::traits::KeyValueStore;

// ============================================================================
// Keys
// ============================================================================

pub const RECEIPTS_KEY: &str = "spendbook.receipts";
pub const TAXONOMY_KEY: &str = "spendbook.taxonomy";
pub const BACKUP_KEY: &str = "spendbook.backup";
pub const AUTO_BACKUP_KEY: &str = "spendbook.auto_backup";

/// What boot-time loading produced.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedState {
    pub receipts: Vec<Receipt>,
    pub taxonomy: Taxonomy,
    /// True when at least one blob was read successfully (as opposed to
    /// everything coming from defaults).
    pub from_storage: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BackupBlob<'a> {
    receipts: &'a [Receipt],
    category_data: &'a Taxonomy,
    updated_at: String,
    version: u32,
}

pub struct Persistence {
    store: Arc<dyn KeyValueStore>,
    auto_backup: AtomicBool,
}

impl Persistence {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        let auto_backup = match store.get(AUTO_BACKUP_KEY) {
            Ok(Some(raw)) => serde_json::from_str::<bool>(&raw).unwrap_or(true),
            Ok(None) => true,
            Err(e) => {
                tracing::warn!(error = %e, "failed to read auto-backup flag, defaulting to on");
                true
            }
        };
        Self {
            store,
            auto_backup: AtomicBool::new(auto_backup),
        }
    }

    // -----------------------------------------------------------------------
    // Boot-time load
    // -----------------------------------------------------------------------

    pub fn load(&self) -> LoadedState {
        let receipts = self.load_receipts();
        let taxonomy = self.load_taxonomy();
        let from_storage = receipts.is_some() || taxonomy.is_some();
        let receipts = receipts.unwrap_or_default();
        let mut taxonomy = taxonomy.unwrap_or_default();
        taxonomy.normalize();
        if taxonomy.adopt_references(&receipts) {
            tracing::warn!("stored taxonomy was missing names used by receipts, restored them");
        }
        LoadedState {
            receipts,
            taxonomy,
            from_storage,
        }
    }

    fn load_receipts(&self) -> Option<Vec<Receipt>> {
        let value = self.read_json(RECEIPTS_KEY)?;
        match serde_json::from_value(value) {
            Ok(receipts) => Some(receipts),
            Err(e) => {
                tracing::warn!(key = RECEIPTS_KEY, error = %e, "corrupt receipts blob, starting with an empty ledger");
                None
            }
        }
    }

    fn load_taxonomy(&self) -> Option<Taxonomy> {
        let value = self.read_json(TAXONOMY_KEY)?;
        let has_shape = value.get("categories").is_some_and(Value::is_object)
            && value.get("labels").is_some_and(Value::is_array);
        if !has_shape {
            tracing::warn!(key = TAXONOMY_KEY, "taxonomy blob is missing required fields, using defaults");
            return None;
        }
        match serde_json::from_value(value) {
            Ok(taxonomy) => Some(taxonomy),
            Err(e) => {
                tracing::warn!(key = TAXONOMY_KEY, error = %e, "corrupt taxonomy blob, using defaults");
                None
            }
        }
    }

    fn read_json(&self, key: &str) -> Option<Value> {
        let raw = match self.store.get(key) {
            Ok(raw) => raw?,
            Err(e) => {
                tracing::warn!(key, error = %e, "local read failed, using defaults");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(key, error = %e, "local blob is not valid JSON, using defaults");
                None
            }
        }
    }

    // -----------------------------------------------------------------------
    // Write-through
    // -----------------------------------------------------------------------

    /// Persist the committed state. `taxonomy_changed` is false for
    /// ledger-only edits, which skip rewriting the taxonomy blob.
    pub(crate) fn write(&self, receipts: &[Receipt], taxonomy: &Taxonomy, taxonomy_changed: bool) {
        if let Err(e) = self.try_write(receipts, taxonomy, taxonomy_changed) {
            tracing::warn!(error = %e, "write-through to local storage failed");
        }
    }

    fn try_write(&self, receipts: &[Receipt], taxonomy: &Taxonomy, taxonomy_changed: bool) -> Result<()> {
        self.store.set(RECEIPTS_KEY, &encode(RECEIPTS_KEY, receipts)?)?;
        if taxonomy_changed {
            self.store.set(TAXONOMY_KEY, &encode(TAXONOMY_KEY, taxonomy)?)?;
        }
        if self.auto_backup() {
            self.write_backup(receipts, taxonomy)?;
        }
        Ok(())
    }

    fn write_backup(&self, receipts: &[Receipt], taxonomy: &Taxonomy) -> Result<()> {
        let blob = BackupBlob {
            receipts,
            category_data: taxonomy,
            updated_at: chrono::Utc::now().to_rfc3339(),
            version: BACKUP_VERSION,
        };
        self.store.set(BACKUP_KEY, &encode(BACKUP_KEY, &blob)?)
    }

    // -----------------------------------------------------------------------
    // Auto-backup
    // -----------------------------------------------------------------------

    pub fn auto_backup(&self) -> bool {
        self.auto_backup.load(Ordering::SeqCst)
    }

    /// Turning the flag on refreshes the backup blob from `receipts` and
    /// `taxonomy` straight away.
    pub(crate) fn set_auto_backup(&self, enabled: bool, receipts: &[Receipt], taxonomy: &Taxonomy) -> Result<()> {
        self.auto_backup.store(enabled, Ordering::SeqCst);
        self.store
            .set(AUTO_BACKUP_KEY, if enabled { "true" } else { "false" })?;
        if enabled {
            self.write_backup(receipts, taxonomy)?;
        }
        Ok(())
    }

    /// Read the combined backup blob. `Ok(None)` when none was ever written.
    pub fn read_local_backup(&self) -> Result<Option<LocalBackup>> {
        let Some(raw) = self.store.get(BACKUP_KEY)? else {
            return Ok(None);
        };
        Ok(Some(LocalBackup::parse(&raw)?))
    }
}

fn encode<T: Serialize + ?Sized>(key: &str, value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(|source| {
        StorageError::Encode {
            key: key.to_string(),
            source,
        }
        .into()
    })
}
