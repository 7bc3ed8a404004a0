//! Session — the single owner of the ledger and taxonomy for one running
//! application.
//!
//! Every mutation goes through here. A mutation runs under the state lock,
//! is written through to local storage while the lock is still held (so the
//! durable order is the commit order), and only then is a [`ChangeEvent`]
//! emitted with the lock released. Rejected edits return an [`EditError`]
//! and leave both stores and the durable copy untouched.
//!
//! Collaborators read through [`Session::snapshot`] and friends, which hand
//! out clones; there is no way to observe a half-applied edit.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::{
    backup::BackupFile,
    error::{BackupError, EditError, Result},
    ledger::Ledger,
    reactive::{ChangeEvent, ChangeOrigin, EventEmitter, ListenerId},
    storage::{KeyValueStore, MemoryStore, Persistence},
    taxonomy::{self, Taxonomy},
    types::{Outcome, Receipt, Snapshot},
};

struct State {
    ledger: Ledger,
    taxonomy: Taxonomy,
}

pub struct Session {
    state: Mutex<State>,
    persistence: Persistence,
    emitter: EventEmitter<ChangeEvent>,
    booted_with_data: bool,
}

impl Session {
    /// Load the last durable snapshot from `store`, or defaults if there is
    /// none or it is unreadable.
    pub fn open(store: Arc<dyn KeyValueStore>) -> Self {
        let persistence = Persistence::new(store);
        let loaded = persistence.load();
        let mut ledger = Ledger::default();
        ledger.replace(loaded.receipts);
        let booted_with_data = !ledger.is_empty() || loaded.taxonomy != Taxonomy::default();
        tracing::debug!(
            receipts = ledger.len(),
            categories = loaded.taxonomy.categories.len(),
            from_storage = loaded.from_storage,
            "session opened"
        );
        Self {
            state: Mutex::new(State {
                ledger,
                taxonomy: loaded.taxonomy,
            }),
            persistence,
            emitter: EventEmitter::new(),
            booted_with_data,
        }
    }

    /// A session backed by a fresh [`MemoryStore`].
    pub fn in_memory() -> Self {
        Self::open(Arc::new(MemoryStore::new()))
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    pub fn snapshot(&self) -> Snapshot {
        let state = self.state.lock();
        Snapshot {
            receipts: state.ledger.receipts().to_vec(),
            category_data: state.taxonomy.clone(),
        }
    }

    pub fn receipts(&self) -> Vec<Receipt> {
        self.state.lock().ledger.receipts().to_vec()
    }

    pub fn receipt(&self, id: &str) -> Option<Receipt> {
        self.state.lock().ledger.get(id).cloned()
    }

    pub fn taxonomy(&self) -> Taxonomy {
        self.state.lock().taxonomy.clone()
    }

    pub fn category_usage(&self, category: &str) -> usize {
        self.state.lock().ledger.category_usage(category)
    }

    pub fn sub_category_usage(&self, category: &str, sub: &str) -> usize {
        self.state.lock().ledger.sub_category_usage(category, sub)
    }

    pub fn label_usage(&self, label: &str) -> usize {
        self.state.lock().ledger.label_usage(label)
    }

    /// Whether local storage held anything beyond the defaults at boot.
    pub fn booted_with_data(&self) -> bool {
        self.booted_with_data
    }

    pub fn persistence(&self) -> &Persistence {
        &self.persistence
    }

    // -----------------------------------------------------------------------
    // Change notification
    // -----------------------------------------------------------------------

    /// Register a listener called after every committed change.
    pub fn on_change(&self, listener: impl Fn(&ChangeEvent) + Send + Sync + 'static) -> ListenerId {
        self.emitter.on(listener)
    }

    pub fn off_change(&self, id: ListenerId) {
        self.emitter.off(id);
    }

    // -----------------------------------------------------------------------
    // Taxonomy edits
    // -----------------------------------------------------------------------

    pub fn add_category(&self, name: &str) -> Result<Outcome, EditError> {
        self.edit(taxonomy_event(), |s| s.taxonomy.add_category(name))
    }

    pub fn add_sub_category(&self, category: &str, sub: &str) -> Result<Outcome, EditError> {
        self.edit(taxonomy_event(), |s| s.taxonomy.add_sub_category(category, sub))
    }

    pub fn add_label(&self, label: &str) -> Result<Outcome, EditError> {
        self.edit(taxonomy_event(), |s| s.taxonomy.add_label(label))
    }

    pub fn add_payment_mode(&self, mode: &str) -> Result<Outcome, EditError> {
        self.edit(taxonomy_event(), |s| s.taxonomy.add_payment_mode(mode))
    }

    pub fn rename_category(&self, old: &str, new: &str) -> Result<Outcome, EditError> {
        self.edit(taxonomy_event(), |s| {
            taxonomy::rename_category(&mut s.taxonomy, &mut s.ledger, old, new)
        })
    }

    pub fn rename_sub_category(&self, category: &str, old: &str, new: &str) -> Result<Outcome, EditError> {
        self.edit(taxonomy_event(), |s| {
            taxonomy::rename_sub_category(&mut s.taxonomy, &mut s.ledger, category, old, new)
        })
    }

    pub fn rename_label(&self, old: &str, new: &str) -> Result<Outcome, EditError> {
        self.edit(taxonomy_event(), |s| {
            taxonomy::rename_label(&mut s.taxonomy, &mut s.ledger, old, new)
        })
    }

    /// Delete a category. Items using it move to `reassign_to`, or to
    /// `"Uncategorized"` when no target is given.
    pub fn delete_category(&self, name: &str, reassign_to: Option<&str>) -> Result<Outcome, EditError> {
        self.edit(taxonomy_event(), |s| {
            taxonomy::delete_category(&mut s.taxonomy, &mut s.ledger, name, reassign_to)
        })
    }

    /// Delete a sub-category. Rejected while items use it unless
    /// `reassign_to` names another sub-category of the same category.
    pub fn delete_sub_category(
        &self,
        category: &str,
        sub: &str,
        reassign_to: Option<&str>,
    ) -> Result<Outcome, EditError> {
        self.edit(taxonomy_event(), |s| {
            taxonomy::delete_sub_category(&mut s.taxonomy, &mut s.ledger, category, sub, reassign_to)
        })
    }

    pub fn delete_label(&self, label: &str) -> Result<Outcome, EditError> {
        self.edit(taxonomy_event(), |s| {
            Ok(taxonomy::delete_label(&mut s.taxonomy, &mut s.ledger, label))
        })
    }

    // -----------------------------------------------------------------------
    // Ledger edits
    // -----------------------------------------------------------------------

    /// Add a receipt, returning the id it was stored under.
    pub fn add_receipt(&self, receipt: Receipt) -> Result<String, EditError> {
        self.commit(receipts_event(), |s| {
            let id = s.ledger.add(receipt, &s.taxonomy)?;
            Ok((id, Outcome::Applied))
        })
    }

    pub fn update_receipt(&self, receipt: Receipt) -> Result<Outcome, EditError> {
        self.edit(receipts_event(), |s| s.ledger.update(receipt, &s.taxonomy))
    }

    pub fn delete_receipt(&self, id: &str) -> Outcome {
        self.edit(receipts_event(), |s| Ok(s.ledger.delete(id)))
            .unwrap_or(Outcome::Unchanged)
    }

    // -----------------------------------------------------------------------
    // Whole-snapshot operations
    // -----------------------------------------------------------------------

    /// Replace both stores with `snapshot` as a local change.
    pub fn import_snapshot(&self, snapshot: Snapshot) -> Outcome {
        self.replace(Some(snapshot.receipts), Some(snapshot.category_data), ChangeOrigin::Local)
    }

    /// Clear the ledger and restore the built-in taxonomy.
    pub fn reset_all(&self) -> Outcome {
        self.import_snapshot(Snapshot {
            receipts: Vec::new(),
            category_data: Taxonomy::default(),
        })
    }

    /// Serialize the current state as a backup file.
    pub fn export_backup(&self) -> Result<String, BackupError> {
        BackupFile::from_snapshot(self.snapshot()).to_json()
    }

    /// Validate a backup file and replace local state with it.
    pub fn import_backup(&self, json: &str) -> Result<Outcome, BackupError> {
        let snapshot = BackupFile::parse(json)?;
        Ok(self.import_snapshot(snapshot))
    }

    /// Replace local state with the auto-backup blob.
    pub fn restore_from_local_backup(&self) -> Result<Outcome> {
        let backup = self
            .persistence
            .read_local_backup()?
            .ok_or(BackupError::NoLocalBackup)?;
        Ok(self.import_snapshot(backup.into_snapshot()))
    }

    pub fn auto_backup(&self) -> bool {
        self.persistence.auto_backup()
    }

    /// Enabling refreshes the backup blob with the current state.
    pub fn set_auto_backup(&self, enabled: bool) -> Result<()> {
        let state = self.state.lock();
        self.persistence
            .set_auto_backup(enabled, state.ledger.receipts(), &state.taxonomy)
    }

    /// Overwrite the fields present in a remote document. Skips intent
    /// validation; the data was validated by whichever session pushed it.
    pub(crate) fn apply_remote(&self, receipts: Option<Vec<Receipt>>, taxonomy: Option<Taxonomy>) -> Outcome {
        self.replace(receipts, taxonomy, ChangeOrigin::Remote)
    }

    // -----------------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------------

    fn replace(&self, receipts: Option<Vec<Receipt>>, taxonomy: Option<Taxonomy>, origin: ChangeOrigin) -> Outcome {
        let event = match (&receipts, &taxonomy) {
            (None, None) => return Outcome::Unchanged,
            (Some(_), None) => ChangeEvent::Receipts { origin },
            (None, Some(_)) => ChangeEvent::Taxonomy { origin },
            (Some(_), Some(_)) => ChangeEvent::Snapshot { origin },
        };
        self.edit(event, |s| {
            let before_ledger = s.ledger.clone();
            let before_taxonomy = s.taxonomy.clone();
            if let Some(receipts) = receipts {
                s.ledger.replace(receipts);
            }
            if let Some(mut taxonomy) = taxonomy {
                taxonomy.normalize();
                s.taxonomy = taxonomy;
            }
            if s.ledger == before_ledger && s.taxonomy == before_taxonomy {
                Ok(Outcome::Unchanged)
            } else {
                Ok(Outcome::Applied)
            }
        })
        .unwrap_or(Outcome::Unchanged)
    }

    fn edit<F>(&self, event: ChangeEvent, f: F) -> Result<Outcome, EditError>
    where
        F: FnOnce(&mut State) -> Result<Outcome, EditError>,
    {
        self.commit(event, |s| f(s).map(|outcome| (outcome, outcome)))
    }

    /// Run `f` under the state lock; on `Applied`, write through and then
    /// notify listeners with the lock released.
    fn commit<T, F>(&self, event: ChangeEvent, f: F) -> Result<T, EditError>
    where
        F: FnOnce(&mut State) -> Result<(T, Outcome), EditError>,
    {
        let value = {
            let mut state = self.state.lock();
            let (value, outcome) = f(&mut state)?;
            if outcome == Outcome::Unchanged {
                return Ok(value);
            }
            self.persistence.write(
                state.ledger.receipts(),
                &state.taxonomy,
                event.touches_taxonomy(),
            );
            value
        };
        tracing::debug!(?event, "committed change");
        self.emitter.emit(&event);
        Ok(value)
    }
}

fn taxonomy_event() -> ChangeEvent {
    ChangeEvent::Taxonomy {
        origin: ChangeOrigin::Local,
    }
}

fn receipts_event() -> ChangeEvent {
    ChangeEvent::Receipts {
        origin: ChangeOrigin::Local,
    }
}
