//! Whole-snapshot operations: reset, import, backup round-trips and the
//! local auto-backup.

use std::sync::Arc;

use spendbook::error::{BackupError, SpendbookError};
use spendbook::session::Session;
use spendbook::storage::persistence::BACKUP_KEY;
use spendbook::storage::{KeyValueStore, MemoryStore};
use spendbook::taxonomy::{Taxonomy, UNCATEGORIZED};
use spendbook::types::{Item, Outcome, Receipt};

fn seeded() -> (Session, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let session = Session::open(store.clone());
    session.add_category("Health").unwrap();
    session.add_sub_category("Health", "Pharmacy").unwrap();
    session
        .add_receipt(
            Receipt::new("2024-07-04", "Chemist")
                .with_item(Item::new("Vitamins", 12.0, "Health").with_sub_category("Pharmacy"))
                .with_gst_rate(5.0),
        )
        .unwrap();
    (session, store)
}

#[test]
fn export_modify_import_restores_everything() {
    let (session, _) = seeded();
    let exported = session.export_backup().unwrap();
    let original = session.snapshot();

    session.delete_category("Health", None).unwrap();
    session.add_label("Temporary").unwrap();
    session
        .add_receipt(Receipt::new("2024-07-05", "Cafe").with_item(Item::new("Coffee", 3.0, "Food")))
        .unwrap();
    assert_ne!(session.snapshot(), original);

    assert_eq!(session.import_backup(&exported).unwrap(), Outcome::Applied);
    assert_eq!(session.snapshot(), original);
    assert!(session.taxonomy().has_category(UNCATEGORIZED));
}

#[test]
fn import_backup_rejects_bad_shapes_without_changes() {
    let (session, _) = seeded();
    let before = session.snapshot();

    assert!(matches!(
        session.import_backup(r#"{"receipts": {}, "categoryData": {"categories": {}, "labels": []}}"#),
        Err(BackupError::InvalidShape { field: "receipts", .. })
    ));
    assert!(matches!(
        session.import_backup(r#"{"receipts": []}"#),
        Err(BackupError::MissingField("categoryData"))
    ));
    assert!(matches!(session.import_backup("{"), Err(BackupError::Parse(_))));
    assert_eq!(session.snapshot(), before);
}

#[test]
fn import_adds_uncategorized_when_missing() {
    let session = Session::in_memory();
    session
        .import_backup(r#"{"receipts": [], "categoryData": {"categories": {"Food": []}, "labels": []}}"#)
        .unwrap();
    let taxonomy = session.taxonomy();
    assert!(taxonomy.has_category(UNCATEGORIZED));
    assert!(taxonomy.has_category("Food"));
    assert_eq!(taxonomy.categories.len(), 2);
}

#[test]
fn reset_all_restores_defaults_and_persists() {
    let (session, store) = seeded();
    assert_eq!(session.reset_all(), Outcome::Applied);
    assert!(session.receipts().is_empty());
    assert_eq!(session.taxonomy(), Taxonomy::default());

    let reopened = Session::open(store);
    assert!(reopened.receipts().is_empty());
    assert!(!reopened.booted_with_data());
    assert_eq!(session.reset_all(), Outcome::Unchanged);
}

#[test]
fn restore_from_local_backup_after_reset() {
    let (session, store) = seeded();
    let before_reset = session.snapshot();

    session.set_auto_backup(false).unwrap();
    session.reset_all();
    assert!(store.get(BACKUP_KEY).unwrap().is_some());

    assert_eq!(session.restore_from_local_backup().unwrap(), Outcome::Applied);
    assert_eq!(session.snapshot(), before_reset);
}

#[test]
fn restore_without_backup_is_an_error() {
    let session = Session::in_memory();
    assert!(matches!(
        session.restore_from_local_backup(),
        Err(SpendbookError::Backup(BackupError::NoLocalBackup))
    ));
}

#[test]
fn auto_backup_flag_survives_reopen() {
    let store = Arc::new(MemoryStore::new());
    let session = Session::open(store.clone());
    assert!(session.auto_backup());
    session.set_auto_backup(false).unwrap();
    session.add_category("Pets").unwrap();
    assert!(store.get(BACKUP_KEY).unwrap().is_none());

    let reopened = Session::open(store);
    assert!(!reopened.auto_backup());
}

#[test]
fn enabling_auto_backup_refreshes_the_backup_blob() {
    let (session, _) = seeded();
    session.set_auto_backup(false).unwrap();
    session.add_category("Pets").unwrap();

    session.set_auto_backup(true).unwrap();
    let expected = session.snapshot();

    session.set_auto_backup(false).unwrap();
    session.reset_all();
    assert_eq!(session.restore_from_local_backup().unwrap(), Outcome::Applied);
    assert_eq!(session.snapshot(), expected);
    assert!(session.taxonomy().has_category("Pets"));
}
