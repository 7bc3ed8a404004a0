//! Backup file format.

use serde_json::{json, Value};

use spendbook::backup::{BackupFile, BACKUP_VERSION};
use spendbook::taxonomy::{Taxonomy, UNCATEGORIZED};
use spendbook::types::{Item, Receipt, Snapshot};

fn snapshot() -> Snapshot {
    Snapshot {
        receipts: vec![Receipt::new("2024-03-03", "Hardware")
            .with_id("h1")
            .with_item(Item::new("Nails", 4.0, "Uncategorized").with_labels(["Bulk"]))],
        category_data: Taxonomy::default(),
    }
}

#[test]
fn export_has_the_documented_fields() {
    let json = BackupFile::from_snapshot(snapshot()).to_json().unwrap();
    let value: Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["version"], BACKUP_VERSION);
    assert!(value["exportedAt"].is_string());
    assert_eq!(value["receipts"][0]["shop"], "Hardware");
    assert_eq!(value["categoryData"]["labels"][3], "Bulk");
}

#[test]
fn parse_returns_the_exported_snapshot() {
    let original = snapshot();
    let json = BackupFile::from_snapshot(original.clone()).to_json().unwrap();
    assert_eq!(BackupFile::parse(&json).unwrap(), original);
}

#[test]
fn parse_accepts_files_without_metadata() {
    let json = json!({
        "receipts": [],
        "categoryData": {"categories": {"Travel": ["Flights"]}, "labels": []}
    });
    let snapshot = BackupFile::parse(&json.to_string()).unwrap();
    assert!(snapshot.category_data.has_category(UNCATEGORIZED));
    assert!(snapshot.category_data.has_sub_category("Travel", "Flights"));
}

#[test]
fn parse_rejects_non_object_root() {
    assert!(BackupFile::parse("[]").is_err());
}
