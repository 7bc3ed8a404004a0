//! Receipt add/update/delete through the session.

use std::sync::Arc;

use spendbook::error::EditError;
use spendbook::session::Session;
use spendbook::storage::persistence::{RECEIPTS_KEY, TAXONOMY_KEY};
use spendbook::storage::{KeyValueStore, MemoryStore};
use spendbook::types::{Item, Outcome, Receipt};

fn groceries() -> Receipt {
    Receipt::new("2024-06-01", "Corner Shop")
        .with_item(Item::new("Milk", 1.2, "Food").with_sub_category("Groceries"))
        .with_item(Item::new("Bread", 2.5, "Food"))
        .with_payment_mode("Cash")
}

#[test]
fn ids_stay_unique_across_adds() {
    let session = Session::in_memory();
    let ids: Vec<String> = (0..20)
        .map(|_| session.add_receipt(groceries()).unwrap())
        .collect();
    let mut unique = ids.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(unique.len(), 20);
    assert!(session.receipts().iter().all(|r| !r.items.is_empty()));
}

#[test]
fn explicit_ids_are_kept_and_duplicates_rejected() {
    let session = Session::in_memory();
    assert_eq!(session.add_receipt(groceries().with_id("r-1")), Ok("r-1".to_string()));
    assert_eq!(
        session.add_receipt(groceries().with_id("r-1")),
        Err(EditError::DuplicateReceiptId("r-1".to_string()))
    );
    assert_eq!(session.receipts().len(), 1);
}

#[test]
fn receipts_without_items_are_rejected() {
    let session = Session::in_memory();
    assert_eq!(
        session.add_receipt(Receipt::new("2024-06-01", "Empty")),
        Err(EditError::EmptyReceipt)
    );
    assert_eq!(
        session.add_receipt(Receipt::new("2024-06-01", " ").with_item(Item::new("X", 1.0, "Food"))),
        Err(EditError::EmptyShop)
    );
    assert!(session.receipts().is_empty());
}

#[test]
fn update_replaces_in_place() {
    let session = Session::in_memory();
    let first = session.add_receipt(groceries()).unwrap();
    let second = session.add_receipt(groceries()).unwrap();

    let mut edited = session.receipt(&first).unwrap();
    edited.shop = "Farmers Market".to_string();
    assert_eq!(session.update_receipt(edited.clone()), Ok(Outcome::Applied));
    assert_eq!(session.update_receipt(edited), Ok(Outcome::Unchanged));

    let receipts = session.receipts();
    assert_eq!(receipts[0].id, first);
    assert_eq!(receipts[0].shop, "Farmers Market");
    assert_eq!(receipts[1].id, second);
}

#[test]
fn update_validates_and_requires_existing_id() {
    let session = Session::in_memory();
    let id = session.add_receipt(groceries()).unwrap();

    let mut bad = session.receipt(&id).unwrap();
    bad.items.clear();
    assert_eq!(session.update_receipt(bad), Err(EditError::EmptyReceipt));

    assert!(matches!(
        session.update_receipt(groceries().with_id("missing")),
        Err(EditError::ReceiptNotFound(_))
    ));
    assert_eq!(session.receipt(&id).unwrap().items.len(), 2);
}

#[test]
fn delete_receipt() {
    let session = Session::in_memory();
    let id = session.add_receipt(groceries()).unwrap();
    assert_eq!(session.delete_receipt(&id), Outcome::Applied);
    assert_eq!(session.delete_receipt(&id), Outcome::Unchanged);
    assert!(session.receipts().is_empty());
}

#[test]
fn ledger_edits_write_through_without_touching_the_taxonomy_blob() {
    let store = Arc::new(MemoryStore::new());
    let session = Session::open(store.clone());
    session.add_receipt(groceries()).unwrap();

    assert!(store.get(RECEIPTS_KEY).unwrap().is_some());
    assert!(store.get(TAXONOMY_KEY).unwrap().is_none());

    let reopened = Session::open(store);
    assert_eq!(reopened.receipts(), session.receipts());
    assert!(reopened.booted_with_data());
}
