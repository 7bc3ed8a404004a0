//! Taxonomy edits through the session: referential integrity across the
//! ledger, rejections, and write-through.

use std::sync::{Arc, Mutex};

use spendbook::error::EditError;
use spendbook::reactive::ChangeEvent;
use spendbook::session::Session;
use spendbook::storage::persistence::TAXONOMY_KEY;
use spendbook::storage::{KeyValueStore, MemoryStore};
use spendbook::taxonomy::UNCATEGORIZED;
use spendbook::types::{Item, Outcome, Receipt};

fn session_with_store() -> (Session, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    (Session::open(store.clone()), store)
}

fn add(session: &Session, items: Vec<Item>) -> String {
    let mut receipt = Receipt::new("2024-05-01", "Market");
    for item in items {
        receipt = receipt.with_item(item);
    }
    session.add_receipt(receipt).unwrap()
}

fn categories_of_items(session: &Session) -> Vec<String> {
    session
        .receipts()
        .iter()
        .flat_map(|r| r.items.iter().map(|i| i.category.clone()))
        .collect()
}

// ============================================================================
// Additions
// ============================================================================

#[test]
fn add_category_trims_and_ignores_duplicates() {
    let (session, _) = session_with_store();
    assert_eq!(session.add_category("  Health "), Ok(Outcome::Applied));
    assert!(session.taxonomy().has_category("Health"));
    assert_eq!(session.add_category("Health"), Ok(Outcome::Unchanged));
    assert_eq!(session.add_category("   "), Err(EditError::BlankName));
}

#[test]
fn add_sub_category_requires_the_category() {
    let (session, _) = session_with_store();
    assert!(matches!(
        session.add_sub_category("Nope", "Thing"),
        Err(EditError::CategoryNotFound(_))
    ));
    assert_eq!(session.add_sub_category("Food", "Dairy"), Ok(Outcome::Applied));
    assert_eq!(session.add_sub_category("Food", "Dairy"), Ok(Outcome::Unchanged));
    assert!(session.taxonomy().has_sub_category("Food", "Dairy"));
}

#[test]
fn add_label_and_payment_mode() {
    let (session, _) = session_with_store();
    assert_eq!(session.add_label("Weekly"), Ok(Outcome::Applied));
    assert_eq!(session.add_payment_mode("Card"), Ok(Outcome::Applied));
    let taxonomy = session.taxonomy();
    assert!(taxonomy.has_label("Weekly"));
    assert!(taxonomy.has_payment_mode("Card"));
}

// ============================================================================
// Renames
// ============================================================================

#[test]
fn rename_category_rewrites_every_item() {
    let (session, _) = session_with_store();
    add(
        &session,
        vec![
            Item::new("Bread", 2.0, "Food"),
            Item::new("Bus", 1.0, "Transportation"),
        ],
    );
    add(&session, vec![Item::new("Rice", 3.0, "Food")]);

    assert_eq!(session.rename_category("Food", "Groceries & Food"), Ok(Outcome::Applied));

    let taxonomy = session.taxonomy();
    assert!(!taxonomy.has_category("Food"));
    assert!(taxonomy.has_category("Groceries & Food"));
    assert_eq!(
        taxonomy.sub_categories("Groceries & Food"),
        Some(&["Groceries".to_string(), "Dining Out".to_string()][..])
    );
    let cats = categories_of_items(&session);
    assert!(!cats.iter().any(|c| c == "Food"));
    assert_eq!(cats.iter().filter(|c| *c == "Groceries & Food").count(), 2);
    assert_eq!(session.category_usage("Transportation"), 1);
}

#[test]
fn rename_category_rejections_leave_state_untouched() {
    let (session, _) = session_with_store();
    add(&session, vec![Item::new("Bread", 2.0, "Food")]);
    let before = session.snapshot();

    assert!(matches!(
        session.rename_category("Food", "Transportation"),
        Err(EditError::DuplicateCategory(_))
    ));
    assert!(matches!(
        session.rename_category(UNCATEGORIZED, "Misc"),
        Err(EditError::ReservedCategory(_))
    ));
    assert!(matches!(
        session.rename_category("Food", "Food"),
        Err(EditError::SameName(_))
    ));
    assert!(matches!(
        session.rename_category("Missing", "Other"),
        Err(EditError::CategoryNotFound(_))
    ));
    assert_eq!(session.rename_category("Food", " "), Err(EditError::BlankName));

    assert_eq!(session.snapshot(), before);
}

#[test]
fn rename_sub_category_only_touches_its_category() {
    let (session, _) = session_with_store();
    session.add_sub_category("Entertainment", "Groceries").unwrap();
    add(
        &session,
        vec![
            Item::new("Milk", 1.0, "Food").with_sub_category("Groceries"),
            Item::new("Board game", 30.0, "Entertainment").with_sub_category("Groceries"),
        ],
    );

    session
        .rename_sub_category("Food", "Groceries", "Supermarket")
        .unwrap();

    let receipt = &session.receipts()[0];
    assert_eq!(receipt.items[0].sub_category, "Supermarket");
    assert_eq!(receipt.items[1].sub_category, "Groceries");
    assert!(session.taxonomy().has_sub_category("Food", "Supermarket"));
    assert!(!session.taxonomy().has_sub_category("Food", "Groceries"));
}

#[test]
fn rename_label_merges_when_item_already_has_the_new_name() {
    let (session, _) = session_with_store();
    add(
        &session,
        vec![
            Item::new("Apples", 3.0, "Food").with_labels(["Organic", "Discount"]),
            Item::new("Pears", 2.0, "Food").with_labels(["Organic"]),
        ],
    );

    assert!(matches!(
        session.rename_label("Organic", "Discount"),
        Err(EditError::DuplicateLabel(_))
    ));

    session.delete_label("Discount").unwrap();
    session.add_label("Bio").unwrap();
    // "Bio" exists now, so the rename is rejected as well.
    assert!(session.rename_label("Organic", "Bio").is_err());

    session.delete_label("Bio").unwrap();
    session.rename_label("Organic", "Bio").unwrap();
    let receipt = &session.receipts()[0];
    assert_eq!(receipt.items[0].labels, vec!["Bio".to_string()]);
    assert_eq!(receipt.items[1].labels, vec!["Bio".to_string()]);
    assert_eq!(session.label_usage("Organic"), 0);
}

// ============================================================================
// Deletions
// ============================================================================

#[test]
fn delete_category_moves_items_and_subs_to_uncategorized() {
    let (session, _) = session_with_store();
    session.add_sub_category(UNCATEGORIZED, "Groceries").unwrap();
    add(
        &session,
        vec![
            Item::new("Milk", 1.0, "Food").with_sub_category("Groceries"),
            Item::new("Eggs", 2.0, "Food"),
        ],
    );
    add(&session, vec![Item::new("Pizza", 12.0, "Food").with_sub_category("Dining Out")]);

    assert_eq!(session.delete_category("Food", None), Ok(Outcome::Applied));

    let taxonomy = session.taxonomy();
    assert!(!taxonomy.has_category("Food"));
    assert_eq!(
        taxonomy.sub_categories(UNCATEGORIZED),
        Some(&["Groceries".to_string(), "Dining Out".to_string()][..])
    );
    assert_eq!(session.category_usage(UNCATEGORIZED), 3);
    assert_eq!(session.category_usage("Food"), 0);
}

#[test]
fn delete_category_with_explicit_target() {
    let (session, _) = session_with_store();
    add(&session, vec![Item::new("Ticket", 9.0, "Entertainment")]);

    session
        .delete_category("Entertainment", Some("Transportation"))
        .unwrap();

    assert_eq!(session.category_usage("Transportation"), 1);
    assert!(session.taxonomy().has_sub_category("Transportation", "Movies"));
}

#[test]
fn delete_category_rejects_missing_target_and_reserved_name() {
    let (session, _) = session_with_store();
    add(&session, vec![Item::new("Ticket", 9.0, "Entertainment")]);
    let before = session.snapshot();

    assert_eq!(
        session.delete_category("Entertainment", Some("Ghost")),
        Err(EditError::ReassignTargetMissing {
            target: "Ghost".to_string(),
            usage: 1
        })
    );
    assert!(matches!(
        session.delete_category(UNCATEGORIZED, None),
        Err(EditError::ReservedCategory(_))
    ));
    assert_eq!(session.snapshot(), before);
}

#[test]
fn delete_unused_category_ignores_a_missing_target() {
    let (session, _) = session_with_store();
    assert_eq!(
        session.delete_category("Entertainment", Some("Ghost")),
        Ok(Outcome::Applied)
    );
    let taxonomy = session.taxonomy();
    assert!(!taxonomy.has_category("Entertainment"));
    assert!(!taxonomy.has_sub_category(UNCATEGORIZED, "Movies"));
}

#[test]
fn delete_sub_category_in_use_without_target_is_rejected() {
    let (session, store) = session_with_store();
    session.add_sub_category("Food", "Dairy").unwrap();
    add(
        &session,
        vec![
            Item::new("Milk", 1.0, "Food").with_sub_category("Dairy"),
            Item::new("Butter", 3.0, "Food").with_sub_category("Dairy"),
        ],
    );
    let before = session.snapshot();
    let stored_before = store.get(TAXONOMY_KEY).unwrap();

    assert_eq!(
        session.delete_sub_category("Food", "Dairy", None),
        Err(EditError::SubCategoryInUse {
            category: "Food".to_string(),
            sub: "Dairy".to_string(),
            usage: 2
        })
    );
    assert_eq!(session.snapshot(), before);
    assert_eq!(store.get(TAXONOMY_KEY).unwrap(), stored_before);
}

#[test]
fn delete_sub_category_with_target_reassigns() {
    let (session, _) = session_with_store();
    session.add_sub_category("Food", "Dairy").unwrap();
    add(&session, vec![Item::new("Milk", 1.0, "Food").with_sub_category("Dairy")]);

    session
        .delete_sub_category("Food", "Dairy", Some("Groceries"))
        .unwrap();

    assert_eq!(session.receipts()[0].items[0].sub_category, "Groceries");
    assert!(!session.taxonomy().has_sub_category("Food", "Dairy"));
}

#[test]
fn delete_unused_sub_category() {
    let (session, _) = session_with_store();
    assert_eq!(
        session.delete_sub_category("Food", "Dining Out", None),
        Ok(Outcome::Applied)
    );
    assert!(!session.taxonomy().has_sub_category("Food", "Dining Out"));
}

#[test]
fn delete_label_strips_it_from_items_regardless_of_usage() {
    let (session, _) = session_with_store();
    add(&session, vec![Item::new("Gift card", 50.0, "Uncategorized").with_labels(["Gift"])]);

    assert_eq!(session.delete_label("Gift"), Ok(Outcome::Applied));
    assert!(!session.taxonomy().has_label("Gift"));
    assert!(session.receipts()[0].items[0].labels.is_empty());
    assert_eq!(session.delete_label("Gift"), Ok(Outcome::Unchanged));
}

// ============================================================================
// Notification
// ============================================================================

#[test]
fn only_applied_edits_notify() {
    let (session, _) = session_with_store();
    let events = Arc::new(Mutex::new(Vec::new()));
    {
        let events = Arc::clone(&events);
        session.on_change(move |e: &ChangeEvent| events.lock().unwrap().push(e.clone()));
    }

    session.add_category("Health").unwrap();
    session.add_category("Health").unwrap();
    let _ = session.rename_category("Missing", "X");

    let events = events.lock().unwrap();
    assert_eq!(events.len(), 1);
    assert!(events[0].touches_taxonomy());
    assert!(!events[0].is_remote());
}
