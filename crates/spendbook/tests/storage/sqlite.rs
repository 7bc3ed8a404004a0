//! SQLite backend.

use std::sync::Arc;

use spendbook::session::Session;
use spendbook::storage::{KeyValueStore, SqliteStore};
use spendbook::types::{Item, Receipt};

#[test]
fn set_get_remove() {
    let store = SqliteStore::open_in_memory().unwrap();
    assert_eq!(store.get("k").unwrap(), None);
    store.set("k", "1").unwrap();
    store.set("k", "2").unwrap();
    assert_eq!(store.get("k").unwrap(), Some("2".to_string()));
    store.remove("k").unwrap();
    store.remove("k").unwrap();
    assert_eq!(store.get("k").unwrap(), None);
}

#[test]
fn session_survives_reopen_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("spendbook.db");

    let id = {
        let session = Session::open(Arc::new(SqliteStore::open(&path).unwrap()));
        session.add_category("Books").unwrap();
        session
            .add_receipt(Receipt::new("2024-04-04", "Bookshop").with_item(Item::new("Novel", 15.0, "Books")))
            .unwrap()
    };

    let session = Session::open(Arc::new(SqliteStore::open(&path).unwrap()));
    assert!(session.booted_with_data());
    assert!(session.taxonomy().has_category("Books"));
    assert_eq!(session.receipt(&id).unwrap().shop, "Bookshop");
}
