//! Integration tests for the contact book over an on-disk preference file

use fallguard::domain::DialingPlan;
use fallguard::io::{JsonFilePreferences, PreferenceStore};
use fallguard::services::contacts::CONTACTS_KEY;
use fallguard::services::ContactBook;
use serde_json::json;
use std::fs;
use std::sync::Arc;
use tempfile::tempdir;

fn open_book(path: &std::path::Path) -> ContactBook {
    let store = Arc::new(JsonFilePreferences::open(path).unwrap());
    ContactBook::load(store, DialingPlan::default()).unwrap()
}

#[test]
fn test_contacts_survive_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("prefs").join("preferences.json");

    {
        let book = open_book(&path);
        assert!(book.add("9876543210").unwrap());
        assert!(book.add("+1 415 555 0100").unwrap());
    }

    let book = open_book(&path);
    let numbers: Vec<String> = book.list().iter().map(|n| n.to_string()).collect();
    assert_eq!(numbers, vec!["+919876543210", "+14155550100"]);
}

#[test]
fn test_every_spelling_is_one_contact() {
    let dir = tempdir().unwrap();
    let book = open_book(&dir.path().join("preferences.json"));

    for raw in ["9876543210", "919876543210", "+919876543210", "+91 98765-43210", "(98765) 43210"] {
        book.add(raw).unwrap();
    }

    assert_eq!(book.len(), 1);
    assert_eq!(book.list()[0].as_str(), "+919876543210");
}

#[test]
fn test_file_holds_json_array() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("preferences.json");
    let book = open_book(&path);
    book.add("9876543210").unwrap();
    book.add("9123456789").unwrap();
    book.remove("+919876543210").unwrap();

    let doc: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(doc[CONTACTS_KEY], json!(["+919123456789"]));
}

#[test]
fn test_legacy_unnormalized_file_is_cleaned_on_load() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("preferences.json");
    fs::write(
        &path,
        r#"{"emergency_contacts": ["9876543210", "919876543210", "9123456789"], "other": 1}"#,
    )
    .unwrap();

    let book = open_book(&path);
    assert_eq!(book.len(), 2);

    // Unrelated keys are kept
    let store = JsonFilePreferences::open(&path).unwrap();
    assert_eq!(store.get("other").unwrap(), Some(json!(1)));
    assert_eq!(
        store.get(CONTACTS_KEY).unwrap(),
        Some(json!(["+919876543210", "+919123456789"]))
    );
}

#[test]
fn test_corrupt_file_is_an_error() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("preferences.json");
    fs::write(&path, "{ not json").unwrap();

    assert!(JsonFilePreferences::open(&path).is_err());
}
