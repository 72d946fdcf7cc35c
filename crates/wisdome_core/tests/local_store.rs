use chrono::{TimeZone, Utc};
use rusqlite::params;
use wisdome_core::db::open_db;
use wisdome_core::repo::local_store::{LocalStore, NOTES_KEY};
use wisdome_core::{Note, NoteKind};

fn note(id: &str, title: &str) -> Note {
    let created_at = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
    Note::with_id(id, NoteKind::Fleeting, title, "<p>body</p>", vec![], created_at)
}

fn write_raw(path: &std::path::Path, value: &str) {
    let conn = open_db(path).unwrap();
    conn.execute(
        "INSERT INTO kv_store (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value;",
        params![NOTES_KEY, value],
    )
    .unwrap();
}

#[test]
fn saving_same_note_twice_keeps_one_entry() {
    let store = LocalStore::open_in_memory().unwrap();
    let first = note("n1", "first");
    store.save_one(&first);
    store.save_one(&first);

    let mut edited = first.clone();
    edited.title = "edited".to_string();
    store.save_one(&edited);

    let notes = store.load_all();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].title, "edited");
}

#[test]
fn delete_is_noop_for_absent_ids() {
    let store = LocalStore::open_in_memory().unwrap();
    store.save_one(&note("n1", "one"));
    store.delete_one("missing");
    assert_eq!(store.load_all().len(), 1);

    store.delete_one("n1");
    assert!(store.load_all().is_empty());
    assert!(!store.contains("n1"));
}

#[test]
fn clear_all_empties_collection() {
    let store = LocalStore::open_in_memory().unwrap();
    store.save_one(&note("n1", "one"));
    store.save_one(&note("n2", "two"));
    store.clear_all();
    assert!(store.load_all().is_empty());
}

#[test]
fn collection_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cache.sqlite3");

    let store = LocalStore::open(&path).unwrap();
    store.save_one(&note("n1", "one"));
    let saved = store.load_all();
    drop(store);

    let reopened = LocalStore::open(&path).unwrap();
    assert_eq!(reopened.load_all(), saved);
}

#[test]
fn unparseable_blob_loads_as_empty_and_is_quarantined_on_write() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cache.sqlite3");
    write_raw(&path, "{not json");

    let store = LocalStore::open(&path).unwrap();
    assert!(store.load_all().is_empty());

    store.save_one(&note("n1", "one"));
    assert_eq!(store.load_all().len(), 1);
    assert_eq!(store.quarantined(), vec!["{not json".to_string()]);
}

#[test]
fn invalid_records_are_skipped_and_quarantined() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cache.sqlite3");
    let valid = note("good", "kept");
    let valid_json = serde_json::to_value(&valid).unwrap();
    let raw = serde_json::json!([
        valid_json,
        {"id": "", "type": "fleeting", "title": "t", "content": "c",
         "createdAt": "2024-03-01T09:00:00Z", "updatedAt": "2024-03-01T09:00:00Z"},
        {"id": "bad-kind", "type": "draft"}
    ])
    .to_string();
    write_raw(&path, &raw);

    let store = LocalStore::open(&path).unwrap();
    let notes = store.load_all();
    assert_eq!(notes, vec![valid.clone()]);
    assert!(store.quarantined().is_empty());

    store.delete_one("absent");
    assert_eq!(store.quarantined().len(), 2);
    assert_eq!(store.load_all(), vec![valid]);
}

#[test]
fn legacy_records_without_schema_version_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cache.sqlite3");
    write_raw(
        &path,
        r#"[{"id":"legacy","type":"permanent","title":"Old","content":"<p>x</p>","tags":["a"],"connections":[],"createdAt":"2023-01-01T00:00:00.000Z","updatedAt":"2023-01-02T00:00:00.000Z"}]"#,
    );

    let store = LocalStore::open(&path).unwrap();
    let notes = store.load_all();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].kind, NoteKind::Permanent);
    assert_eq!(notes[0].schema_version, 1);
}
