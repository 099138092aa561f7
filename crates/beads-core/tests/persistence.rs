//! Snapshot durability and rollback on failed saves.

#[path = "common.rs"]
mod common;

use std::time::Duration;

use beads_core::model::{ItemUpdate, NewItem, Status};
use beads_core::{ErrorCode, ErrorKind, IssueStore, StoreOptions};
use common::fixture;

fn options() -> StoreOptions {
    StoreOptions {
        lock_timeout: Duration::from_millis(50),
        ..StoreOptions::default()
    }
}

#[test]
fn failed_create_leaves_no_item() {
    let f = fixture();
    f.sink.fail_saves(true);
    let err = f.store.create(NewItem::titled("doomed")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Persist);
    assert!(f.store.is_empty());
}

#[test]
fn failed_close_restores_child_and_epic() {
    let f = fixture();
    let epic = f.create("epic");
    let child = f.child("child", &epic.id);
    let dependent = f.create("dependent");
    f.store.link(&dependent.id, &child.id).unwrap();
    let before = f.store.snapshot();

    f.sink.fail_saves(true);
    f.tick();
    let err = f.store.close(&child.id).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Persist);
    assert_eq!(f.store.snapshot(), before);

    f.sink.fail_saves(false);
    let ok = f.store.close(&child.id).unwrap();
    assert_eq!(ok.unblocked[0].id, dependent.id);
    assert_eq!(f.status(&epic.id), Status::Closed);
}

#[test]
fn failed_delete_keeps_edges() {
    let f = fixture();
    let blocker = f.create("blocker");
    let dependent = f.create("dependent");
    f.store.link(&dependent.id, &blocker.id).unwrap();

    f.sink.fail_saves(true);
    assert!(f.store.delete(&blocker.id).is_err());
    assert_eq!(f.status(&blocker.id), Status::Open);
    assert_eq!(
        f.store.get(&dependent.id).unwrap().blocked_by,
        vec![blocker.id]
    );
}

#[test]
fn failed_clean_restores_every_removal() {
    let f = fixture();
    let done = f.create("done");
    f.close(&done.id);
    let now = f.tick();
    let before = f.store.snapshot();

    f.sink.fail_saves(true);
    assert!(f.store.clean(now).is_err());
    assert_eq!(f.store.snapshot(), before);

    f.sink.fail_saves(false);
    assert_eq!(f.store.clean(now).unwrap(), 1);
    assert!(f.store.is_empty());
}

#[test]
fn saved_snapshot_matches_memory() {
    let f = fixture();
    let epic = f.create("epic");
    let child = f.child("child", &epic.id);
    f.store.add_comment(&child.id, "alice", "hello").unwrap();
    f.store
        .update(
            &child.id,
            ItemUpdate {
                add_tags: vec!["x".into()],
                ..ItemUpdate::default()
            },
        )
        .unwrap();
    assert_eq!(f.sink.last_saved().unwrap(), f.store.snapshot());
}

#[test]
fn file_store_reloads_to_the_same_state() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("beads.json");

    let before = {
        let store = IssueStore::open(&path, &options()).unwrap();
        let a = store.create(NewItem::titled("a")).unwrap();
        let b = store.create(NewItem::titled("b")).unwrap();
        store.link(&a.id, &b.id).unwrap();
        let epic = store.create(NewItem::titled("epic")).unwrap();
        store
            .create_with_parent(NewItem::titled("child"), &epic.id)
            .unwrap();
        store.snapshot()
    };

    let reopened = IssueStore::open(&path, &options()).unwrap();
    assert_eq!(reopened.snapshot(), before);
}

#[test]
fn unknown_fields_survive_a_store_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("beads.json");
    std::fs::write(
        &path,
        r#"{"beads": [{"id": "bd-k3y9", "title": "legacy", "status": "open", "type": "epic",
            "created_at": "2025-06-01T00:00:00Z", "updated_at": "2025-06-01T00:00:00Z",
            "estimate": {"hours": 4}}]}"#,
    )
    .unwrap();

    {
        let store = IssueStore::open(&path, &options()).unwrap();
        store.add_comment("bd-k3y9", "bob", "still here").unwrap();
    }

    let raw: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
    let bead = &raw["beads"][0];
    assert_eq!(bead["type"], "task");
    assert_eq!(bead["estimate"]["hours"], 4);
    assert_eq!(bead["comments"][0]["text"], "still here");
}

#[test]
fn legacy_statuses_refuse_to_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("beads.json");
    std::fs::write(
        &path,
        r#"{"beads": [{"id": "bd-old1", "title": "old", "status": "resolved",
            "created_at": "2025-06-01T00:00:00Z", "updated_at": "2025-06-01T00:00:00Z"}]}"#,
    )
    .unwrap();
    let err = IssueStore::open(&path, &options()).unwrap_err();
    assert_eq!(err.code(), ErrorCode::LegacyStatus);
}

#[test]
fn one_writer_per_data_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("beads.json");
    let _owner = IssueStore::open(&path, &options()).unwrap();
    let err = IssueStore::open(&path, &options()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Persist);
    assert_eq!(err.code(), ErrorCode::LockContention);
}
