//! Whole-state JSON snapshots.
//!
//! The on-disk format is a single document `{"beads": [ ... ]}`. Every commit
//! rewrites the file: the encoded snapshot goes to a temporary sibling in the
//! same directory, is synced, then renamed over the old file. A failure at any
//! step leaves the previous snapshot untouched.
//!
//! Loading applies one-way migrations: the retired `epic` type becomes
//! `task`. Retired statuses (`resolved`, `wontfix`) are rejected rather than
//! guessed at.

use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::PersistError;
use crate::lock::DataFileLock;
use crate::model::Item;

const RETIRED_STATUSES: [&str; 2] = ["resolved", "wontfix"];

/// Destination for committed snapshots.
pub trait SnapshotSink: Send + Sync {
    /// Durably replace the stored snapshot with `items`.
    fn save(&self, items: &[&Item]) -> Result<(), PersistError>;

    /// Short description for logs.
    fn describe(&self) -> String;
}

#[derive(Serialize)]
struct SnapshotOut<'a> {
    beads: &'a [&'a Item],
}

#[derive(Deserialize)]
struct SnapshotIn {
    #[serde(default)]
    beads: Vec<Item>,
}

/// Serialize items into the snapshot document.
pub fn encode(items: &[&Item]) -> Result<Vec<u8>, PersistError> {
    let mut bytes =
        serde_json::to_vec_pretty(&SnapshotOut { beads: items }).map_err(PersistError::Encode)?;
    bytes.push(b'\n');
    Ok(bytes)
}

/// Parse a snapshot document, applying load-time migrations.
pub fn decode(bytes: &[u8], origin: &Path) -> Result<Vec<Item>, PersistError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Vec::new());
    }
    let decode_err = |source| PersistError::Decode {
        path: origin.to_path_buf(),
        source,
    };
    let mut doc: Value = serde_json::from_slice(bytes).map_err(decode_err)?;
    migrate(&mut doc)?;
    let snapshot: SnapshotIn = serde_json::from_value(doc).map_err(decode_err)?;
    Ok(snapshot.beads)
}

fn migrate(doc: &mut Value) -> Result<(), PersistError> {
    let Some(beads) = doc.get_mut("beads").and_then(Value::as_array_mut) else {
        return Ok(());
    };
    for bead in beads {
        let Some(record) = bead.as_object_mut() else {
            continue;
        };
        if record.get("type").and_then(Value::as_str) == Some("epic") {
            record.insert("type".into(), Value::from("task"));
        }
        if let Some(status) = record.get("status").and_then(Value::as_str) {
            if RETIRED_STATUSES.contains(&status) {
                return Err(PersistError::LegacyStatus {
                    id: record
                        .get("id")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                    status: status.to_string(),
                });
            }
        }
    }
    Ok(())
}

/// Read the snapshot at `path`. A missing file is an empty store.
pub fn load(path: &Path) -> Result<Vec<Item>, PersistError> {
    match fs::read(path) {
        Ok(bytes) => decode(&bytes, path),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(source) => Err(PersistError::Io {
            op: "read",
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Write `bytes` to `path` via a synced temporary sibling and a rename.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), PersistError> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let io_err = |op: &'static str, target: &Path| {
        let target = target.to_path_buf();
        move |source| PersistError::Io {
            op,
            path: target,
            source,
        }
    };

    fs::create_dir_all(&dir).map_err(io_err("create dir", &dir))?;
    let mut temp = tempfile::NamedTempFile::new_in(&dir).map_err(io_err("create temp in", &dir))?;
    temp.write_all(bytes).map_err(io_err("write", temp.path()))?;
    temp.as_file()
        .sync_all()
        .map_err(io_err("sync", temp.path()))?;
    temp.persist(path)
        .map_err(|err| io_err("rename", path)(err.error))?;
    Ok(())
}

/// Snapshot file owned by exactly one process.
#[derive(Debug)]
pub struct FileSnapshot {
    path: PathBuf,
    _lock: Option<DataFileLock>,
}

impl FileSnapshot {
    /// Take the writer lock for `path` and load its current contents.
    pub fn open(path: &Path, lock_timeout: Duration) -> Result<(Self, Vec<Item>), PersistError> {
        let lock = DataFileLock::acquire(path, lock_timeout)?;
        let items = load(path)?;
        tracing::info!(path = %path.display(), beads = items.len(), "loaded snapshot");
        Ok((
            Self {
                path: path.to_path_buf(),
                _lock: Some(lock),
            },
            items,
        ))
    }

    /// Open without the cross-process writer lock.
    pub fn open_unlocked(path: &Path) -> Result<(Self, Vec<Item>), PersistError> {
        let items = load(path)?;
        Ok((
            Self {
                path: path.to_path_buf(),
                _lock: None,
            },
            items,
        ))
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SnapshotSink for FileSnapshot {
    fn save(&self, items: &[&Item]) -> Result<(), PersistError> {
        let bytes = encode(items)?;
        write_atomic(&self.path, &bytes)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// In-memory sink for tests and ephemeral stores.
///
/// `fail_saves(true)` makes every save fail until switched back.
#[derive(Debug, Default)]
pub struct MemorySnapshot {
    saved: Mutex<Vec<u8>>,
    fail: AtomicBool,
    saves: std::sync::atomic::AtomicUsize,
}

impl MemorySnapshot {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_saves(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Number of successful saves.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    /// Decode the last successful save.
    pub fn last_saved(&self) -> Result<Vec<Item>, PersistError> {
        let bytes = self
            .saved
            .lock()
            .map_err(|_| PersistError::Unavailable("memory snapshot poisoned".into()))?
            .clone();
        decode(&bytes, Path::new("<memory>"))
    }
}

impl SnapshotSink for MemorySnapshot {
    fn save(&self, items: &[&Item]) -> Result<(), PersistError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(PersistError::Unavailable("injected save failure".into()));
        }
        let bytes = encode(items)?;
        *self
            .saved
            .lock()
            .map_err(|_| PersistError::Unavailable("memory snapshot poisoned".into()))? = bytes;
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{IssueType, Status};

    const LEGACY_EPIC: &str = r#"{"beads": [
        {"id": "bd-aaaa", "title": "old epic", "status": "open", "type": "epic",
         "created_at": "2025-01-01T00:00:00Z", "updated_at": "2025-01-01T00:00:00Z",
         "custom_field": {"nested": true}}
    ]}"#;

    #[test]
    fn missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let items = load(&dir.path().join("nope.json")).unwrap();
        assert!(items.is_empty());
    }

    #[test]
    fn blank_file_is_empty() {
        let items = decode(b"  \n", Path::new("blank.json")).unwrap();
        assert!(items.is_empty());
    }

    #[test]
    fn epic_type_migrates_to_task_and_keeps_unknown_fields() {
        let items = decode(LEGACY_EPIC.as_bytes(), Path::new("legacy.json")).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].issue_type, IssueType::Task);
        assert_eq!(items[0].status, Status::Open);
        assert_eq!(
            items[0].extra["custom_field"],
            serde_json::json!({"nested": true})
        );
    }

    #[test]
    fn retired_statuses_are_rejected() {
        let raw = r#"{"beads": [{"id": "bd-bbbb", "title": "x", "status": "wontfix",
            "created_at": "2025-01-01T00:00:00Z", "updated_at": "2025-01-01T00:00:00Z"}]}"#;
        let err = decode(raw.as_bytes(), Path::new("old.json")).unwrap_err();
        assert!(matches!(err, PersistError::LegacyStatus { ref id, ref status }
            if id == "bd-bbbb" && status == "wontfix"));
    }

    #[test]
    fn garbage_is_a_decode_error() {
        let err = decode(b"{not json", Path::new("bad.json")).unwrap_err();
        assert!(matches!(err, PersistError::Decode { .. }));
    }

    #[test]
    fn atomic_write_replaces_and_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("beads.json");
        write_atomic(&path, b"first").unwrap();
        write_atomic(&path, b"second").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"second");
        let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn file_snapshot_roundtrips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("beads.json");
        fs::write(&path, LEGACY_EPIC).unwrap();

        let (sink, items) = FileSnapshot::open(&path, Duration::from_millis(50)).unwrap();
        let refs: Vec<&Item> = items.iter().collect();
        sink.save(&refs).unwrap();

        let reloaded = load(&path).unwrap();
        assert_eq!(reloaded, items);
        let raw: Value = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        assert_eq!(raw["beads"][0]["type"], "task");
    }

    #[test]
    fn second_owner_of_a_data_file_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("beads.json");
        let _first = FileSnapshot::open(&path, Duration::from_millis(50)).unwrap();
        let err = FileSnapshot::open(&path, Duration::from_millis(20)).unwrap_err();
        assert!(matches!(err, PersistError::Lock(_)));
    }

    #[test]
    fn memory_snapshot_can_fail_on_demand() {
        let sink = MemorySnapshot::new();
        sink.save(&[]).unwrap();
        sink.fail_saves(true);
        assert!(sink.save(&[]).is_err());
        sink.fail_saves(false);
        sink.save(&[]).unwrap();
        assert_eq!(sink.save_count(), 2);
        assert!(sink.last_saved().unwrap().is_empty());
    }
}
