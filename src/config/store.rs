//! Durable collection of configuration records
//!
//! Load once, rewrite in full on every mutation. Every mutating call either
//! persists or restores the in-memory collection to what it was before the
//! call, so memory never diverges from disk.

use parking_lot::Mutex;
use serde_json::Value;
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{info, warn};

use super::record::{now_timestamp, ConfigRecord};
use crate::constants::config;
use crate::error::{PersistError, StoreError};
use crate::matcher;

/// Store shared between the watch loop, bulk-apply workers and callers
pub type SharedStore = Arc<Mutex<ConfigStore>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ImportSummary {
    pub added: usize,
    pub skipped: usize,
}

#[derive(Debug)]
pub struct ConfigStore {
    path: PathBuf,
    records: Vec<ConfigRecord>,
    loaded_modified: Option<SystemTime>,
}

impl ConfigStore {
    /// Open the store at `path`. Unreadable or malformed files degrade to an
    /// empty collection so the application stays usable.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let records = load_records(&path);
        let loaded_modified = modified_time(&path);
        info!(path = %path.display(), count = records.len(), "Loaded window configs");
        Self {
            path,
            records,
            loaded_modified,
        }
    }

    pub fn shared(self) -> SharedStore {
        Arc::new(Mutex::new(self))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn records(&self) -> &[ConfigRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&ConfigRecord> {
        self.records.get(index)
    }

    pub fn find_by_identity(&self, title: &str, process: &str) -> Option<usize> {
        matcher::find_record(&self.records, title, process)
    }

    /// Re-read the file if another process rewrote it since we last loaded
    pub fn reload_if_changed(&mut self) -> bool {
        let current = modified_time(&self.path);
        if current == self.loaded_modified {
            return false;
        }
        self.records = load_records(&self.path);
        self.loaded_modified = current;
        info!(path = %self.path.display(), count = self.records.len(), "Reloaded window configs after external change");
        true
    }

    fn check_index(&self, index: usize) -> Result<(), StoreError> {
        if index < self.records.len() {
            Ok(())
        } else {
            Err(StoreError::IndexOutOfRange {
                index,
                len: self.records.len(),
            })
        }
    }

    fn duplicate_of(record: &ConfigRecord) -> StoreError {
        StoreError::Duplicate {
            title: record.title.clone(),
            process: record.process.clone(),
        }
    }

    /// Append a new record. Rejects an existing identity key; never overwrites.
    pub fn add(&mut self, mut record: ConfigRecord) -> Result<usize, StoreError> {
        record.validate()?;
        if self.find_by_identity(&record.title, &record.process).is_some() {
            return Err(Self::duplicate_of(&record));
        }

        let now = now_timestamp();
        record.created_at = now;
        record.updated_at = now;

        self.records.push(record);
        if let Err(e) = self.persist() {
            self.records.pop();
            return Err(e.into());
        }

        let index = self.records.len() - 1;
        info!(index = index, name = %self.records[index].display_name(), "Added window config");
        Ok(index)
    }

    /// Replace a record in place. The caller carries forward any metadata it
    /// wants to keep; only `updated_at` is stamped here.
    pub fn update(&mut self, index: usize, mut record: ConfigRecord) -> Result<(), StoreError> {
        self.check_index(index)?;
        record.validate()?;
        if let Some(existing) = self.find_by_identity(&record.title, &record.process) {
            if existing != index {
                return Err(Self::duplicate_of(&record));
            }
        }

        record.updated_at = now_timestamp();
        let previous = std::mem::replace(&mut self.records[index], record);
        if let Err(e) = self.persist() {
            self.records[index] = previous;
            return Err(e.into());
        }

        info!(index = index, name = %self.records[index].display_name(), "Updated window config");
        Ok(())
    }

    pub fn delete(&mut self, index: usize) -> Result<ConfigRecord, StoreError> {
        self.check_index(index)?;

        let removed = self.records.remove(index);
        if let Err(e) = self.persist() {
            self.records.insert(index, removed);
            return Err(e.into());
        }

        info!(index = index, name = %removed.display_name(), "Deleted window config");
        Ok(removed)
    }

    /// Apply an in-place metadata edit with persist-or-rollback
    fn modify(&mut self, index: usize, edit: impl FnOnce(&mut ConfigRecord)) -> Result<(), StoreError> {
        self.check_index(index)?;

        let previous = self.records[index].clone();
        edit(&mut self.records[index]);
        if let Err(e) = self.persist() {
            self.records[index] = previous;
            return Err(e.into());
        }
        Ok(())
    }

    pub fn set_enabled(&mut self, index: usize, enabled: bool) -> Result<(), StoreError> {
        self.modify(index, |record| record.enabled = enabled)?;
        info!(index = index, enabled = enabled, "Toggled window config");
        Ok(())
    }

    pub fn rename(&mut self, index: usize, custom_name: String, icon_file: Option<String>) -> Result<(), StoreError> {
        self.modify(index, |record| {
            record.custom_name = Some(custom_name);
            if icon_file.is_some() {
                record.icon_file = icon_file;
            }
        })?;
        info!(index = index, name = %self.records[index].display_name(), "Renamed window config");
        Ok(())
    }

    /// Case-insensitive substring match on title or process, insertion order
    pub fn query(&self, keyword: &str) -> Vec<(usize, &ConfigRecord)> {
        let keyword = keyword.to_lowercase();
        self.records
            .iter()
            .enumerate()
            .filter(|(_, record)| {
                keyword.is_empty()
                    || record.title.to_lowercase().contains(&keyword)
                    || record.process.to_lowercase().contains(&keyword)
            })
            .collect()
    }

    /// Merge records from an exported file.
    ///
    /// Identity keys already present (or repeated within the file) are
    /// skipped; merged records get fresh timestamps. All-or-nothing: any
    /// failure restores the pre-import collection.
    pub fn import(&mut self, path: &Path) -> Result<ImportSummary, StoreError> {
        let incoming = read_record_file(path)?;
        let backup = self.records.clone();

        let mut summary = ImportSummary::default();
        let now = now_timestamp();
        for mut record in incoming {
            if self.records.iter().any(|existing| existing.same_identity(&record)) {
                summary.skipped += 1;
                continue;
            }
            record.created_at = now;
            record.updated_at = now;
            self.records.push(record);
            summary.added += 1;
        }

        if let Err(e) = self.persist() {
            self.records = backup;
            return Err(e.into());
        }

        info!(path = %path.display(), added = summary.added, skipped = summary.skipped, "Imported window configs");
        Ok(summary)
    }

    /// Write the full collection elsewhere without touching the store
    pub fn export(&self, path: &Path) -> Result<(), StoreError> {
        write_records(path, &self.records)?;
        info!(path = %path.display(), count = self.records.len(), "Exported window configs");
        Ok(())
    }

    /// Timestamped copy next to the config file
    pub fn backup(&self) -> Result<PathBuf, StoreError> {
        let mut name = OsString::from(self.path.as_os_str());
        name.push(format!(".{}.{}", config::BACKUP_INFIX, chrono::Utc::now().timestamp()));
        let backup_path = PathBuf::from(name);

        write_records(&backup_path, &self.records)?;
        info!(path = %backup_path.display(), "Backed up window configs");
        Ok(backup_path)
    }

    /// Replace the collection with a backup's contents
    pub fn restore(&mut self, path: &Path) -> Result<usize, StoreError> {
        let mut restored: Vec<ConfigRecord> = Vec::new();
        for record in read_record_file(path)? {
            if restored.iter().any(|existing| existing.same_identity(&record)) {
                warn!(title = %record.title, process = %record.process, "Dropping duplicate config in backup");
                continue;
            }
            restored.push(record);
        }

        let previous = std::mem::replace(&mut self.records, restored);
        if let Err(e) = self.persist() {
            self.records = previous;
            return Err(e.into());
        }

        info!(path = %path.display(), count = self.records.len(), "Restored window configs");
        Ok(self.records.len())
    }

    fn persist(&mut self) -> Result<(), PersistError> {
        write_records(&self.path, &self.records)?;
        self.loaded_modified = modified_time(&self.path);
        Ok(())
    }
}

/// 1-indexed page of `items`; empty when the page is out of range
pub fn page<T>(items: &[T], page: usize, page_size: usize) -> &[T] {
    if page == 0 || page_size == 0 {
        return &[];
    }
    let start = (page - 1).saturating_mul(page_size);
    if start >= items.len() {
        return &[];
    }
    let end = start.saturating_add(page_size).min(items.len());
    &items[start..end]
}

/// Number of pages, never less than one
pub fn page_count(len: usize, page_size: usize) -> usize {
    if page_size == 0 {
        return 1;
    }
    len.div_ceil(page_size).max(1)
}

fn modified_time(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

fn load_records(path: &Path) -> Vec<ConfigRecord> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            info!(path = %path.display(), "No config file found, starting with no configs");
            return Vec::new();
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to read config file, starting with no configs");
            return Vec::new();
        }
    };

    let entries = match serde_json::from_str::<Value>(&contents) {
        Ok(Value::Array(entries)) => entries,
        Ok(_) => {
            warn!(path = %path.display(), "Config file is not a JSON array, starting with no configs");
            return Vec::new();
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to parse config file, starting with no configs");
            return Vec::new();
        }
    };

    let mut records: Vec<ConfigRecord> = Vec::with_capacity(entries.len());
    for (position, entry) in entries.into_iter().enumerate() {
        match ConfigRecord::from_value(entry) {
            Ok(record) if records.iter().any(|existing| existing.same_identity(&record)) => {
                warn!(position = position, title = %record.title, process = %record.process, "Dropping duplicate config entry");
            }
            Ok(record) => records.push(record),
            Err(e) => warn!(position = position, error = %e, "Dropping invalid config entry"),
        }
    }
    records
}

/// Strict reader for import/restore: any bad entry fails the whole file
fn read_record_file(path: &Path) -> Result<Vec<ConfigRecord>, StoreError> {
    let contents = fs::read_to_string(path).map_err(|source| StoreError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let invalid = |reason: String| StoreError::InvalidFormat {
        path: path.to_path_buf(),
        reason,
    };

    let value: Value = serde_json::from_str(&contents).map_err(|e| invalid(e.to_string()))?;
    let Value::Array(entries) = value else {
        return Err(invalid("expected a JSON array of configs".to_string()));
    };

    entries
        .into_iter()
        .enumerate()
        .map(|(position, entry)| {
            ConfigRecord::from_value(entry).map_err(|e| invalid(format!("entry {position}: {e}")))
        })
        .collect()
}

fn write_records(path: &Path, records: &[ConfigRecord]) -> Result<(), PersistError> {
    let json = serde_json::to_string_pretty(records)?;
    write_atomically(path, json.as_bytes()).map_err(|source| PersistError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Write via a sibling temp file and rename, so a failed write never
/// truncates the existing file
fn write_atomically(path: &Path, bytes: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let mut tmp_name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);

    let result = (|| -> io::Result<()> {
        let mut file = File::create(&tmp)?;
        file.write_all(bytes)?;
        file.write_all(b"\n")?;
        file.sync_all()?;
        fs::rename(&tmp, path)
    })();

    if result.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationError;
    use crate::types::Geometry;
    use serde_json::json;
    use tempfile::TempDir;

    fn notepad() -> ConfigRecord {
        ConfigRecord::new("Notepad", "notepad.exe", Geometry::new(100, 100, 800, 600))
    }

    fn record(title: &str, process: &str) -> ConfigRecord {
        ConfigRecord::new(title, process, Geometry::new(0, 0, 640, 480))
    }

    fn open_store() -> (TempDir, ConfigStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::open(dir.path().join(config::FILENAME));
        (dir, store)
    }

    /// Point the store at a path whose parent is a regular file, so every write fails
    fn break_persistence(dir: &TempDir, store: &mut ConfigStore) {
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, b"").unwrap();
        store.path = blocker.join(config::FILENAME);
    }

    #[test]
    fn test_add_then_query() {
        let (_dir, mut store) = open_store();

        let index = store.add(notepad()).unwrap();
        assert_eq!(index, 0);

        let results = store.query("note");
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0, 0);
        assert!(store.records()[0].enabled);
        assert!(store.records()[0].created_at > 0.0);
        assert_eq!(store.records()[0].created_at, store.records()[0].updated_at);
    }

    #[test]
    fn test_duplicate_add_rejected() {
        let (_dir, mut store) = open_store();
        store.add(notepad()).unwrap();

        let mut again = notepad();
        again.x = 5;
        let err = store.add(again).unwrap_err();
        assert!(matches!(err, StoreError::Duplicate { .. }));
        assert_eq!(store.len(), 1);
        assert_eq!(store.records()[0].x, 100);
    }

    #[test]
    fn test_identity_is_exact() {
        let (_dir, mut store) = open_store();
        store.add(record("Console", "app.exe")).unwrap();
        store.add(record("console", "app.exe")).unwrap();
        store.add(record("Console", "App.exe")).unwrap();
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn test_add_rejects_invalid_geometry() {
        let (dir, mut store) = open_store();
        let mut bad = notepad();
        bad.width = 0;

        let err = store.add(bad).unwrap_err();
        assert!(matches!(
            err,
            StoreError::Validation(ValidationError::NonPositiveDimension { width: 0, .. })
        ));
        assert!(store.is_empty());
        assert!(!dir.path().join(config::FILENAME).exists());
    }

    #[test]
    fn test_persisted_file_is_pretty_json_array() {
        let (dir, mut store) = open_store();
        store.add(notepad()).unwrap();

        let contents = fs::read_to_string(dir.path().join(config::FILENAME)).unwrap();
        assert!(contents.starts_with("[\n  {"));
        let value: Value = serde_json::from_str(&contents).unwrap();
        assert_eq!(value[0]["title"], json!("Notepad"));
        assert_eq!(value[0]["width"], json!(800));

        let reopened = ConfigStore::open(dir.path().join(config::FILENAME));
        assert_eq!(reopened.records(), store.records());
    }

    #[test]
    fn test_update_stamps_and_replaces() {
        let (_dir, mut store) = open_store();
        store.add(notepad()).unwrap();
        let created = store.records()[0].created_at;

        let mut changed = store.records()[0].clone();
        changed.set_geometry(Geometry::new(0, 0, 1024, 768));
        store.update(0, changed).unwrap();

        let updated = &store.records()[0];
        assert_eq!(updated.width, 1024);
        assert_eq!(updated.created_at, created);
        assert!(updated.updated_at >= created);
    }

    #[test]
    fn test_update_out_of_range() {
        let (_dir, mut store) = open_store();
        let err = store.update(3, notepad()).unwrap_err();
        assert!(matches!(err, StoreError::IndexOutOfRange { index: 3, len: 0 }));
    }

    #[test]
    fn test_update_cannot_create_duplicate_identity() {
        let (_dir, mut store) = open_store();
        store.add(record("A", "a")).unwrap();
        store.add(record("B", "b")).unwrap();

        let err = store.update(1, record("A", "a")).unwrap_err();
        assert!(matches!(err, StoreError::Duplicate { .. }));
        assert_eq!(store.records()[1].title, "B");
    }

    #[test]
    fn test_delete() {
        let (_dir, mut store) = open_store();
        store.add(record("A", "a")).unwrap();
        store.add(record("B", "b")).unwrap();

        let removed = store.delete(0).unwrap();
        assert_eq!(removed.title, "A");
        assert_eq!(store.len(), 1);
        assert!(matches!(store.delete(5), Err(StoreError::IndexOutOfRange { .. })));
    }

    #[test]
    fn test_rollback_on_persist_failure() {
        let (dir, mut store) = open_store();
        store.add(record("A", "a")).unwrap();
        store.add(record("B", "b")).unwrap();
        let before = store.records().to_vec();
        let on_disk = fs::read_to_string(dir.path().join(config::FILENAME)).unwrap();

        break_persistence(&dir, &mut store);

        assert!(matches!(store.add(record("C", "c")), Err(StoreError::Persist(_))));
        assert_eq!(store.records(), before.as_slice());

        let mut changed = before[0].clone();
        changed.width = 1;
        assert!(matches!(store.update(0, changed), Err(StoreError::Persist(_))));
        assert_eq!(store.records(), before.as_slice());

        assert!(matches!(store.delete(1), Err(StoreError::Persist(_))));
        assert_eq!(store.records(), before.as_slice());

        assert!(store.set_enabled(0, false).is_err());
        assert!(store.rename(0, "Renamed".into(), None).is_err());
        assert_eq!(store.records(), before.as_slice());

        // The original file was never touched
        assert_eq!(fs::read_to_string(dir.path().join(config::FILENAME)).unwrap(), on_disk);
    }

    #[test]
    fn test_load_degrades_on_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(config::FILENAME);

        fs::write(&path, "{ not json").unwrap();
        assert!(ConfigStore::open(&path).is_empty());

        fs::write(&path, r#"{"title": "object, not array"}"#).unwrap();
        assert!(ConfigStore::open(&path).is_empty());

        assert!(ConfigStore::open(dir.path().join("missing.json")).is_empty());
    }

    #[test]
    fn test_load_drops_invalid_and_duplicate_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(config::FILENAME);
        fs::write(
            &path,
            json!([
                { "title": "A", "process": "a", "x": 0, "y": 0, "width": 10, "height": 10 },
                { "title": "B", "process": "b", "x": 0, "y": 0, "width": 0, "height": 10 },
                { "title": "A", "process": "a", "x": 5, "y": 5, "width": 10, "height": 10 },
                { "title": "C", "process": "c", "x": "1", "y": "2", "width": "30", "height": "40" }
            ])
            .to_string(),
        )
        .unwrap();

        let store = ConfigStore::open(&path);
        let titles: Vec<&str> = store.records().iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["A", "C"]);
        assert_eq!(store.records()[0].x, 0);
    }

    #[test]
    fn test_edits_to_mistyped_record_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(config::FILENAME);
        fs::write(
            &path,
            json!([{
                "title": "A", "process": "a", "x": 0, "y": 0, "width": 10, "height": 10,
                "enabled": "yes", "custom_name": 7, "updated_at": "never"
            }])
            .to_string(),
        )
        .unwrap();

        let mut store = ConfigStore::open(&path);
        store.set_enabled(0, false).unwrap();
        store.rename(0, "Alpha".into(), None).unwrap();

        let raw = fs::read_to_string(&path).unwrap();
        assert_eq!(raw.matches("\"enabled\"").count(), 1);

        let reopened = ConfigStore::open(&path);
        assert!(!reopened.records()[0].enabled);
        assert_eq!(reopened.records()[0].custom_name.as_deref(), Some("Alpha"));
        assert_eq!(reopened.records()[0], store.records()[0]);
    }

    #[test]
    fn test_query_case_insensitive_on_title_and_process() {
        let (_dir, mut store) = open_store();
        store.add(record("Mozilla Firefox", "firefox")).unwrap();
        store.add(record("Terminal", "kitty")).unwrap();
        store.add(record("Notes", "FIREFOX-helper")).unwrap();

        let hits: Vec<usize> = store.query("FireFox").iter().map(|(i, _)| *i).collect();
        assert_eq!(hits, vec![0, 2]);
        assert_eq!(store.query("").len(), 3);
        assert!(store.query("emacs").is_empty());
    }

    #[test]
    fn test_pagination() {
        let items: Vec<u32> = (1..=25).collect();
        assert_eq!(page(&items, 1, 10), &items[0..10]);
        assert_eq!(page(&items, 3, 10), &items[20..25]);
        assert!(page(&items, 4, 10).is_empty());
        assert!(page(&items, 0, 10).is_empty());

        assert_eq!(page_count(25, 10), 3);
        assert_eq!(page_count(20, 10), 2);
        assert_eq!(page_count(0, 10), 1);
        assert_eq!(page_count(5, 0), 1);
    }

    #[test]
    fn test_export_import_round_trip() {
        let (dir, mut store) = open_store();
        let mut a = record("A", "a");
        a.extra.insert("monitor".into(), json!("HDMI-1"));
        store.add(a).unwrap();
        store.add(record("B", "b")).unwrap();
        store.set_enabled(1, false).unwrap();
        store.rename(0, "Alpha".into(), Some("Alpha.png".into())).unwrap();

        let export_path = dir.path().join("export.json");
        store.export(&export_path).unwrap();
        assert_eq!(store.len(), 2);

        let other_dir = tempfile::tempdir().unwrap();
        let mut fresh = ConfigStore::open(other_dir.path().join(config::FILENAME));
        let summary = fresh.import(&export_path).unwrap();
        assert_eq!(summary, ImportSummary { added: 2, skipped: 0 });

        for (original, imported) in store.records().iter().zip(fresh.records()) {
            let mut imported = imported.clone();
            imported.created_at = original.created_at;
            imported.updated_at = original.updated_at;
            assert_eq!(&imported, original);
        }
    }

    #[test]
    fn test_import_skips_existing_identity_keys() {
        let (dir, mut store) = open_store();
        store.add(record("Notepad", "notepad.exe")).unwrap();
        let existing_created = store.records()[0].created_at;

        let import_path = dir.path().join("incoming.json");
        fs::write(
            &import_path,
            json!([
                { "title": "Notepad", "process": "notepad.exe", "x": 9, "y": 9, "width": 99, "height": 99 },
                { "title": "Terminal", "process": "kitty", "x": 0, "y": 0, "width": 500, "height": 400,
                  "created_at": 1.0, "updated_at": 2.0 },
                { "title": "Terminal", "process": "kitty", "x": 1, "y": 1, "width": 500, "height": 400 }
            ])
            .to_string(),
        )
        .unwrap();

        let summary = store.import(&import_path).unwrap();
        assert_eq!(summary, ImportSummary { added: 1, skipped: 2 });
        assert_eq!(store.len(), 2);
        assert_eq!(store.records()[0].width, 640);
        assert_eq!(store.records()[0].created_at, existing_created);
        assert!(store.records()[1].created_at > 2.0);
        assert_eq!(store.records()[1].x, 0);
    }

    #[test]
    fn test_import_is_all_or_nothing() {
        let (dir, mut store) = open_store();
        store.add(record("A", "a")).unwrap();
        let before = store.records().to_vec();

        let import_path = dir.path().join("bad.json");
        fs::write(
            &import_path,
            json!([
                { "title": "B", "process": "b", "x": 0, "y": 0, "width": 10, "height": 10 },
                { "title": "C", "process": "c", "x": 0, "y": 0, "width": 10 }
            ])
            .to_string(),
        )
        .unwrap();
        assert!(matches!(store.import(&import_path), Err(StoreError::InvalidFormat { .. })));
        assert_eq!(store.records(), before.as_slice());

        fs::write(&import_path, r#"{"not": "an array"}"#).unwrap();
        assert!(matches!(store.import(&import_path), Err(StoreError::InvalidFormat { .. })));

        assert!(matches!(
            store.import(&dir.path().join("absent.json")),
            Err(StoreError::Read { .. })
        ));

        fs::write(
            &import_path,
            json!([{ "title": "B", "process": "b", "x": 0, "y": 0, "width": 10, "height": 10 }]).to_string(),
        )
        .unwrap();
        break_persistence(&dir, &mut store);
        assert!(matches!(store.import(&import_path), Err(StoreError::Persist(_))));
        assert_eq!(store.records(), before.as_slice());
    }

    #[test]
    fn test_backup_and_restore() {
        let (_dir, mut store) = open_store();
        store.add(record("A", "a")).unwrap();
        store.add(record("B", "b")).unwrap();

        let backup = store.backup().unwrap();
        assert!(backup.to_string_lossy().contains(".json.backup."));

        store.delete(0).unwrap();
        store.add(record("C", "c")).unwrap();

        let count = store.restore(&backup).unwrap();
        assert_eq!(count, 2);
        let titles: Vec<&str> = store.records().iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["A", "B"]);
    }

    #[test]
    fn test_reload_if_changed() {
        let (dir, mut store) = open_store();
        store.add(record("A", "a")).unwrap();
        assert!(!store.reload_if_changed());

        let mut other = ConfigStore::open(dir.path().join(config::FILENAME));
        std::thread::sleep(std::time::Duration::from_millis(20));
        other.add(record("B", "b")).unwrap();

        // mtime granularity can hide a rewrite that lands in the same tick
        if modified_time(store.path()) != store.loaded_modified {
            assert!(store.reload_if_changed());
            assert_eq!(store.len(), 2);
        }
    }
}
