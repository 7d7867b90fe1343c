//! Medication list persistence.
//!
//! The whole list lives in one pretty-printed JSON file. There is no
//! in-memory cache: every read re-reads the file and every mutation
//! rewrites it in full. Load-then-save sequences run under a single lock
//! so concurrent writers in this process cannot lose each other's updates.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use tokio::sync::watch;
use tracing::{debug, info};

use crate::error::StoreError;
use crate::medication::{seed_records, MedicationRecord};

pub struct MedicationStore {
    path: PathBuf,
    write_lock: Mutex<()>,
    revision: watch::Sender<u64>,
}

impl MedicationStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
            revision,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the list, seeding the file on first use.
    pub fn load(&self) -> Result<Vec<MedicationRecord>, StoreError> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.load_locked()
    }

    /// Records in display order.
    pub fn list(&self) -> Result<Vec<MedicationRecord>, StoreError> {
        self.load()
    }

    /// Overwrite the file with `records`.
    #[cfg(test)]
    pub fn save(&self, records: &[MedicationRecord]) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.save_locked(records)?;
        self.bump_revision();
        Ok(())
    }

    pub fn add(&self, record: MedicationRecord) -> Result<(), StoreError> {
        record.validate()?;

        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut records = self.load_locked()?;
        info!("Adding {} at {} ({})", record.name, record.time, record.dose);
        records.push(record);
        self.save_locked(&records)?;
        self.bump_revision();
        Ok(())
    }

    /// Drop every record matching both `time` and `name`. Returns how many went.
    pub fn remove(&self, time: &str, name: &str) -> Result<usize, StoreError> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut records = self.load_locked()?;
        let before = records.len();
        records.retain(|r| !r.matches(time, name));
        let removed = before - records.len();

        if removed == 0 {
            debug!("Nothing to remove for {name} at {time}");
            return Ok(0);
        }

        self.save_locked(&records)?;
        self.bump_revision();
        info!("Removed {removed} record(s) for {name} at {time}");
        Ok(removed)
    }

    /// Receiver that changes whenever the list is mutated.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    fn load_locked(&self) -> Result<Vec<MedicationRecord>, StoreError> {
        if !self.path.exists() {
            let seeds = seed_records();
            info!("No medication file at {}, seeding defaults", self.path.display());
            self.save_locked(&seeds)?;
            return Ok(seeds);
        }

        let contents =
            fs::read_to_string(&self.path).map_err(|e| StoreError::io("read", &self.path, e))?;
        serde_json::from_str(&contents).map_err(|source| StoreError::MalformedStore {
            path: self.path.clone(),
            source,
        })
    }

    /// Write to a sibling temp file then rename, so readers never see a half-written list.
    fn save_locked(&self, records: &[MedicationRecord]) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| StoreError::io("create directory", parent, e))?;
        }

        let json = serde_json::to_string_pretty(records).map_err(StoreError::Serialize)?;

        let tmp = self.tmp_path();
        fs::write(&tmp, json).map_err(|e| StoreError::io("write", &tmp, e))?;
        fs::rename(&tmp, &self.path).map_err(|e| StoreError::io("replace", &self.path, e))?;
        debug!("Saved {} record(s) to {}", records.len(), self.path.display());
        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "medications.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn bump_revision(&self) {
        self.revision.send_modify(|rev| *rev += 1);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::error::ValidationError;

    fn scratch_store() -> (tempfile::TempDir, MedicationStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = MedicationStore::new(dir.path().join("medications.json"));
        (dir, store)
    }

    #[test]
    fn first_load_seeds_and_persists() {
        let (_dir, store) = scratch_store();
        assert!(!store.path().exists());

        let first = store.load().unwrap();
        assert_eq!(first, seed_records());
        assert!(store.path().exists());

        let second = store.load().unwrap();
        assert_eq!(second, first);
    }

    #[test]
    fn file_is_pretty_printed_array() {
        let (_dir, store) = scratch_store();
        store.load().unwrap();

        let raw = fs::read_to_string(store.path()).unwrap();
        assert!(raw.starts_with("[\n"));
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value[1]["name"], "Ibuprofen");
        assert_eq!(value[1]["time"], "14:00");
        assert_eq!(value[1]["dose"], "2 tablets");
    }

    #[test]
    fn save_replaces_whole_list() {
        let (_dir, store) = scratch_store();
        store.load().unwrap();

        let replacement = vec![MedicationRecord::new("Insulin", "07:30", "10 units")];
        store.save(&replacement).unwrap();
        assert_eq!(store.load().unwrap(), replacement);

        let leftovers: Vec<_> = fs::read_dir(store.path().parent().unwrap())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn malformed_file_is_reported() {
        let (_dir, store) = scratch_store();
        fs::write(store.path(), "{ not json").unwrap();
        assert!(matches!(store.load(), Err(StoreError::MalformedStore { .. })));
    }

    #[test]
    fn missing_field_in_file_is_malformed() {
        let (_dir, store) = scratch_store();
        fs::write(store.path(), r#"[{"name": "A", "time": "08:00"}]"#).unwrap();
        assert!(matches!(store.load(), Err(StoreError::MalformedStore { .. })));
    }

    #[test]
    fn unwritable_location_is_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "").unwrap();
        let store = MedicationStore::new(blocker.join("medications.json"));

        assert!(matches!(store.load(), Err(StoreError::StorageIo { .. })));
    }

    #[test]
    fn add_then_remove_restores_list() {
        let (_dir, store) = scratch_store();
        let before = store.load().unwrap();

        store
            .add(MedicationRecord::new("Metformin", "20:00", "500 mg"))
            .unwrap();
        assert_eq!(store.load().unwrap().len(), before.len() + 1);

        assert_eq!(store.remove("20:00", "Metformin").unwrap(), 1);
        assert_eq!(store.load().unwrap(), before);
    }

    #[test]
    fn remove_seed_leaves_other() {
        let (_dir, store) = scratch_store();
        store.remove("08:00", "Paracetamol").unwrap();
        assert_eq!(
            store.load().unwrap(),
            vec![MedicationRecord::new("Ibuprofen", "14:00", "2 tablets")]
        );
    }

    #[test]
    fn remove_unknown_is_noop() {
        let (_dir, store) = scratch_store();
        let mut revisions = store.subscribe();
        assert_eq!(store.remove("03:00", "Nothing").unwrap(), 0);
        assert_eq!(store.load().unwrap(), seed_records());
        assert!(!revisions.has_changed().unwrap());
    }

    #[test]
    fn remove_drops_all_duplicates() {
        let (_dir, store) = scratch_store();
        store.add(MedicationRecord::new("Aspirin", "18:00", "1 tablet")).unwrap();
        store.add(MedicationRecord::new("Aspirin", "18:00", "2 tablets")).unwrap();
        store.add(MedicationRecord::new("Aspirin", "19:00", "1 tablet")).unwrap();

        assert_eq!(store.remove("18:00", "Aspirin").unwrap(), 2);
        let times: Vec<_> = store.load().unwrap().into_iter().map(|r| r.time).collect();
        assert_eq!(times, ["08:00", "14:00", "19:00"]);
    }

    #[test]
    fn invalid_record_never_touches_file() {
        let (_dir, store) = scratch_store();
        let err = store
            .add(MedicationRecord::new("Aspirin", "6pm", "1 tablet"))
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::Validation(ValidationError::InvalidTime(_))
        ));
        assert!(!store.path().exists());
    }

    #[test]
    fn mutations_bump_revision() {
        let (_dir, store) = scratch_store();
        let mut revisions = store.subscribe();

        store.add(MedicationRecord::new("Aspirin", "18:00", "1 tablet")).unwrap();
        assert!(revisions.has_changed().unwrap());
        assert_eq!(*revisions.borrow_and_update(), 1);

        store.remove("18:00", "Aspirin").unwrap();
        assert_eq!(*revisions.borrow_and_update(), 2);
    }

    #[test]
    fn concurrent_adds_are_not_lost() {
        let (_dir, store) = scratch_store();
        let store = Arc::new(store);
        store.load().unwrap();

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    store
                        .add(MedicationRecord::new(format!("Med {i}"), "10:00", "1 tablet"))
                        .unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.load().unwrap().len(), 2 + 8);
    }
}
