//! File-backed store with atomic snapshot writes.
//!
//! Keeps the committed licenses in memory and mirrors them to a single
//! snapshot file, by default `dirs::data_dir()/<namespace>/licenses.json`.
//! Every mutation rewrites the snapshot via temp file + fsync + rename +
//! directory fsync, and the in-memory view only changes after all of it
//! succeeded.

use crate::clock::{Clock, SystemClock};
use crate::digest::key_tag;
use crate::protocol::models::LicenseRecord;
use crate::store::locks::KeyLocks;
use crate::store::snapshot::Snapshot;
use crate::store::{poisoned, LicenseStore, Mutation};
use crate::SeatwardenError;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};
use tracing::{debug, error, warn};

/// Snapshot file name inside a namespace directory.
pub const SNAPSHOT_FILE: &str = "licenses.json";

/// Default number of write attempts before a persist is abandoned.
pub const DEFAULT_PERSIST_ATTEMPTS: u32 = 2;

/// Durable [`LicenseStore`] backed by a JSON snapshot.
pub struct FileStore {
    /// Snapshot location.
    path: PathBuf,
    /// Committed view; always equal to the last successful write.
    records: RwLock<BTreeMap<String, LicenseRecord>>,
    /// Serializes snapshot writes across keys.
    writer: Mutex<()>,
    locks: KeyLocks,
    clock: Arc<dyn Clock>,
    persist_attempts: u32,
}

impl FileStore {
    /// Open the store for `namespace` under the platform data directory.
    pub fn with_namespace(namespace: &str) -> Result<Self, SeatwardenError> {
        let base_dir = dirs::data_dir()
            .ok_or_else(|| SeatwardenError::StoreIO("Could not find data directory".to_string()))?;

        Self::open(base_dir.join(namespace).join(SNAPSHOT_FILE))
    }

    /// Open (or create) the store at an explicit snapshot path.
    ///
    /// A missing file is an empty store. A file that fails its integrity
    /// checks is an error; it is never silently replaced.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, SeatwardenError> {
        let path = path.into();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                SeatwardenError::StoreIO(format!("Failed to create store dir: {}", e))
            })?;
        }

        let records = Self::load(&path)?;
        debug!(path = %path.display(), count = records.len(), "Opened license store");

        Ok(Self {
            path,
            records: RwLock::new(records),
            writer: Mutex::new(()),
            locks: KeyLocks::new(),
            clock: Arc::new(SystemClock),
            persist_attempts: DEFAULT_PERSIST_ATTEMPTS,
        })
    }

    /// Set how many times a snapshot write is attempted (at least once).
    pub fn with_persist_attempts(mut self, attempts: u32) -> Self {
        self.persist_attempts = attempts.max(1);
        self
    }

    /// Use `clock` for snapshot timestamps.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Snapshot location.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        self.path.with_extension("json.tmp")
    }

    fn load(path: &Path) -> Result<BTreeMap<String, LicenseRecord>, SeatwardenError> {
        if !path.exists() {
            return Ok(BTreeMap::new());
        }

        let json = fs::read_to_string(path)
            .map_err(|e| SeatwardenError::StoreIO(format!("Failed to read snapshot: {}", e)))?;

        Snapshot::from_json(&json)?.licenses()
    }

    /// Apply one change durably, then publish it to the in-memory view.
    fn commit(&self, key: &str, change: Option<LicenseRecord>) -> Result<(), SeatwardenError> {
        let _writer = self.writer.lock().map_err(poisoned)?;

        let mut next = self.records.read().map_err(poisoned)?.clone();
        match change {
            Some(record) => {
                next.insert(key.to_string(), record);
            }
            None => {
                next.remove(key);
            }
        }

        self.persist(&next).map_err(|e| {
            error!(key = %key_tag(key), error = %e, "License change not persisted");
            e
        })?;

        *self.records.write().map_err(poisoned)? = next;
        Ok(())
    }

    fn persist(&self, licenses: &BTreeMap<String, LicenseRecord>) -> Result<(), SeatwardenError> {
        let json = Snapshot::new(licenses, self.clock.as_ref())?.to_json()?;

        let mut attempt = 1;
        loop {
            match self.write_atomic(&json) {
                Ok(()) => return Ok(()),
                Err(e) if attempt < self.persist_attempts => {
                    warn!(attempt, error = %e, "Snapshot write failed, retrying");
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Write `json` to the snapshot path via temp file + rename.
    fn write_atomic(&self, json: &str) -> Result<(), SeatwardenError> {
        let temp_path = self.temp_path();

        let mut file = fs::File::create(&temp_path)
            .map_err(|e| SeatwardenError::StoreIO(format!("Failed to create temp file: {}", e)))?;
        file.write_all(json.as_bytes())
            .map_err(|e| SeatwardenError::StoreIO(format!("Failed to write temp file: {}", e)))?;
        file.sync_all()
            .map_err(|e| SeatwardenError::StoreIO(format!("Failed to sync temp file: {}", e)))?;
        drop(file);

        fs::rename(&temp_path, &self.path)
            .map_err(|e| SeatwardenError::StoreIO(format!("Failed to rename snapshot: {}", e)))?;

        self.sync_parent_dir()
    }

    /// Make the rename itself durable.
    #[cfg(unix)]
    fn sync_parent_dir(&self) -> Result<(), SeatwardenError> {
        let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) else {
            return Ok(());
        };

        fs::File::open(parent)
            .and_then(|dir| dir.sync_all())
            .map_err(|e| SeatwardenError::StoreIO(format!("Failed to sync store dir: {}", e)))
    }

    // Directory handles cannot be synced on this platform.
    #[cfg(not(unix))]
    fn sync_parent_dir(&self) -> Result<(), SeatwardenError> {
        Ok(())
    }
}

impl LicenseStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<LicenseRecord>, SeatwardenError> {
        let records = self.records.read().map_err(poisoned)?;
        Ok(records.get(key).cloned())
    }

    fn put(&self, record: LicenseRecord) -> Result<(), SeatwardenError> {
        let key = record.key.clone();
        self.locks
            .with_key(&key, || self.commit(&key, Some(record)))?
    }

    fn update(
        &self,
        key: &str,
        mutate: Mutation<'_>,
    ) -> Result<Option<LicenseRecord>, SeatwardenError> {
        self.locks.with_key(key, || {
            let current = self.get(key)?;
            match mutate(current.as_ref()) {
                Some(next) => {
                    debug_assert_eq!(next.key, key);
                    self.commit(key, Some(next.clone()))?;
                    Ok(Some(next))
                }
                None => Ok(current),
            }
        })?
    }

    fn remove(&self, key: &str) -> Result<Option<LicenseRecord>, SeatwardenError> {
        self.locks.with_key(key, || {
            let current = self.get(key)?;
            if current.is_some() {
                self.commit(key, None)?;
            }
            Ok(current)
        })?
    }

    fn list_all(&self) -> Result<Vec<LicenseRecord>, SeatwardenError> {
        let records = self.records.read().map_err(poisoned)?;
        Ok(records.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::models::ScriptScope;
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    fn make_record(key: &str) -> LicenseRecord {
        let issued = Utc.with_ymd_and_hms(2025, 8, 21, 0, 0, 0).unwrap();
        LicenseRecord {
            key: key.to_string(),
            script_id: ScriptScope::single("FKBP-PRO-1.0"),
            issued_at: issued,
            expires_at: issued + chrono::Duration::days(30),
            max_devices: 2,
            devices: vec![],
            disabled: false,
            owner: Some("demo-user".to_string()),
            created_at: issued,
            updated_at: issued,
        }
    }

    fn bind(
        store: &FileStore,
        key: &str,
        fingerprint: &str,
    ) -> Result<Option<LicenseRecord>, SeatwardenError> {
        store.update(key, &mut |current| {
            let mut next = current?.clone();
            next.devices.push(fingerprint.to_string());
            Some(next)
        })
    }

    #[test]
    fn test_file_store_missing_file_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::open(temp_dir.path().join(SNAPSHOT_FILE)).unwrap();

        assert!(store.list_all().unwrap().is_empty());
        assert!(!store.path().exists());
    }

    #[test]
    fn test_file_store_creates_parent_dirs() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("ns").join(SNAPSHOT_FILE);
        let store = FileStore::open(&path).unwrap();

        store.put(make_record("K1")).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_file_store_write_leaves_only_snapshot() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::open(temp_dir.path().join(SNAPSHOT_FILE)).unwrap();

        store.put(make_record("K1")).unwrap();
        bind(&store, "K1", "fp-a").unwrap();

        let names: Vec<_> = fs::read_dir(temp_dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from(SNAPSHOT_FILE)]);
        assert!(store.sync_parent_dir().is_ok());
    }

    #[test]
    fn test_file_store_survives_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(SNAPSHOT_FILE);

        {
            let store = FileStore::open(&path).unwrap();
            store.put(make_record("K1")).unwrap();
            store.put(make_record("K2")).unwrap();
            bind(&store, "K1", "fp-a").unwrap();
            store.remove("K2").unwrap();
        }

        let store = FileStore::open(&path).unwrap();
        let all = store.list_all().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].devices, vec!["fp-a"]);
    }

    #[test]
    fn test_file_store_no_write_when_unchanged() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::open(temp_dir.path().join(SNAPSHOT_FILE)).unwrap();

        let after = store.update("K1", &mut |_| None).unwrap();
        assert!(after.is_none());
        assert!(!store.path().exists());
    }

    #[test]
    fn test_file_store_failed_persist_keeps_view() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::open(temp_dir.path().join(SNAPSHOT_FILE))
            .unwrap()
            .with_persist_attempts(3);
        store.put(make_record("K1")).unwrap();

        // A directory squatting on the temp path makes every write fail.
        fs::create_dir(store.temp_path()).unwrap();

        let result = bind(&store, "K1", "fp-a");
        assert!(matches!(result, Err(SeatwardenError::StoreIO(_))));
        assert!(store.get("K1").unwrap().unwrap().devices.is_empty());
        assert!(matches!(
            store.put(make_record("K2")),
            Err(SeatwardenError::StoreIO(_))
        ));
        assert!(store.get("K2").unwrap().is_none());

        // Once the obstruction is gone the next write carries no stale state.
        fs::remove_dir(store.temp_path()).unwrap();
        bind(&store, "K1", "fp-b").unwrap();

        let reopened = FileStore::open(store.path()).unwrap();
        let all = reopened.list_all().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].devices, vec!["fp-b"]);
    }

    #[test]
    fn test_file_store_rejects_tampered_snapshot() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(SNAPSHOT_FILE);

        {
            let store = FileStore::open(&path).unwrap();
            store.put(make_record("K1")).unwrap();
        }

        let json = fs::read_to_string(&path).unwrap();
        fs::write(&path, json.replace("\"maxDevices\": 2", "\"maxDevices\": 20")).unwrap();

        let result = FileStore::open(&path);
        assert!(matches!(result, Err(SeatwardenError::StoreCorrupt(_))));
    }

    #[test]
    fn test_file_store_concurrent_keys() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(SNAPSHOT_FILE);
        let store = FileStore::open(&path).unwrap();

        std::thread::scope(|s| {
            for i in 0..8 {
                let store = &store;
                s.spawn(move || {
                    let key = format!("K{}", i);
                    store.put(make_record(&key)).unwrap();
                    bind(store, &key, "fp-a").unwrap();
                });
            }
        });

        let reopened = FileStore::open(&path).unwrap();
        let all = reopened.list_all().unwrap();
        assert_eq!(all.len(), 8);
        assert!(all.iter().all(|r| r.devices == vec!["fp-a"]));
    }
}
