//! In-memory store. Nothing survives the process.

use crate::protocol::models::LicenseRecord;
use crate::store::locks::KeyLocks;
use crate::store::{poisoned, LicenseStore, Mutation};
use crate::SeatwardenError;
use std::collections::HashMap;
use std::sync::RwLock;

/// Volatile [`LicenseStore`] backed by a hash map.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<String, LicenseRecord>>,
    locks: KeyLocks,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with `records`.
    pub fn with_records(records: impl IntoIterator<Item = LicenseRecord>) -> Self {
        let records = records.into_iter().map(|r| (r.key.clone(), r)).collect();
        Self {
            records: RwLock::new(records),
            locks: KeyLocks::new(),
        }
    }

    fn write(&self, key: &str, record: Option<LicenseRecord>) -> Result<(), SeatwardenError> {
        let mut records = self.records.write().map_err(poisoned)?;
        match record {
            Some(record) => records.insert(key.to_string(), record),
            None => records.remove(key),
        };
        Ok(())
    }
}

impl LicenseStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<LicenseRecord>, SeatwardenError> {
        let records = self.records.read().map_err(poisoned)?;
        Ok(records.get(key).cloned())
    }

    fn put(&self, record: LicenseRecord) -> Result<(), SeatwardenError> {
        let key = record.key.clone();
        self.locks
            .with_key(&key, || self.write(&key, Some(record)))?
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
                    self.write(key, Some(next.clone()))?;
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
                self.write(key, None)?;
            }
            Ok(current)
        })?
    }

    fn list_all(&self) -> Result<Vec<LicenseRecord>, SeatwardenError> {
        let records = self.records.read().map_err(poisoned)?;
        let mut all: Vec<LicenseRecord> = records.values().cloned().collect();
        all.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(all)
    }
}
