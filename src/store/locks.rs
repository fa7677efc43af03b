//! Per-key mutual exclusion for read-modify-write sequences.

use crate::store::poisoned;
use crate::SeatwardenError;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Table of per-key locks.
///
/// Slots are created on demand and dropped again once no caller holds or
/// waits on them, so probing unknown keys does not grow the table.
#[derive(Debug, Default)]
pub struct KeyLocks {
    slots: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl KeyLocks {
    /// Create an empty lock table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` while holding the lock for `key`.
    pub fn with_key<T>(&self, key: &str, f: impl FnOnce() -> T) -> Result<T, SeatwardenError> {
        let slot = {
            let mut slots = self.slots.lock().map_err(poisoned)?;
            Arc::clone(slots.entry(key.to_string()).or_default())
        };

        let result = {
            // The slot guards no data, so a panic in an earlier holder is harmless.
            let _held = slot.lock().unwrap_or_else(|e| e.into_inner());
            f()
        };

        let mut slots = self.slots.lock().map_err(poisoned)?;
        // Table + this handle: nobody else holds or waits on the slot.
        if Arc::strong_count(&slot) == 2 {
            slots.remove(key);
        }

        Ok(result)
    }

    /// Number of live slots.
    pub fn len(&self) -> usize {
        self.slots.lock().map(|s| s.len()).unwrap_or(0)
    }

    /// Whether no slot is live.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
