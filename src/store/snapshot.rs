//! Checksummed snapshot format for the file store.
//!
//! A snapshot holds every license keyed by license key, plus:
//! - a format version
//! - when it was written
//! - a SHA-256 checksum over the licenses
//!
//! On load, we:
//! 1. Check the version
//! 2. Recompute and compare the checksum
//! 3. Check every record against its map key, device capacity and
//!    binding uniqueness
//!
//! The checksum is computed over the `serde_json::Value` form of the
//! licenses, whose object keys are always sorted, so it does not depend on
//! struct field order or on how the file was pretty-printed.

use crate::clock::Clock;
use crate::digest::sha256_hex;
use crate::protocol::models::LicenseRecord;
use crate::SeatwardenError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Current snapshot format version.
pub const SNAPSHOT_VERSION: u32 = 1;

/// On-disk snapshot of the whole store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// Format version.
    pub version: u32,

    /// When the snapshot was written.
    pub written_at: DateTime<Utc>,

    /// Hex SHA-256 of the canonical licenses JSON.
    pub checksum: String,

    /// Licenses keyed by license key.
    licenses: serde_json::Value,
}

impl Snapshot {
    /// Build a snapshot of `licenses`.
    pub fn new(
        licenses: &BTreeMap<String, LicenseRecord>,
        clock: &dyn Clock,
    ) -> Result<Self, SeatwardenError> {
        let licenses = serde_json::to_value(licenses).map_err(|e| {
            SeatwardenError::StoreIO(format!("Failed to serialize licenses: {}", e))
        })?;
        let checksum = checksum_of(&licenses)?;

        Ok(Self {
            version: SNAPSHOT_VERSION,
            written_at: clock.now_utc(),
            checksum,
            licenses,
        })
    }

    /// Serialize the snapshot to JSON.
    pub fn to_json(&self) -> Result<String, SeatwardenError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| SeatwardenError::StoreIO(format!("Failed to serialize snapshot: {}", e)))
    }

    /// Deserialize and verify a snapshot.
    pub fn from_json(json: &str) -> Result<Self, SeatwardenError> {
        let snapshot: Self = serde_json::from_str(json).map_err(|e| {
            SeatwardenError::StoreCorrupt(format!("Failed to parse snapshot: {}", e))
        })?;
        snapshot.verify()?;
        Ok(snapshot)
    }

    /// Check version and checksum.
    pub fn verify(&self) -> Result<(), SeatwardenError> {
        if self.version != SNAPSHOT_VERSION {
            return Err(SeatwardenError::StoreCorrupt(format!(
                "Unsupported snapshot version {}",
                self.version
            )));
        }

        let computed = checksum_of(&self.licenses)?;
        if computed != self.checksum {
            return Err(SeatwardenError::StoreCorrupt(
                "Snapshot checksum mismatch".to_string(),
            ));
        }

        Ok(())
    }

    /// Decode the licenses and check record invariants.
    pub fn licenses(&self) -> Result<BTreeMap<String, LicenseRecord>, SeatwardenError> {
        let licenses: BTreeMap<String, LicenseRecord> =
            serde_json::from_value(self.licenses.clone()).map_err(|e| {
                SeatwardenError::StoreCorrupt(format!("Failed to decode licenses: {}", e))
            })?;

        for (key, record) in &licenses {
            check_record(key, record)?;
        }

        Ok(licenses)
    }
}

fn check_record(key: &str, record: &LicenseRecord) -> Result<(), SeatwardenError> {
    let corrupt = |detail: String| -> Result<(), SeatwardenError> {
        Err(SeatwardenError::StoreCorrupt(detail))
    };

    if key.trim().is_empty() {
        return corrupt("Record filed under a blank key".to_string());
    }
    if record.key != key {
        return corrupt(format!(
            "Record filed under wrong key ({} != {})",
            record.key, key
        ));
    }
    if record.max_devices < 1 {
        return corrupt(format!("Record {} allows no devices", key));
    }
    if record.devices.len() > record.max_devices as usize {
        return corrupt(format!(
            "Record {} binds {} devices but allows {}",
            key,
            record.devices.len(),
            record.max_devices
        ));
    }

    let mut seen = HashSet::with_capacity(record.devices.len());
    if let Some(duplicate) = record.devices.iter().find(|d| !seen.insert(d.as_str())) {
        return corrupt(format!("Record {} binds {} twice", key, duplicate));
    }

    Ok(())
}

fn checksum_of(licenses: &serde_json::Value) -> Result<String, SeatwardenError> {
    let canonical = serde_json::to_vec(licenses)
        .map_err(|e| SeatwardenError::StoreIO(format!("Failed to encode licenses: {}", e)))?;
    Ok(sha256_hex(&canonical))
}
