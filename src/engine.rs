//! License lifecycle engine.
//!
//! Implements issue, verify, revoke-device, toggle and the read-only
//! projections on top of any [`LicenseStore`]. The engine holds no locks of
//! its own; every read-modify-write goes through [`LicenseStore::update`],
//! which serializes callers per key.

use crate::clock::{days_after, Clock};
use crate::config::{SeatwardenConfig, SeedLicense};
use crate::digest::key_tag;
use crate::policy::verify::{evaluate, present, Decision};
use crate::protocol::messages::{
    DeviceList, IssueRequest, IssuedLicense, LicenseListing, ToggleResult, VerifyOutcome,
    VerifyRequest,
};
use crate::protocol::models::{DenyReason, LicenseRecord, ScriptScope};
use crate::store::LicenseStore;
use crate::SeatwardenError;
use std::sync::Arc;
use tracing::{debug, info};

/// Values used when an issue request leaves a field out.
#[derive(Debug, Clone)]
pub struct IssueDefaults {
    /// Script scope for new keys.
    pub script: ScriptScope,
    /// Validity in days.
    pub days: i64,
    /// Device capacity.
    pub max_devices: u32,
    /// Length of one licensing day.
    pub day_length: chrono::Duration,
}

impl Default for IssueDefaults {
    fn default() -> Self {
        Self {
            script: ScriptScope::Any,
            days: 30,
            max_devices: 1,
            day_length: chrono::Duration::days(1),
        }
    }
}

impl IssueDefaults {
    /// Take defaults from configuration.
    pub fn from_config(config: &SeatwardenConfig) -> Self {
        Self {
            script: config.default_script.clone(),
            days: config.default_days,
            max_devices: config.default_max_devices,
            day_length: config.day_length(),
        }
    }

    /// Reject defaults that would issue unusable licenses.
    pub fn validate(&self) -> Result<(), SeatwardenError> {
        if self.script.is_empty() {
            return Err(SeatwardenError::ConfigError(
                "default script cannot be empty".to_string(),
            ));
        }
        if self.days < 1 {
            return Err(SeatwardenError::ConfigError(format!(
                "default days must be at least 1, got {}",
                self.days
            )));
        }
        if self.max_devices < 1 {
            return Err(SeatwardenError::ConfigError(
                "default max_devices must be at least 1".to_string(),
            ));
        }
        if self.day_length <= chrono::Duration::zero() {
            return Err(SeatwardenError::ConfigError(format!(
                "day length must be positive, got {}",
                self.day_length
            )));
        }
        Ok(())
    }
}

/// License operations against an injected store.
pub struct LicenseEngine {
    store: Arc<dyn LicenseStore>,
    clock: Arc<dyn Clock>,
    defaults: IssueDefaults,
}

impl LicenseEngine {
    /// Create an engine with default issue policy.
    pub fn new(store: Arc<dyn LicenseStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            defaults: IssueDefaults::default(),
        }
    }

    /// Replace the issue defaults.
    ///
    /// # Errors
    /// `ConfigError` if the defaults fail [`IssueDefaults::validate`].
    pub fn with_defaults(mut self, defaults: IssueDefaults) -> Result<Self, SeatwardenError> {
        defaults.validate()?;
        self.defaults = defaults;
        Ok(self)
    }

    /// The backing store.
    pub fn store(&self) -> &Arc<dyn LicenseStore> {
        &self.store
    }

    /// Issue a new key or re-issue an existing one.
    ///
    /// Re-issuing always clears `disabled` and recomputes the expiry from
    /// now. Device bindings survive unless `reset_devices` is set; if the new
    /// capacity is smaller, the oldest bindings are kept.
    ///
    /// # Errors
    /// - `InvalidInput` - empty key, empty script scope, or unrepresentable expiry
    /// - `StoreIO` - the record could not be persisted
    pub fn issue(&self, request: &IssueRequest) -> Result<IssuedLicense, SeatwardenError> {
        let key = required(&request.key, "key")?;

        let script = match &request.script_id {
            Some(scope) if scope.is_empty() => {
                return Err(SeatwardenError::InvalidInput(
                    "scriptId cannot be empty".to_string(),
                ))
            }
            scope => scope.clone(),
        };

        let days = request.days.unwrap_or(self.defaults.days).max(1);
        let max_devices = clamp_devices(
            request
                .max_devices
                .unwrap_or(i64::from(self.defaults.max_devices)),
        );
        let owner = present(request.owner.as_deref()).map(String::from);

        let now = self.clock.now_utc();
        let expires_at = days_after(now, self.defaults.day_length, days).ok_or_else(|| {
            SeatwardenError::InvalidInput(format!("days out of range: {}", days))
        })?;

        let mut reissued = false;
        let record = self
            .store
            .update(key, &mut |current| {
                reissued = current.is_some();

                let mut devices = match current {
                    Some(existing) if !request.reset_devices => existing.devices.clone(),
                    _ => Vec::new(),
                };
                devices.truncate(max_devices as usize);

                let script_id = script
                    .clone()
                    .or_else(|| current.map(|c| c.script_id.clone()))
                    .unwrap_or_else(|| self.defaults.script.clone());

                Some(LicenseRecord {
                    key: key.to_string(),
                    script_id,
                    issued_at: now,
                    expires_at,
                    max_devices,
                    devices,
                    disabled: false,
                    owner: owner.clone().or_else(|| current.and_then(|c| c.owner.clone())),
                    created_at: current.map_or(now, |c| c.created_at),
                    updated_at: now,
                })
            })?
            .ok_or_else(|| SeatwardenError::StoreIO("issued record not retained".to_string()))?;

        info!(
            key = %key_tag(key),
            script = %record.script_id,
            max_devices,
            expires_at = %record.expires_at,
            reissued,
            reset_devices = request.reset_devices,
            "Issued license"
        );

        Ok(IssuedLicense {
            key: record.key,
            script_id: record.script_id,
            max_devices: record.max_devices,
            expires_at: record.expires_at,
        })
    }

    /// Verify a key for a script on a device, binding the device if a seat
    /// is free.
    ///
    /// Refusals come back as `Ok` with `ok == false`; see [`DenyReason`].
    /// A request for a fingerprint that is already bound writes nothing.
    ///
    /// # Errors
    /// - `InvalidInput` - empty key
    /// - `StoreIO` - a new binding could not be persisted
    pub fn verify(&self, request: &VerifyRequest) -> Result<VerifyOutcome, SeatwardenError> {
        let key = required(&request.key, "key")?;
        let fingerprint = present(request.fingerprint.as_deref());
        let now = self.clock.now_utc();

        let mut decision = Decision::Deny(DenyReason::InvalidKey);
        let record = self.store.update(key, &mut |current| {
            decision = evaluate(current, request.script_id.as_deref(), fingerprint, now);
            match (decision, current, fingerprint) {
                (Decision::Bind, Some(existing), Some(fingerprint)) => {
                    let mut next = existing.clone();
                    next.devices.push(fingerprint.to_string());
                    next.updated_at = now;
                    Some(next)
                }
                _ => None,
            }
        })?;

        let outcome = match (decision, record) {
            (Decision::Deny(reason), _) => VerifyOutcome::denied(reason),
            (_, Some(record)) => VerifyOutcome::granted(&record, now, self.defaults.day_length),
            (_, None) => VerifyOutcome::denied(DenyReason::InvalidKey),
        };

        match outcome.reason {
            Some(reason) => debug!(key = %key_tag(key), %reason, "License refused"),
            None => debug!(
                key = %key_tag(key),
                bound = matches!(decision, Decision::Bind),
                "License verified"
            ),
        }

        Ok(outcome)
    }

    /// Unbind a device. Unbinding a device that is not bound succeeds and
    /// changes nothing.
    ///
    /// # Errors
    /// - `InvalidInput` - empty key or fingerprint
    /// - `LicenseNotFound` - no such key
    /// - `StoreIO` - the change could not be persisted
    pub fn revoke_device(
        &self,
        key: &str,
        fingerprint: &str,
    ) -> Result<DeviceList, SeatwardenError> {
        let key = required(key, "key")?;
        let fingerprint = required(fingerprint, "fingerprint")?;
        let now = self.clock.now_utc();

        let mut removed = false;
        let record = self
            .store
            .update(key, &mut |current| {
                let existing = current?;
                if !existing.has_device(fingerprint) {
                    return None;
                }
                removed = true;
                let mut next = existing.clone();
                next.devices.retain(|d| d != fingerprint);
                next.updated_at = now;
                Some(next)
            })?
            .ok_or(SeatwardenError::LicenseNotFound)?;

        info!(
            key = %key_tag(key),
            removed,
            remaining = record.devices.len(),
            "Revoked device"
        );

        Ok(DeviceList {
            devices: record.devices,
        })
    }

    /// Set the administrative kill switch.
    ///
    /// # Errors
    /// - `InvalidInput` - empty key
    /// - `LicenseNotFound` - no such key
    /// - `StoreIO` - the change could not be persisted
    pub fn toggle(&self, key: &str, disabled: bool) -> Result<ToggleResult, SeatwardenError> {
        let key = required(key, "key")?;
        let now = self.clock.now_utc();

        let record = self
            .store
            .update(key, &mut |current| {
                let existing = current?;
                if existing.disabled == disabled {
                    return None;
                }
                let mut next = existing.clone();
                next.disabled = disabled;
                next.updated_at = now;
                Some(next)
            })?
            .ok_or(SeatwardenError::LicenseNotFound)?;

        info!(key = %key_tag(key), disabled = record.disabled, "Toggled license");

        Ok(ToggleResult {
            disabled: record.disabled,
        })
    }

    /// Fetch one record.
    pub fn info(&self, key: &str) -> Result<LicenseRecord, SeatwardenError> {
        let key = required(key, "key")?;
        self.store.get(key)?.ok_or(SeatwardenError::LicenseNotFound)
    }

    /// Every record, sorted by key.
    pub fn list(&self) -> Result<LicenseListing, SeatwardenError> {
        Ok(LicenseListing::from(self.store.list_all()?))
    }

    /// Physically remove a record.
    pub fn delete(&self, key: &str) -> Result<LicenseRecord, SeatwardenError> {
        let key = required(key, "key")?;
        let removed = self
            .store
            .remove(key)?
            .ok_or(SeatwardenError::LicenseNotFound)?;

        info!(key = %key_tag(key), "Deleted license");
        Ok(removed)
    }

    /// Write each seed whose key is absent. Stored records always win.
    ///
    /// Returns how many seeds were written.
    pub fn seed(&self, seeds: &[SeedLicense]) -> Result<usize, SeatwardenError> {
        let now = self.clock.now_utc();
        let mut written = 0;

        for seed in seeds {
            let record = seed.to_record(self.defaults.day_length, now)?;
            let mut inserted = false;
            self.store.update(&record.key, &mut |current| {
                if current.is_some() {
                    return None;
                }
                inserted = true;
                Some(record.clone())
            })?;

            if inserted {
                written += 1;
                info!(
                    key = %key_tag(&record.key),
                    expires_at = %record.expires_at,
                    "Seeded license"
                );
            } else {
                debug!(key = %key_tag(&record.key), "Seed license already stored");
            }
        }

        Ok(written)
    }
}

fn required<'a>(value: &'a str, field: &str) -> Result<&'a str, SeatwardenError> {
    present(Some(value))
        .ok_or_else(|| SeatwardenError::InvalidInput(format!("{} is required", field)))
}

fn clamp_devices(requested: i64) -> u32 {
    requested.clamp(1, i64::from(u32::MAX)) as u32
}
