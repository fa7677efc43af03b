//! Seatwarden configuration.

use crate::clock::days_after;
use crate::protocol::models::{LicenseRecord, ScriptScope};
use crate::SeatwardenError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable overriding [`SeatwardenConfig::admin_token`].
pub const ENV_ADMIN_TOKEN: &str = "SEATWARDEN_ADMIN_TOKEN";

/// Environment variable overriding [`SeatwardenConfig::store_path`].
pub const ENV_STORE_PATH: &str = "SEATWARDEN_STORE_PATH";

/// Configuration for a license manager.
///
/// Deserializable from JSON; every field has a default, so a config file
/// only needs to name what it changes.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SeatwardenConfig {
    /// Namespace directory under the platform data dir (e.g., "seatwarden").
    /// Ignored when `store_path` is set.
    pub namespace: String,

    /// Explicit snapshot file location.
    pub store_path: Option<PathBuf>,

    /// Shared secret for administrative operations.
    /// SECURITY: Supply via `SEATWARDEN_ADMIN_TOKEN` rather than a checked-in file.
    /// Never written back out when the config is serialized.
    #[serde(skip_serializing)]
    pub admin_token: String,

    /// Script scope for issues that do not name one.
    pub default_script: ScriptScope,

    /// Validity for issues that do not name one.
    pub default_days: i64,

    /// Device capacity for issues that do not name one.
    pub default_max_devices: u32,

    /// Length of one licensing day in seconds.
    pub day_length_secs: u64,

    /// Snapshot write attempts before a mutation fails.
    pub persist_attempts: u32,

    /// Licenses written at startup when their key is absent.
    pub seed: Vec<SeedLicense>,
}

impl Default for SeatwardenConfig {
    fn default() -> Self {
        Self {
            namespace: "seatwarden".to_string(),
            store_path: None,
            admin_token: String::new(),
            default_script: ScriptScope::Any,
            default_days: 30,
            default_max_devices: 1,
            day_length_secs: 24 * 60 * 60,
            persist_attempts: 2,
            seed: Vec::new(),
        }
    }
}

impl fmt::Debug for SeatwardenConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SeatwardenConfig")
            .field("namespace", &self.namespace)
            .field("store_path", &self.store_path)
            .field("admin_token", &"<redacted>")
            .field("default_script", &self.default_script)
            .field("default_days", &self.default_days)
            .field("default_max_devices", &self.default_max_devices)
            .field("day_length_secs", &self.day_length_secs)
            .field("persist_attempts", &self.persist_attempts)
            .field("seed", &self.seed.len())
            .finish()
    }
}

impl SeatwardenConfig {
    /// Load configuration from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, SeatwardenError> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|e| {
            SeatwardenError::ConfigError(format!("Failed to read {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&json).map_err(|e| {
            SeatwardenError::ConfigError(format!("Failed to parse {}: {}", path.display(), e))
        })
    }

    /// Apply `SEATWARDEN_ADMIN_TOKEN` and `SEATWARDEN_STORE_PATH` if set.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(token) = std::env::var(ENV_ADMIN_TOKEN) {
            self.admin_token = token;
        }
        if let Some(path) = std::env::var_os(ENV_STORE_PATH) {
            self.store_path = Some(PathBuf::from(path));
        }
        self
    }

    /// Length of one licensing day.
    pub fn day_length(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.day_length_secs as i64)
    }

    /// Validate configuration for obvious errors.
    pub fn validate(&self) -> Result<(), SeatwardenError> {
        if self.store_path.is_none() && self.namespace.trim().is_empty() {
            return Err(SeatwardenError::ConfigError(
                "namespace cannot be empty without store_path".to_string(),
            ));
        }
        if self.admin_token.trim().is_empty() {
            return Err(SeatwardenError::ConfigError(
                "admin_token cannot be empty".to_string(),
            ));
        }
        if self.default_script.is_empty() {
            return Err(SeatwardenError::ConfigError(
                "default_script cannot be empty".to_string(),
            ));
        }
        if self.default_days < 1 {
            return Err(SeatwardenError::ConfigError(format!(
                "default_days must be at least 1, got {}",
                self.default_days
            )));
        }
        if self.default_max_devices < 1 {
            return Err(SeatwardenError::ConfigError(
                "default_max_devices must be at least 1".to_string(),
            ));
        }
        if self.day_length_secs == 0 || self.day_length_secs > i64::MAX as u64 / 1000 {
            return Err(SeatwardenError::ConfigError(format!(
                "day_length_secs out of range: {}",
                self.day_length_secs
            )));
        }
        if self.persist_attempts < 1 {
            return Err(SeatwardenError::ConfigError(
                "persist_attempts must be at least 1".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for seed in &self.seed {
            seed.validate()?;
            if !seen.insert(seed.key.trim()) {
                return Err(SeatwardenError::ConfigError(format!(
                    "duplicate seed license {}",
                    seed.key.trim()
                )));
            }
        }

        Ok(())
    }
}

/// A license provisioned from configuration rather than by an issue call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeedLicense {
    /// License key.
    pub key: String,

    /// Script scope.
    #[serde(default = "any_script")]
    pub script_id: ScriptScope,

    /// Issue instant; expiry counts from here, not from startup.
    pub issued_at: DateTime<Utc>,

    /// Validity in days from `issued_at`.
    pub duration_days: i64,

    /// Device capacity.
    #[serde(default = "one_device")]
    pub max_devices: u32,

    /// Operator label.
    #[serde(default)]
    pub owner: Option<String>,
}

fn any_script() -> ScriptScope {
    ScriptScope::Any
}

fn one_device() -> u32 {
    1
}

impl SeedLicense {
    fn validate(&self) -> Result<(), SeatwardenError> {
        if self.key.trim().is_empty() {
            return Err(SeatwardenError::ConfigError(
                "seed license key cannot be empty".to_string(),
            ));
        }
        if self.duration_days < 1 {
            return Err(SeatwardenError::ConfigError(format!(
                "seed license {} needs duration_days >= 1",
                self.key
            )));
        }
        if self.max_devices < 1 {
            return Err(SeatwardenError::ConfigError(format!(
                "seed license {} needs max_devices >= 1",
                self.key
            )));
        }
        if self.script_id.is_empty() {
            return Err(SeatwardenError::ConfigError(format!(
                "seed license {} has an empty script_id",
                self.key
            )));
        }
        Ok(())
    }

    /// Materialize the record. `now` stamps the bookkeeping fields.
    pub fn to_record(
        &self,
        day_length: chrono::Duration,
        now: DateTime<Utc>,
    ) -> Result<LicenseRecord, SeatwardenError> {
        let expires_at = days_after(self.issued_at, day_length, self.duration_days).ok_or_else(|| {
            SeatwardenError::ConfigError(format!(
                "seed license {} expires out of range",
                self.key
            ))
        })?;

        Ok(LicenseRecord {
            key: self.key.trim().to_string(),
            script_id: self.script_id.clone(),
            issued_at: self.issued_at,
            expires_at,
            max_devices: self.max_devices,
            devices: Vec::new(),
            disabled: false,
            owner: self.owner.clone(),
            created_at: now,
            updated_at: now,
        })
    }
}
