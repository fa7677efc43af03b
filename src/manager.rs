//! License Manager - the main public API for Seatwarden.
//!
//! The `LicenseManager` wires configuration, storage and the engine together:
//! - Opens the durable store and seeds configured licenses
//! - Serves verification to any caller
//! - Gates every administrative operation behind the shared admin token

use crate::clock::{Clock, SystemClock};
use crate::config::SeatwardenConfig;
use crate::engine::{IssueDefaults, LicenseEngine};
use crate::policy::admin::AdminGate;
use crate::protocol::messages::{
    DeviceList, IssueRequest, IssuedLicense, LicenseListing, ToggleResult, VerifyOutcome,
    VerifyRequest,
};
use crate::protocol::models::LicenseRecord;
use crate::store::file::FileStore;
use crate::store::LicenseStore;
use crate::SeatwardenError;
use std::sync::Arc;
use tracing::info;

/// Main license manager for Seatwarden.
///
/// This is the primary public API. Create one instance per process and
/// share it (it is `Send + Sync`) across request handlers.
pub struct LicenseManager {
    config: SeatwardenConfig,
    engine: LicenseEngine,
    gate: AdminGate,
}

impl LicenseManager {
    /// Create a license manager backed by the snapshot file from `config`.
    ///
    /// Uses the system clock for time operations.
    ///
    /// # Errors
    /// Returns an error if:
    /// - Configuration validation fails
    /// - The store directory cannot be created
    /// - An existing snapshot cannot be read or fails its integrity check
    /// - Seed licenses cannot be persisted
    pub fn new(config: SeatwardenConfig) -> Result<Self, SeatwardenError> {
        config.validate()?;

        let store = match &config.store_path {
            Some(path) => FileStore::open(path)?,
            None => FileStore::with_namespace(&config.namespace)?,
        }
        .with_persist_attempts(config.persist_attempts);

        Self::build(config, Arc::new(store), Arc::new(SystemClock))
    }

    /// Create a license manager over an existing store.
    pub fn with_store(
        config: SeatwardenConfig,
        store: Arc<dyn LicenseStore>,
    ) -> Result<Self, SeatwardenError> {
        config.validate()?;
        Self::build(config, store, Arc::new(SystemClock))
    }

    /// Create a license manager with a custom store and clock (for testing).
    #[cfg(any(test, feature = "test-seams"))]
    pub fn new_with_clock(
        config: SeatwardenConfig,
        store: Arc<dyn LicenseStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, SeatwardenError> {
        config.validate()?;
        Self::build(config, store, clock)
    }

    fn build(
        config: SeatwardenConfig,
        store: Arc<dyn LicenseStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, SeatwardenError> {
        let gate = AdminGate::new(&config.admin_token)?;
        let engine =
            LicenseEngine::new(store, clock).with_defaults(IssueDefaults::from_config(&config))?;

        let seeded = engine.seed(&config.seed)?;
        info!(seeded, configured = config.seed.len(), "License manager ready");

        Ok(Self {
            config,
            engine,
            gate,
        })
    }

    /// Verify a key for a script on a device. Not gated.
    ///
    /// Refusals (unknown key, expired, device limit, ...) are `Ok` outcomes.
    ///
    /// # Errors
    /// - `InvalidInput` - empty key
    /// - `StoreIO` - a new device binding could not be persisted
    pub fn verify(&self, request: &VerifyRequest) -> Result<VerifyOutcome, SeatwardenError> {
        self.engine.verify(request)
    }

    /// Issue or re-issue a license.
    pub fn issue(
        &self,
        credential: Option<&str>,
        request: &IssueRequest,
    ) -> Result<IssuedLicense, SeatwardenError> {
        self.gate.authorize(credential)?;
        self.engine.issue(request)
    }

    /// Unbind a device from a license.
    pub fn revoke_device(
        &self,
        credential: Option<&str>,
        key: &str,
        fingerprint: &str,
    ) -> Result<DeviceList, SeatwardenError> {
        self.gate.authorize(credential)?;
        self.engine.revoke_device(key, fingerprint)
    }

    /// Set or clear a license's kill switch.
    pub fn toggle(
        &self,
        credential: Option<&str>,
        key: &str,
        disabled: bool,
    ) -> Result<ToggleResult, SeatwardenError> {
        self.gate.authorize(credential)?;
        self.engine.toggle(key, disabled)
    }

    /// Inspect one license.
    pub fn info(
        &self,
        credential: Option<&str>,
        key: &str,
    ) -> Result<LicenseRecord, SeatwardenError> {
        self.gate.authorize(credential)?;
        self.engine.info(key)
    }

    /// List every license.
    pub fn list(&self, credential: Option<&str>) -> Result<LicenseListing, SeatwardenError> {
        self.gate.authorize(credential)?;
        self.engine.list()
    }

    /// Delete a license outright.
    pub fn delete(
        &self,
        credential: Option<&str>,
        key: &str,
    ) -> Result<LicenseRecord, SeatwardenError> {
        self.gate.authorize(credential)?;
        self.engine.delete(key)
    }

    /// The underlying engine, for callers that do their own gating.
    pub fn engine(&self) -> &LicenseEngine {
        &self.engine
    }

    /// Get the current configuration.
    pub fn config(&self) -> &SeatwardenConfig {
        &self.config
    }
}
