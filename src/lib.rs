//! # Seatwarden
//!
//! **License key issuance, device-seat binding and revocation for Rust services.**
//!
//! Seatwarden is the state machine behind a license server: it issues keys
//! with an absolute expiry and a device capacity, verifies them from client
//! builds, binds device fingerprints to seats, and lets an operator revoke
//! devices or switch keys off.
//!
//! ## Features
//!
//! - **Strict verification order** — unknown/disabled, expired, script, fingerprint, seats
//! - **Per-key atomicity** — concurrent verifies can never over-bind a key
//! - **Durable snapshot** — checksummed JSON, atomic temp + rename writes
//! - **Fail-closed persistence** — a binding that was not written is never reported as success
//! - **Uniform admin gate** — one `Forbidden` for every admin failure
//!
//! ## Quickstart
//!
//! ```no_run
//! use seatwarden::{IssueRequest, LicenseManager, ScriptScope, SeatwardenConfig, VerifyRequest};
//!
//! fn main() -> Result<(), seatwarden::SeatwardenError> {
//!     let config = SeatwardenConfig {
//!         admin_token: "change-me".to_string(),
//!         ..SeatwardenConfig::default()
//!     }
//!     .with_env_overrides();
//!
//!     let manager = LicenseManager::new(config)?;
//!
//!     manager.issue(
//!         Some("change-me"),
//!         &IssueRequest::new("K1")
//!             .script(ScriptScope::single("FKBP-PRO-1.0"))
//!             .days(30)
//!             .max_devices(2),
//!     )?;
//!
//!     let outcome = manager.verify(&VerifyRequest::new("K1", "FKBP-PRO-1.0", "fp-a"))?;
//!     if outcome.ok {
//!         println!("License valid for {:?} more days", outcome.days_left);
//!     } else {
//!         println!("Refused: {:?}", outcome.reason);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Outcomes vs. errors
//!
//! Verification refusals (`invalid_key`, `expired`, `missing_script`,
//! `wrong_script`, `missing_fingerprint`, `device_limit`) are ordinary
//! [`VerifyOutcome`] values. [`SeatwardenError`] is reserved for malformed
//! input, admin gate failures, unknown keys on admin operations, and store
//! faults, so a caller can always tell "your key is invalid" from "we could
//! not check".
//!
//! ## Storage
//!
//! The engine depends only on the [`LicenseStore`] trait. [`MemoryStore`]
//! keeps everything in memory; [`FileStore`] keeps a snapshot under
//! `dirs::data_dir()/<namespace>/licenses.json` (or an explicit path).

#![deny(warnings)]
#![deny(missing_docs)]

// Core modules
pub mod clock;
pub mod config;
pub mod digest;
pub mod errors;

// Protocol layer
pub mod protocol;

// Storage layer
pub mod store;

// Policy layer
pub mod policy;

// Engine
pub mod engine;

// Manager (main public API)
pub mod manager;

// Re-exports for public API
pub use clock::{Clock, SystemClock};
pub use config::{SeatwardenConfig, SeedLicense};
pub use engine::{IssueDefaults, LicenseEngine};
pub use errors::{ErrorKind, SeatwardenError};
pub use manager::LicenseManager;
pub use policy::admin::AdminGate;
pub use protocol::messages::{
    DeviceList, IssueRequest, IssuedLicense, LicenseListing, ToggleResult, VerifyOutcome,
    VerifyRequest,
};
pub use protocol::models::{DenyReason, LicenseRecord, ScriptScope};
pub use store::file::FileStore;
pub use store::memory::MemoryStore;
pub use store::LicenseStore;

#[cfg(any(test, feature = "test-seams"))]
pub use clock::MockClock;
