//! Verification decision table.
//!
//! Checks run in a fixed order and the first failure wins:
//! 1. Record exists and is not disabled
//! 2. Record has not expired
//! 3. A script identifier was supplied and the record's scope admits it
//! 4. A fingerprint was supplied
//! 5. The fingerprint is already bound, or a seat is free

use crate::protocol::models::{DenyReason, LicenseRecord};
use chrono::{DateTime, Utc};

/// What verification should do with a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Refuse with this reason.
    Deny(DenyReason),
    /// Fingerprint already bound; succeed without writing.
    AlreadyBound,
    /// Bind the fingerprint, then succeed.
    Bind,
}

/// Trim an optional request field; blank counts as absent.
pub fn present(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Decide the outcome of verifying `record` for `script_id` on `fingerprint` at `now`.
pub fn evaluate(
    record: Option<&LicenseRecord>,
    script_id: Option<&str>,
    fingerprint: Option<&str>,
    now: DateTime<Utc>,
) -> Decision {
    // Disabled keys are indistinguishable from unknown ones.
    let Some(record) = record.filter(|r| !r.disabled) else {
        return Decision::Deny(DenyReason::InvalidKey);
    };

    if record.is_expired(now) {
        return Decision::Deny(DenyReason::Expired);
    }

    let Some(script_id) = present(script_id) else {
        return Decision::Deny(DenyReason::MissingScript);
    };
    if !record.script_id.matches(script_id) {
        return Decision::Deny(DenyReason::WrongScript);
    }

    let Some(fingerprint) = present(fingerprint) else {
        return Decision::Deny(DenyReason::MissingFingerprint);
    };
    if record.has_device(fingerprint) {
        return Decision::AlreadyBound;
    }
    if !record.has_free_seat() {
        return Decision::Deny(DenyReason::DeviceLimit);
    }

    Decision::Bind
}
