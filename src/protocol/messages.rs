//! Request and response messages for the license operations.
//!
//! Every type derives serde with camelCase field names so a transport can
//! encode them as-is.

use crate::protocol::models::{DenyReason, LicenseRecord, ScriptScope};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Issue (or re-issue) a license.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueRequest {
    /// License key to create or overwrite.
    pub key: String,

    /// Script scope; config default when absent.
    #[serde(default)]
    pub script_id: Option<ScriptScope>,

    /// Validity in days; values <= 0 are clamped to 1.
    #[serde(default)]
    pub days: Option<i64>,

    /// Device capacity; values < 1 are clamped to 1.
    #[serde(default)]
    pub max_devices: Option<i64>,

    /// Drop existing device bindings on re-issue.
    #[serde(default)]
    pub reset_devices: bool,

    /// Optional operator label.
    #[serde(default)]
    pub owner: Option<String>,
}

impl IssueRequest {
    /// Request with only a key; everything else defaults.
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Self::default()
        }
    }

    /// Set the script scope.
    pub fn script(mut self, scope: ScriptScope) -> Self {
        self.script_id = Some(scope);
        self
    }

    /// Set the validity in days.
    pub fn days(mut self, days: i64) -> Self {
        self.days = Some(days);
        self
    }

    /// Set the device capacity.
    pub fn max_devices(mut self, max_devices: i64) -> Self {
        self.max_devices = Some(max_devices);
        self
    }

    /// Drop existing bindings on re-issue.
    pub fn reset_devices(mut self, reset: bool) -> Self {
        self.reset_devices = reset;
        self
    }

    /// Set the operator label.
    pub fn owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }
}

/// Effective policy of an issued license.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedLicense {
    /// The license key.
    pub key: String,
    /// Effective script scope.
    pub script_id: ScriptScope,
    /// Effective device capacity.
    pub max_devices: u32,
    /// Absolute expiry instant.
    pub expires_at: DateTime<Utc>,
}

/// Verify a key for a script on a device.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest {
    /// License key presented by the client.
    pub key: String,
    /// Script identifier of the requesting build.
    #[serde(default)]
    pub script_id: Option<String>,
    /// Device fingerprint of the requesting installation.
    #[serde(default)]
    pub fingerprint: Option<String>,
}

impl VerifyRequest {
    /// Fully populated request.
    pub fn new(key: &str, script_id: &str, fingerprint: &str) -> Self {
        Self {
            key: key.to_string(),
            script_id: Some(script_id.to_string()),
            fingerprint: Some(fingerprint.to_string()),
        }
    }
}

/// Result of a verification. Refusals are ordinary outcomes, not errors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyOutcome {
    /// Whether the key is valid for this script and device.
    pub ok: bool,

    /// Why the request was refused.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<DenyReason>,

    /// Milliseconds until expiry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub left_ms: Option<i64>,

    /// Whole days until expiry, rounded up.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub days_left: Option<i64>,

    /// Absolute expiry instant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,

    /// Currently bound devices.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub devices: Option<Vec<String>>,

    /// Operator label of the license, if it has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
}

impl VerifyOutcome {
    /// A refusal.
    pub fn denied(reason: DenyReason) -> Self {
        Self {
            ok: false,
            reason: Some(reason),
            left_ms: None,
            days_left: None,
            expires_at: None,
            devices: None,
            owner: None,
        }
    }

    /// A success describing `record` as seen at `now`.
    pub fn granted(
        record: &LicenseRecord,
        now: DateTime<Utc>,
        day_length: chrono::Duration,
    ) -> Self {
        let left_ms = record.remaining(now).num_milliseconds().max(0);
        let day_ms = day_length.num_milliseconds().max(1);
        let days_left = (left_ms + day_ms - 1) / day_ms;

        Self {
            ok: true,
            reason: None,
            left_ms: Some(left_ms),
            days_left: Some(days_left),
            expires_at: Some(record.expires_at),
            devices: Some(record.devices.clone()),
            owner: record.owner.clone(),
        }
    }
}

/// Device list after a revocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceList {
    /// Bound devices in binding order.
    pub devices: Vec<String>,
}

/// Disabled flag after a toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToggleResult {
    /// Current value of the kill switch.
    pub disabled: bool,
}

/// All stored licenses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LicenseListing {
    /// Number of licenses.
    pub count: usize,
    /// Licenses sorted by key.
    pub items: Vec<LicenseRecord>,
}

impl From<Vec<LicenseRecord>> for LicenseListing {
    fn from(items: Vec<LicenseRecord>) -> Self {
        Self {
            count: items.len(),
            items,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record_expiring_at(expires_at: DateTime<Utc>) -> LicenseRecord {
        let issued = Utc.with_ymd_and_hms(2025, 8, 21, 0, 0, 0).unwrap();
        LicenseRecord {
            key: "K1".to_string(),
            script_id: ScriptScope::single("S"),
            issued_at: issued,
            expires_at,
            max_devices: 2,
            devices: vec!["fp-a".to_string()],
            disabled: false,
            owner: None,
            created_at: issued,
            updated_at: issued,
        }
    }

    #[test]
    fn test_issue_request_defaults_from_json() {
        let req: IssueRequest = serde_json::from_str(r#"{"key":"K1"}"#).unwrap();
        assert_eq!(req, IssueRequest::new("K1"));
        assert!(!req.reset_devices);
    }

    #[test]
    fn test_issue_request_full_json() {
        let req: IssueRequest = serde_json::from_str(
            r#"{"key":"K1","scriptId":["a","b"],"days":30,"maxDevices":2,"resetDevices":true}"#,
        )
        .unwrap();
        assert_eq!(req.script_id, Some(ScriptScope::set(["a", "b"])));
        assert_eq!(req.days, Some(30));
        assert_eq!(req.max_devices, Some(2));
        assert!(req.reset_devices);
    }

    #[test]
    fn test_denied_outcome_is_minimal_on_the_wire() {
        let json = serde_json::to_string(&VerifyOutcome::denied(DenyReason::Expired)).unwrap();
        assert_eq!(json, r#"{"ok":false,"reason":"expired"}"#);
    }

    #[test]
    fn test_granted_outcome_rounds_days_up() {
        let now = Utc.with_ymd_and_hms(2025, 8, 21, 0, 0, 0).unwrap();
        let record = record_expiring_at(now + chrono::Duration::hours(36));
        let outcome = VerifyOutcome::granted(&record, now, chrono::Duration::days(1));

        assert!(outcome.ok);
        assert_eq!(outcome.left_ms, Some(36 * 60 * 60 * 1000));
        assert_eq!(outcome.days_left, Some(2));
        assert_eq!(outcome.devices, Some(vec!["fp-a".to_string()]));
    }

    #[test]
    fn test_granted_outcome_last_millisecond() {
        let now = Utc.with_ymd_and_hms(2025, 8, 21, 0, 0, 0).unwrap();
        let record = record_expiring_at(now + chrono::Duration::milliseconds(1));
        let outcome = VerifyOutcome::granted(&record, now, chrono::Duration::days(1));

        assert_eq!(outcome.left_ms, Some(1));
        assert_eq!(outcome.days_left, Some(1));
    }

    #[test]
    fn test_granted_outcome_carries_owner() {
        let now = Utc.with_ymd_and_hms(2025, 8, 21, 0, 0, 0).unwrap();
        let mut record = record_expiring_at(now + chrono::Duration::days(1));

        let outcome = VerifyOutcome::granted(&record, now, chrono::Duration::days(1));
        let json = serde_json::to_value(&outcome).unwrap();
        assert!(json.get("owner").is_none());

        record.owner = Some("demo-user".to_string());
        let outcome = VerifyOutcome::granted(&record, now, chrono::Duration::days(1));
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["owner"], "demo-user");
        assert_eq!(json["daysLeft"], 1);
    }

    #[test]
    fn test_listing_counts_items() {
        let now = Utc.with_ymd_and_hms(2025, 8, 21, 0, 0, 0).unwrap();
        let listing = LicenseListing::from(vec![record_expiring_at(now)]);
        assert_eq!(listing.count, 1);
    }
}
