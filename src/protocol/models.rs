//! License records, script scopes and verification outcomes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Wire sentinel meaning "valid for any script".
pub const WILDCARD: &str = "*";

/// Which protected client builds a key is valid for.
///
/// On the wire this is either a string (`"*"` for [`ScriptScope::Any`]) or
/// an array of strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawScope", into = "RawScope")]
pub enum ScriptScope {
    /// Exactly one script identifier.
    Single(String),
    /// Any script identifier.
    Any,
    /// A set of script identifiers; a `"*"` member acts as a wildcard.
    Set(Vec<String>),
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum RawScope {
    One(String),
    Many(Vec<String>),
}

impl From<RawScope> for ScriptScope {
    fn from(raw: RawScope) -> Self {
        match raw {
            RawScope::One(id) => {
                let id = id.trim();
                if id == WILDCARD {
                    ScriptScope::Any
                } else {
                    ScriptScope::Single(id.to_string())
                }
            }
            RawScope::Many(ids) => ScriptScope::set(ids),
        }
    }
}

impl From<ScriptScope> for RawScope {
    fn from(scope: ScriptScope) -> Self {
        match scope {
            ScriptScope::Single(id) => RawScope::One(id),
            ScriptScope::Any => RawScope::One(WILDCARD.to_string()),
            ScriptScope::Set(ids) => RawScope::Many(ids),
        }
    }
}

impl ScriptScope {
    /// Scope for a single script identifier.
    pub fn single(id: impl Into<String>) -> Self {
        let id = id.into();
        let id = id.trim();
        if id == WILDCARD {
            ScriptScope::Any
        } else {
            ScriptScope::Single(id.to_string())
        }
    }

    /// Scope for a set of identifiers.
    ///
    /// Entries are trimmed; empty entries and case-insensitive duplicates
    /// are dropped, first occurrence wins.
    pub fn set<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut normalized: Vec<String> = Vec::new();
        for id in ids {
            let id: String = id.into();
            let id = id.trim();
            if id.is_empty() || normalized.iter().any(|seen| ids_equal(seen, id)) {
                continue;
            }
            normalized.push(id.to_string());
        }
        ScriptScope::Set(normalized)
    }

    /// True when the scope cannot match any request.
    pub fn is_empty(&self) -> bool {
        match self {
            ScriptScope::Single(id) => id.trim().is_empty(),
            ScriptScope::Any => false,
            ScriptScope::Set(ids) => ids.iter().all(|id| id.trim().is_empty()),
        }
    }

    /// Does this scope admit the requested script identifier?
    ///
    /// Matching is case-insensitive. An empty request never matches.
    pub fn matches(&self, requested: &str) -> bool {
        let requested = requested.trim();
        if requested.is_empty() {
            return false;
        }
        match self {
            ScriptScope::Any => true,
            ScriptScope::Single(id) => id == WILDCARD || ids_equal(id, requested),
            ScriptScope::Set(ids) => ids
                .iter()
                .any(|id| id == WILDCARD || ids_equal(id, requested)),
        }
    }
}

impl fmt::Display for ScriptScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScriptScope::Single(id) => f.write_str(id),
            ScriptScope::Any => f.write_str(WILDCARD),
            ScriptScope::Set(ids) => write!(f, "[{}]", ids.join(", ")),
        }
    }
}

fn ids_equal(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b) || a.to_lowercase() == b.to_lowercase()
}

/// A stored license.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LicenseRecord {
    /// The license key (unique across the store).
    pub key: String,

    /// Scripts this key is valid for.
    pub script_id: ScriptScope,

    /// When the key was last issued.
    pub issued_at: DateTime<Utc>,

    /// Absolute expiry instant.
    pub expires_at: DateTime<Utc>,

    /// Device-binding capacity.
    pub max_devices: u32,

    /// Bound device fingerprints in binding order.
    #[serde(default)]
    pub devices: Vec<String>,

    /// Administrative kill switch.
    #[serde(default)]
    pub disabled: bool,

    /// Free-form operator label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,

    /// When the record was first created.
    pub created_at: DateTime<Utc>,

    /// When the record was last mutated.
    pub updated_at: DateTime<Utc>,
}

impl LicenseRecord {
    /// Whether the key has expired at `now`. The expiry instant itself is expired.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Time left until expiry (negative once expired).
    pub fn remaining(&self, now: DateTime<Utc>) -> chrono::Duration {
        self.expires_at.signed_duration_since(now)
    }

    /// Whether `fingerprint` is already bound.
    pub fn has_device(&self, fingerprint: &str) -> bool {
        self.devices.iter().any(|d| d == fingerprint)
    }

    /// Whether another device can be bound.
    pub fn has_free_seat(&self) -> bool {
        self.devices.len() < self.max_devices as usize
    }
}

/// Why a verification was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    /// Unknown or disabled key.
    InvalidKey,
    /// Key is past its expiry instant.
    Expired,
    /// Request carried no script identifier.
    MissingScript,
    /// Key is not valid for the requested script.
    WrongScript,
    /// Request carried no device fingerprint.
    MissingFingerprint,
    /// All device seats are taken.
    DeviceLimit,
}

impl DenyReason {
    /// Wire name of the reason.
    pub fn as_str(&self) -> &'static str {
        match self {
            DenyReason::InvalidKey => "invalid_key",
            DenyReason::Expired => "expired",
            DenyReason::MissingScript => "missing_script",
            DenyReason::WrongScript => "wrong_script",
            DenyReason::MissingFingerprint => "missing_fingerprint",
            DenyReason::DeviceLimit => "device_limit",
        }
    }
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn make_record(scope: ScriptScope) -> LicenseRecord {
        let issued = Utc.with_ymd_and_hms(2025, 8, 21, 0, 0, 0).unwrap();
        LicenseRecord {
            key: "FAARIZ-DEMO-1111-2222".to_string(),
            script_id: scope,
            issued_at: issued,
            expires_at: issued + chrono::Duration::days(30),
            max_devices: 2,
            devices: vec!["fp-a".to_string()],
            disabled: false,
            owner: Some("demo-user".to_string()),
            created_at: issued,
            updated_at: issued,
        }
    }

    #[test]
    fn test_single_scope_is_case_insensitive() {
        let scope = ScriptScope::single("FKBP-PRO-1.0");
        assert!(scope.matches("fkbp-pro-1.0"));
        assert!(scope.matches("  FKBP-PRO-1.0 "));
        assert!(!scope.matches("FKBP-LITE-1.0"));
    }

    #[test]
    fn test_any_scope_matches_non_empty() {
        assert!(ScriptScope::Any.matches("whatever"));
        assert!(!ScriptScope::Any.matches(""));
        assert!(!ScriptScope::Any.matches("   "));
    }

    #[test]
    fn test_set_scope_membership() {
        let scope = ScriptScope::set(["alpha", "Beta"]);
        assert!(scope.matches("ALPHA"));
        assert!(scope.matches("beta"));
        assert!(!scope.matches("gamma"));
    }

    #[test]
    fn test_set_scope_wildcard_member() {
        let scope = ScriptScope::set(["alpha", "*"]);
        assert!(scope.matches("gamma"));
    }

    #[test]
    fn test_set_normalizes_entries() {
        let scope = ScriptScope::set([" alpha ", "", "ALPHA", "beta"]);
        assert_eq!(
            scope,
            ScriptScope::Set(vec!["alpha".to_string(), "beta".to_string()])
        );
        assert!(ScriptScope::set(["", "  "]).is_empty());
    }

    #[test]
    fn test_single_wildcard_becomes_any() {
        assert_eq!(ScriptScope::single("*"), ScriptScope::Any);
    }

    #[test]
    fn test_scope_wire_format() {
        assert_eq!(serde_json::to_string(&ScriptScope::Any).unwrap(), r#""*""#);
        assert_eq!(
            serde_json::to_string(&ScriptScope::single("S")).unwrap(),
            r#""S""#
        );
        assert_eq!(
            serde_json::to_string(&ScriptScope::set(["a", "b"])).unwrap(),
            r#"["a","b"]"#
        );

        let any: ScriptScope = serde_json::from_str(r#""*""#).unwrap();
        assert_eq!(any, ScriptScope::Any);
        let set: ScriptScope = serde_json::from_str(r#"["a"," A ","b"]"#).unwrap();
        assert_eq!(set, ScriptScope::Set(vec!["a".into(), "b".into()]));
    }

    #[test]
    fn test_record_expiry_boundary() {
        let record = make_record(ScriptScope::Any);
        let one_ms = chrono::Duration::milliseconds(1);

        assert!(!record.is_expired(record.expires_at - one_ms));
        assert!(record.is_expired(record.expires_at));
        assert!(record.is_expired(record.expires_at + one_ms));
        assert_eq!(
            record.remaining(record.expires_at - one_ms).num_milliseconds(),
            1
        );
    }

    #[test]
    fn test_record_seats() {
        let mut record = make_record(ScriptScope::Any);
        assert!(record.has_device("fp-a"));
        assert!(!record.has_device("FP-A"));
        assert!(record.has_free_seat());

        record.devices.push("fp-b".to_string());
        assert!(!record.has_free_seat());
    }

    #[test]
    fn test_record_wire_names() {
        let record = make_record(ScriptScope::single("FKBP-PRO-1.0"));
        let json = serde_json::to_value(&record).unwrap();

        assert_eq!(json["scriptId"], "FKBP-PRO-1.0");
        assert_eq!(json["maxDevices"], 2);
        assert!(json.get("expiresAt").is_some());
        assert!(json.get("createdAt").is_some());

        let back: LicenseRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_deny_reason_wire_names() {
        assert_eq!(
            serde_json::to_string(&DenyReason::DeviceLimit).unwrap(),
            r#""device_limit""#
        );
        assert_eq!(DenyReason::MissingFingerprint.to_string(), "missing_fingerprint");
    }
}
