//! Shared-secret gate for administrative operations.

use crate::digest::{digests_match, sha256};
use crate::SeatwardenError;
use std::fmt;

/// Admin token check.
///
/// Only the SHA-256 digest of the token is retained. Credentials are
/// compared digest-to-digest, so the comparison time depends on neither
/// the token's length nor the position of the first mismatch.
#[derive(Clone)]
pub struct AdminGate {
    token_digest: [u8; 32],
}

impl AdminGate {
    /// Build a gate for `token`.
    ///
    /// # Errors
    /// `ConfigError` if the token is blank; an empty secret would open
    /// every admin operation.
    pub fn new(token: &str) -> Result<Self, SeatwardenError> {
        if token.trim().is_empty() {
            return Err(SeatwardenError::ConfigError(
                "admin_token cannot be empty".to_string(),
            ));
        }
        Ok(Self {
            token_digest: sha256(token.as_bytes()),
        })
    }

    /// Check a caller-supplied credential.
    ///
    /// Returns the same `Forbidden` error for a missing, blank or wrong
    /// credential.
    pub fn authorize(&self, credential: Option<&str>) -> Result<(), SeatwardenError> {
        match credential {
            Some(credential) if !credential.is_empty() => {
                if digests_match(&self.token_digest, &sha256(credential.as_bytes())) {
                    Ok(())
                } else {
                    Err(SeatwardenError::Forbidden)
                }
            }
            _ => Err(SeatwardenError::Forbidden),
        }
    }
}

impl fmt::Debug for AdminGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdminGate").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gate_accepts_token() {
        let gate = AdminGate::new("s3cret").unwrap();
        assert!(gate.authorize(Some("s3cret")).is_ok());
    }

    #[test]
    fn test_gate_rejects_uniformly() {
        let gate = AdminGate::new("s3cret").unwrap();
        for credential in [None, Some(""), Some("s3cre"), Some("s3cret "), Some("S3CRET")] {
            assert!(matches!(
                gate.authorize(credential),
                Err(SeatwardenError::Forbidden)
            ));
        }
    }

    #[test]
    fn test_gate_requires_token() {
        assert!(matches!(
            AdminGate::new("   "),
            Err(SeatwardenError::ConfigError(_))
        ));
    }

    #[test]
    fn test_gate_debug_hides_digest() {
        let gate = AdminGate::new("s3cret").unwrap();
        assert_eq!(format!("{:?}", gate), "AdminGate { .. }");
    }
}
