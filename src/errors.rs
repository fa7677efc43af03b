//! Seatwarden error types.
//!
//! Only request-level failures live here. Expected verification outcomes
//! (expired keys, device limits and so on) are reported through
//! [`DenyReason`](crate::protocol::models::DenyReason) instead.

use thiserror::Error;

/// Errors that can occur while operating on licenses.
#[derive(Debug, Error)]
pub enum SeatwardenError {
    /// Configuration is invalid.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Request input is missing or malformed.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Admin credential missing or mismatched.
    #[error("Forbidden")]
    Forbidden,

    /// Administrative operation on a key that does not exist.
    #[error("License not found")]
    LicenseNotFound,

    /// Store I/O error (load, persist, or lock failure).
    #[error("Store I/O error: {0}")]
    StoreIO(String),

    /// Persisted snapshot failed integrity or format checks.
    #[error("Store corrupt: {0}")]
    StoreCorrupt(String),
}

/// Coarse classification of an error for transports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The request itself was malformed.
    BadRequest,
    /// The admin gate rejected the caller.
    Forbidden,
    /// The addressed license does not exist.
    NotFound,
    /// The server could not complete the request.
    Fault,
}

impl ErrorKind {
    /// Conventional HTTP status code for this kind.
    pub fn status_code(self) -> u16 {
        match self {
            ErrorKind::BadRequest => 400,
            ErrorKind::Forbidden => 403,
            ErrorKind::NotFound => 404,
            ErrorKind::Fault => 500,
        }
    }
}

impl SeatwardenError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            SeatwardenError::InvalidInput(_) => ErrorKind::BadRequest,
            SeatwardenError::Forbidden => ErrorKind::Forbidden,
            SeatwardenError::LicenseNotFound => ErrorKind::NotFound,
            SeatwardenError::ConfigError(_)
            | SeatwardenError::StoreIO(_)
            | SeatwardenError::StoreCorrupt(_) => ErrorKind::Fault,
        }
    }

    /// Whether the failure is on our side rather than the caller's.
    pub fn is_fault(&self) -> bool {
        self.kind() == ErrorKind::Fault
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            SeatwardenError::InvalidInput("key".into()).kind(),
            ErrorKind::BadRequest
        );
        assert_eq!(SeatwardenError::Forbidden.kind(), ErrorKind::Forbidden);
        assert_eq!(SeatwardenError::LicenseNotFound.kind(), ErrorKind::NotFound);
        assert!(SeatwardenError::StoreIO("disk full".into()).is_fault());
        assert!(SeatwardenError::StoreCorrupt("checksum".into()).is_fault());
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(ErrorKind::BadRequest.status_code(), 400);
        assert_eq!(ErrorKind::Forbidden.status_code(), 403);
        assert_eq!(ErrorKind::NotFound.status_code(), 404);
        assert_eq!(ErrorKind::Fault.status_code(), 500);
    }

    #[test]
    fn test_forbidden_message_has_no_detail() {
        assert_eq!(SeatwardenError::Forbidden.to_string(), "Forbidden");
    }
}
