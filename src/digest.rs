//! SHA-256 helpers shared by the snapshot, the admin gate and logging.

use sha2::{Digest, Sha256};

/// Number of hex characters kept in a log tag.
const KEY_TAG_LEN: usize = 12;

/// Raw SHA-256 of `bytes`.
pub fn sha256(bytes: &[u8]) -> [u8; 32] {
    Sha256::digest(bytes).into()
}

/// Hex-encoded SHA-256 of `bytes`.
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(sha256(bytes))
}

/// Short, stable tag for a license key, safe to write to logs.
///
/// Raw keys are credentials and never appear in log output.
pub fn key_tag(license_key: &str) -> String {
    let mut tag = sha256_hex(license_key.as_bytes());
    tag.truncate(KEY_TAG_LEN);
    tag
}

/// Compare two digests without short-circuiting on the first difference.
pub fn digests_match(a: &[u8; 32], b: &[u8; 32]) -> bool {
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
