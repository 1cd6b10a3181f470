// src/payments/checksum.rs

//! X-VERIFY checksum codec.
//!
//! The pay call and the callback sign DIFFERENT strings: the pay call hashes
//! `payload + "/pg/v1/pay" + salt_key`, the callback hashes
//! `payload + salt_key` with no path segment. The two formulas stay separate
//! functions on purpose.

use sha2::{Digest, Sha256};

/// API path folded into the outbound pay signature.
pub const PAY_PATH: &str = "/pg/v1/pay";

const CHECKSUM_SEPARATOR: &str = "###";

/// Checksum for the outbound pay call:
/// `hex(sha256(payload + PAY_PATH + salt_key)) + "###" + salt_index`.
pub fn sign(payload_base64: &str, salt_key: &str, salt_index: &str) -> String {
  let mut hasher = Sha256::new();
  hasher.update(payload_base64.as_bytes());
  hasher.update(PAY_PATH.as_bytes());
  hasher.update(salt_key.as_bytes());
  format!("{}{}{}", hex::encode(hasher.finalize()), CHECKSUM_SEPARATOR, salt_index)
}

/// Checksum in callback mode: same construction minus the path segment.
pub fn callback_checksum(payload_base64: &str, salt_key: &str, salt_index: &str) -> String {
  let mut hasher = Sha256::new();
  hasher.update(payload_base64.as_bytes());
  hasher.update(salt_key.as_bytes());
  format!("{}{}{}", hex::encode(hasher.finalize()), CHECKSUM_SEPARATOR, salt_index)
}

/// Verifies a received X-VERIFY header against the callback formula.
/// Exact string comparison; any mismatch, including in the salt index
/// suffix, fails.
pub fn verify(payload_base64: &str, received: &str, salt_key: &str, salt_index: &str) -> bool {
  callback_checksum(payload_base64, salt_key, salt_index) == received
}
