// src/payments/txn_id.rs

use uuid::Uuid;

/// Prefix carried by every merchant transaction id this service issues.
pub const MERCHANT_TXN_PREFIX: &str = "MT_";

/// Fresh merchant transaction id: the prefix plus a v4 UUID in simple form.
/// Uniqueness rides on UUID randomness, so concurrent callers need no
/// coordination.
pub fn generate() -> String {
  format!("{}{}", MERCHANT_TXN_PREFIX, Uuid::new_v4().simple())
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::collections::HashSet;

  #[test]
  fn generated_ids_have_prefix_and_fixed_length() {
    let id = generate();
    assert!(id.starts_with(MERCHANT_TXN_PREFIX));
    // "MT_" plus 32 hex characters.
    assert_eq!(id.len(), 35);
    assert!(id[3..].chars().all(|c| c.is_ascii_hexdigit()));
  }

  #[test]
  fn generated_ids_do_not_repeat() {
    let ids: HashSet<String> = (0..1000).map(|_| generate()).collect();
    assert_eq!(ids.len(), 1000);
  }
}
