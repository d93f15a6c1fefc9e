//! Size and integrity digest for stored payloads.

use sha2::{Digest, Sha256};

use crate::error::{CacheError, Result};

/// Canonical byte size of a stored representation.
pub fn payload_size(bytes: &[u8]) -> u64 {
    bytes.len() as u64
}

/// Lowercase hex SHA-256 of `bytes`.
pub fn digest(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Fails with a transform error when `bytes` no longer match `expected`.
pub fn verify(bytes: &[u8], expected: &str) -> Result<()> {
    let actual = digest(bytes);
    if actual == expected {
        Ok(())
    } else {
        Err(CacheError::Transform(format!(
            "checksum mismatch: expected {}, got {}",
            expected, actual
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_known_value() {
        assert_eq!(
            digest(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_verify_detects_corruption() {
        let sum = digest(b"payload");
        assert!(verify(b"payload", &sum).is_ok());
        assert!(matches!(verify(b"pay1oad", &sum), Err(CacheError::Transform(_))));
    }

    #[test]
    fn test_payload_size() {
        assert_eq!(payload_size(&[0u8; 17]), 17);
    }
}
