//! # Hashing Utilities
//!
//! Two hash functions, two jobs, and we refuse to support more without a
//! very good reason:
//!
//! - **SHA-256** — used doubled for transaction identifiers. The
//!   double-hash construction costs one extra compression and buys
//!   immunity from length-extension, which matters for identifiers that
//!   cross trust boundaries.
//! - **BLAKE3** — used for host address derivation. Faster than SHA-256 on
//!   every platform that matters, and a proper cryptographic hash.

use sha2::{Digest, Sha256};

/// Compute the SHA-256 hash of the input data as a fixed-size array.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let result = hasher.finalize();
    let mut output = [0u8; 32];
    output.copy_from_slice(&result);
    output
}

/// Compute `SHA-256(SHA-256(data))`.
///
/// This is the construction behind every transaction identifier in the
/// protocol: `tx_id = hex(double_sha256(signable_bytes))`.
pub fn double_sha256(data: &[u8]) -> [u8; 32] {
    sha256(&sha256(data))
}

/// Compute the BLAKE3 hash of the input data.
///
/// Used for deriving host addresses from host public keys. The extra layer
/// of indirection (hash, not raw key) keeps address format stable if the
/// key scheme ever changes.
pub fn blake3_hash(data: &[u8]) -> [u8; 32] {
    *blake3::hash(data).as_bytes()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_known_vector() {
        // SHA-256 of the empty string — the most famous test vector there is.
        let hash = sha256(b"");
        assert_eq!(
            hex::encode(hash),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn double_sha256_is_sha256_of_sha256() {
        let data = b"pact ledger";
        assert_eq!(double_sha256(data), sha256(&sha256(data)));
    }

    #[test]
    fn double_sha256_differs_from_single() {
        let data = b"pact ledger";
        assert_ne!(double_sha256(data), sha256(data));
    }

    #[test]
    fn blake3_is_deterministic_and_distinct() {
        let a = blake3_hash(b"host-a");
        let b = blake3_hash(b"host-b");
        assert_eq!(a, blake3_hash(b"host-a"));
        assert_ne!(a, b);
    }
}
