//! # Cryptographic Primitives for PACT
//!
//! Every signature and every digest in the protocol flows through here.
//! The choices are deliberately boring and well-audited:
//!
//! - **Ed25519** for signatures — fast, deterministic, and nobody has broken it.
//! - **SHA-256 (doubled)** for transaction identifiers.
//! - **BLAKE3** for host address derivation — because we live in the future.
//!
//! ## A note on "rolling your own crypto"
//!
//! We don't. Everything here is a thin, type-safe wrapper around audited
//! implementations. If you're tempted to optimize these functions, go read
//! about timing attacks and come back when you've lost the urge.

pub mod hash;
pub mod keys;

pub use hash::{blake3_hash, double_sha256, sha256};
pub use keys::{PactKeypair, PactPublicKey, PactSignature};
