//! # Host Addresses
//!
//! A [`HostId`] is the address of a protocol host: the Bech32 encoding of
//! the BLAKE3 hash of the host's Ed25519 public key.
//!
//! ```text
//! host public key (32 bytes)
//!     -> BLAKE3(public_key) -> 32 bytes
//!     -> Bech32("pact", hash) -> pact1qw508d6qe...
//! ```
//!
//! Hashing (rather than encoding the raw key) keeps the address format
//! stable across any future key-scheme change, and Bech32's checksum
//! catches up to four character errors — which matters when host addresses
//! get copy-pasted into configuration files.

use bech32::{Bech32, Hrp};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::config::HOST_ADDRESS_HRP;
use crate::crypto::keys::PactPublicKey;

/// Errors that can occur parsing a host address.
#[derive(Debug, Error)]
pub enum HostIdError {
    /// The Bech32 string could not be decoded.
    #[error("bech32 decode error: {0}")]
    Bech32Decode(String),

    /// The decoded address has an unexpected human-readable prefix.
    #[error("invalid HRP: expected '{expected}', got '{got}'")]
    InvalidHrp { expected: String, got: String },

    /// The decoded data has an unexpected length.
    #[error("invalid address data length: expected {expected} bytes, got {got}")]
    InvalidDataLength { expected: usize, got: usize },
}

// ---------------------------------------------------------------------------
// HostId
// ---------------------------------------------------------------------------

/// The Bech32 address of a protocol host.
///
/// Internally stores the validated address string; construction goes
/// through [`from_public_key`](Self::from_public_key) or
/// [`parse`](Self::parse), so an existing `HostId` is always well-formed.
///
/// # Examples
///
/// ```
/// use pact_protocol::crypto::keys::PactKeypair;
/// use pact_protocol::identity::HostId;
///
/// let kp = PactKeypair::generate();
/// let host = HostId::from_public_key(&kp.public_key());
/// assert!(host.as_str().starts_with("pact1"));
/// assert_eq!(HostId::parse(host.as_str()).unwrap(), host);
/// ```
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HostId(String);

impl HostId {
    /// Derive the address of the host owning the given public key.
    pub fn from_public_key(pk: &PactPublicKey) -> Self {
        let hash = blake3::hash(pk.as_bytes());
        let hrp = Hrp::parse(HOST_ADDRESS_HRP).expect("static HRP is valid");
        let address = bech32::encode::<Bech32>(hrp, hash.as_bytes())
            .expect("encoding a 32-byte payload should never fail");
        Self(address)
    }

    /// Parse and validate a Bech32 host address.
    ///
    /// Checks the checksum, the `pact` prefix, and the payload length.
    pub fn parse(addr: &str) -> Result<Self, HostIdError> {
        let (hrp, data) =
            bech32::decode(addr).map_err(|e| HostIdError::Bech32Decode(e.to_string()))?;

        let expected_hrp = Hrp::parse(HOST_ADDRESS_HRP).expect("static HRP is valid");
        if hrp != expected_hrp {
            return Err(HostIdError::InvalidHrp {
                expected: HOST_ADDRESS_HRP.to_string(),
                got: hrp.to_string(),
            });
        }

        if data.len() != 32 {
            return Err(HostIdError::InvalidDataLength {
                expected: 32,
                got: data.len(),
            });
        }

        Ok(Self(addr.to_string()))
    }

    /// The address as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for HostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Prefix + tail is plenty for logs; the middle 40 characters of a
        // Bech32 string carry no information a human can use.
        if self.0.len() > 16 {
            write!(f, "HostId({}..{})", &self.0[..10], &self.0[self.0.len() - 4..])
        } else {
            write!(f, "HostId({})", self.0)
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
