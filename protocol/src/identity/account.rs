//! # Accounts and One-Time Keys
//!
//! An account is a named party living on a host. Accounts never sign with a
//! long-term key: for every record an account participates in, its host
//! mints a fresh Ed25519 keypair and hands out only the public half. A
//! ledger observer therefore cannot link two records to the same account by
//! key inspection alone.
//!
//! The [`KeyRing`] is where those one-time secrets live. It stays on the
//! owning host; everything that crosses a session or lands in a record is a
//! public key.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use pact_contracts::PartyRef;

use crate::crypto::keys::{PactKeypair, PactPublicKey, PactSignature};
use crate::identity::host::HostId;

// ---------------------------------------------------------------------------
// AccountInfo
// ---------------------------------------------------------------------------

/// Directory entry for an account: its name, its stable identifier, and the
/// host that owns it. Carries no key material — keys are per-transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountInfo {
    /// Human-readable account name, unique within the directory.
    pub name: String,
    /// Stable account identifier.
    pub account_id: Uuid,
    /// The host that owns this account and mints its keys.
    pub host: HostId,
}

// ---------------------------------------------------------------------------
// AccountRef
// ---------------------------------------------------------------------------

/// A fully resolved participant for one transaction: the owning host, the
/// stable account id, and a one-time public key minted for this record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRef {
    /// The host that owns the account (and holds the key's secret half).
    pub host: HostId,
    /// Stable account identifier.
    pub account_id: Uuid,
    /// One-time public key naming this account in exactly one record.
    pub key: PactPublicKey,
}

impl AccountRef {
    /// The contract-level view of this participant (account id + hex key).
    pub fn to_party(&self) -> PartyRef {
        PartyRef::new(self.account_id, self.key.to_hex())
    }
}

// ---------------------------------------------------------------------------
// KeyRing
// ---------------------------------------------------------------------------

/// Per-host store of one-time account keypairs.
///
/// `mint` generates a keypair for an account and returns the public half;
/// the secret half never leaves the ring. When a proposal arrives naming
/// one of our keys as a required signer, [`sign_with`](Self::sign_with)
/// produces the endorsement signature.
///
/// Thread-safe: backed by lock-free concurrent maps, shareable via `Arc`.
#[derive(Default)]
pub struct KeyRing {
    /// hex(public key) -> keypair.
    keys: DashMap<String, PactKeypair>,
    /// account id -> hex keys minted for it, in mint order.
    by_account: DashMap<Uuid, Vec<String>>,
}

impl KeyRing {
    /// Creates an empty key ring.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint a fresh one-time keypair for an account and return the public key.
    pub fn mint(&self, account_id: Uuid) -> PactPublicKey {
        let kp = PactKeypair::generate();
        let public = kp.public_key();
        let hex_key = public.to_hex();
        self.keys.insert(hex_key.clone(), kp);
        self.by_account.entry(account_id).or_default().push(hex_key);
        public
    }

    /// Returns `true` if the ring holds the secret for the given hex key.
    pub fn holds(&self, hex_key: &str) -> bool {
        self.keys.contains_key(hex_key)
    }

    /// Sign a message with the keypair behind the given hex public key.
    ///
    /// Returns `None` if this ring never minted that key — the caller is
    /// being asked to sign as somebody it is not.
    pub fn sign_with(&self, hex_key: &str, message: &[u8]) -> Option<PactSignature> {
        self.keys.get(hex_key).map(|kp| kp.sign(message))
    }

    /// Of the given required signer keys, the first one this ring holds.
    ///
    /// A proposal names its required signers by key; a host endorses with
    /// whichever of those keys it minted. In the two-party IOU domain there
    /// is exactly one per host.
    pub fn first_held<'a, I>(&self, required: I) -> Option<String>
    where
        I: IntoIterator<Item = &'a String>,
    {
        required
            .into_iter()
            .find(|k| self.holds(k))
            .cloned()
    }

    /// Number of keys minted so far.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Returns `true` if no keys have been minted.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
