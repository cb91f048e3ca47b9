//! # Identity Module
//!
//! Identity in PACT is two-tiered:
//!
//! 1. **Hosts** — the node-level parties that run the protocol. A host has a
//!    long-term Ed25519 keypair and a Bech32 address ([`HostId`]) derived
//!    from it. Hosts open sessions, endorse proposals, and store records.
//! 2. **Accounts** — the user-level parties that own IOUs. An account lives
//!    on exactly one host and never exposes a long-term key: every record it
//!    participates in names a fresh one-time key minted by its host.
//!
//! The mapping between the two — which host owns which account, and which
//! one-time key belongs to whom — is the business of the account directory,
//! modeled as an injected capability ([`AccountDirectory`]) so the core
//! never hard-wires a particular directory implementation.
//!
//! ## Design Decisions
//!
//! - Ed25519 keys, Bech32 host addresses (`pact1...`) over a BLAKE3 key
//!   hash: checksummed, recognizable, hard to fat-finger.
//! - One-time account keys are minted and held by the owning host's
//!   [`KeyRing`]. Secrets never leave the host; only public halves travel.

pub mod account;
pub mod directory;
pub mod host;

pub use account::{AccountInfo, AccountRef, KeyRing};
pub use directory::{AccountDirectory, DirectoryError, InMemoryDirectory};
pub use host::{HostId, HostIdError};
