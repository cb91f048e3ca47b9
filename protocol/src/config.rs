//! # Protocol Configuration & Constants
//!
//! Every magic number in PACT lives here. If you're hardcoding a constant
//! somewhere else, you're doing it wrong and you owe the team coffee.

use std::time::Duration;

// ---------------------------------------------------------------------------
// Protocol Version
// ---------------------------------------------------------------------------

/// Protocol fingerprint for session negotiation. Identifies the PACT
/// protocol family and build generation in one string.
pub const PROTOCOL_FINGERPRINT: &str = "ALAS-PACT-2026";

/// Major version — bump on breaking changes to the agreement protocol.
pub const PROTOCOL_VERSION_MAJOR: u16 = 0;

/// Minor version — bump on backward-compatible additions.
pub const PROTOCOL_VERSION_MINOR: u16 = 1;

/// The full version string, assembled at compile time so we don't allocate
/// for something this trivial at runtime.
pub const PROTOCOL_VERSION: &str = "0.1.0";

// ---------------------------------------------------------------------------
// Cryptographic Parameters
// ---------------------------------------------------------------------------

/// Ed25519 — deterministic signatures, 128-bit security, no k-value
/// footguns. The only signing algorithm the protocol speaks.
pub const SIGNING_ALGORITHM: &str = "Ed25519";

/// Ed25519 secret and public keys are each 32 bytes.
pub const SIGNING_KEY_LENGTH: usize = 32;

/// Ed25519 signature length. Always 64 bytes. If yours isn't, something
/// has gone terribly wrong.
pub const SIGNATURE_LENGTH: usize = 64;

/// Transaction identifiers are double-SHA-256 over the proposal's canonical
/// bytes; host addresses are BLAKE3 over the host public key.
pub const HASH_OUTPUT_LENGTH: usize = 32;

/// The human-readable Bech32 prefix for host addresses.
pub const HOST_ADDRESS_HRP: &str = "pact";

// ---------------------------------------------------------------------------
// Timing Constants
// ---------------------------------------------------------------------------

/// Default bound on any single counterparty round trip during signature
/// collection and finality fan-out. Callers can override per flow; expiry
/// aborts the attempt with a timeout error and commits nothing.
pub const DEFAULT_FLOW_TIMEOUT: Duration = Duration::from_secs(30);

/// How long a responder waits for the finality message after endorsing
/// before it gives up on the session. Generous on purpose: the proposer may
/// still be collecting other endorsements when ours is already in.
pub const RESPONDER_COMMIT_TIMEOUT: Duration = Duration::from_secs(120);

// ---------------------------------------------------------------------------
// Session Parameters
// ---------------------------------------------------------------------------

/// Per-session message buffer. Sessions carry a strict request/response
/// conversation, so a handful of slots absorbs any realistic burst.
pub const SESSION_BUFFER: usize = 8;

/// Inbound session queue per registered host. A host that falls this far
/// behind on accepting sessions is effectively down.
pub const SESSION_BACKLOG: usize = 64;

// ---------------------------------------------------------------------------
// Transaction Limits
// ---------------------------------------------------------------------------

/// Maximum number of consumed states per proposal. The IOU domain uses at
/// most one, but the wire format is bounded explicitly anyway.
pub const MAX_CONSUMED_STATES: usize = 16;

/// Maximum number of produced states per proposal.
pub const MAX_PRODUCED_STATES: usize = 16;
