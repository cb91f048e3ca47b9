//! Error taxonomy for the agreement protocol.
//!
//! Every failure a flow can surface is one of these variants, and every one
//! of them reaches the caller as a typed result — nothing is swallowed, and
//! nothing is retried behind the caller's back. Retry policy belongs to the
//! caller: blindly resubmitting after a double spend would just replay a
//! stale proposal.

use thiserror::Error;

use pact_contracts::ViolationList;

use crate::identity::directory::DirectoryError;
use crate::ledger::vault::{StateRef, StoreError};

use super::session::SessionError;

/// Errors surfaced by flows and the agreement machinery beneath them.
#[derive(Debug, Error)]
pub enum AgreementError {
    /// One or more contract predicates failed. Recoverable: build a
    /// corrected proposal and try again.
    #[error(transparent)]
    Validation(#[from] ViolationList),

    /// A counterparty declined to endorse. Terminal for this attempt.
    #[error("endorsement refused by {signer}: {reason}")]
    EndorsementRefused { signer: String, reason: String },

    /// The notary saw a consumed input that was already spent. Terminal —
    /// re-query current state before retrying with fresh inputs.
    #[error("double spend: input {conflicting} was already consumed")]
    DoubleSpend { conflicting: StateRef },

    /// A counterparty did not answer within the caller-supplied bound.
    /// Safe to retry: nothing was committed.
    #[error("timed out after {elapsed_ms}ms (bound {timeout_ms}ms)")]
    Timeout { elapsed_ms: u64, timeout_ms: u64 },

    /// The account directory could not resolve a name or mint a key.
    /// Surfaced before any transaction is attempted.
    #[error("account resolution failed: {0}")]
    Resolution(String),

    /// The vault lookup backing a flow found no usable record (or an
    /// ambiguous set of them).
    #[error("record lookup failed: {0}")]
    RecordLookup(String),

    /// A required signer has no endorsement at finality time. This is a
    /// local programming error — the notary is never consulted.
    #[error("missing endorsement for required signer {signer}")]
    MissingEndorsement { signer: String },

    /// An endorsement is present but its signature does not cover this
    /// proposal's bytes.
    #[error("invalid endorsement from signer {signer}")]
    InvalidEndorsement { signer: String },

    /// This host holds no key named in the proposal's required signers, so
    /// it cannot produce the proposer-side signature.
    #[error("no key held by this host is named as a required signer")]
    NoLocalSigner,

    /// A session failed: peer unknown, channel closed, or an out-of-protocol
    /// message arrived.
    #[error("session error: {0}")]
    Session(String),

    /// The durable store failed.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),
}

impl From<DirectoryError> for AgreementError {
    fn from(e: DirectoryError) -> Self {
        AgreementError::Resolution(e.to_string())
    }
}

impl From<SessionError> for AgreementError {
    fn from(e: SessionError) -> Self {
        AgreementError::Session(e.to_string())
    }
}
