//! # The Notary — Finality Arbiter
//!
//! The notary is the single serialization point of the protocol. Its
//! contract is deliberately narrow: hand it a fully endorsed proposal and
//! it either commits (signing the result) or rejects with a reason. It
//! holds no vault, runs no sessions, and knows nothing about flows.
//!
//! The one global guarantee lives here: for any consumed state reference,
//! at most one transaction ever commits. Two submissions racing over the
//! same input are totally ordered by the notary's spent-set lock — the
//! first wins, the second gets a double-spend rejection. Proposals over
//! disjoint inputs share no lock-ordering at all and commit independently.
//!
//! The notary re-runs contract validation before committing. The proposer
//! and every counterparty already validated, but the notary's run is the
//! authoritative one — it is the last gate before a transaction becomes
//! permanent.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::HashSet;
use thiserror::Error;

use pact_contracts::ViolationList;

use crate::crypto::keys::PactKeypair;
use crate::identity::host::HostId;
use crate::ledger::endorsement::EndorsementSet;
use crate::ledger::proposal::Proposal;
use crate::ledger::transaction::CommittedTransaction;
use crate::ledger::vault::StateRef;

// ---------------------------------------------------------------------------
// Rejections
// ---------------------------------------------------------------------------

/// Why the notary refused to commit.
#[derive(Debug, Error)]
pub enum NotaryRejection {
    /// Authoritative contract validation failed.
    #[error(transparent)]
    Violation(#[from] ViolationList),

    /// A consumed input was already spent by an earlier transaction.
    #[error("double spend: input {conflicting} was already consumed")]
    DoubleSpend { conflicting: StateRef },

    /// The endorsement set is missing required signers.
    #[error("incomplete endorsements: missing {missing:?}")]
    IncompleteEndorsements { missing: Vec<String> },

    /// An endorsement is present but its signature does not verify.
    #[error("invalid endorsement from signer {signer}")]
    InvalidEndorsement { signer: String },
}

// ---------------------------------------------------------------------------
// Arbiter capability
// ---------------------------------------------------------------------------

/// The finality capability the protocol depends on.
///
/// Implementations must guarantee exactly-once consumption: once a
/// transaction consuming state `s` commits, every later `commit` naming `s`
/// is rejected with [`NotaryRejection::DoubleSpend`].
#[async_trait]
pub trait Arbiter: Send + Sync {
    /// Commit a fully endorsed proposal, or reject it.
    async fn commit(
        &self,
        proposal: &Proposal,
        endorsements: &EndorsementSet,
    ) -> Result<CommittedTransaction, NotaryRejection>;

    /// The committing identity, for proposal construction.
    fn host(&self) -> &HostId;
}

// ---------------------------------------------------------------------------
// Notary
// ---------------------------------------------------------------------------

/// In-process single-writer notary.
///
/// The spent set is guarded by one mutex; the critical section is a set
/// lookup plus inserts, so contention is only ever between transactions
/// racing over the *same* inputs — exactly the case that must serialize.
pub struct Notary {
    keypair: PactKeypair,
    host: HostId,
    spent: Mutex<HashSet<StateRef>>,
}

impl Notary {
    /// Creates a notary with a fresh identity.
    pub fn new() -> Self {
        Self::with_keypair(PactKeypair::generate())
    }

    /// Creates a notary from an existing keypair.
    pub fn with_keypair(keypair: PactKeypair) -> Self {
        let host = HostId::from_public_key(&keypair.public_key());
        Self {
            keypair,
            host,
            spent: Mutex::new(HashSet::new()),
        }
    }

    /// Number of state references consumed so far.
    pub fn spent_count(&self) -> usize {
        self.spent.lock().len()
    }
}

impl Default for Notary {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Arbiter for Notary {
    async fn commit(
        &self,
        proposal: &Proposal,
        endorsements: &EndorsementSet,
    ) -> Result<CommittedTransaction, NotaryRejection> {
        // 1. Authoritative contract validation.
        proposal.validate()?;

        // 2. One valid endorsement per required signer.
        let missing = endorsements.missing();
        if !missing.is_empty() {
            return Err(NotaryRejection::IncompleteEndorsements { missing });
        }
        let bytes = proposal.signable_bytes();
        for endorsement in endorsements.iter() {
            if !endorsement.signer.verify(&bytes, &endorsement.signature) {
                return Err(NotaryRejection::InvalidEndorsement {
                    signer: endorsement.signer_hex(),
                });
            }
        }

        // 3. Atomic check-and-mark of the consumed inputs. Either every
        //    input is fresh and all get marked, or none are touched.
        {
            let mut spent = self.spent.lock();
            if let Some(conflicting) = proposal
                .consumed
                .iter()
                .find(|input| spent.contains(&input.state_ref))
            {
                tracing::warn!(
                    tx_id = %proposal.id,
                    input = %conflicting.state_ref,
                    "rejecting double spend"
                );
                return Err(NotaryRejection::DoubleSpend {
                    conflicting: conflicting.state_ref.clone(),
                });
            }
            for input in &proposal.consumed {
                spent.insert(input.state_ref.clone());
            }
        }

        // 4. Sign and commit.
        let notary_signature = self.keypair.sign(&bytes);
        tracing::info!(tx_id = %proposal.id, command = %proposal.command, "transaction committed");
        Ok(CommittedTransaction {
            tx_id: proposal.id.clone(),
            proposal: proposal.clone(),
            endorsements: endorsements.clone(),
            notary_key: self.keypair.public_key(),
            notary_signature,
            committed_at: Utc::now(),
        })
    }

    fn host(&self) -> &HostId {
        &self.host
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
