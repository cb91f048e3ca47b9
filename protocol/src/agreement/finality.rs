//! # Finality — Commitment and Fan-Out
//!
//! The last leg of a flow: hand the fully endorsed proposal to the arbiter,
//! and on commit make sure every participant's vault observes the same
//! committed version before reporting success.
//!
//! Two disciplines are enforced here:
//!
//! 1. **Precondition, not protocol**: a missing or invalid endorsement at
//!    this point is a local programming error. It is surfaced as such and
//!    the arbiter is never consulted.
//! 2. **All-or-nothing**: if the arbiter rejects, no vault anywhere is
//!    touched and the caller gets the typed rejection. If the arbiter
//!    commits, the transaction is persisted locally and pushed to every
//!    session still open from collection; success is reported only after
//!    every counterparty acknowledges.
//!
//! A counterparty that fails to acknowledge *after* commitment is a
//! distribution failure, not a rollback: the transaction is already final
//! at the notary. The flow surfaces the error so the caller knows fan-out
//! is incomplete; the committed state can be re-queried and re-shared.

use std::sync::Arc;
use std::time::Duration;

use crate::ledger::endorsement::EndorsementSet;
use crate::ledger::proposal::Proposal;
use crate::ledger::transaction::CommittedTransaction;
use crate::ledger::vault::LedgerStore;
use crate::notary::{Arbiter, NotaryRejection};

use super::error::AgreementError;
use super::session::{Session, SessionError, SessionMessage};

/// Submits endorsed proposals and distributes the committed result.
pub struct FinalityCoordinator {
    arbiter: Arc<dyn Arbiter>,
    vault: Arc<dyn LedgerStore>,
    timeout: Duration,
}

impl FinalityCoordinator {
    /// Creates a coordinator over the arbiter and the proposer's own vault.
    pub fn new(arbiter: Arc<dyn Arbiter>, vault: Arc<dyn LedgerStore>, timeout: Duration) -> Self {
        Self {
            arbiter,
            vault,
            timeout,
        }
    }

    /// Commit the proposal and fan the result out over the open sessions.
    pub async fn finalize(
        &self,
        proposal: &Proposal,
        endorsements: &EndorsementSet,
        mut sessions: Vec<Session>,
    ) -> Result<CommittedTransaction, AgreementError> {
        // Preconditions: complete and valid, before the arbiter hears of it.
        if let Some(signer) = endorsements.missing().into_iter().next() {
            return Err(AgreementError::MissingEndorsement { signer });
        }
        for endorsement in endorsements.iter() {
            if !endorsement.verify(proposal) {
                return Err(AgreementError::InvalidEndorsement {
                    signer: endorsement.signer_hex(),
                });
            }
        }

        let tx = self
            .arbiter
            .commit(proposal, endorsements)
            .await
            .map_err(map_rejection)?;

        // Our own vault first, then every counterparty still on the line.
        self.vault.persist(&tx).await?;

        for session in &mut sessions {
            session
                .send(SessionMessage::Commit(Box::new(tx.clone())))
                .await
                .map_err(|_| distribution_error(session, "session closed before delivery"))?;

            match session.recv_timeout(self.timeout).await {
                Ok(SessionMessage::Ack) => {}
                Ok(other) => {
                    return Err(distribution_error(
                        session,
                        &format!("expected Ack, got {}", other.kind()),
                    ));
                }
                Err(SessionError::Elapsed(_)) => {
                    return Err(distribution_error(session, "no Ack within bound"));
                }
                Err(e) => return Err(distribution_error(session, &e.to_string())),
            }
        }

        tracing::info!(tx_id = %tx.tx_id, sessions = sessions.len(), "finality complete");
        Ok(tx)
    }
}

fn distribution_error(session: &Session, detail: &str) -> AgreementError {
    AgreementError::Session(format!(
        "transaction committed but distribution to {:?} failed: {}",
        session.peer(),
        detail
    ))
}

fn map_rejection(rejection: NotaryRejection) -> AgreementError {
    match rejection {
        NotaryRejection::Violation(v) => AgreementError::Validation(v),
        NotaryRejection::DoubleSpend { conflicting } => {
            AgreementError::DoubleSpend { conflicting }
        }
        NotaryRejection::IncompleteEndorsements { missing } => AgreementError::MissingEndorsement {
            signer: missing.into_iter().next().unwrap_or_default(),
        },
        NotaryRejection::InvalidEndorsement { signer } => {
            AgreementError::InvalidEndorsement { signer }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
