//! # The Responder — the Counterparty Side of a Session
//!
//! When a proposal arrives, the responder decides independently whether to
//! endorse it. Independence is the whole point: the proposer's validation
//! is a courtesy, the responder's is a defense. The checks, in order:
//!
//! 1. The proposal id matches its content (nobody slipped bytes in transit).
//! 2. Contract validation passes — the same pure rule set the proposer ran.
//! 3. The flow-specific [`EndorsementPolicy`] accepts what is being
//!    attested. For an IOU transition this is where "I will only sign an
//!    acceptance whose produced status is literally `IOU_ACCEPTED`" lives.
//! 4. One of the required signer keys was minted by this host — otherwise
//!    we are being asked to sign as somebody we are not.
//!
//! Any failure terminates the session with an explicit [`Refuse`] carrying
//! the reason. On success the responder signs, returns the endorsement, and
//! stays on the line for the finality message; only a verified committed
//! transaction is persisted to the vault.
//!
//! [`Refuse`]: super::session::SessionMessage::Refuse

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use pact_contracts::{CommandKind, RecordStatus};

use crate::config::RESPONDER_COMMIT_TIMEOUT;
use crate::crypto::keys::PactPublicKey;
use crate::identity::account::KeyRing;
use crate::ledger::endorsement::Endorsement;
use crate::ledger::proposal::Proposal;
use crate::ledger::vault::LedgerStore;

use super::session::{IncomingSession, Session, SessionMessage};

// ---------------------------------------------------------------------------
// EndorsementPolicy
// ---------------------------------------------------------------------------

/// What a counterparty is willing to attest, beyond contract validity.
///
/// The contract says whether a transition is *legal*; the policy says
/// whether this host will put its signature on it. Injected so tests (and
/// future flows) can swap in stricter or deliberately hostile policies.
pub trait EndorsementPolicy: Send + Sync {
    /// Returns `Err(reason)` to refuse endorsement.
    fn check(&self, proposal: &Proposal) -> Result<(), String>;
}

/// The standard IOU policy.
///
/// - `CREATE`: the produced record must be a freshly issued `IOU_CREATED`.
/// - `UPDATE`: the produced record's status must be exactly `IOU_ACCEPTED` —
///   an acceptance is the only transition this host will countersign, and
///   any other produced status is rejected outright.
pub struct IouEndorsementPolicy;

impl EndorsementPolicy for IouEndorsementPolicy {
    fn check(&self, proposal: &Proposal) -> Result<(), String> {
        let Some(produced) = proposal.produced.first() else {
            return Err("proposal produces no record".to_string());
        };
        match proposal.command {
            CommandKind::Create => {
                if produced.status != RecordStatus::Created {
                    return Err(format!(
                        "refusing to endorse issuance with status {}",
                        produced.status
                    ));
                }
            }
            CommandKind::Update => {
                if produced.status != RecordStatus::Accepted {
                    return Err(format!(
                        "refusing to endorse update: produced status is {}, not {}",
                        produced.status,
                        RecordStatus::Accepted
                    ));
                }
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Responder
// ---------------------------------------------------------------------------

/// Serves inbound sessions for one host.
pub struct Responder {
    keyring: Arc<KeyRing>,
    vault: Arc<dyn LedgerStore>,
    policy: Arc<dyn EndorsementPolicy>,
}

impl Responder {
    /// Creates a responder over a host's key ring, vault, and policy.
    pub fn new(
        keyring: Arc<KeyRing>,
        vault: Arc<dyn LedgerStore>,
        policy: Arc<dyn EndorsementPolicy>,
    ) -> Self {
        Self {
            keyring,
            vault,
            policy,
        }
    }

    /// Spawn the accept loop: one task per inbound session.
    ///
    /// The loop ends when the listener's network registration is replaced
    /// or dropped.
    pub fn spawn(self: Arc<Self>, mut listener: mpsc::Receiver<IncomingSession>) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(incoming) = listener.recv().await {
                let responder = Arc::clone(&self);
                tokio::spawn(async move {
                    let initiator = incoming.initiator.clone();
                    if let Err(reason) = responder.serve(incoming).await {
                        tracing::debug!(peer = ?initiator, %reason, "session ended without commit");
                    }
                });
            }
        })
    }

    /// Drive one inbound session to completion.
    async fn serve(&self, incoming: IncomingSession) -> Result<(), String> {
        let mut session = incoming.session;

        let first = session
            .recv_timeout(RESPONDER_COMMIT_TIMEOUT)
            .await
            .map_err(|e| e.to_string())?;
        let SessionMessage::Propose(proposal) = first else {
            return Err(format!("expected Propose, got {}", first.kind()));
        };

        match self.consider(&proposal) {
            Ok(endorsement) => {
                tracing::debug!(tx_id = %proposal.id, "endorsing proposal");
                session
                    .send(SessionMessage::Endorse(endorsement))
                    .await
                    .map_err(|e| e.to_string())?;
                self.await_finality(&mut session, &proposal).await
            }
            Err(reason) => {
                tracing::info!(tx_id = %proposal.id, %reason, "refusing to endorse");
                session
                    .send(SessionMessage::Refuse {
                        reason: reason.clone(),
                    })
                    .await
                    .ok();
                Err(reason)
            }
        }
    }

    /// The endorsement decision. Pure — no I/O, no side effects.
    fn consider(&self, proposal: &Proposal) -> Result<Endorsement, String> {
        if proposal.id != proposal.compute_id() {
            return Err("proposal id does not match its content".to_string());
        }

        proposal.validate().map_err(|v| v.to_string())?;
        self.policy.check(proposal)?;

        let our_key = self
            .keyring
            .first_held(&proposal.required_signers)
            .ok_or_else(|| "no key of this host is named as a required signer".to_string())?;

        let signature = self
            .keyring
            .sign_with(&our_key, &proposal.signable_bytes())
            .ok_or_else(|| "signing key vanished from the ring".to_string())?;
        let signer =
            PactPublicKey::from_hex(&our_key).map_err(|_| "malformed key in ring".to_string())?;

        Ok(Endorsement::new(signer, signature))
    }

    /// After endorsing: wait for the committed transaction, verify it,
    /// persist it, acknowledge.
    ///
    /// A closed session or a timeout here means the proposer aborted (or a
    /// different counterparty refused). Nothing was persisted on our side,
    /// so dropping out silently is exactly right.
    async fn await_finality(
        &self,
        session: &mut Session,
        proposal: &Proposal,
    ) -> Result<(), String> {
        let msg = session
            .recv_timeout(RESPONDER_COMMIT_TIMEOUT)
            .await
            .map_err(|e| format!("no finality message: {}", e))?;
        let SessionMessage::Commit(tx) = msg else {
            return Err(format!("expected Commit, got {}", msg.kind()));
        };

        if tx.tx_id != proposal.id {
            return Err(format!(
                "commit for transaction {} does not match endorsed proposal {}",
                tx.tx_id, proposal.id
            ));
        }
        if !tx.verify_notary() {
            return Err("notary signature does not verify".to_string());
        }
        if !tx.endorsements.is_complete() || !tx.endorsements.verify_all(&tx.proposal) {
            return Err("committed transaction carries an incomplete or invalid endorsement set"
                .to_string());
        }

        self.vault
            .persist(&tx)
            .await
            .map_err(|e| format!("persist failed: {}", e))?;
        tracing::info!(tx_id = %tx.tx_id, "committed transaction persisted");

        session.send(SessionMessage::Ack).await.ok();
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
