//! # Committed Transactions
//!
//! A [`CommittedTransaction`] is what a proposal becomes after the notary
//! accepts it: the proposal itself, the complete endorsement set, the
//! notary's own signature, and a commitment timestamp. At this point — and
//! only at this point — the produced records acquire their [`StateRef`]s
//! and may enter vaults.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::crypto::keys::{PactPublicKey, PactSignature};
use crate::ledger::endorsement::EndorsementSet;
use crate::ledger::proposal::Proposal;
use crate::ledger::vault::{StateRef, VersionedRecord};

/// A proposal the notary has committed.
///
/// This is the unit finality distributes: every participant persists the
/// same `CommittedTransaction`, so every vault observes the same consumed
/// inputs and the same fresh outputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommittedTransaction {
    /// Transaction identifier — equal to the proposal id.
    pub tx_id: String,

    /// The committed proposal, verbatim.
    pub proposal: Proposal,

    /// One valid endorsement per required signer.
    pub endorsements: EndorsementSet,

    /// The notary's public key.
    pub notary_key: PactPublicKey,

    /// The notary's signature over the proposal's signable bytes.
    pub notary_signature: PactSignature,

    /// When the notary committed, in UTC.
    pub committed_at: DateTime<Utc>,
}

impl CommittedTransaction {
    /// The produced records with their assigned state references.
    ///
    /// Output `i` of transaction `t` gets `StateRef { tx_id: t, index: i }`
    /// and starts unconsumed.
    pub fn outputs(&self) -> Vec<VersionedRecord> {
        self.proposal
            .produced
            .iter()
            .enumerate()
            .map(|(index, record)| VersionedRecord {
                state_ref: StateRef::new(self.tx_id.clone(), index as u32),
                record: record.clone(),
                consumed: false,
            })
            .collect()
    }

    /// The consumed inputs, as the proposal described them.
    pub fn inputs(&self) -> &[VersionedRecord] {
        &self.proposal.consumed
    }

    /// Verify the notary's signature over the proposal.
    pub fn verify_notary(&self) -> bool {
        self.notary_key
            .verify(&self.proposal.signable_bytes(), &self.notary_signature)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::keys::PactKeypair;
    use crate::identity::HostId;
    use crate::ledger::endorsement::Endorsement;
    use crate::ledger::proposal::ProposalBuilder;
    use crate::ledger::vault::{LedgerStore, MemoryVault, RecordFilter};
    use pact_contracts::{CommandKind, IouRecord, PartyRef, RecordStatus};
    use uuid::Uuid;

    fn committed_issue() -> (CommittedTransaction, Uuid) {
        let lender = PactKeypair::generate();
        let borrower = PactKeypair::generate();
        let notary = PactKeypair::generate();
        let owner = Uuid::new_v4();

        let record = IouRecord::new(
            75,
            PartyRef::new(Uuid::new_v4(), lender.public_key().to_hex()),
            PartyRef::new(Uuid::new_v4(), borrower.public_key().to_hex()),
            Uuid::new_v4(),
            owner,
        );
        let proposal = ProposalBuilder::new(CommandKind::Create)
            .produce(record)
            .require_signer(lender.public_key().to_hex())
            .require_signer(borrower.public_key().to_hex())
            .notary(HostId::from_public_key(&notary.public_key()))
            .build();

        let mut endorsements = EndorsementSet::for_signers(proposal.required_signers.clone());
        endorsements
            .insert(Endorsement::over(&proposal, &lender))
            .unwrap();
        endorsements
            .insert(Endorsement::over(&proposal, &borrower))
            .unwrap();

        let notary_signature = notary.sign(&proposal.signable_bytes());
        let tx = CommittedTransaction {
            tx_id: proposal.id.clone(),
            proposal,
            endorsements,
            notary_key: notary.public_key(),
            notary_signature,
            committed_at: Utc::now(),
        };
        (tx, owner)
    }

    #[test]
    fn outputs_get_sequential_state_refs() {
        let (tx, _) = committed_issue();
        let outputs = tx.outputs();
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].state_ref, StateRef::new(tx.tx_id.clone(), 0));
        assert!(!outputs[0].consumed);
    }

    #[test]
    fn notary_signature_verifies() {
        let (tx, _) = committed_issue();
        assert!(tx.verify_notary());
    }

    #[test]
    fn tampered_transaction_fails_notary_check() {
        let (mut tx, _) = committed_issue();
        tx.proposal.created_at += 1;
        assert!(!tx.verify_notary());
    }

    #[tokio::test]
    async fn persist_makes_outputs_queryable() {
        let (tx, owner) = committed_issue();
        let vault = MemoryVault::new();

        vault.persist(&tx).await.unwrap();

        let found = vault.find(&RecordFilter::owned_by(owner)).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].record.status, RecordStatus::Created);
        assert_eq!(found[0].state_ref.tx_id, tx.tx_id);
    }

    #[tokio::test]
    async fn persist_is_idempotent_per_tx_id() {
        let (tx, owner) = committed_issue();
        let vault = MemoryVault::new();

        vault.persist(&tx).await.unwrap();
        vault.persist(&tx).await.unwrap();

        let found = vault.find(&RecordFilter::owned_by(owner)).await.unwrap();
        assert_eq!(found.len(), 1, "replaying a tx must not duplicate outputs");
    }

    #[tokio::test]
    async fn serde_roundtrip_preserves_verification() {
        let (tx, _) = committed_issue();
        let json = serde_json::to_string(&tx).unwrap();
        let back: CommittedTransaction = serde_json::from_str(&json).unwrap();
        assert_eq!(back, tx);
        assert!(back.verify_notary());
        assert!(back.endorsements.verify_all(&back.proposal));
    }
}
