//! # Endorsements — Detached Signatures over a Proposal
//!
//! An endorsement is one required signer's detached Ed25519 signature over
//! a proposal's canonical bytes. Collection is complete when every entry in
//! the proposal's `required_signers` set has exactly one valid endorsement.
//!
//! The [`EndorsementSet`] is strict about what it accepts: a signer that
//! the proposal never named is rejected, and so is a second endorsement
//! from the same key. Signature *validity* is the caller's job (it needs
//! the proposal bytes); set membership is enforced here.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

use crate::crypto::keys::{PactKeypair, PactPublicKey, PactSignature};
use crate::ledger::proposal::Proposal;

// ---------------------------------------------------------------------------
// Endorsement
// ---------------------------------------------------------------------------

/// One signer's detached signature over a proposal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endorsement {
    /// The endorsing public key.
    pub signer: PactPublicKey,
    /// Ed25519 signature over the proposal's signable bytes.
    pub signature: PactSignature,
}

impl Endorsement {
    /// Creates an endorsement from its parts.
    pub fn new(signer: PactPublicKey, signature: PactSignature) -> Self {
        Self { signer, signature }
    }

    /// Sign a proposal with the given keypair.
    pub fn over(proposal: &Proposal, keypair: &PactKeypair) -> Self {
        Self {
            signer: keypair.public_key(),
            signature: keypair.sign(&proposal.signable_bytes()),
        }
    }

    /// Verify this endorsement against a proposal.
    pub fn verify(&self, proposal: &Proposal) -> bool {
        self.signer
            .verify(&proposal.signable_bytes(), &self.signature)
    }

    /// The signer's hex key — the form `required_signers` uses.
    pub fn signer_hex(&self) -> String {
        self.signer.to_hex()
    }
}

// ---------------------------------------------------------------------------
// EndorsementSet
// ---------------------------------------------------------------------------

/// Errors from endorsement accumulation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EndorsementError {
    /// The signer is not named in the proposal's required signer set.
    #[error("unexpected signer: {0} is not a required signer")]
    UnexpectedSigner(String),

    /// This signer has already endorsed.
    #[error("duplicate endorsement from signer {0}")]
    Duplicate(String),
}

/// Accumulates endorsements keyed by signer, bounded by a required set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndorsementSet {
    required: BTreeSet<String>,
    by_signer: BTreeMap<String, Endorsement>,
}

impl EndorsementSet {
    /// Creates an empty set expecting exactly the given signers.
    pub fn for_signers(required: BTreeSet<String>) -> Self {
        Self {
            required,
            by_signer: BTreeMap::new(),
        }
    }

    /// Insert an endorsement.
    ///
    /// Rejects signers outside the required set and duplicates. Does not
    /// verify the signature — do that against the proposal before inserting.
    pub fn insert(&mut self, endorsement: Endorsement) -> Result<(), EndorsementError> {
        let key = endorsement.signer_hex();
        if !self.required.contains(&key) {
            return Err(EndorsementError::UnexpectedSigner(key));
        }
        if self.by_signer.contains_key(&key) {
            return Err(EndorsementError::Duplicate(key));
        }
        self.by_signer.insert(key, endorsement);
        Ok(())
    }

    /// The endorsement from the given hex key, if present.
    pub fn get(&self, hex_key: &str) -> Option<&Endorsement> {
        self.by_signer.get(hex_key)
    }

    /// Required signers that have not endorsed yet, in key order.
    pub fn missing(&self) -> Vec<String> {
        self.required
            .iter()
            .filter(|k| !self.by_signer.contains_key(*k))
            .cloned()
            .collect()
    }

    /// `true` when every required signer has endorsed.
    pub fn is_complete(&self) -> bool {
        self.missing().is_empty()
    }

    /// The required signer set this accumulation is bounded by.
    pub fn required(&self) -> &BTreeSet<String> {
        &self.required
    }

    /// Iterate over collected endorsements in signer-key order.
    pub fn iter(&self) -> impl Iterator<Item = &Endorsement> {
        self.by_signer.values()
    }

    /// Number of endorsements collected so far.
    pub fn len(&self) -> usize {
        self.by_signer.len()
    }

    /// `true` if no endorsement has been collected.
    pub fn is_empty(&self) -> bool {
        self.by_signer.is_empty()
    }

    /// Verify every collected endorsement against the proposal.
    pub fn verify_all(&self, proposal: &Proposal) -> bool {
        self.by_signer.values().all(|e| e.verify(proposal))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::HostId;
    use crate::ledger::proposal::ProposalBuilder;
    use pact_contracts::{CommandKind, IouRecord, PartyRef};
    use uuid::Uuid;

    fn proposal_for(keys: &[&PactKeypair]) -> Proposal {
        let record = IouRecord::new(
            100,
            PartyRef::new(Uuid::new_v4(), keys[0].public_key().to_hex()),
            PartyRef::new(Uuid::new_v4(), keys[1].public_key().to_hex()),
            Uuid::new_v4(),
            Uuid::new_v4(),
        );
        let notary = HostId::from_public_key(&PactKeypair::generate().public_key());
        let mut builder = ProposalBuilder::new(CommandKind::Create)
            .produce(record)
            .notary(notary);
        for kp in keys {
            builder = builder.require_signer(kp.public_key().to_hex());
        }
        builder.build()
    }

    #[test]
    fn endorsement_over_proposal_verifies() {
        let lender = PactKeypair::generate();
        let borrower = PactKeypair::generate();
        let proposal = proposal_for(&[&lender, &borrower]);

        let e = Endorsement::over(&proposal, &borrower);
        assert!(e.verify(&proposal));
    }

    #[test]
    fn endorsement_on_altered_proposal_fails() {
        let lender = PactKeypair::generate();
        let borrower = PactKeypair::generate();
        let proposal = proposal_for(&[&lender, &borrower]);

        let e = Endorsement::over(&proposal, &borrower);

        let mut altered = proposal.clone();
        altered.created_at += 1;
        assert!(!e.verify(&altered));
    }

    #[test]
    fn set_completes_when_all_required_sign() {
        let lender = PactKeypair::generate();
        let borrower = PactKeypair::generate();
        let proposal = proposal_for(&[&lender, &borrower]);

        let mut set = EndorsementSet::for_signers(proposal.required_signers.clone());
        assert!(!set.is_complete());
        assert_eq!(set.missing().len(), 2);

        set.insert(Endorsement::over(&proposal, &lender)).unwrap();
        assert!(!set.is_complete());

        set.insert(Endorsement::over(&proposal, &borrower)).unwrap();
        assert!(set.is_complete());
        assert!(set.missing().is_empty());
        assert!(set.verify_all(&proposal));
    }

    #[test]
    fn set_rejects_unexpected_signer() {
        let lender = PactKeypair::generate();
        let borrower = PactKeypair::generate();
        let stranger = PactKeypair::generate();
        let proposal = proposal_for(&[&lender, &borrower]);

        let mut set = EndorsementSet::for_signers(proposal.required_signers.clone());
        let err = set
            .insert(Endorsement::over(&proposal, &stranger))
            .unwrap_err();
        assert!(matches!(err, EndorsementError::UnexpectedSigner(_)));
    }

    #[test]
    fn set_rejects_duplicate_signer() {
        let lender = PactKeypair::generate();
        let borrower = PactKeypair::generate();
        let proposal = proposal_for(&[&lender, &borrower]);

        let mut set = EndorsementSet::for_signers(proposal.required_signers.clone());
        set.insert(Endorsement::over(&proposal, &lender)).unwrap();
        let err = set
            .insert(Endorsement::over(&proposal, &lender))
            .unwrap_err();
        assert!(matches!(err, EndorsementError::Duplicate(_)));
        assert_eq!(set.len(), 1);
    }
}
