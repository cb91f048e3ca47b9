//! # Proposals — Unendorsed Candidate Transitions
//!
//! A [`Proposal`] is the immutable description of a state transition before
//! anyone has signed it: which versions it consumes, which records it
//! produces, which keys must endorse it, and which notary will commit it.
//!
//! Building a proposal is a pure staging step — the builder never touches a
//! vault or opens a session. The proposer validates and signs first; only a
//! locally valid proposal is ever shown to a counterparty.
//!
//! The proposal identifier is `hex(double_sha256(signable_bytes))`, where
//! [`Proposal::signable_bytes`] is a hand-rolled deterministic encoding.
//! JSON/serde is deliberately avoided for the signing payload: field
//! ordering is not guaranteed across serialization formats, and two honest
//! parties disagreeing on bytes is how protocols die.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use pact_contracts::{validate, CommandKind, IouRecord, ViolationList};

use crate::config::{MAX_CONSUMED_STATES, MAX_PRODUCED_STATES};
use crate::crypto::hash::double_sha256;
use crate::identity::host::HostId;
use crate::ledger::vault::VersionedRecord;

// ---------------------------------------------------------------------------
// Proposal
// ---------------------------------------------------------------------------

/// An unendorsed candidate state transition.
///
/// Immutable once built. The `id` is derived from the signable bytes at
/// build time and is what every endorsement signs over — signatures and
/// endorsements never feed back into the id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    /// Proposal/transaction identifier: `hex(double_sha256(signable_bytes))`.
    pub id: String,

    /// The transition this proposal performs.
    pub command: CommandKind,

    /// Prior record versions this transition spends, with their state refs.
    pub consumed: Vec<VersionedRecord>,

    /// New record versions this transition creates. State refs are assigned
    /// only at commitment.
    pub produced: Vec<IouRecord>,

    /// Hex-encoded keys whose endorsements the transition requires.
    /// Sorted by construction (`BTreeSet`), which keeps the signable byte
    /// encoding canonical.
    pub required_signers: BTreeSet<String>,

    /// The notary that will commit this proposal.
    pub notary: HostId,

    /// Unix timestamp in milliseconds when the proposal was built.
    pub created_at: u64,
}

impl Proposal {
    /// The canonical byte encoding used for the identifier and every
    /// signature over this proposal.
    ///
    /// Deterministic concatenation with null-byte separators and
    /// little-endian fixed-width integers. Covers every field except `id`
    /// itself. Consumed states contribute their state reference *and* their
    /// record content — endorsing a spend means endorsing what is spent.
    pub fn signable_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(512);

        buf.extend_from_slice(self.command.to_string().as_bytes());
        buf.push(0x00);

        buf.extend_from_slice(self.notary.as_str().as_bytes());
        buf.push(0x00);

        buf.extend_from_slice(&(self.required_signers.len() as u32).to_le_bytes());
        for signer in &self.required_signers {
            buf.extend_from_slice(signer.as_bytes());
            buf.push(0x00);
        }

        buf.extend_from_slice(&(self.consumed.len() as u32).to_le_bytes());
        for input in &self.consumed {
            buf.extend_from_slice(input.state_ref.tx_id.as_bytes());
            buf.push(0x00);
            buf.extend_from_slice(&input.state_ref.index.to_le_bytes());
            encode_record(&mut buf, &input.record);
        }

        buf.extend_from_slice(&(self.produced.len() as u32).to_le_bytes());
        for record in &self.produced {
            encode_record(&mut buf, record);
        }

        buf.extend_from_slice(&self.created_at.to_le_bytes());
        buf
    }

    /// Computes the identifier from the current field values.
    pub fn compute_id(&self) -> String {
        hex::encode(double_sha256(&self.signable_bytes()))
    }

    /// The consumed record contents, without their versioning envelope —
    /// the shape contract validation wants.
    pub fn consumed_records(&self) -> Vec<IouRecord> {
        self.consumed.iter().map(|v| v.record.clone()).collect()
    }

    /// Run contract validation over this proposal.
    ///
    /// The same pure rule set runs on the proposer (fail fast), on every
    /// counterparty asked to endorse, and on the notary (authoritative).
    pub fn validate(&self) -> Result<(), ViolationList> {
        validate(
            &self.consumed_records(),
            &self.produced,
            self.command,
            &self.required_signers,
        )
    }
}

/// Appends the canonical encoding of one record.
fn encode_record(buf: &mut Vec<u8>, record: &IouRecord) {
    buf.extend_from_slice(&record.value.to_le_bytes());
    buf.extend_from_slice(record.lender.account_id.as_bytes());
    buf.extend_from_slice(record.lender.key.as_bytes());
    buf.push(0x00);
    buf.extend_from_slice(record.borrower.account_id.as_bytes());
    buf.extend_from_slice(record.borrower.key.as_bytes());
    buf.push(0x00);
    buf.extend_from_slice(record.status.to_string().as_bytes());
    buf.push(0x00);
    buf.extend_from_slice(record.record_id.as_bytes());
    buf.extend_from_slice(record.account_owner_id.as_bytes());
}

// ---------------------------------------------------------------------------
// ProposalBuilder
// ---------------------------------------------------------------------------

/// Fluent builder for [`Proposal`]s.
///
/// # Usage
///
/// ```rust,no_run
/// # use pact_contracts::{CommandKind, IouRecord, PartyRef};
/// # use pact_protocol::identity::HostId;
/// # use pact_protocol::ledger::ProposalBuilder;
/// # fn demo(record: IouRecord, notary: HostId) {
/// let proposal = ProposalBuilder::new(CommandKind::Create)
///     .produce(record.clone())
///     .require_signer(record.lender.key.clone())
///     .require_signer(record.borrower.key.clone())
///     .notary(notary)
///     .build();
/// # }
/// ```
///
/// `created_at` defaults to the current UTC time; override it only in tests
/// that need byte-for-byte reproducible proposals.
pub struct ProposalBuilder {
    command: CommandKind,
    consumed: Vec<VersionedRecord>,
    produced: Vec<IouRecord>,
    required_signers: BTreeSet<String>,
    notary: Option<HostId>,
    created_at: Option<u64>,
}

impl ProposalBuilder {
    /// Creates a builder for the given command.
    pub fn new(command: CommandKind) -> Self {
        Self {
            command,
            consumed: Vec::new(),
            produced: Vec::new(),
            required_signers: BTreeSet::new(),
            notary: None,
            created_at: None,
        }
    }

    /// Adds a prior version to consume.
    pub fn consume(mut self, input: VersionedRecord) -> Self {
        self.consumed.push(input);
        self
    }

    /// Adds a record to produce.
    pub fn produce(mut self, record: IouRecord) -> Self {
        self.produced.push(record);
        self
    }

    /// Adds a required signer by hex-encoded key.
    pub fn require_signer(mut self, hex_key: impl Into<String>) -> Self {
        self.required_signers.insert(hex_key.into());
        self
    }

    /// Sets the committing notary.
    pub fn notary(mut self, notary: HostId) -> Self {
        self.notary = Some(notary);
        self
    }

    /// Sets the creation timestamp explicitly (Unix milliseconds).
    pub fn created_at(mut self, timestamp: u64) -> Self {
        self.created_at = Some(timestamp);
        self
    }

    /// Consumes the builder and produces the immutable [`Proposal`].
    ///
    /// # Panics
    ///
    /// Panics if no notary was set, or if the state counts exceed the wire
    /// limits — both are construction bugs, not runtime conditions.
    pub fn build(self) -> Proposal {
        assert!(
            self.consumed.len() <= MAX_CONSUMED_STATES,
            "proposal consumes too many states"
        );
        assert!(
            self.produced.len() <= MAX_PRODUCED_STATES,
            "proposal produces too many states"
        );
        let created_at = self
            .created_at
            .unwrap_or_else(|| Utc::now().timestamp_millis() as u64);

        let mut proposal = Proposal {
            id: String::new(),
            command: self.command,
            consumed: self.consumed,
            produced: self.produced,
            required_signers: self.required_signers,
            notary: self.notary.expect("proposal requires a notary"),
            created_at,
        };
        proposal.id = proposal.compute_id();
        proposal
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::keys::PactKeypair;
    use crate::ledger::vault::StateRef;
    use pact_contracts::{PartyRef, RecordStatus};
    use uuid::Uuid;

    fn notary_host() -> HostId {
        HostId::from_public_key(&PactKeypair::from_seed(&[1u8; 32]).public_key())
    }

    fn sample_record() -> IouRecord {
        IouRecord::new(
            250,
            PartyRef::new(Uuid::nil(), "aa".repeat(32)),
            PartyRef::new(Uuid::nil(), "bb".repeat(32)),
            Uuid::nil(),
            Uuid::nil(),
        )
    }

    fn create_proposal() -> Proposal {
        let record = sample_record();
        ProposalBuilder::new(CommandKind::Create)
            .produce(record.clone())
            .require_signer(record.lender.key.clone())
            .require_signer(record.borrower.key.clone())
            .notary(notary_host())
            .created_at(1_700_000_000_000)
            .build()
    }

    #[test]
    fn builder_produces_deterministic_id() {
        let p1 = create_proposal();
        let p2 = create_proposal();
        assert_eq!(p1.id, p2.id, "same inputs must produce the same id");
        assert_eq!(p1.id.len(), 64);
        assert!(p1.id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn id_matches_compute_id() {
        let p = create_proposal();
        assert_eq!(p.id, p.compute_id());
    }

    #[test]
    fn different_timestamp_different_id() {
        let mut p = create_proposal();
        let original = p.id.clone();
        p.created_at += 1;
        assert_ne!(p.compute_id(), original);
    }

    #[test]
    fn consumed_state_content_affects_id() {
        let record = sample_record();
        let input = VersionedRecord {
            state_ref: StateRef::new("f00d", 0),
            record: record.clone(),
            consumed: false,
        };
        let base = ProposalBuilder::new(CommandKind::Update)
            .consume(input.clone())
            .produce(record.with_status(RecordStatus::Accepted))
            .require_signer(record.lender.key.clone())
            .notary(notary_host())
            .created_at(1_700_000_000_000)
            .build();

        let mut altered_input = input;
        altered_input.record.value += 1;
        let altered = ProposalBuilder::new(CommandKind::Update)
            .consume(altered_input)
            .produce(record.with_status(RecordStatus::Accepted))
            .require_signer(record.lender.key.clone())
            .notary(notary_host())
            .created_at(1_700_000_000_000)
            .build();

        assert_ne!(base.id, altered.id, "spent content must be endorsed too");
    }

    #[test]
    fn required_signer_order_is_canonical() {
        let record = sample_record();
        let ab = ProposalBuilder::new(CommandKind::Create)
            .produce(record.clone())
            .require_signer(record.lender.key.clone())
            .require_signer(record.borrower.key.clone())
            .notary(notary_host())
            .created_at(1)
            .build();
        let ba = ProposalBuilder::new(CommandKind::Create)
            .produce(record.clone())
            .require_signer(record.borrower.key.clone())
            .require_signer(record.lender.key.clone())
            .notary(notary_host())
            .created_at(1)
            .build();
        assert_eq!(ab.id, ba.id, "signer insertion order must not matter");
    }

    #[test]
    fn valid_create_proposal_validates() {
        assert!(create_proposal().validate().is_ok());
    }

    #[test]
    fn invalid_proposal_reports_violations() {
        // Create proposal with a consumed input: the issue invariant breaks.
        let record = sample_record();
        let p = ProposalBuilder::new(CommandKind::Create)
            .consume(VersionedRecord {
                state_ref: StateRef::new("dead", 0),
                record: record.clone(),
                consumed: false,
            })
            .produce(record.clone())
            .require_signer(record.lender.key.clone())
            .require_signer(record.borrower.key.clone())
            .notary(notary_host())
            .build();

        assert!(p.validate().is_err());
    }

    #[test]
    fn proposal_serde_roundtrip() {
        let p = create_proposal();
        let json = serde_json::to_string(&p).unwrap();
        let back: Proposal = serde_json::from_str(&json).unwrap();
        assert_eq!(p, back);
        assert_eq!(back.compute_id(), back.id);
    }

    #[test]
    #[should_panic(expected = "requires a notary")]
    fn build_without_notary_panics() {
        ProposalBuilder::new(CommandKind::Create)
            .produce(sample_record())
            .build();
    }
}
