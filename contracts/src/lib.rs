//! # PACT Ledger Contracts
//!
//! The state and contract model for the PACT ledger. A contract here is not
//! executable chain code — it is a pure rule set over a proposed state
//! transition: which prior record versions are consumed, which new versions
//! are produced, and whose signatures the transition requires.
//!
//! This crate is deliberately free of I/O, clocks, and key material. It
//! knows nothing about sessions, notaries, or storage — those live in
//! `pact-protocol`. Keeping the model pure means the same `validate` call
//! runs identically on the proposer, on every counterparty asked to endorse,
//! and on the notary — and a disagreement between those three runs is a bug,
//! not a feature.
//!
//! ## Design Principles
//!
//! 1. State versions are immutable. A transition produces a *new* version
//!    and marks the old one consumed; nothing is ever mutated in place.
//! 2. Status transitions are explicit: enum variants, not boolean flags.
//! 3. Validation collects *every* failed predicate, not just the first —
//!    a refused counterparty deserves the full list of reasons.
//! 4. Every public type is serializable (serde) for wire transport and
//!    persistent storage.

pub mod contract;
pub mod record;

pub use contract::{validate, CommandKind, Violation, ViolationList};
pub use record::{IouRecord, PartyRef, RecordStatus};
