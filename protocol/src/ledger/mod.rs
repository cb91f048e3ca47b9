//! # Ledger Primitives
//!
//! Everything that describes or stores a state transition:
//!
//! - **proposal** — an unendorsed candidate transition and its builder.
//! - **endorsement** — detached signatures over a proposal, accumulated
//!   per required signer.
//! - **transaction** — the committed form a proposal takes after the
//!   notary signs off, with point-in-time state references assigned.
//! - **vault** — the durable per-host record store capability and its
//!   in-memory implementation.
//! - **sled_vault** — the sled-backed durable implementation.
//!
//! A proposal is pure staging: building one touches no shared store. The
//! only component that ever writes durable state is finality, and only
//! after the notary commits.

pub mod endorsement;
pub mod proposal;
pub mod sled_vault;
pub mod transaction;
pub mod vault;

pub use endorsement::{Endorsement, EndorsementError, EndorsementSet};
pub use proposal::{Proposal, ProposalBuilder};
pub use sled_vault::SledVault;
pub use transaction::CommittedTransaction;
pub use vault::{LedgerStore, MemoryVault, RecordFilter, StateRef, StoreError, VersionedRecord};
