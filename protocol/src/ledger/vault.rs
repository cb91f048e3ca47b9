//! # The Vault — Per-Host Record Storage
//!
//! Every host keeps its own vault of record versions it has witnessed.
//! A version enters the vault exactly once — inside finality, after the
//! notary has committed the transaction — and is never deleted: a consumed
//! version stays queryable as history with its `consumed` flag set.
//!
//! The protocol depends only on the [`LedgerStore`] capability (find +
//! persist). [`MemoryVault`] is the in-memory implementation; the
//! sled-backed one lives in [`super::sled_vault`].

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

use pact_contracts::{IouRecord, RecordStatus};

use crate::ledger::transaction::CommittedTransaction;

// ---------------------------------------------------------------------------
// StateRef
// ---------------------------------------------------------------------------

/// The point-in-time identity of one committed record version.
///
/// A `StateRef` names "output `index` of transaction `tx_id`". It is the
/// identifier the notary's double-spend prevention operates on, and is
/// distinct from the business-level `record_id` that survives transitions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StateRef {
    /// Identifier of the committing transaction (hex digest).
    pub tx_id: String,
    /// Index of this output within the transaction.
    pub index: u32,
}

impl StateRef {
    /// Creates a state reference.
    pub fn new(tx_id: impl Into<String>, index: u32) -> Self {
        Self {
            tx_id: tx_id.into(),
            index,
        }
    }

    /// The canonical storage-key encoding: `"{tx_id}:{index}"`.
    pub fn encode(&self) -> String {
        format!("{}:{}", self.tx_id, self.index)
    }
}

impl fmt::Display for StateRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = self.tx_id.get(..12).unwrap_or(&self.tx_id);
        write!(f, "{}:{}", prefix, self.index)
    }
}

// ---------------------------------------------------------------------------
// VersionedRecord
// ---------------------------------------------------------------------------

/// One record version as the vault stores it: the record itself, the
/// state reference assigned at commitment, and whether a later transaction
/// has consumed it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionedRecord {
    /// Point-in-time identity of this version.
    pub state_ref: StateRef,
    /// The record content.
    pub record: IouRecord,
    /// `true` once a committed transaction has spent this version.
    pub consumed: bool,
}

// ---------------------------------------------------------------------------
// RecordFilter
// ---------------------------------------------------------------------------

/// Query filter for vault lookups.
///
/// The zero-value filter matches every *unconsumed* version; consumed
/// history is opt-in via [`including_consumed`](Self::including_consumed).
///
/// The `owner` filter is account-scoped, not owner-field-scoped: it matches
/// a version whose owning account *or* either participant account equals
/// the given id. Both parties to an IOU can query it under their own
/// account, whichever side's flow happened to index it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordFilter {
    /// Restrict to versions involving this account.
    pub owner: Option<Uuid>,
    /// Restrict to versions with this status.
    pub status: Option<RecordStatus>,
    /// Also return versions already consumed by a later transaction.
    pub include_consumed: bool,
}

impl RecordFilter {
    /// Filter by owning account.
    pub fn owned_by(owner: Uuid) -> Self {
        Self {
            owner: Some(owner),
            ..Self::default()
        }
    }

    /// Additionally filter by status.
    pub fn with_status(mut self, status: RecordStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Include consumed (historical) versions in the result.
    pub fn including_consumed(mut self) -> Self {
        self.include_consumed = true;
        self
    }

    /// Whether a stored version matches this filter.
    pub fn matches(&self, version: &VersionedRecord) -> bool {
        if !self.include_consumed && version.consumed {
            return false;
        }
        if let Some(owner) = self.owner {
            let record = &version.record;
            let involved = record.account_owner_id == owner
                || record.lender.account_id == owner
                || record.borrower.account_id == owner;
            if !involved {
                return false;
            }
        }
        if let Some(status) = self.status {
            if version.record.status != status {
                return false;
            }
        }
        true
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors surfaced by vault operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The underlying storage engine failed.
    #[error("storage backend error: {0}")]
    Backend(String),

    /// A stored value could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),
}

// ---------------------------------------------------------------------------
// LedgerStore
// ---------------------------------------------------------------------------

/// The durable record store capability.
///
/// `persist` is the *only* write path, it runs exactly once per committed
/// transaction inside finality, and it is idempotent: replaying the same
/// transaction id is a no-op. All other components are read-only.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Find record versions matching the filter, in state-reference order.
    async fn find(&self, filter: &RecordFilter) -> Result<Vec<VersionedRecord>, StoreError>;

    /// Record a committed transaction: mark its consumed inputs spent and
    /// insert its outputs as fresh unconsumed versions.
    async fn persist(&self, tx: &CommittedTransaction) -> Result<(), StoreError>;
}

// ---------------------------------------------------------------------------
// MemoryVault
// ---------------------------------------------------------------------------

/// In-memory vault for tests and ephemeral hosts.
#[derive(Default)]
pub struct MemoryVault {
    records: RwLock<HashMap<String, VersionedRecord>>,
    seen_txs: RwLock<HashSet<String>>,
}

impl MemoryVault {
    /// Creates an empty vault.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored versions (consumed included).
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Returns `true` if nothing has ever been persisted.
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

#[async_trait]
impl LedgerStore for MemoryVault {
    async fn find(&self, filter: &RecordFilter) -> Result<Vec<VersionedRecord>, StoreError> {
        let records = self.records.read();
        let mut hits: Vec<VersionedRecord> =
            records.values().filter(|v| filter.matches(v)).cloned().collect();
        hits.sort_by(|a, b| a.state_ref.cmp(&b.state_ref));
        Ok(hits)
    }

    async fn persist(&self, tx: &CommittedTransaction) -> Result<(), StoreError> {
        {
            let mut seen = self.seen_txs.write();
            if !seen.insert(tx.tx_id.clone()) {
                return Ok(()); // already applied
            }
        }

        let mut records = self.records.write();
        for input in &tx.proposal.consumed {
            records
                .entry(input.state_ref.encode())
                .and_modify(|v| v.consumed = true)
                .or_insert_with(|| VersionedRecord {
                    consumed: true,
                    ..input.clone()
                });
        }
        for output in tx.outputs() {
            records.insert(output.state_ref.encode(), output);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
