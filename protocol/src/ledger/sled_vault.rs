//! # SledVault — Durable Record Storage
//!
//! The persistent vault implementation, built on sled's embedded key-value
//! store. Layout:
//!
//! | Tree           | Key                      | Value                          |
//! |----------------|--------------------------|--------------------------------|
//! | `records`      | `"{tx_id}:{index}"`      | `bincode(VersionedRecord)`     |
//! | `transactions` | `tx_id` (hex bytes)      | `bincode(CommittedTransaction)`|
//!
//! ## Atomicity
//!
//! One commit touches several record keys (consumed inputs flip to spent,
//! outputs appear). Those updates go through a single sled `Batch`, so they
//! land together or not at all. The transaction marker is written after the
//! batch; because [`persist`](crate::ledger::LedgerStore::persist) is
//! idempotent per transaction id, a crash between the two simply replays
//! the same batch on recovery.

use async_trait::async_trait;
use sled::{Batch, Db, Tree};
use std::path::Path;

use crate::ledger::transaction::CommittedTransaction;
use crate::ledger::vault::{LedgerStore, RecordFilter, StoreError, VersionedRecord};

impl From<sled::Error> for StoreError {
    fn from(e: sled::Error) -> Self {
        StoreError::Backend(e.to_string())
    }
}

/// Persistent vault backed by sled.
///
/// sled trees support lock-free concurrent reads and serialized writes, so
/// a `SledVault` can be shared across tasks via `Arc` without external
/// locking.
#[derive(Debug, Clone)]
pub struct SledVault {
    db: Db,
    records: Tree,
    transactions: Tree,
}

impl SledVault {
    /// Open or create a vault at the given filesystem path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    /// Open a temporary vault that vanishes on drop. For tests.
    pub fn open_temporary() -> Result<Self, StoreError> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db)
    }

    fn from_db(db: Db) -> Result<Self, StoreError> {
        let records = db.open_tree("records")?;
        let transactions = db.open_tree("transactions")?;
        Ok(Self {
            db,
            records,
            transactions,
        })
    }

    /// Fetch a committed transaction by id.
    pub fn transaction(&self, tx_id: &str) -> Result<Option<CommittedTransaction>, StoreError> {
        match self.transactions.get(tx_id.as_bytes())? {
            Some(bytes) => {
                let tx = bincode::deserialize(&bytes)
                    .map_err(|e| StoreError::Serialization(e.to_string()))?;
                Ok(Some(tx))
            }
            None => Ok(None),
        }
    }

    /// Number of stored record versions (consumed included).
    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    /// Flush pending writes to disk. Mostly useful before process exit.
    pub fn flush(&self) -> Result<(), StoreError> {
        self.db.flush()?;
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for SledVault {
    async fn find(&self, filter: &RecordFilter) -> Result<Vec<VersionedRecord>, StoreError> {
        let mut hits = Vec::new();
        for entry in self.records.iter() {
            let (_, value) = entry?;
            let version: VersionedRecord = bincode::deserialize(&value)
                .map_err(|e| StoreError::Serialization(e.to_string()))?;
            if filter.matches(&version) {
                hits.push(version);
            }
        }
        // Key order is lexicographic; StateRef order is numeric on the
        // output index. Sort decoded so both vault implementations agree.
        hits.sort_by(|a, b| a.state_ref.cmp(&b.state_ref));
        Ok(hits)
    }

    async fn persist(&self, tx: &CommittedTransaction) -> Result<(), StoreError> {
        if self.transactions.contains_key(tx.tx_id.as_bytes())? {
            return Ok(()); // already applied
        }

        let mut batch = Batch::default();
        for input in tx.inputs() {
            let spent = VersionedRecord {
                consumed: true,
                ..input.clone()
            };
            let bytes = bincode::serialize(&spent)
                .map_err(|e| StoreError::Serialization(e.to_string()))?;
            batch.insert(input.state_ref.encode().as_bytes(), bytes);
        }
        for output in tx.outputs() {
            let bytes = bincode::serialize(&output)
                .map_err(|e| StoreError::Serialization(e.to_string()))?;
            batch.insert(output.state_ref.encode().as_bytes(), bytes);
        }
        self.records.apply_batch(batch)?;

        let tx_bytes =
            bincode::serialize(tx).map_err(|e| StoreError::Serialization(e.to_string()))?;
        self.transactions.insert(tx.tx_id.as_bytes(), tx_bytes)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
