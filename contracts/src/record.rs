//! The IOU record — the versioned ledger entity shared between two accounts.
//!
//! A record version is a value, not an object: once created it never changes.
//! Transitioning a record (e.g. the borrower accepting an IOU) produces a
//! fresh version carrying the same `record_id`, and the ledger marks the
//! prior version consumed. Superseded versions stay queryable as history.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// RecordStatus
// ---------------------------------------------------------------------------

/// Lifecycle status of an IOU record.
///
/// The ledger text form (`IOU_CREATED` / `IOU_ACCEPTED`) is the canonical
/// wire and storage encoding. The enum is closed: text that is not one of
/// the two known statuses fails to parse, so no third status can enter the
/// system through deserialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordStatus {
    /// Issued by the lender, awaiting the borrower's acceptance.
    #[serde(rename = "IOU_CREATED")]
    Created,
    /// Accepted by the borrower. Terminal in the current domain.
    #[serde(rename = "IOU_ACCEPTED")]
    Accepted,
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "IOU_CREATED"),
            Self::Accepted => write!(f, "IOU_ACCEPTED"),
        }
    }
}

impl FromStr for RecordStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "IOU_CREATED" => Ok(Self::Created),
            "IOU_ACCEPTED" => Ok(Self::Accepted),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// Error returned when parsing a status string that names no known status.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown record status: {0:?}")]
pub struct UnknownStatus(pub String);

// ---------------------------------------------------------------------------
// PartyRef
// ---------------------------------------------------------------------------

/// The anonymous, per-transaction identity of a participant account.
///
/// `key` is a hex-encoded Ed25519 public key minted freshly for this record
/// by the account's owning host. The account id is stable; the key is not —
/// two records involving the same account carry unrelated keys, so a ledger
/// observer cannot link them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyRef {
    /// Stable identifier of the account behind this key.
    pub account_id: Uuid,
    /// Hex-encoded one-time Ed25519 public key.
    pub key: String,
}

impl PartyRef {
    /// Creates a party reference from an account id and a hex-encoded key.
    pub fn new(account_id: Uuid, key: impl Into<String>) -> Self {
        Self {
            account_id,
            key: key.into(),
        }
    }
}

impl fmt::Display for PartyRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Key prefix only: the full 64 hex chars drown log lines.
        let prefix = self.key.get(..8).unwrap_or(&self.key);
        write!(f, "{}@{}", prefix, self.account_id)
    }
}

// ---------------------------------------------------------------------------
// IouRecord
// ---------------------------------------------------------------------------

/// One version of an IOU between a lender account and a borrower account.
///
/// `record_id` is the stable business identifier carried across status
/// transitions. It is distinct from the per-submission state reference the
/// ledger assigns when a version is committed — the former answers "which
/// IOU is this", the latter answers "which point-in-time version is this".
///
/// `account_owner_id` determines which account's vault partition indexes
/// this version for queries; the issuing flow sets it to the lender account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IouRecord {
    /// The amount owed, in the ledger's integer unit.
    pub value: i64,
    /// The party the value is owed to.
    pub lender: PartyRef,
    /// The party that owes the value.
    pub borrower: PartyRef,
    /// Current lifecycle status of this version.
    pub status: RecordStatus,
    /// Stable business identifier, carried across transitions.
    pub record_id: Uuid,
    /// Account under which this version is indexed for queries.
    pub account_owner_id: Uuid,
}

impl IouRecord {
    /// Creates the initial `Created` version of a new IOU.
    ///
    /// A fresh `record_id` is minted by the caller (the issuing flow) so the
    /// model itself stays clock- and randomness-free.
    pub fn new(
        value: i64,
        lender: PartyRef,
        borrower: PartyRef,
        record_id: Uuid,
        account_owner_id: Uuid,
    ) -> Self {
        Self {
            value,
            lender,
            borrower,
            status: RecordStatus::Created,
            record_id,
            account_owner_id,
        }
    }

    /// Returns a copy of this record with a new status.
    ///
    /// This is how transitions are expressed: the prior version is left
    /// untouched and the copy becomes the produced state of an `Update`
    /// transaction. `record_id` and all other fields are carried over.
    pub fn with_status(&self, status: RecordStatus) -> Self {
        Self {
            status,
            ..self.clone()
        }
    }

    /// The hex-encoded keys of the involved parties.
    ///
    /// Only participants' signatures are ever required for a transition of
    /// this record — the contract checks required signers against this set.
    pub fn participants(&self) -> [&str; 2] {
        [&self.lender.key, &self.borrower.key]
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
