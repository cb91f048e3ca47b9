//! Contract validation for IOU state transitions.
//!
//! [`validate`] is the single rule set every transition must satisfy. It runs
//! three times per transaction: on the proposer before any endorsement is
//! requested (fail fast), on each counterparty before it signs, and on the
//! notary before commitment (authoritative). The function is pure — same
//! inputs, same verdict, on every machine.
//!
//! Unlike a first-failure check, validation walks *all* predicates and
//! returns the complete list of violations. A counterparty refusing to
//! endorse can then name every broken rule at once instead of drip-feeding
//! them across retries.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use uuid::Uuid;

use crate::record::{IouRecord, RecordStatus};

// ---------------------------------------------------------------------------
// CommandKind
// ---------------------------------------------------------------------------

/// Discriminant for the transition a transaction performs.
///
/// The command determines which rule set applies: `Create` issues a new
/// record from nothing, `Update` consumes exactly one prior version and
/// produces its successor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommandKind {
    /// Issue a new IOU record. Zero consumed states, one produced state.
    Create,
    /// Transition an existing record. One consumed state, one produced state.
    Update,
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create => write!(f, "CREATE"),
            Self::Update => write!(f, "UPDATE"),
        }
    }
}

// ---------------------------------------------------------------------------
// Violations
// ---------------------------------------------------------------------------

/// One failed contract predicate, named.
///
/// Each variant corresponds to exactly one rule in [`validate`]; the payload
/// carries the observed values so the failure is diagnosable without access
/// to the proposal itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum Violation {
    /// `Create` must not consume any prior state.
    #[error("no inputs may be consumed when issuing an IOU (got {got})")]
    ConsumedNotEmptyOnCreate { got: usize },

    /// Both commands produce exactly one output state.
    #[error("exactly one output state must be produced (got {got})")]
    ProducedCountNotOne { got: usize },

    /// `Update` consumes exactly one input state.
    #[error("exactly one input state must be consumed on update (got {got})")]
    ConsumedCountNotOne { got: usize },

    /// An issued record must start in `IOU_CREATED`.
    #[error("issued record must have status IOU_CREATED (got {got})")]
    StatusNotCreatedOnIssue { got: RecordStatus },

    /// An issued record must carry a positive value.
    #[error("IOU value must be positive (got {value})")]
    NonPositiveValue { value: i64 },

    /// The business identifier must survive a transition.
    #[error("record id must not change across a transition ({consumed} -> {produced})")]
    RecordIdChanged { consumed: Uuid, produced: Uuid },

    /// Only the `IOU_CREATED -> IOU_ACCEPTED` transition is legal.
    #[error("illegal status transition {from} -> {to}")]
    IllegalStatusTransition {
        from: RecordStatus,
        to: RecordStatus,
    },

    /// Every participant of the produced record must be a required signer.
    #[error("participant key {key} is not among the required signers")]
    MissingParticipantSigner { key: String },
}

/// The complete set of predicates a proposed transition failed.
///
/// Never empty: an empty violation set is `Ok(())`. Fails closed — any
/// single entry renders the transaction unconfirmable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViolationList(Vec<Violation>);

impl ViolationList {
    /// The individual violations, in rule-evaluation order.
    pub fn violations(&self) -> &[Violation] {
        &self.0
    }

    /// Number of failed predicates.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always `false` for a constructed list; present for clippy's sake.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ViolationList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "contract validation failed: ")?;
        for (i, v) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{}", v)?;
        }
        Ok(())
    }
}

impl std::error::Error for ViolationList {}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validates a proposed transition against the IOU contract.
///
/// * `consumed` — prior record versions the transaction spends.
/// * `produced` — new record versions the transaction creates.
/// * `command` — which rule set applies.
/// * `signers` — hex-encoded keys whose signatures the transaction requires.
///
/// Rules for [`CommandKind::Create`]:
/// 1. `consumed` is empty.
/// 2. `produced` has exactly one record.
/// 3. The produced record's status is `IOU_CREATED`.
/// 4. The produced record's value is positive.
/// 5. Both participants of the produced record appear in `signers`.
///
/// Rules for [`CommandKind::Update`]:
/// 1. `consumed` has exactly one record.
/// 2. `produced` has exactly one record.
/// 3. The `record_id` is unchanged.
/// 4. The status transition is `IOU_CREATED -> IOU_ACCEPTED`; no other
///    pairing is legal.
/// 5. Both participants of the produced record appear in `signers`.
///
/// All failed predicates are collected; the result is `Err` with the full
/// list if any rule failed.
// TODO: decide whether a zero-value IOU should ever be issuable. Rule 4
// rejects it today; relaxing to `>= 0` is a one-line change once the
// product question is answered.
pub fn validate(
    consumed: &[IouRecord],
    produced: &[IouRecord],
    command: CommandKind,
    signers: &BTreeSet<String>,
) -> Result<(), ViolationList> {
    let mut violations = Vec::new();

    if produced.len() != 1 {
        violations.push(Violation::ProducedCountNotOne {
            got: produced.len(),
        });
    }

    match command {
        CommandKind::Create => {
            if !consumed.is_empty() {
                violations.push(Violation::ConsumedNotEmptyOnCreate {
                    got: consumed.len(),
                });
            }
            if let [record] = produced {
                if record.status != RecordStatus::Created {
                    violations.push(Violation::StatusNotCreatedOnIssue { got: record.status });
                }
                if record.value <= 0 {
                    violations.push(Violation::NonPositiveValue {
                        value: record.value,
                    });
                }
                check_participant_signers(record, signers, &mut violations);
            }
        }
        CommandKind::Update => {
            if consumed.len() != 1 {
                violations.push(Violation::ConsumedCountNotOne {
                    got: consumed.len(),
                });
            }
            if let ([input], [output]) = (consumed, produced) {
                if input.record_id != output.record_id {
                    violations.push(Violation::RecordIdChanged {
                        consumed: input.record_id,
                        produced: output.record_id,
                    });
                }
                if !(input.status == RecordStatus::Created
                    && output.status == RecordStatus::Accepted)
                {
                    violations.push(Violation::IllegalStatusTransition {
                        from: input.status,
                        to: output.status,
                    });
                }
                check_participant_signers(output, signers, &mut violations);
            }
        }
    }

    if violations.is_empty() {
        Ok(())
    } else {
        Err(ViolationList(violations))
    }
}

/// Pushes a violation for every participant key missing from the signer set.
fn check_participant_signers(
    record: &IouRecord,
    signers: &BTreeSet<String>,
    violations: &mut Vec<Violation>,
) {
    for key in record.participants() {
        if !signers.contains(key) {
            violations.push(Violation::MissingParticipantSigner {
                key: key.to_string(),
            });
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
