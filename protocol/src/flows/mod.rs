//! # Flows — the User-Facing State Machines
//!
//! A flow is one end-to-end run of the agreement protocol. Every
//! transaction flow walks the same strict sequence:
//!
//! ```text
//! Build -> LocalValidate -> LocalSign -> CollectSignatures -> Finalize
//!                                                               |
//!                                           Committed <---------+--------> Aborted
//! ```
//!
//! No state is skipped and no backward transition exists. `Aborted` is
//! reachable from any non-terminal state and carries the originating error;
//! `Committed` is reached only from `Finalize` and carries the committed
//! record plus its assigned version reference.
//!
//! Three concrete flows exist:
//!
//! - [`IssueFlow`] — create a new IOU record (CREATE, zero consumed states).
//! - [`AcceptFlow`] — accept an existing IOU (UPDATE, consumes the CREATED
//!   version, produces the ACCEPTED one).
//! - [`QueryFlow`] — a read-only projection over the vault; not a
//!   transaction flow at all, it never opens a session or touches the notary.
//!
//! Each flow instance is an independent task. Dropping one before finality
//! leaves no trace: endorsements already collected are discarded and no
//! vault anywhere has been written.

pub mod accept;
pub mod issue;
pub mod query;

pub use accept::{AcceptFlow, AcceptRequest};
pub use issue::{IssueFlow, IssueRequest};
pub use query::{QueryFlow, QueryRequest};

use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use pact_contracts::IouRecord;

use crate::identity::account::KeyRing;
use crate::identity::directory::AccountDirectory;
use crate::identity::host::HostId;
use crate::ledger::vault::{LedgerStore, StateRef};
use crate::notary::Arbiter;

use crate::agreement::session::SessionTransport;

// ---------------------------------------------------------------------------
// FlowState
// ---------------------------------------------------------------------------

/// The states of a transaction flow, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowState {
    /// Assembling the proposal from resolved inputs.
    Build,
    /// Running contract validation locally, before anyone else sees it.
    LocalValidate,
    /// Producing the proposer's own endorsement.
    LocalSign,
    /// Gathering endorsements from remote required signers.
    CollectSignatures,
    /// Submitting to the notary and fanning out the result.
    Finalize,
    /// Terminal: committed, all participants notified.
    Committed,
    /// Terminal: failed with the originating error.
    Aborted,
}

impl FlowState {
    fn order(self) -> u8 {
        match self {
            Self::Build => 0,
            Self::LocalValidate => 1,
            Self::LocalSign => 2,
            Self::CollectSignatures => 3,
            Self::Finalize => 4,
            Self::Committed => 5,
            Self::Aborted => 5,
        }
    }

    /// `true` for `Committed` and `Aborted`.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Committed | Self::Aborted)
    }
}

impl std::fmt::Display for FlowState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Build => "BUILD",
            Self::LocalValidate => "LOCAL_VALIDATE",
            Self::LocalSign => "LOCAL_SIGN",
            Self::CollectSignatures => "COLLECT_SIGNATURES",
            Self::Finalize => "FINALIZE",
            Self::Committed => "COMMITTED",
            Self::Aborted => "ABORTED",
        };
        write!(f, "{}", name)
    }
}

// ---------------------------------------------------------------------------
// FlowProgress
// ---------------------------------------------------------------------------

/// Tracks one flow instance through its states, emitting a tracing event
/// per transition.
pub struct FlowProgress {
    flow_id: Uuid,
    kind: &'static str,
    state: FlowState,
}

impl FlowProgress {
    /// Starts a new flow in `Build`.
    pub fn start(kind: &'static str) -> Self {
        let flow_id = Uuid::new_v4();
        tracing::info!(flow = kind, %flow_id, state = %FlowState::Build, "flow started");
        Self {
            flow_id,
            kind,
            state: FlowState::Build,
        }
    }

    /// The flow instance id (for log correlation).
    pub fn flow_id(&self) -> Uuid {
        self.flow_id
    }

    /// The current state.
    pub fn state(&self) -> FlowState {
        self.state
    }

    /// Advance to the next state.
    ///
    /// # Panics
    ///
    /// Panics on a backward or skipping transition — flows are straight
    /// lines, and breaking the sequence is a bug in the flow itself, not a
    /// runtime condition.
    pub fn advance(&mut self, next: FlowState) {
        assert!(
            !self.state.is_terminal(),
            "flow {} already terminal in {}",
            self.flow_id,
            self.state
        );
        assert!(
            next == FlowState::Aborted || next.order() == self.state.order() + 1,
            "illegal flow transition {} -> {}",
            self.state,
            next
        );
        tracing::debug!(flow = self.kind, flow_id = %self.flow_id, state = %next, "flow transition");
        self.state = next;
    }
}

// ---------------------------------------------------------------------------
// FlowContext & outcome
// ---------------------------------------------------------------------------

/// The capability bundle a flow runs against.
///
/// Everything is a trait object behind `Arc`: flows never know which
/// directory, vault, transport, or arbiter implementation they are wired to.
#[derive(Clone)]
pub struct FlowContext {
    /// The host this flow runs on.
    pub our_host: HostId,
    /// Account name resolution and key minting.
    pub directory: Arc<dyn AccountDirectory>,
    /// This host's one-time signing keys.
    pub keyring: Arc<KeyRing>,
    /// This host's durable record store.
    pub vault: Arc<dyn LedgerStore>,
    /// Session transport to other hosts.
    pub transport: Arc<dyn SessionTransport>,
    /// The finality arbiter.
    pub arbiter: Arc<dyn Arbiter>,
    /// Bound on each counterparty round trip.
    pub timeout: Duration,
}

/// The successful outcome of a transaction flow.
#[derive(Debug, Clone)]
pub struct FlowCommit {
    /// The committed record version's content.
    pub record: IouRecord,
    /// The version reference assigned at commitment.
    pub version: StateRef,
    /// The committing transaction's id.
    pub tx_id: String,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
