//! # The Agreement Protocol
//!
//! The multi-party handshake that turns a local proposal into a committed
//! transaction every participant stores. One flow run looks like this:
//!
//! ```text
//!   ┌──────────┐                                ┌──────────────┐
//!   │ Proposer │                                │ Counterparty │
//!   └────┬─────┘                                └──────┬───────┘
//!        │  build + validate + sign locally            │
//!        │                                             │
//!        │  1. Propose (consumed, produced, command)   │
//!        ├────────────────────────────────────────────►│
//!        │                                             │  re-validate,
//!        │  2. Endorse (detached signature)            │  policy check,
//!        │◄────────────────────────────────────────────┤  sign or refuse
//!        │                                             │
//!        │  3. commit(proposal, endorsements)          │
//!        ├──────────────► NOTARY                       │
//!        │                (spent-set check, sign)      │
//!        │                                             │
//!        │  4. Commit (committed transaction)          │
//!        ├────────────────────────────────────────────►│
//!        │                                             │  persist
//!        │  5. Ack                                     │
//!        │◄────────────────────────────────────────────┤
//! ```
//!
//! Step 2 repeats per counterparty when a proposal names several remote
//! signers; ordering across counterparties is not significant, only the
//! per-counterparty request/response order matters.
//!
//! ## Failure discipline
//!
//! - A refusal, malformed reply, or timeout during collection aborts the
//!   whole attempt. No partial state exists to clean up, because nothing
//!   durable is written before step 3 succeeds.
//! - The notary is never called with an incomplete endorsement set; that is
//!   a local precondition failure, not a protocol message.
//! - After the notary commits, the result fans out to every session still
//!   open; the flow reports success only once every participant has
//!   acknowledged persisting the same committed transaction.
//!
//! ## Session assumptions
//!
//! Sessions provide reliable, ordered, authenticated delivery of typed
//! messages — that is the contract, not raw sockets. [`LocalNetwork`] is
//! the in-process implementation the devnet and tests run on; a wire
//! transport would implement the same [`SessionTransport`] trait.

pub mod collector;
pub mod error;
pub mod finality;
pub mod responder;
pub mod session;

pub use collector::{RemoteSigner, SignatureCollector};
pub use error::AgreementError;
pub use finality::FinalityCoordinator;
pub use responder::{EndorsementPolicy, IouEndorsementPolicy, Responder};
pub use session::{
    IncomingSession, LocalEndpoint, LocalNetwork, Session, SessionError, SessionMessage,
    SessionTransport,
};
