// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # PACT Protocol — Core Library
//!
//! PACT (Peer Agreement for Committed Transactions) lets independently
//! controlled accounts jointly create and transition shared IOU records.
//! Neither party can fabricate or alter a record unilaterally, and a
//! single-writer notary guarantees each record version is consumed at most
//! once — the ledger equivalent of "you can't spend the same promise twice".
//!
//! The heart of the crate is the agreement protocol: build a proposed
//! transition, validate it against the contract, sign it yourself, collect a
//! detached endorsement from every other required signer, then push the
//! fully-endorsed proposal through the notary and fan the committed result
//! out to everyone involved. Validation runs on the proposer, on every
//! counterparty, and again on the notary — three machines, one pure rule
//! set, zero room for disagreement.
//!
//! ## Architecture
//!
//! The modules mirror the layers of the protocol:
//!
//! - **crypto** — Ed25519 signing and hashing wrappers. Don't roll your own.
//! - **identity** — hosts, accounts, and the account directory capability.
//! - **ledger** — proposals, endorsements, committed transactions, vaults.
//! - **notary** — the finality arbiter and its double-spend prevention.
//! - **agreement** — sessions, signature collection, and finality fan-out.
//! - **flows** — the Issue / Accept / Query state machines users actually run.
//! - **participant** — wires one host's capabilities into a running node.
//! - **config** — protocol constants and tuning knobs.
//!
//! ## Design Philosophy
//!
//! 1. Capabilities are traits, injected at construction. The directory, the
//!    vault, the notary, and the transport are all seams, not hard wires.
//! 2. Nothing durable is written outside finality. Abandon a flow at any
//!    point before commitment and no store anywhere has changed.
//! 3. Errors are typed, propagated, and never retried behind the caller's
//!    back — retrying a double-spend blindly just replays a stale proposal.

pub mod agreement;
pub mod config;
pub mod crypto;
pub mod flows;
pub mod identity;
pub mod ledger;
pub mod notary;
pub mod participant;
