//! # Sessions — Typed Conversations Between Hosts
//!
//! A session is a bidirectional, ordered stream of [`SessionMessage`]s
//! between two hosts. The transport behind it is a capability
//! ([`SessionTransport`]) injected at construction; [`LocalNetwork`] is the
//! in-process implementation built on tokio channels, used by the devnet
//! node and the test suite.
//!
//! Sessions never carry private signing material. Proposals, endorsements
//! (public key + signature), committed transactions, refusals, and acks —
//! that is the entire vocabulary.

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::config::{SESSION_BACKLOG, SESSION_BUFFER};
use crate::identity::host::HostId;
use crate::ledger::endorsement::Endorsement;
use crate::ledger::proposal::Proposal;
use crate::ledger::transaction::CommittedTransaction;

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// The message vocabulary of an agreement session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SessionMessage {
    /// Proposer → counterparty: please endorse this transition.
    Propose(Proposal),
    /// Counterparty → proposer: my detached signature.
    Endorse(Endorsement),
    /// Counterparty → proposer: I will not endorse, and here is why.
    Refuse { reason: String },
    /// Proposer → counterparty: the notary committed; persist this.
    Commit(Box<CommittedTransaction>),
    /// Counterparty → proposer: persisted, we observe the same version.
    Ack,
}

impl SessionMessage {
    /// Short tag for logs and error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Propose(_) => "Propose",
            Self::Endorse(_) => "Endorse",
            Self::Refuse { .. } => "Refuse",
            Self::Commit(_) => "Commit",
            Self::Ack => "Ack",
        }
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from session establishment and use.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The target host is not registered with the transport.
    #[error("unknown host: {0}")]
    UnknownHost(HostId),

    /// The peer closed the session (or its backlog is full).
    #[error("session closed by peer")]
    Closed,

    /// No message arrived within the given bound.
    #[error("no response within {0:?}")]
    Elapsed(Duration),
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// One end of an established session.
pub struct Session {
    id: Uuid,
    peer: HostId,
    tx: mpsc::Sender<SessionMessage>,
    rx: mpsc::Receiver<SessionMessage>,
}

impl Session {
    /// The session identifier (shared by both ends).
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The host on the other end.
    pub fn peer(&self) -> &HostId {
        &self.peer
    }

    /// Send a message to the peer.
    pub async fn send(&self, msg: SessionMessage) -> Result<(), SessionError> {
        self.tx.send(msg).await.map_err(|_| SessionError::Closed)
    }

    /// Receive the next message, waiting at most `bound`.
    pub async fn recv_timeout(&mut self, bound: Duration) -> Result<SessionMessage, SessionError> {
        match tokio::time::timeout(bound, self.rx.recv()).await {
            Ok(Some(msg)) => Ok(msg),
            Ok(None) => Err(SessionError::Closed),
            Err(_) => Err(SessionError::Elapsed(bound)),
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Session({}, peer={:?})", self.id, self.peer)
    }
}

/// A session delivered to a host's inbound listener.
pub struct IncomingSession {
    /// The host that opened the session.
    pub initiator: HostId,
    /// Our end of the conversation.
    pub session: Session,
}

// ---------------------------------------------------------------------------
// Transport capability
// ---------------------------------------------------------------------------

/// The session-opening capability flows depend on.
///
/// Implementations must provide reliable, ordered, authenticated delivery —
/// the protocol's messages assume exactly that, nothing more.
#[async_trait]
pub trait SessionTransport: Send + Sync {
    /// Open a session to the given host.
    async fn open(&self, to: &HostId) -> Result<Session, SessionError>;
}

// ---------------------------------------------------------------------------
// LocalNetwork
// ---------------------------------------------------------------------------

/// In-process session transport.
///
/// Hosts register to receive inbound sessions; opening a session builds a
/// pair of bounded channels and hands the far end to the target host's
/// listener. Cheap to clone via `Arc`, safe to share across tasks.
#[derive(Default)]
pub struct LocalNetwork {
    hosts: DashMap<HostId, mpsc::Sender<IncomingSession>>,
}

impl LocalNetwork {
    /// Creates an empty network.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a host; returns the stream of sessions opened to it.
    ///
    /// Re-registering a host replaces its listener — the old receiver goes
    /// dead, which is what you want when a host restarts.
    pub fn register(&self, host: HostId) -> mpsc::Receiver<IncomingSession> {
        let (tx, rx) = mpsc::channel(SESSION_BACKLOG);
        self.hosts.insert(host, tx);
        rx
    }

    /// Open a session from `from` to `to`.
    pub async fn connect(&self, from: &HostId, to: &HostId) -> Result<Session, SessionError> {
        let listener = self
            .hosts
            .get(to)
            .map(|e| e.value().clone())
            .ok_or_else(|| SessionError::UnknownHost(to.clone()))?;

        let id = Uuid::new_v4();
        let (to_peer_tx, to_peer_rx) = mpsc::channel(SESSION_BUFFER);
        let (to_us_tx, to_us_rx) = mpsc::channel(SESSION_BUFFER);

        let their_end = Session {
            id,
            peer: from.clone(),
            tx: to_us_tx,
            rx: to_peer_rx,
        };
        listener
            .send(IncomingSession {
                initiator: from.clone(),
                session: their_end,
            })
            .await
            .map_err(|_| SessionError::Closed)?;

        Ok(Session {
            id,
            peer: to.clone(),
            tx: to_peer_tx,
            rx: to_us_rx,
        })
    }
}

/// One host's handle onto a [`LocalNetwork`].
///
/// Binds the opening host's identity so the peer always learns who called —
/// the "authenticated" part of the transport contract.
pub struct LocalEndpoint {
    host: HostId,
    network: Arc<LocalNetwork>,
}

impl LocalEndpoint {
    /// Creates an endpoint for `host` on `network`.
    pub fn new(host: HostId, network: Arc<LocalNetwork>) -> Self {
        Self { host, network }
    }
}

#[async_trait]
impl SessionTransport for LocalEndpoint {
    async fn open(&self, to: &HostId) -> Result<Session, SessionError> {
        self.network.connect(&self.host, to).await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
