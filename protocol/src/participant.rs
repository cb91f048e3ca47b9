//! # Participant — One Host, Fully Wired
//!
//! A [`Participant`] assembles everything a host needs to run the protocol:
//! its identity keypair, its one-time key ring, its vault, its inbound
//! responder loop, and handles to the shared directory, network, and
//! arbiter. The devnet node and the test suite both build their worlds out
//! of participants; production wiring would swap the in-process transport
//! and directory for real ones behind the same traits.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::agreement::responder::{EndorsementPolicy, IouEndorsementPolicy, Responder};
use crate::agreement::session::{LocalEndpoint, LocalNetwork, SessionTransport};
use crate::config::DEFAULT_FLOW_TIMEOUT;
use crate::crypto::keys::PactKeypair;
use crate::flows::{
    AcceptFlow, AcceptRequest, FlowCommit, FlowContext, IssueFlow, IssueRequest, QueryFlow,
    QueryRequest,
};
use crate::agreement::error::AgreementError;
use crate::identity::account::KeyRing;
use crate::identity::directory::{AccountDirectory, InMemoryDirectory};
use crate::identity::host::HostId;
use crate::ledger::vault::{LedgerStore, VersionedRecord};
use crate::notary::Arbiter;

/// One protocol host with all its capabilities wired together.
pub struct Participant {
    host: HostId,
    keypair: PactKeypair,
    keyring: Arc<KeyRing>,
    vault: Arc<dyn LedgerStore>,
    directory: Arc<InMemoryDirectory>,
    transport: Arc<dyn SessionTransport>,
    arbiter: Arc<dyn Arbiter>,
    timeout: Duration,
    responder: JoinHandle<()>,
}

impl Participant {
    /// Boot a participant with the standard IOU endorsement policy.
    pub fn spawn(
        network: Arc<LocalNetwork>,
        directory: Arc<InMemoryDirectory>,
        arbiter: Arc<dyn Arbiter>,
        vault: Arc<dyn LedgerStore>,
    ) -> Self {
        Self::spawn_with_policy(network, directory, arbiter, vault, Arc::new(IouEndorsementPolicy))
    }

    /// Boot a participant with a custom endorsement policy.
    pub fn spawn_with_policy(
        network: Arc<LocalNetwork>,
        directory: Arc<InMemoryDirectory>,
        arbiter: Arc<dyn Arbiter>,
        vault: Arc<dyn LedgerStore>,
        policy: Arc<dyn EndorsementPolicy>,
    ) -> Self {
        Self::spawn_with_keypair(
            network,
            directory,
            arbiter,
            vault,
            policy,
            PactKeypair::generate(),
        )
    }

    /// Boot a participant with an existing identity keypair.
    ///
    /// Registers the host's key ring with the directory and its session
    /// listener with the network, then starts the responder loop.
    pub fn spawn_with_keypair(
        network: Arc<LocalNetwork>,
        directory: Arc<InMemoryDirectory>,
        arbiter: Arc<dyn Arbiter>,
        vault: Arc<dyn LedgerStore>,
        policy: Arc<dyn EndorsementPolicy>,
        keypair: PactKeypair,
    ) -> Self {
        let host = HostId::from_public_key(&keypair.public_key());
        let keyring = Arc::new(KeyRing::new());

        directory.register_host(host.clone(), Arc::clone(&keyring));
        let listener = network.register(host.clone());
        let responder = Arc::new(Responder::new(
            Arc::clone(&keyring),
            Arc::clone(&vault),
            policy,
        ))
        .spawn(listener);

        let transport: Arc<dyn SessionTransport> =
            Arc::new(LocalEndpoint::new(host.clone(), network));

        tracing::info!(host = ?host, "participant online");
        Self {
            host,
            keypair,
            keyring,
            vault,
            directory,
            transport,
            arbiter,
            timeout: DEFAULT_FLOW_TIMEOUT,
            responder,
        }
    }

    /// Override the per-round-trip timeout for flows run by this participant.
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    /// This host's address.
    pub fn host(&self) -> &HostId {
        &self.host
    }

    /// This host's identity keypair.
    pub fn keypair(&self) -> &PactKeypair {
        &self.keypair
    }

    /// This host's vault.
    pub fn vault(&self) -> &Arc<dyn LedgerStore> {
        &self.vault
    }

    /// The shared directory (concrete handle, for account administration).
    pub fn directory(&self) -> &Arc<InMemoryDirectory> {
        &self.directory
    }

    /// The capability context flows run against.
    pub fn context(&self) -> FlowContext {
        FlowContext {
            our_host: self.host.clone(),
            directory: Arc::clone(&self.directory) as Arc<dyn AccountDirectory>,
            keyring: Arc::clone(&self.keyring),
            vault: Arc::clone(&self.vault),
            transport: Arc::clone(&self.transport),
            arbiter: Arc::clone(&self.arbiter),
            timeout: self.timeout,
        }
    }

    /// Run an issue flow from this host.
    pub async fn issue(&self, request: IssueRequest) -> Result<FlowCommit, AgreementError> {
        IssueFlow::new(self.context()).run(request).await
    }

    /// Run an accept flow from this host.
    pub async fn accept(&self, request: AcceptRequest) -> Result<FlowCommit, AgreementError> {
        AcceptFlow::new(self.context()).run(request).await
    }

    /// Run a query projection from this host.
    pub async fn query(
        &self,
        request: QueryRequest,
    ) -> Result<Vec<VersionedRecord>, AgreementError> {
        QueryFlow::new(self.context()).run(request).await
    }
}

impl Drop for Participant {
    fn drop(&mut self) {
        // The responder loop holds no durable state; cut it loose.
        self.responder.abort();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
