//! # Signature Collection
//!
//! Obtains one endorsement per required signer beyond the proposer's own.
//! For each remote signer: open a session to the signer's host, send the
//! proposal, and wait (bounded) for an endorsement or a refusal.
//!
//! Counterparties are contacted one after another; ordering across them is
//! not significant, only the request/response order within each session.
//! Any refusal, malformed reply, or timeout aborts the whole attempt — the
//! partial endorsements already gathered are simply dropped, which is safe
//! because nothing durable has been written yet.
//!
//! Sessions that produced an endorsement stay open: finality reuses them to
//! deliver the committed transaction.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::identity::host::HostId;
use crate::ledger::endorsement::EndorsementSet;
use crate::ledger::proposal::Proposal;

use super::error::AgreementError;
use super::session::{Session, SessionError, SessionMessage, SessionTransport};

/// One required signer that lives on another host.
#[derive(Debug, Clone)]
pub struct RemoteSigner {
    /// Hex-encoded key expected to endorse.
    pub key: String,
    /// The host that holds that key's secret half.
    pub host: HostId,
}

/// Drives the per-counterparty endorsement protocol.
pub struct SignatureCollector {
    transport: Arc<dyn SessionTransport>,
    timeout: Duration,
}

impl SignatureCollector {
    /// Creates a collector over a transport with a per-round-trip bound.
    pub fn new(transport: Arc<dyn SessionTransport>, timeout: Duration) -> Self {
        Self { transport, timeout }
    }

    /// Collect one endorsement per remote signer into `endorsements`.
    ///
    /// On success, returns the sessions still open for finality fan-out.
    /// On any failure the attempt is over: the error is returned, collected
    /// endorsements are discarded with the set, and every session drops.
    pub async fn collect(
        &self,
        proposal: &Proposal,
        endorsements: &mut EndorsementSet,
        remotes: &[RemoteSigner],
    ) -> Result<Vec<Session>, AgreementError> {
        let mut sessions = Vec::with_capacity(remotes.len());

        for remote in remotes {
            let started = Instant::now();
            let mut session = self.transport.open(&remote.host).await?;
            tracing::debug!(
                tx_id = %proposal.id,
                signer = %remote.key,
                peer = ?remote.host,
                "requesting endorsement"
            );

            session
                .send(SessionMessage::Propose(proposal.clone()))
                .await?;

            let reply = match session.recv_timeout(self.timeout).await {
                Ok(msg) => msg,
                Err(SessionError::Elapsed(_)) => {
                    return Err(AgreementError::Timeout {
                        elapsed_ms: started.elapsed().as_millis() as u64,
                        timeout_ms: self.timeout.as_millis() as u64,
                    });
                }
                Err(e) => return Err(e.into()),
            };

            match reply {
                SessionMessage::Endorse(endorsement) => {
                    if endorsement.signer_hex() != remote.key {
                        return Err(AgreementError::Session(format!(
                            "expected endorsement from {}, got one from {}",
                            remote.key,
                            endorsement.signer_hex()
                        )));
                    }
                    if !endorsement.verify(proposal) {
                        return Err(AgreementError::InvalidEndorsement {
                            signer: remote.key.clone(),
                        });
                    }
                    endorsements
                        .insert(endorsement)
                        .map_err(|e| AgreementError::Session(e.to_string()))?;
                    sessions.push(session);
                }
                SessionMessage::Refuse { reason } => {
                    return Err(AgreementError::EndorsementRefused {
                        signer: remote.key.clone(),
                        reason,
                    });
                }
                other => {
                    return Err(AgreementError::Session(format!(
                        "unexpected {} during signature collection",
                        other.kind()
                    )));
                }
            }
        }

        Ok(sessions)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agreement::responder::{IouEndorsementPolicy, Responder};
    use crate::agreement::session::{LocalEndpoint, LocalNetwork};
    use crate::crypto::keys::PactKeypair;
    use crate::identity::account::KeyRing;
    use crate::ledger::proposal::ProposalBuilder;
    use crate::ledger::vault::MemoryVault;
    use pact_contracts::{CommandKind, IouRecord, PartyRef};
    use uuid::Uuid;

    fn host() -> HostId {
        HostId::from_public_key(&PactKeypair::generate().public_key())
    }

    /// Boots a counterparty host with a responder and one minted key.
    fn boot_counterparty(network: &Arc<LocalNetwork>) -> (HostId, String) {
        let their_host = host();
        let ring = Arc::new(KeyRing::new());
        let their_key = ring.mint(Uuid::new_v4()).to_hex();

        let listener = network.register(their_host.clone());
        Arc::new(Responder::new(
            ring,
            Arc::new(MemoryVault::new()),
            Arc::new(IouEndorsementPolicy),
        ))
        .spawn(listener);

        (their_host, their_key)
    }

    fn issue_proposal(our_key: &str, their_key: &str, notary: HostId) -> Proposal {
        let record = IouRecord::new(
            100,
            PartyRef::new(Uuid::new_v4(), our_key.to_string()),
            PartyRef::new(Uuid::new_v4(), their_key.to_string()),
            Uuid::new_v4(),
            Uuid::new_v4(),
        );
        ProposalBuilder::new(CommandKind::Create)
            .produce(record)
            .require_signer(our_key.to_string())
            .require_signer(their_key.to_string())
            .notary(notary)
            .build()
    }

    #[tokio::test]
    async fn collects_endorsement_from_live_counterparty() {
        let network = Arc::new(LocalNetwork::new());
        let our_host = host();
        let (their_host, their_key) = boot_counterparty(&network);

        let our_kp = PactKeypair::generate();
        let proposal = issue_proposal(&our_kp.public_key().to_hex(), &their_key, host());

        let mut set = EndorsementSet::for_signers(proposal.required_signers.clone());
        set.insert(crate::ledger::endorsement::Endorsement::over(
            &proposal, &our_kp,
        ))
        .unwrap();

        let collector = SignatureCollector::new(
            Arc::new(LocalEndpoint::new(our_host, Arc::clone(&network))),
            Duration::from_secs(2),
        );
        let sessions = collector
            .collect(
                &proposal,
                &mut set,
                &[RemoteSigner {
                    key: their_key.clone(),
                    host: their_host,
                }],
            )
            .await
            .unwrap();

        assert!(set.is_complete());
        assert!(set.verify_all(&proposal));
        assert_eq!(sessions.len(), 1);
    }

    #[tokio::test]
    async fn refusal_aborts_the_attempt() {
        let network = Arc::new(LocalNetwork::new());
        let our_host = host();
        let (their_host, _their_key) = boot_counterparty(&network);

        // Name a required signer whose key the counterparty does not hold;
        // its responder will refuse.
        let our_kp = PactKeypair::generate();
        let phantom_key = PactKeypair::generate().public_key().to_hex();
        let proposal = issue_proposal(&our_kp.public_key().to_hex(), &phantom_key, host());

        let mut set = EndorsementSet::for_signers(proposal.required_signers.clone());
        let collector = SignatureCollector::new(
            Arc::new(LocalEndpoint::new(our_host, Arc::clone(&network))),
            Duration::from_secs(2),
        );

        let err = collector
            .collect(
                &proposal,
                &mut set,
                &[RemoteSigner {
                    key: phantom_key,
                    host: their_host,
                }],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AgreementError::EndorsementRefused { .. }));
        assert!(set.is_empty());
    }

    #[tokio::test]
    async fn silent_counterparty_times_out() {
        let network = Arc::new(LocalNetwork::new());
        let our_host = host();

        // Register a host but never serve its sessions.
        let silent_host = host();
        let _listener = network.register(silent_host.clone());

        let our_kp = PactKeypair::generate();
        let their_key = PactKeypair::generate().public_key().to_hex();
        let proposal = issue_proposal(&our_kp.public_key().to_hex(), &their_key, host());

        let mut set = EndorsementSet::for_signers(proposal.required_signers.clone());
        let collector = SignatureCollector::new(
            Arc::new(LocalEndpoint::new(our_host, Arc::clone(&network))),
            Duration::from_millis(50),
        );

        let err = collector
            .collect(
                &proposal,
                &mut set,
                &[RemoteSigner {
                    key: their_key,
                    host: silent_host,
                }],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AgreementError::Timeout { .. }));
    }
}
