//! End-to-end integration tests for the PACT agreement protocol.
//!
//! Each test boots a fresh in-process devnet — hosts with their own vaults
//! and key rings, a shared directory, a notary — and drives the real flows
//! over real sessions. No shared state between tests, no ordering
//! dependencies.
//!
//! The scenarios here are the protocol's contract: exactly-once consumption
//! under concurrency, legal status transitions only, no partial commits on
//! refusal or timeout, and query round-trips that see what was committed
//! (and nothing else).

use std::sync::Arc;
use std::time::Duration;

use pact_contracts::RecordStatus;
use pact_protocol::agreement::{
    AgreementError, EndorsementPolicy, IouEndorsementPolicy, LocalNetwork, SessionMessage,
    SessionTransport,
};
use pact_protocol::agreement::LocalEndpoint;
use pact_protocol::crypto::PactKeypair;
use pact_protocol::flows::{AcceptRequest, IssueRequest, QueryRequest};
use pact_protocol::identity::{HostId, InMemoryDirectory, KeyRing};
use pact_protocol::ledger::{LedgerStore, MemoryVault, ProposalBuilder, SledVault};
use pact_protocol::notary::{Arbiter, Notary};
use pact_protocol::participant::Participant;

// ---------------------------------------------------------------------------
// Test Harness
// ---------------------------------------------------------------------------

/// A fresh in-process devnet: shared network, directory, and notary.
struct DevNet {
    network: Arc<LocalNetwork>,
    directory: Arc<InMemoryDirectory>,
    notary: Arc<Notary>,
}

impl DevNet {
    fn new() -> Self {
        Self {
            network: Arc::new(LocalNetwork::new()),
            directory: Arc::new(InMemoryDirectory::new()),
            notary: Arc::new(Notary::new()),
        }
    }

    /// Boot a host with an in-memory vault and the standard policy.
    fn spawn_host(&self) -> Participant {
        self.spawn_host_on(Arc::new(MemoryVault::new()))
    }

    /// Boot a host with the given vault.
    fn spawn_host_on(&self, vault: Arc<dyn LedgerStore>) -> Participant {
        Participant::spawn(
            Arc::clone(&self.network),
            Arc::clone(&self.directory),
            Arc::clone(&self.notary) as Arc<dyn Arbiter>,
            vault,
        )
    }

    /// Boot a host with a custom endorsement policy.
    fn spawn_host_with_policy(&self, policy: Arc<dyn EndorsementPolicy>) -> Participant {
        Participant::spawn_with_policy(
            Arc::clone(&self.network),
            Arc::clone(&self.directory),
            Arc::clone(&self.notary) as Arc<dyn Arbiter>,
            Arc::new(MemoryVault::new()),
            policy,
        )
    }
}

/// The standard two-host, two-account world most tests start from.
fn lender_and_borrower(net: &DevNet) -> (Participant, Participant) {
    let lender_host = net.spawn_host();
    let borrower_host = net.spawn_host();
    net.directory
        .create_account(lender_host.host(), "alice")
        .unwrap();
    net.directory
        .create_account(borrower_host.host(), "bob")
        .unwrap();
    (lender_host, borrower_host)
}

fn issue_request(value: i64) -> IssueRequest {
    IssueRequest {
        value,
        lender_account: "alice".into(),
        borrower_account: "bob".into(),
    }
}

async fn accept_request(net: &DevNet, lender_host: &Participant) -> AcceptRequest {
    use pact_protocol::identity::AccountDirectory;
    let alice = net.directory.resolve("alice").await.unwrap();
    AcceptRequest {
        borrower_account: "bob".into(),
        lender_account_id: alice.account_id,
        lender_host: lender_host.host().clone(),
        record_id: None,
    }
}

// ---------------------------------------------------------------------------
// 1. Issue → Accept lifecycle
// ---------------------------------------------------------------------------

#[tokio::test]
async fn issue_then_accept_preserves_value_and_identity() {
    let net = DevNet::new();
    let (lender, borrower) = lender_and_borrower(&net);

    let issued = lender.issue(issue_request(100)).await.unwrap();
    assert_eq!(issued.record.value, 100);
    assert_eq!(issued.record.status, RecordStatus::Created);

    let accepted = borrower
        .accept(accept_request(&net, &lender).await)
        .await
        .unwrap();
    assert_eq!(accepted.record.status, RecordStatus::Accepted);
    assert_eq!(accepted.record.value, 100, "value must carry unchanged");
    assert_eq!(
        accepted.record.record_id, issued.record.record_id,
        "business identity must survive the transition"
    );
    assert_ne!(
        accepted.version, issued.version,
        "the accepted version is a new point-in-time state"
    );
}

// ---------------------------------------------------------------------------
// 2. Query round-trips
// ---------------------------------------------------------------------------

#[tokio::test]
async fn query_round_trip_across_issue_and_accept() {
    let net = DevNet::new();
    let (lender, borrower) = lender_and_borrower(&net);

    let issued = lender.issue(issue_request(42)).await.unwrap();

    // Lender-side query: exactly one record, equal to the committed one.
    let hits = lender.query(QueryRequest::all("alice")).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].record, issued.record);
    assert_eq!(hits[0].state_ref, issued.version);

    borrower
        .accept(accept_request(&net, &lender).await)
        .await
        .unwrap();

    // Unfiltered history: two versions, the original now consumed.
    let history = lender
        .query(QueryRequest {
            account_name: "alice".into(),
            status: None,
            include_consumed: true,
        })
        .await
        .unwrap();
    assert_eq!(history.len(), 2);
    let consumed: Vec<_> = history.iter().filter(|v| v.consumed).collect();
    assert_eq!(consumed.len(), 1);
    assert_eq!(consumed[0].record.status, RecordStatus::Created);
    assert!(history
        .iter()
        .any(|v| !v.consumed && v.record.status == RecordStatus::Accepted));

    // A status-filtered query for CREATED is now empty.
    let created = lender
        .query(QueryRequest {
            account_name: "alice".into(),
            status: Some(RecordStatus::Created),
            include_consumed: false,
        })
        .await
        .unwrap();
    assert!(created.is_empty());

    // Both parties observe the same committed history.
    let borrower_view = borrower
        .query(QueryRequest {
            account_name: "bob".into(),
            status: None,
            include_consumed: true,
        })
        .await
        .unwrap();
    assert_eq!(borrower_view, history);
}

// ---------------------------------------------------------------------------
// 3. Single consumption under concurrency
// ---------------------------------------------------------------------------

#[tokio::test]
async fn concurrent_accepts_exactly_one_commits() {
    let net = DevNet::new();
    let (lender, borrower) = lender_and_borrower(&net);
    lender.issue(issue_request(100)).await.unwrap();

    let req_a = accept_request(&net, &lender).await;
    let req_b = req_a.clone();
    let (a, b) = tokio::join!(borrower.accept(req_a), borrower.accept(req_b));

    let outcomes = [a, b];
    let wins = outcomes.iter().filter(|r| r.is_ok()).count();
    assert_eq!(wins, 1, "exactly one concurrent accept may commit");

    let loss = outcomes.iter().find(|r| r.is_err()).unwrap();
    match loss {
        Err(AgreementError::DoubleSpend { .. }) => {}
        other => panic!("expected DoubleSpend, got {:?}", other),
    }

    // The ledger holds exactly one accepted version.
    let live = borrower.query(QueryRequest::all("bob")).await.unwrap();
    assert_eq!(live.len(), 1);
    assert_eq!(live[0].record.status, RecordStatus::Accepted);
}

#[tokio::test]
async fn disjoint_issues_commit_concurrently() {
    let net = DevNet::new();
    let (lender, _borrower) = lender_and_borrower(&net);

    let (a, b, c) = tokio::join!(
        lender.issue(issue_request(10)),
        lender.issue(issue_request(20)),
        lender.issue(issue_request(30)),
    );
    a.unwrap();
    b.unwrap();
    c.unwrap();

    let hits = lender.query(QueryRequest::all("alice")).await.unwrap();
    assert_eq!(hits.len(), 3);
}

// ---------------------------------------------------------------------------
// 4. Validation failures commit nothing
// ---------------------------------------------------------------------------

#[tokio::test]
async fn non_positive_issue_aborts_before_any_session() {
    let net = DevNet::new();
    let (lender, borrower) = lender_and_borrower(&net);

    let err = lender.issue(issue_request(0)).await.unwrap_err();
    assert!(matches!(err, AgreementError::Validation(_)));

    assert!(lender.query(QueryRequest::all("alice")).await.unwrap().is_empty());
    assert!(borrower.query(QueryRequest::all("bob")).await.unwrap().is_empty());
    assert_eq!(net.notary.spent_count(), 0);
}

#[tokio::test]
async fn unknown_account_fails_resolution_without_a_transaction() {
    let net = DevNet::new();
    let (lender, _borrower) = lender_and_borrower(&net);

    let err = lender
        .issue(IssueRequest {
            value: 10,
            lender_account: "alice".into(),
            borrower_account: "nobody".into(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, AgreementError::Resolution(_)));
    assert!(lender.query(QueryRequest::all("alice")).await.unwrap().is_empty());
}

// ---------------------------------------------------------------------------
// 5. No partial commit on refusal
// ---------------------------------------------------------------------------

/// A counterparty that refuses everything.
struct RefuseAll;

impl EndorsementPolicy for RefuseAll {
    fn check(&self, _proposal: &pact_protocol::ledger::Proposal) -> Result<(), String> {
        Err("this host endorses nothing".to_string())
    }
}

#[tokio::test]
async fn refused_endorsement_leaves_every_vault_untouched() {
    let net = DevNet::new();
    let lender = net.spawn_host();
    let borrower = net.spawn_host_with_policy(Arc::new(RefuseAll));
    net.directory.create_account(lender.host(), "alice").unwrap();
    net.directory.create_account(borrower.host(), "bob").unwrap();

    let err = lender.issue(issue_request(100)).await.unwrap_err();
    match err {
        AgreementError::EndorsementRefused { reason, .. } => {
            assert!(reason.contains("endorses nothing"));
        }
        other => panic!("expected EndorsementRefused, got {:?}", other),
    }

    assert!(lender.query(QueryRequest::all("alice")).await.unwrap().is_empty());
    assert!(borrower.query(QueryRequest::all("bob")).await.unwrap().is_empty());
    assert_eq!(net.notary.spent_count(), 0);
}

// ---------------------------------------------------------------------------
// 6. Timeout on a stalled counterparty
// ---------------------------------------------------------------------------

#[tokio::test]
async fn stalled_counterparty_times_out_with_nothing_committed() {
    let net = DevNet::new();
    let mut lender = net.spawn_host();
    lender.set_timeout(Duration::from_millis(100));
    net.directory.create_account(lender.host(), "alice").unwrap();

    // A host that is registered everywhere but never serves its sessions.
    let dead_kp = PactKeypair::generate();
    let dead_host = HostId::from_public_key(&dead_kp.public_key());
    net.directory
        .register_host(dead_host.clone(), Arc::new(KeyRing::new()));
    let _unserviced = net.network.register(dead_host.clone());
    net.directory.create_account(&dead_host, "sleepy").unwrap();

    let err = lender
        .issue(IssueRequest {
            value: 100,
            lender_account: "alice".into(),
            borrower_account: "sleepy".into(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, AgreementError::Timeout { .. }));
    assert!(lender.query(QueryRequest::all("alice")).await.unwrap().is_empty());
    assert_eq!(net.notary.spent_count(), 0);
}

// ---------------------------------------------------------------------------
// 7. Counterparties reject what they are not willing to attest
// ---------------------------------------------------------------------------

#[tokio::test]
async fn responder_refuses_update_that_does_not_produce_accepted() {
    use pact_contracts::CommandKind;
    use pact_protocol::ledger::{StateRef, VersionedRecord};

    let net = DevNet::new();
    let (lender, borrower) = lender_and_borrower(&net);
    lender.issue(issue_request(100)).await.unwrap();

    // Craft an update over the committed record whose produced status is
    // still IOU_CREATED, and push it straight at the lender's responder.
    let issued = borrower.query(QueryRequest::all("bob")).await.unwrap().remove(0);
    let proposal = ProposalBuilder::new(CommandKind::Update)
        .consume(VersionedRecord {
            state_ref: StateRef::new(issued.state_ref.tx_id.clone(), issued.state_ref.index),
            record: issued.record.clone(),
            consumed: false,
        })
        .produce(issued.record.clone()) // status unchanged: not an acceptance
        .require_signer(issued.record.lender.key.clone())
        .require_signer(issued.record.borrower.key.clone())
        .notary(net.notary.host().clone())
        .build();

    let prober_kp = PactKeypair::generate();
    let prober = HostId::from_public_key(&prober_kp.public_key());
    net.network.register(prober.clone());
    let endpoint = LocalEndpoint::new(prober, Arc::clone(&net.network));

    let mut session = endpoint.open(lender.host()).await.unwrap();
    session
        .send(SessionMessage::Propose(proposal))
        .await
        .unwrap();
    let reply = session.recv_timeout(Duration::from_secs(2)).await.unwrap();
    match reply {
        SessionMessage::Refuse { reason } => {
            // The contract objects to the illegal transition before the
            // policy is even consulted; either way, no endorsement.
            assert!(
                reason.contains("transition") || reason.contains("IOU_ACCEPTED"),
                "unexpected refusal reason: {}",
                reason
            );
        }
        other => panic!("expected Refuse, got {}", other.kind()),
    }
}

// ---------------------------------------------------------------------------
// 8. Durable vault end to end
// ---------------------------------------------------------------------------

#[tokio::test]
async fn sled_backed_host_runs_the_full_lifecycle() {
    let net = DevNet::new();
    let lender_vault = Arc::new(SledVault::open_temporary().unwrap());
    let lender = net.spawn_host_on(lender_vault.clone());
    let borrower = net.spawn_host();
    net.directory.create_account(lender.host(), "alice").unwrap();
    net.directory.create_account(borrower.host(), "bob").unwrap();

    let issued = lender.issue(issue_request(7)).await.unwrap();
    borrower
        .accept(accept_request(&net, &lender).await)
        .await
        .unwrap();

    // The durable vault holds both versions and the committed transactions.
    let history = lender
        .query(QueryRequest {
            account_name: "alice".into(),
            status: None,
            include_consumed: true,
        })
        .await
        .unwrap();
    assert_eq!(history.len(), 2);
    assert!(lender_vault.transaction(&issued.tx_id).unwrap().is_some());
}

// ---------------------------------------------------------------------------
// 9. Accept needs an outstanding record
// ---------------------------------------------------------------------------

#[tokio::test]
async fn accept_without_an_outstanding_record_fails_lookup() {
    let net = DevNet::new();
    let (lender, borrower) = lender_and_borrower(&net);

    let err = borrower
        .accept(accept_request(&net, &lender).await)
        .await
        .unwrap_err();
    assert!(matches!(err, AgreementError::RecordLookup(_)));
}

#[tokio::test]
async fn second_accept_of_the_same_record_finds_nothing_left() {
    let net = DevNet::new();
    let (lender, borrower) = lender_and_borrower(&net);
    lender.issue(issue_request(100)).await.unwrap();

    borrower
        .accept(accept_request(&net, &lender).await)
        .await
        .unwrap();

    // The CREATED version is consumed; a fresh attempt has nothing to spend.
    let err = borrower
        .accept(accept_request(&net, &lender).await)
        .await
        .unwrap_err();
    assert!(matches!(err, AgreementError::RecordLookup(_)));
}

// ---------------------------------------------------------------------------
// 10. One-time keys stay one-time
// ---------------------------------------------------------------------------

#[tokio::test]
async fn two_issues_between_the_same_accounts_use_unrelated_keys() {
    let net = DevNet::new();
    let (lender, _borrower) = lender_and_borrower(&net);

    let first = lender.issue(issue_request(10)).await.unwrap();
    let second = lender.issue(issue_request(20)).await.unwrap();

    assert_ne!(first.record.lender.key, second.record.lender.key);
    assert_ne!(first.record.borrower.key, second.record.borrower.key);
    assert_eq!(
        first.record.lender.account_id,
        second.record.lender.account_id
    );
}

// ---------------------------------------------------------------------------
// 11. Policy sanity: only known statuses are ever accepted
// ---------------------------------------------------------------------------

#[test]
fn standard_policy_accepts_exactly_the_two_known_statuses() {
    use pact_contracts::{CommandKind, IouRecord, PartyRef};
    use pact_protocol::ledger::{StateRef, VersionedRecord};
    use uuid::Uuid;

    let policy = IouEndorsementPolicy;
    let notary = HostId::from_public_key(&PactKeypair::generate().public_key());

    let record = IouRecord::new(
        5,
        PartyRef::new(Uuid::new_v4(), "aa".repeat(32)),
        PartyRef::new(Uuid::new_v4(), "bb".repeat(32)),
        Uuid::new_v4(),
        Uuid::new_v4(),
    );

    // CREATE producing IOU_CREATED: acceptable.
    let create = ProposalBuilder::new(CommandKind::Create)
        .produce(record.clone())
        .require_signer(record.lender.key.clone())
        .require_signer(record.borrower.key.clone())
        .notary(notary.clone())
        .build();
    assert!(policy.check(&create).is_ok());

    // UPDATE producing IOU_ACCEPTED: acceptable.
    let input = VersionedRecord {
        state_ref: StateRef::new("cafe", 0),
        record: record.clone(),
        consumed: false,
    };
    let accept = ProposalBuilder::new(CommandKind::Update)
        .consume(input.clone())
        .produce(record.with_status(RecordStatus::Accepted))
        .require_signer(record.lender.key.clone())
        .require_signer(record.borrower.key.clone())
        .notary(notary.clone())
        .build();
    assert!(policy.check(&accept).is_ok());

    // UPDATE producing anything else: refused. The status enum is closed,
    // so "anything else" is exactly IOU_CREATED.
    let bad = ProposalBuilder::new(CommandKind::Update)
        .consume(input)
        .produce(record.clone())
        .require_signer(record.lender.key.clone())
        .require_signer(record.borrower.key.clone())
        .notary(notary)
        .build();
    assert!(policy.check(&bad).is_err());
}
