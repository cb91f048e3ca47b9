//! # The Issue Flow
//!
//! Creates a new IOU record between a lender account and a borrower
//! account. CREATE semantics: zero consumed states, one produced record in
//! status `IOU_CREATED`, endorsed by both participants' one-time keys.
//!
//! The flow resolves both accounts through the directory, asks each owning
//! host to mint a fresh key (unlinkability: no key is ever named in two
//! records), signs with every required key this host holds, collects the
//! rest over sessions, and finalizes through the notary.

use std::collections::HashMap;

use uuid::Uuid;

use pact_contracts::{CommandKind, IouRecord};

use crate::agreement::collector::{RemoteSigner, SignatureCollector};
use crate::agreement::error::AgreementError;
use crate::agreement::finality::FinalityCoordinator;
use crate::crypto::keys::PactPublicKey;
use crate::identity::account::AccountRef;
use crate::identity::host::HostId;
use crate::ledger::endorsement::{Endorsement, EndorsementSet};
use crate::ledger::proposal::{Proposal, ProposalBuilder};

use super::{FlowCommit, FlowContext, FlowProgress, FlowState};

/// Input to the issue flow.
#[derive(Debug, Clone)]
pub struct IssueRequest {
    /// The amount owed. Must be positive — the contract enforces it.
    pub value: i64,
    /// Directory name of the lender account (the value is owed to them).
    pub lender_account: String,
    /// Directory name of the borrower account (they owe the value).
    pub borrower_account: String,
}

/// Issues a new IOU record.
pub struct IssueFlow {
    ctx: FlowContext,
}

impl IssueFlow {
    /// Creates the flow over a capability context.
    pub fn new(ctx: FlowContext) -> Self {
        Self { ctx }
    }

    /// Run the flow to completion.
    pub async fn run(&self, request: IssueRequest) -> Result<FlowCommit, AgreementError> {
        let mut progress = FlowProgress::start("issue");
        match self.execute(&mut progress, &request).await {
            Ok(commit) => {
                progress.advance(FlowState::Committed);
                tracing::info!(tx_id = %commit.tx_id, record_id = %commit.record.record_id, "issue committed");
                Ok(commit)
            }
            Err(e) => {
                progress.advance(FlowState::Aborted);
                tracing::warn!(error = %e, "issue aborted");
                Err(e)
            }
        }
    }

    async fn execute(
        &self,
        progress: &mut FlowProgress,
        request: &IssueRequest,
    ) -> Result<FlowCommit, AgreementError> {
        let ctx = &self.ctx;

        // BUILD: resolve both accounts, mint one-time keys, stage the proposal.
        let lender = ctx.directory.resolve(&request.lender_account).await?;
        let borrower = ctx.directory.resolve(&request.borrower_account).await?;

        let lender_ref = AccountRef {
            key: ctx.directory.new_key(&lender.host, lender.account_id).await?,
            host: lender.host,
            account_id: lender.account_id,
        };
        let borrower_ref = AccountRef {
            key: ctx
                .directory
                .new_key(&borrower.host, borrower.account_id)
                .await?,
            host: borrower.host,
            account_id: borrower.account_id,
        };

        let record = IouRecord::new(
            request.value,
            lender_ref.to_party(),
            borrower_ref.to_party(),
            Uuid::new_v4(),
            lender_ref.account_id,
        );

        let proposal = ProposalBuilder::new(CommandKind::Create)
            .produce(record)
            .require_signer(lender_ref.key.to_hex())
            .require_signer(borrower_ref.key.to_hex())
            .notary(ctx.arbiter.host().clone())
            .build();

        let key_hosts: HashMap<String, HostId> = [
            (lender_ref.key.to_hex(), lender_ref.host),
            (borrower_ref.key.to_hex(), borrower_ref.host),
        ]
        .into();

        // LOCAL_VALIDATE: fail fast before anything leaves this host.
        progress.advance(FlowState::LocalValidate);
        proposal.validate()?;

        // LOCAL_SIGN: the proposer signs first, with every required key it holds.
        progress.advance(FlowState::LocalSign);
        let mut endorsements = sign_held_keys(ctx, &proposal)?;

        // COLLECT_SIGNATURES: one endorsement per remote signer.
        progress.advance(FlowState::CollectSignatures);
        let remotes = remote_signers(&proposal, &key_hosts, &endorsements)?;
        let collector = SignatureCollector::new(ctx.transport.clone(), ctx.timeout);
        let sessions = collector
            .collect(&proposal, &mut endorsements, &remotes)
            .await?;

        // FINALIZE: notary commitment and fan-out.
        progress.advance(FlowState::Finalize);
        let finality =
            FinalityCoordinator::new(ctx.arbiter.clone(), ctx.vault.clone(), ctx.timeout);
        let tx = finality.finalize(&proposal, &endorsements, sessions).await?;

        let output = tx
            .outputs()
            .into_iter()
            .next()
            .expect("a committed CREATE has exactly one output");
        Ok(FlowCommit {
            record: output.record,
            version: output.state_ref,
            tx_id: tx.tx_id,
        })
    }
}

/// Endorse with every required key this host's ring holds.
///
/// Errors with [`AgreementError::NoLocalSigner`] if the ring holds none —
/// a proposer that cannot sign its own proposal has nothing to offer.
pub(super) fn sign_held_keys(
    ctx: &FlowContext,
    proposal: &Proposal,
) -> Result<EndorsementSet, AgreementError> {
    let mut endorsements = EndorsementSet::for_signers(proposal.required_signers.clone());
    let bytes = proposal.signable_bytes();

    for key in &proposal.required_signers {
        if let Some(signature) = ctx.keyring.sign_with(key, &bytes) {
            let signer = PactPublicKey::from_hex(key)
                .map_err(|_| AgreementError::Session(format!("malformed signer key {}", key)))?;
            endorsements
                .insert(Endorsement::new(signer, signature))
                .map_err(|e| AgreementError::Session(e.to_string()))?;
        }
    }

    if endorsements.is_empty() {
        return Err(AgreementError::NoLocalSigner);
    }
    Ok(endorsements)
}

/// Map each still-missing required signer to the host that owns its key.
pub(super) fn remote_signers(
    proposal: &Proposal,
    key_hosts: &HashMap<String, HostId>,
    endorsements: &EndorsementSet,
) -> Result<Vec<RemoteSigner>, AgreementError> {
    proposal
        .required_signers
        .iter()
        .filter(|key| endorsements.get(key).is_none())
        .map(|key| {
            key_hosts
                .get(key)
                .map(|host| RemoteSigner {
                    key: key.clone(),
                    host: host.clone(),
                })
                .ok_or_else(|| {
                    AgreementError::Resolution(format!("no host known for required signer {}", key))
                })
        })
        .collect()
}
