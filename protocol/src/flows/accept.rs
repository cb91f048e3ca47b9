//! # The Accept Flow
//!
//! The borrower accepts an outstanding IOU. UPDATE semantics: consume the
//! single `IOU_CREATED` version, produce the `IOU_ACCEPTED` successor with
//! the same `record_id` and value, endorsed by the same one-time keys the
//! record already names.
//!
//! The lender side is addressed by `(account id, host)` — not by reusing a
//! previously resolved key — and its responder independently checks that
//! what it is countersigning really is an acceptance (produced status
//! exactly `IOU_ACCEPTED`) before it signs.

use std::collections::HashMap;

use uuid::Uuid;

use pact_contracts::{CommandKind, RecordStatus};

use crate::agreement::collector::SignatureCollector;
use crate::agreement::error::AgreementError;
use crate::agreement::finality::FinalityCoordinator;
use crate::identity::host::HostId;
use crate::ledger::proposal::ProposalBuilder;
use crate::ledger::vault::{RecordFilter, VersionedRecord};

use super::issue::{remote_signers, sign_held_keys};
use super::{FlowCommit, FlowContext, FlowProgress, FlowState};

/// Input to the accept flow.
#[derive(Debug, Clone)]
pub struct AcceptRequest {
    /// Directory name of the borrower account doing the accepting.
    pub borrower_account: String,
    /// Stable id of the lender account on the other side of the IOU.
    pub lender_account_id: Uuid,
    /// The host the lender account lives on.
    pub lender_host: HostId,
    /// Accept this specific record. When `None`, the borrower account must
    /// have exactly one outstanding `IOU_CREATED` record.
    pub record_id: Option<Uuid>,
}

/// Accepts an outstanding IOU record.
pub struct AcceptFlow {
    ctx: FlowContext,
}

impl AcceptFlow {
    /// Creates the flow over a capability context.
    pub fn new(ctx: FlowContext) -> Self {
        Self { ctx }
    }

    /// Run the flow to completion.
    pub async fn run(&self, request: AcceptRequest) -> Result<FlowCommit, AgreementError> {
        let mut progress = FlowProgress::start("accept");
        match self.execute(&mut progress, &request).await {
            Ok(commit) => {
                progress.advance(FlowState::Committed);
                tracing::info!(tx_id = %commit.tx_id, record_id = %commit.record.record_id, "accept committed");
                Ok(commit)
            }
            Err(e) => {
                progress.advance(FlowState::Aborted);
                tracing::warn!(error = %e, "accept aborted");
                Err(e)
            }
        }
    }

    async fn execute(
        &self,
        progress: &mut FlowProgress,
        request: &AcceptRequest,
    ) -> Result<FlowCommit, AgreementError> {
        let ctx = &self.ctx;

        // BUILD: locate the outstanding record and stage its transition.
        let borrower = ctx.directory.resolve(&request.borrower_account).await?;

        let lender = ctx.directory.resolve_id(request.lender_account_id).await?;
        if lender.host != request.lender_host {
            return Err(AgreementError::Resolution(format!(
                "lender account {} lives on {:?}, not the requested host {:?}",
                request.lender_account_id, lender.host, request.lender_host
            )));
        }

        let input = self.outstanding_record(borrower.account_id, request).await?;
        if input.record.lender.account_id != request.lender_account_id {
            return Err(AgreementError::RecordLookup(format!(
                "record {} names lender account {}, not {}",
                input.record.record_id, input.record.lender.account_id, request.lender_account_id
            )));
        }

        let accepted = input.record.with_status(RecordStatus::Accepted);
        let proposal = ProposalBuilder::new(CommandKind::Update)
            .consume(input.clone())
            .produce(accepted)
            .require_signer(input.record.lender.key.clone())
            .require_signer(input.record.borrower.key.clone())
            .notary(ctx.arbiter.host().clone())
            .build();

        // The record's keys were minted at issue time: the lender key by the
        // lender host, the borrower key by ours.
        let key_hosts: HashMap<String, HostId> = [
            (input.record.lender.key.clone(), lender.host),
            (input.record.borrower.key.clone(), ctx.our_host.clone()),
        ]
        .into();

        // LOCAL_VALIDATE.
        progress.advance(FlowState::LocalValidate);
        proposal.validate()?;

        // LOCAL_SIGN: the borrower-side key lives in our ring.
        progress.advance(FlowState::LocalSign);
        let mut endorsements = sign_held_keys(ctx, &proposal)?;

        // COLLECT_SIGNATURES: the lender host countersigns.
        progress.advance(FlowState::CollectSignatures);
        let remotes = remote_signers(&proposal, &key_hosts, &endorsements)?;
        let collector = SignatureCollector::new(ctx.transport.clone(), ctx.timeout);
        let sessions = collector
            .collect(&proposal, &mut endorsements, &remotes)
            .await?;

        // FINALIZE.
        progress.advance(FlowState::Finalize);
        let finality =
            FinalityCoordinator::new(ctx.arbiter.clone(), ctx.vault.clone(), ctx.timeout);
        let tx = finality.finalize(&proposal, &endorsements, sessions).await?;

        let output = tx
            .outputs()
            .into_iter()
            .next()
            .expect("a committed UPDATE has exactly one output");
        Ok(FlowCommit {
            record: output.record,
            version: output.state_ref,
            tx_id: tx.tx_id,
        })
    }

    /// The single `IOU_CREATED` version this request targets.
    async fn outstanding_record(
        &self,
        borrower_account_id: Uuid,
        request: &AcceptRequest,
    ) -> Result<VersionedRecord, AgreementError> {
        let filter =
            RecordFilter::owned_by(borrower_account_id).with_status(RecordStatus::Created);
        let mut candidates = self.ctx.vault.find(&filter).await?;

        if let Some(record_id) = request.record_id {
            candidates.retain(|v| v.record.record_id == record_id);
        }

        match candidates.len() {
            1 => Ok(candidates.remove(0)),
            0 => Err(AgreementError::RecordLookup(format!(
                "no outstanding IOU_CREATED record for account {}",
                borrower_account_id
            ))),
            n => Err(AgreementError::RecordLookup(format!(
                "{} outstanding IOU_CREATED records for account {}; pass a record id",
                n, borrower_account_id
            ))),
        }
    }
}
