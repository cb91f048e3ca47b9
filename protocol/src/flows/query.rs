//! # The Query Flow
//!
//! A read-only projection over the vault, scoped to one account. Not a
//! transaction flow: it opens no sessions, consults no notary, and mutates
//! nothing. Each run recomputes the projection from the vault, so the
//! returned sequence is finite, in stable state-reference order, and
//! restartable by running the flow again.

use pact_contracts::RecordStatus;

use crate::agreement::error::AgreementError;
use crate::ledger::vault::{RecordFilter, VersionedRecord};

use super::FlowContext;

/// Input to the query flow.
#[derive(Debug, Clone)]
pub struct QueryRequest {
    /// Directory name of the account to query.
    pub account_name: String,
    /// Restrict to versions with this status.
    pub status: Option<RecordStatus>,
    /// Also return versions already consumed by a later transaction.
    pub include_consumed: bool,
}

impl QueryRequest {
    /// Query all unconsumed versions involving the account.
    pub fn all(account_name: impl Into<String>) -> Self {
        Self {
            account_name: account_name.into(),
            status: None,
            include_consumed: false,
        }
    }
}

/// Projects an account's record versions out of the vault.
pub struct QueryFlow {
    ctx: FlowContext,
}

impl QueryFlow {
    /// Creates the flow over a capability context.
    pub fn new(ctx: FlowContext) -> Self {
        Self { ctx }
    }

    /// Run the projection.
    pub async fn run(
        &self,
        request: QueryRequest,
    ) -> Result<Vec<VersionedRecord>, AgreementError> {
        let account = self.ctx.directory.resolve(&request.account_name).await?;

        let mut filter = RecordFilter::owned_by(account.account_id);
        if let Some(status) = request.status {
            filter = filter.with_status(status);
        }
        if request.include_consumed {
            filter = filter.including_consumed();
        }

        let records = self.ctx.vault.find(&filter).await?;
        tracing::debug!(
            account = %request.account_name,
            hits = records.len(),
            "query projection computed"
        );
        Ok(records)
    }
}
