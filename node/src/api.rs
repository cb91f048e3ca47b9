//! # HTTP Gateway
//!
//! Builds the axum router translating JSON requests into ledger flows.
//! Pure translation: every handler resolves which host should run the flow,
//! invokes it, and maps the typed outcome to a JSON envelope. No protocol
//! logic lives here.
//!
//! ## Endpoints
//!
//! | Method | Path                   | Description                           |
//! |--------|------------------------|---------------------------------------|
//! | GET    | `/health`              | Liveness probe                        |
//! | GET    | `/status`              | Node status summary                   |
//! | GET    | `/metrics`             | Prometheus metrics                    |
//! | POST   | `/accounts`            | Create an account on a host           |
//! | POST   | `/accounts/share`      | Share account visibility with a host  |
//! | GET    | `/accounts`            | List known accounts                   |
//! | POST   | `/ious`                | Issue an IOU (runs on the lender host)|
//! | POST   | `/ious/accept`         | Accept an IOU (runs on the borrower host) |
//! | GET    | `/ious/:account`       | Query an account's IOU records        |
//!
//! Flow outcomes use the classic envelope: `{"status": "SUCCESS", ...}` on
//! commit, `{"status": "FAILURE", "reason": ...}` otherwise, with the HTTP
//! code picked per error class (422 contract violation, 409 double spend /
//! refusal, 404 resolution, 504 timeout).

use axum::{
    extract::{Path, Query, State},
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use pact_contracts::RecordStatus;
use pact_protocol::agreement::AgreementError;
use pact_protocol::flows::{AcceptRequest, IssueRequest, QueryRequest};
use pact_protocol::identity::{HostId, InMemoryDirectory};
use pact_protocol::ledger::VersionedRecord;
use pact_protocol::participant::Participant;

use crate::metrics::{metrics_handler, SharedMetrics};

// ---------------------------------------------------------------------------
// Application State
// ---------------------------------------------------------------------------

/// One booted host, addressable by its devnet label.
pub struct HostEntry {
    /// Human label from the CLI (`bank-a`, `bank-b`, ...).
    pub label: String,
    /// The running participant.
    pub participant: Arc<Participant>,
}

/// Shared application state for all request handlers. Cheap to clone —
/// everything behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// The node's reported version string.
    pub version: String,
    /// When the process came up.
    pub started_at: DateTime<Utc>,
    /// The shared account directory.
    pub directory: Arc<InMemoryDirectory>,
    /// The hosts booted in this process.
    pub hosts: Arc<Vec<HostEntry>>,
    /// Prometheus metric handles.
    pub metrics: SharedMetrics,
}

impl AppState {
    fn by_label(&self, label: &str) -> Result<&HostEntry, ApiError> {
        self.hosts
            .iter()
            .find(|h| h.label == label)
            .ok_or_else(|| ApiError::not_found(format!("unknown host label {:?}", label)))
    }

    fn by_host(&self, host: &HostId) -> Result<&HostEntry, ApiError> {
        self.hosts
            .iter()
            .find(|h| h.participant.host() == host)
            .ok_or_else(|| {
                ApiError::not_found(format!("no host in this process owns address {}", host))
            })
    }

    fn label_of(&self, host: &HostId) -> Option<&str> {
        self.hosts
            .iter()
            .find(|h| h.participant.host() == host)
            .map(|h| h.label.as_str())
    }
}

// ---------------------------------------------------------------------------
// Router Construction
// ---------------------------------------------------------------------------

/// Builds the full axum [`Router`] with all routes, CORS, and tracing.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
        .route("/metrics", get(metrics_handler))
        .route("/accounts", post(create_account_handler).get(list_accounts_handler))
        .route("/accounts/share", post(share_account_handler))
        .route("/ious", post(create_iou_handler))
        .route("/ious/accept", post(accept_iou_handler))
        .route("/ious/:account", get(query_ious_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Error Envelope
// ---------------------------------------------------------------------------

/// A gateway failure: an HTTP status plus the classic failure envelope.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    reason: String,
}

impl ApiError {
    fn not_found(reason: String) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            reason,
        }
    }

    fn bad_request(reason: String) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            reason,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "status": "FAILURE",
            "reason": self.reason,
        });
        (self.status, Json(body)).into_response()
    }
}

impl From<AgreementError> for ApiError {
    fn from(e: AgreementError) -> Self {
        let status = match &e {
            AgreementError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AgreementError::EndorsementRefused { .. } | AgreementError::DoubleSpend { .. } => {
                StatusCode::CONFLICT
            }
            AgreementError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            AgreementError::Resolution(_) | AgreementError::RecordLookup(_) => {
                StatusCode::NOT_FOUND
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            reason: e.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Request / Response Types
// ---------------------------------------------------------------------------

/// `POST /accounts` request body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAccountRequest {
    /// Name for the new account.
    pub account_name: String,
    /// Label of the host that will own the account.
    pub host: String,
}

/// `POST /accounts/share` request body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareAccountRequest {
    /// Name of the account to share.
    pub account_name: String,
    /// Label of the host to share it with.
    pub to_host: String,
}

/// `POST /ious` request body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateIouRequest {
    /// The amount owed.
    pub value: i64,
    /// Lender account name.
    pub lender: String,
    /// Borrower account name.
    pub borrower: String,
}

/// `POST /ious/accept` request body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptIouRequest {
    /// Borrower account name (the accepting side).
    pub borrower_account_name: String,
    /// Stable id of the lender account.
    pub lender_account_id: Uuid,
    /// Label of the host the lender account lives on.
    pub lender_host: String,
    /// Accept a specific record (required when several are outstanding).
    #[serde(default)]
    pub record_id: Option<Uuid>,
}

/// `GET /ious/:account` query parameters.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryParams {
    /// Restrict to a status, by ledger text (e.g. `IOU_CREATED`).
    pub status: Option<String>,
    /// Include versions already consumed by a later transaction.
    #[serde(default)]
    pub include_consumed: bool,
}

/// Success envelope for transaction flows.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowResponse {
    /// Always `"SUCCESS"` in this shape.
    pub status: String,
    /// The committing transaction id.
    pub tx_id: String,
    /// The committed version reference, `"{txId}:{index}"`.
    pub version_id: String,
    /// The record's stable business id.
    pub record_id: Uuid,
}

/// One account in `GET /accounts`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountView {
    pub name: String,
    pub account_id: Uuid,
    /// Owning host's devnet label (when booted here) and address.
    pub host_label: Option<String>,
    pub host: String,
}

/// One record version in `GET /ious/:account`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IouView {
    pub value: i64,
    pub record_id: Uuid,
    pub lender_account_id: Uuid,
    pub lender_key: String,
    pub borrower_account_id: Uuid,
    pub borrower_key: String,
    pub status: RecordStatus,
    pub consumed: bool,
    pub version_id: String,
}

impl IouView {
    fn from_version(v: &VersionedRecord) -> Self {
        Self {
            value: v.record.value,
            record_id: v.record.record_id,
            lender_account_id: v.record.lender.account_id,
            lender_key: v.record.lender.key.clone(),
            borrower_account_id: v.record.borrower.account_id,
            borrower_key: v.record.borrower.key.clone(),
            status: v.record.status,
            consumed: v.consumed,
            version_id: v.state_ref.encode(),
        }
    }
}

/// `GET /status` response payload.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub version: String,
    pub uptime_secs: i64,
    pub hosts: Vec<HostView>,
    pub accounts: usize,
}

/// One booted host in `GET /status`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostView {
    pub label: String,
    pub address: String,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn health_handler() -> &'static str {
    "ok"
}

async fn status_handler(State(state): State<AppState>) -> Json<StatusResponse> {
    let hosts = state
        .hosts
        .iter()
        .map(|h| HostView {
            label: h.label.clone(),
            address: h.participant.host().to_string(),
        })
        .collect();
    Json(StatusResponse {
        version: state.version.clone(),
        uptime_secs: (Utc::now() - state.started_at).num_seconds(),
        hosts,
        accounts: state.directory.all_accounts().len(),
    })
}

async fn create_account_handler(
    State(state): State<AppState>,
    Json(req): Json<CreateAccountRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let entry = state.by_label(&req.host)?;
    let info = state
        .directory
        .create_account(entry.participant.host(), &req.account_name)
        .map_err(|e| ApiError::bad_request(e.to_string()))?;

    state.metrics.accounts_created_total.inc();
    Ok(Json(serde_json::json!({
        "status": "SUCCESS",
        "accountId": info.account_id,
        "host": entry.label,
    })))
}

async fn share_account_handler(
    State(state): State<AppState>,
    Json(req): Json<ShareAccountRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    use pact_protocol::identity::AccountDirectory;

    let target = state.by_label(&req.to_host)?.participant.host().clone();
    let info = state
        .directory
        .resolve(&req.account_name)
        .await
        .map_err(|e| ApiError::not_found(e.to_string()))?;
    state
        .directory
        .share_visibility(info.account_id, &[target])
        .await
        .map_err(|e| ApiError::bad_request(e.to_string()))?;

    Ok(Json(serde_json::json!({ "status": "SUCCESS" })))
}

async fn list_accounts_handler(State(state): State<AppState>) -> Json<Vec<AccountView>> {
    let mut accounts: Vec<AccountView> = state
        .directory
        .all_accounts()
        .into_iter()
        .map(|info| AccountView {
            host_label: state.label_of(&info.host).map(str::to_string),
            host: info.host.to_string(),
            name: info.name,
            account_id: info.account_id,
        })
        .collect();
    accounts.sort_by(|a, b| a.name.cmp(&b.name));
    Json(accounts)
}

async fn create_iou_handler(
    State(state): State<AppState>,
    Json(req): Json<CreateIouRequest>,
) -> Result<Json<FlowResponse>, ApiError> {
    use pact_protocol::identity::AccountDirectory;

    // The issue flow runs on the lender's host.
    let lender = state
        .directory
        .resolve(&req.lender)
        .await
        .map_err(|e| ApiError::not_found(e.to_string()))?;
    let entry = state.by_host(&lender.host)?;

    state.metrics.flows_started_total.inc();
    let timer = state.metrics.flow_latency_seconds.start_timer();
    let outcome = entry
        .participant
        .issue(IssueRequest {
            value: req.value,
            lender_account: req.lender,
            borrower_account: req.borrower,
        })
        .await;
    timer.observe_duration();

    match outcome {
        Ok(commit) => {
            state.metrics.flows_committed_total.inc();
            Ok(Json(FlowResponse {
                status: "SUCCESS".into(),
                version_id: commit.version.encode(),
                tx_id: commit.tx_id,
                record_id: commit.record.record_id,
            }))
        }
        Err(e) => {
            state.metrics.flows_aborted_total.inc();
            Err(e.into())
        }
    }
}

async fn accept_iou_handler(
    State(state): State<AppState>,
    Json(req): Json<AcceptIouRequest>,
) -> Result<Json<FlowResponse>, ApiError> {
    use pact_protocol::identity::AccountDirectory;

    // The accept flow runs on the borrower's host.
    let borrower = state
        .directory
        .resolve(&req.borrower_account_name)
        .await
        .map_err(|e| ApiError::not_found(e.to_string()))?;
    let entry = state.by_host(&borrower.host)?;
    let lender_host = state.by_label(&req.lender_host)?.participant.host().clone();

    state.metrics.flows_started_total.inc();
    let timer = state.metrics.flow_latency_seconds.start_timer();
    let outcome = entry
        .participant
        .accept(AcceptRequest {
            borrower_account: req.borrower_account_name,
            lender_account_id: req.lender_account_id,
            lender_host,
            record_id: req.record_id,
        })
        .await;
    timer.observe_duration();

    match outcome {
        Ok(commit) => {
            state.metrics.flows_committed_total.inc();
            Ok(Json(FlowResponse {
                status: "SUCCESS".into(),
                version_id: commit.version.encode(),
                tx_id: commit.tx_id,
                record_id: commit.record.record_id,
            }))
        }
        Err(e) => {
            state.metrics.flows_aborted_total.inc();
            Err(e.into())
        }
    }
}

async fn query_ious_handler(
    State(state): State<AppState>,
    Path(account): Path<String>,
    Query(params): Query<QueryParams>,
) -> Result<Json<Vec<IouView>>, ApiError> {
    use pact_protocol::identity::AccountDirectory;

    let info = state
        .directory
        .resolve(&account)
        .await
        .map_err(|e| ApiError::not_found(e.to_string()))?;
    let entry = state.by_host(&info.host)?;

    let status = params
        .status
        .as_deref()
        .map(str::parse::<RecordStatus>)
        .transpose()
        .map_err(|e| ApiError::bad_request(e.to_string()))?;

    state.metrics.queries_total.inc();
    let records = entry
        .participant
        .query(QueryRequest {
            account_name: account,
            status,
            include_consumed: params.include_consumed,
        })
        .await?;

    Ok(Json(records.iter().map(IouView::from_version).collect()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::NodeMetrics;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use pact_protocol::agreement::LocalNetwork;
    use pact_protocol::ledger::MemoryVault;
    use pact_protocol::notary::{Arbiter, Notary};
    use tower::ServiceExt;

    /// Boots a two-host devnet and returns a router over it.
    fn devnet_router() -> Router {
        let network = Arc::new(LocalNetwork::new());
        let directory = Arc::new(InMemoryDirectory::new());
        let arbiter: Arc<dyn Arbiter> = Arc::new(Notary::new());

        let mut hosts = Vec::new();
        for label in ["bank-a", "bank-b"] {
            let participant = Participant::spawn(
                Arc::clone(&network),
                Arc::clone(&directory),
                Arc::clone(&arbiter),
                Arc::new(MemoryVault::new()),
            );
            hosts.push(HostEntry {
                label: label.to_string(),
                participant: Arc::new(participant),
            });
        }

        create_router(AppState {
            version: "test".into(),
            started_at: Utc::now(),
            directory,
            hosts: Arc::new(hosts),
            metrics: Arc::new(NodeMetrics::new()),
        })
    }

    async fn post_json(router: &Router, path: &str, body: serde_json::Value) -> (StatusCode, serde_json::Value) {
        let response = router
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(path)
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    async fn get_json(router: &Router, path: &str) -> (StatusCode, serde_json::Value) {
        let response = router
            .clone()
            .oneshot(Request::builder().uri(path).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn full_gateway_lifecycle() {
        let router = devnet_router();

        // Create both accounts.
        let (status, body) = post_json(
            &router,
            "/accounts",
            serde_json::json!({"accountName": "alice", "host": "bank-a"}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "SUCCESS");
        let lender_account_id = body["accountId"].as_str().unwrap().to_string();

        let (status, _) = post_json(
            &router,
            "/accounts",
            serde_json::json!({"accountName": "bob", "host": "bank-b"}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        // Issue an IOU from alice (bank-a) to bob (bank-b).
        let (status, body) = post_json(
            &router,
            "/ious",
            serde_json::json!({"value": 100, "lender": "alice", "borrower": "bob"}),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "issue failed: {}", body);
        assert_eq!(body["status"], "SUCCESS");

        // The lender-side query sees exactly one CREATED record.
        let (status, body) = get_json(&router, "/ious/alice").await;
        assert_eq!(status, StatusCode::OK);
        let records = body.as_array().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["status"], "IOU_CREATED");
        assert_eq!(records[0]["value"], 100);

        // Bob accepts it.
        let (status, body) = post_json(
            &router,
            "/ious/accept",
            serde_json::json!({
                "borrowerAccountName": "bob",
                "lenderAccountId": lender_account_id,
                "lenderHost": "bank-a",
            }),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "accept failed: {}", body);
        assert_eq!(body["status"], "SUCCESS");

        // Status-filtered query for CREATED is now empty; history shows both.
        let (_, body) = get_json(&router, "/ious/bob?status=IOU_CREATED").await;
        assert_eq!(body.as_array().unwrap().len(), 0);

        let (_, body) = get_json(&router, "/ious/bob?includeConsumed=true").await;
        assert_eq!(body.as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn issue_for_unknown_account_is_404() {
        let router = devnet_router();
        let (status, body) = post_json(
            &router,
            "/ious",
            serde_json::json!({"value": 10, "lender": "ghost", "borrower": "bob"}),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["status"], "FAILURE");
    }

    #[tokio::test]
    async fn zero_value_issue_is_rejected_as_unprocessable() {
        let router = devnet_router();
        for (name, host) in [("alice", "bank-a"), ("bob", "bank-b")] {
            post_json(
                &router,
                "/accounts",
                serde_json::json!({"accountName": name, "host": host}),
            )
            .await;
        }

        let (status, body) = post_json(
            &router,
            "/ious",
            serde_json::json!({"value": 0, "lender": "alice", "borrower": "bob"}),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["status"], "FAILURE");
        assert!(body["reason"].as_str().unwrap().contains("positive"));
    }

    #[tokio::test]
    async fn health_and_status_respond() {
        let router = devnet_router();

        let response = router
            .clone()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let (status, body) = get_json(&router, "/status").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["hosts"].as_array().unwrap().len(), 2);
    }
}
