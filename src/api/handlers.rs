//! REST API handlers for vault coordination

use crate::coordinator::{
    Coordinator, CoordinatorError, ExecutionReceipt, Request, Response, SigningStatus,
};
use crate::core::{Network, Utxo};
use crate::multisig::{
    DraftOutput, ErrorCode, MultisigError, PartialSignature, TransactionDraft, Vault, VaultParams,
};
use crate::store::VaultFilter;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Shared application state for API handlers
#[derive(Clone)]
pub struct ApiState {
    pub coordinator: Arc<RwLock<Coordinator>>,
}

impl ApiState {
    pub fn new(coordinator: Coordinator) -> Self {
        Self {
            coordinator: Arc::new(RwLock::new(coordinator)),
        }
    }
}

/// Error body: `{"code": ..., "error": ...}`
pub type ApiError = (StatusCode, Json<CoordinatorError>);

pub type ApiResult<T> = Result<Json<T>, ApiError>;

/// HTTP status for each error code
pub fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::BadArguments
        | ErrorCode::InvalidThreshold
        | ErrorCode::InvalidKeySet
        | ErrorCode::ForeignUtxo
        | ErrorCode::InsufficientFunds
        | ErrorCode::DraftMismatch => StatusCode::BAD_REQUEST,
        ErrorCode::KeyNotAuthorized => StatusCode::FORBIDDEN,
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::NotFullySigned => StatusCode::CONFLICT,
        ErrorCode::StoreUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        ErrorCode::BroadcastFailed => StatusCode::BAD_GATEWAY,
    }
}

fn api_error(e: impl Into<CoordinatorError>) -> ApiError {
    let error = e.into();
    (status_for(error.code), Json(error))
}

fn reply<T>(result: Result<T, MultisigError>) -> ApiResult<T> {
    result.map(Json).map_err(|e| {
        log::warn!("Request failed: {}", e);
        api_error(e)
    })
}

// ============================================================================
// Request Types
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateVaultRequest {
    pub identity_ids: Vec<String>,
    /// Resolved from the identity directory when absent
    #[serde(default)]
    pub public_keys: Option<Vec<String>>,
    pub threshold: u8,
    #[serde(default)]
    pub network: Option<Network>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTransactionRequest {
    pub inputs: Vec<Utxo>,
    pub output: DraftOutput,
    #[serde(default)]
    pub fee_rate: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultListQuery {
    pub signer: Option<String>,
    pub vault_id: Option<String>,
    #[serde(default)]
    pub refresh: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct RefreshQuery {
    #[serde(default)]
    pub refresh: bool,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub network: Network,
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /health - Liveness and configured network
pub async fn health_check(State(state): State<ApiState>) -> Json<HealthResponse> {
    let coordinator = state.coordinator.read().await;
    Json(HealthResponse {
        status: "ok",
        network: coordinator.config().network,
    })
}

/// POST /api/requests - Dispatch a typed request
pub async fn dispatch(
    State(state): State<ApiState>,
    Json(request): Json<Request>,
) -> ApiResult<Response> {
    let mut coordinator = state.coordinator.write().await;
    coordinator.handle(request).await.map(Json).map_err(api_error)
}

/// GET /api/vaults - List vaults, optionally by signer or id
pub async fn list_vaults(
    State(state): State<ApiState>,
    Query(query): Query<VaultListQuery>,
) -> ApiResult<Vec<Vault>> {
    let filter = VaultFilter {
        signer: query.signer,
        vault_id: query.vault_id,
    };
    let mut coordinator = state.coordinator.write().await;
    reply(coordinator.list_vaults(&filter, query.refresh).await)
}

/// POST /api/vaults - Register a vault
pub async fn create_vault(
    State(state): State<ApiState>,
    Json(req): Json<CreateVaultRequest>,
) -> Result<(StatusCode, Json<Vault>), ApiError> {
    let mut coordinator = state.coordinator.write().await;
    let result = match req.public_keys {
        Some(public_keys) => {
            let network = req.network.unwrap_or(coordinator.config().network);
            coordinator
                .create_vault(VaultParams {
                    identity_ids: req.identity_ids,
                    public_keys,
                    threshold: req.threshold,
                    network,
                })
                .await
        }
        None => {
            coordinator
                .create_vault_from_identities(req.identity_ids, req.threshold, req.network)
                .await
        }
    };
    reply(result).map(|vault| (StatusCode::CREATED, vault))
}

/// GET /api/vaults/:id/transactions - List drafts of a vault
pub async fn list_transactions(
    State(state): State<ApiState>,
    Path(vault_id): Path<String>,
    Query(query): Query<RefreshQuery>,
) -> ApiResult<Vec<TransactionDraft>> {
    let mut coordinator = state.coordinator.write().await;
    reply(coordinator.list_transactions(&vault_id, query.refresh).await)
}

/// POST /api/vaults/:id/transactions - Propose a spend
pub async fn create_transaction(
    State(state): State<ApiState>,
    Path(vault_id): Path<String>,
    Json(req): Json<CreateTransactionRequest>,
) -> Result<(StatusCode, Json<TransactionDraft>), ApiError> {
    let mut coordinator = state.coordinator.write().await;
    let result = coordinator
        .create_transaction(&vault_id, req.inputs, req.output, req.fee_rate)
        .await;
    reply(result).map(|draft| (StatusCode::CREATED, draft))
}

/// GET /api/transactions/:id/signatures - Signatures shared for a draft
pub async fn list_signatures(
    State(state): State<ApiState>,
    Path(transaction_id): Path<String>,
    Query(query): Query<RefreshQuery>,
) -> ApiResult<Vec<PartialSignature>> {
    let mut coordinator = state.coordinator.write().await;
    reply(
        coordinator
            .list_signatures(&transaction_id, query.refresh)
            .await,
    )
}

/// POST /api/transactions/:id/sign - Sign with the server's account
pub async fn sign_transaction(
    State(state): State<ApiState>,
    Path(transaction_id): Path<String>,
) -> ApiResult<Vec<PartialSignature>> {
    let mut coordinator = state.coordinator.write().await;
    reply(coordinator.submit_signature(&transaction_id).await)
}

/// GET /api/transactions/:id/status - Per-input signing progress
pub async fn transaction_status(
    State(state): State<ApiState>,
    Path(transaction_id): Path<String>,
) -> ApiResult<SigningStatus> {
    let mut coordinator = state.coordinator.write().await;
    reply(coordinator.status(&transaction_id).await)
}

/// POST /api/transactions/:id/execute - Broadcast a fully signed draft
pub async fn execute_transaction(
    State(state): State<ApiState>,
    Path(transaction_id): Path<String>,
) -> ApiResult<ExecutionReceipt> {
    let mut coordinator = state.coordinator.write().await;
    reply(coordinator.execute_transaction(&transaction_id).await)
}
