//! Typed request/response interface
//!
//! Every action a front end can take is one `Request` variant, answered by
//! one `Response` variant or a `CoordinatorError` carrying a stable code.

use crate::core::{Network, Utxo};
use crate::multisig::{
    Aggregation, DraftOutput, ErrorCode, InputStatus, MultisigError, PartialSignature, Rejection,
    TransactionDraft, Vault,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A coordinator command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "action",
    content = "params",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum Request {
    /// Register a vault from explicit public keys
    CreateVault {
        identity_ids: Vec<String>,
        public_keys: Vec<String>,
        threshold: u8,
        #[serde(default)]
        network: Option<Network>,
    },
    /// Register a vault, resolving each identity's public key
    CreateVaultFromIdentities {
        identity_ids: Vec<String>,
        threshold: u8,
        #[serde(default)]
        network: Option<Network>,
    },
    ListVaults {
        #[serde(default)]
        signer: Option<String>,
        #[serde(default)]
        vault_id: Option<String>,
        #[serde(default)]
        refresh: bool,
    },
    /// Propose a spend from a vault
    CreateTransaction {
        vault_id: String,
        inputs: Vec<Utxo>,
        output: DraftOutput,
        /// Duffs per byte; the configured rate when absent
        #[serde(default)]
        fee_rate: Option<u64>,
    },
    ListTransactions {
        vault_id: String,
        #[serde(default)]
        refresh: bool,
    },
    /// Sign every input of a draft with the account key and share the result
    SubmitSignature { transaction_id: String },
    ListSignatures {
        transaction_id: String,
        #[serde(default)]
        refresh: bool,
    },
    /// Assemble and broadcast a fully signed draft
    ExecuteTransaction { transaction_id: String },
    GetStatus { transaction_id: String },
}

impl Request {
    /// Short name for logs
    pub fn name(&self) -> &'static str {
        match self {
            Request::CreateVault { .. } => "createVault",
            Request::CreateVaultFromIdentities { .. } => "createVaultFromIdentities",
            Request::ListVaults { .. } => "listVaults",
            Request::CreateTransaction { .. } => "createTransaction",
            Request::ListTransactions { .. } => "listTransactions",
            Request::SubmitSignature { .. } => "submitSignature",
            Request::ListSignatures { .. } => "listSignatures",
            Request::ExecuteTransaction { .. } => "executeTransaction",
            Request::GetStatus { .. } => "getStatus",
        }
    }
}

/// Signing progress of a draft
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SigningStatus {
    pub transaction_id: String,
    pub vault_id: String,
    pub threshold: u8,
    pub fully_signed: bool,
    pub signed_inputs: usize,
    pub inputs: Vec<InputStatus>,
    pub rejected: Vec<Rejection>,
}

impl SigningStatus {
    pub fn new(draft: &TransactionDraft, vault: &Vault, aggregation: &Aggregation) -> Self {
        Self {
            transaction_id: draft.id.clone(),
            vault_id: vault.id.clone(),
            threshold: vault.threshold,
            fully_signed: aggregation.is_fully_signed(),
            signed_inputs: aggregation.signed_inputs(),
            inputs: aggregation.inputs.clone(),
            rejected: aggregation.rejected.clone(),
        }
    }
}

/// Result of a successful broadcast
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionReceipt {
    pub transaction_id: String,
    pub txid: String,
    pub raw_transaction: String,
}

/// A coordinator answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum Response {
    Vault(Vault),
    Vaults(Vec<Vault>),
    Transaction(TransactionDraft),
    Transactions(Vec<TransactionDraft>),
    Signatures(Vec<PartialSignature>),
    Status(SigningStatus),
    Executed(ExecutionReceipt),
}

/// Error returned to front ends: `{"code": ..., "error": ...}`
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{code}: {message}")]
pub struct CoordinatorError {
    pub code: ErrorCode,
    #[serde(rename = "error")]
    pub message: String,
}

impl CoordinatorError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl From<MultisigError> for CoordinatorError {
    fn from(e: MultisigError) -> Self {
        Self::new(e.code(), e.to_string())
    }
}
