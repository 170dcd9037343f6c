//! Multi-signature vault definition and registry
//!
//! A vault is an m-of-n spending group: an ordered list of signer identities,
//! their index-aligned public keys, a threshold and a network. Its address is
//! always re-derived from those fields, never read back from storage.

use crate::core::address::{derive_address, redeem_script_for, AddressError, Network};
use crate::core::{Address, TransactionError};
use crate::crypto::KeyError;
use crate::store::{
    CoordinationCache, Document, DocumentBatch, DocumentStore, DocumentType, StoreError,
    VaultFilter,
};
use crate::wallet::WalletError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

// =============================================================================
// Errors
// =============================================================================

/// Stable error codes surfaced to callers of the coordinator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    #[serde(alias = "ValidationError")]
    BadArguments,
    InvalidThreshold,
    InvalidKeySet,
    #[serde(rename = "ForeignUTXO", alias = "ForeignUtxo")]
    ForeignUtxo,
    InsufficientFunds,
    KeyNotAuthorized,
    DraftMismatch,
    NotFound,
    StoreUnavailable,
    BroadcastFailed,
    NotFullySigned,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::BadArguments => "BadArguments",
            ErrorCode::InvalidThreshold => "InvalidThreshold",
            ErrorCode::InvalidKeySet => "InvalidKeySet",
            ErrorCode::ForeignUtxo => "ForeignUTXO",
            ErrorCode::InsufficientFunds => "InsufficientFunds",
            ErrorCode::KeyNotAuthorized => "KeyNotAuthorized",
            ErrorCode::DraftMismatch => "DraftMismatch",
            ErrorCode::NotFound => "NotFound",
            ErrorCode::StoreUnavailable => "StoreUnavailable",
            ErrorCode::BroadcastFailed => "BroadcastFailed",
            ErrorCode::NotFullySigned => "NotFullySigned",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors related to multisig coordination
#[derive(Error, Debug)]
pub enum MultisigError {
    #[error("Bad arguments: {0}")]
    BadArguments(String),
    #[error("Invalid threshold: {threshold} for {signers} signer(s)")]
    InvalidThreshold { threshold: u8, signers: usize },
    #[error("Invalid key set: {0}")]
    InvalidKeySet(String),
    #[error("UTXO {outpoint} does not belong to the vault: {reason}")]
    ForeignUtxo { outpoint: String, reason: String },
    #[error("Insufficient funds: have {available}, need {required}")]
    InsufficientFunds { available: u64, required: u64 },
    #[error("Key not authorized for this vault: {0}")]
    KeyNotAuthorized(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Not fully signed: {signed} of {inputs} input(s) meet the threshold")]
    NotFullySigned { signed: usize, inputs: usize },
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
    #[error("Wallet error: {0}")]
    Wallet(#[from] WalletError),
    #[error("Crypto error: {0}")]
    Crypto(#[from] KeyError),
    #[error("Transaction error: {0}")]
    Transaction(#[from] TransactionError),
}

impl From<AddressError> for MultisigError {
    fn from(e: AddressError) -> Self {
        match e {
            AddressError::InvalidThreshold { threshold, signers } => {
                MultisigError::InvalidThreshold { threshold, signers }
            }
            AddressError::InvalidKeySet(msg) => MultisigError::InvalidKeySet(msg),
            other => MultisigError::BadArguments(other.to_string()),
        }
    }
}

impl MultisigError {
    pub fn code(&self) -> ErrorCode {
        match self {
            MultisigError::BadArguments(_) => ErrorCode::BadArguments,
            MultisigError::InvalidThreshold { .. } => ErrorCode::InvalidThreshold,
            MultisigError::InvalidKeySet(_) => ErrorCode::InvalidKeySet,
            MultisigError::ForeignUtxo { .. } => ErrorCode::ForeignUtxo,
            MultisigError::InsufficientFunds { .. } => ErrorCode::InsufficientFunds,
            MultisigError::KeyNotAuthorized(_) => ErrorCode::KeyNotAuthorized,
            MultisigError::NotFound(_) => ErrorCode::NotFound,
            MultisigError::NotFullySigned { .. } => ErrorCode::NotFullySigned,
            MultisigError::Store(StoreError::NotFound(_)) => ErrorCode::NotFound,
            MultisigError::Store(StoreError::Unavailable(_)) => ErrorCode::StoreUnavailable,
            MultisigError::Store(_) => ErrorCode::BadArguments,
            MultisigError::Wallet(WalletError::BroadcastFailed(_)) => ErrorCode::BroadcastFailed,
            MultisigError::Wallet(_) => ErrorCode::BadArguments,
            MultisigError::Crypto(_) => ErrorCode::BadArguments,
            MultisigError::Transaction(_) => ErrorCode::BadArguments,
        }
    }
}

// =============================================================================
// Vault
// =============================================================================

/// Arguments for creating a vault
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultParams {
    /// Signer identities, in key order
    pub identity_ids: Vec<String>,
    /// Compressed public keys (hex), index-aligned with `identity_ids`
    pub public_keys: Vec<String>,
    /// Signatures required per input (M)
    pub threshold: u8,
    #[serde(default)]
    pub network: Network,
}

impl VaultParams {
    /// Check every vault invariant and return the derived address
    ///
    /// All failures are `BadArguments`; nothing here touches the store.
    pub fn validate(&self) -> Result<String, MultisigError> {
        if self.identity_ids.is_empty() {
            return Err(MultisigError::BadArguments(
                "at least one signer identity is required".to_string(),
            ));
        }
        if self.identity_ids.len() != self.public_keys.len() {
            return Err(MultisigError::BadArguments(format!(
                "{} identities but {} public keys",
                self.identity_ids.len(),
                self.public_keys.len()
            )));
        }
        let mut seen = HashSet::new();
        for id in &self.identity_ids {
            if id.trim().is_empty() {
                return Err(MultisigError::BadArguments("empty identity id".to_string()));
            }
            if !seen.insert(id.as_str()) {
                return Err(MultisigError::BadArguments(format!(
                    "duplicate identity {}",
                    id
                )));
            }
        }

        derive_address(&self.public_keys, self.threshold, self.network)
            .map_err(|e| MultisigError::BadArguments(e.to_string()))
    }
}

/// Payload of a `honeypot.vault` document
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VaultRecord {
    threshold: u8,
    identity_ids: Vec<String>,
    public_keys: Vec<String>,
    #[serde(default)]
    network: Network,
}

/// An m-of-n multisig vault
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vault {
    pub id: String,
    /// Identity that registered the vault
    pub owner_id: String,
    pub threshold: u8,
    pub signer_identity_ids: Vec<String>,
    pub public_keys: Vec<String>,
    pub network: Network,
    /// P2SH address derived from keys, threshold and network
    pub address: String,
    pub created_at: DateTime<Utc>,
}

impl Vault {
    /// Validate `params` and build an unpersisted vault (empty id)
    pub fn new(params: VaultParams) -> Result<Self, MultisigError> {
        let address = params.validate()?;
        Ok(Self {
            id: String::new(),
            owner_id: String::new(),
            threshold: params.threshold,
            signer_identity_ids: params.identity_ids,
            public_keys: params
                .public_keys
                .iter()
                .map(|k| k.to_lowercase())
                .collect(),
            network: params.network,
            address,
            created_at: Utc::now(),
        })
    }

    /// Rebuild a vault from its document, re-deriving the address
    pub fn from_document(document: &Document) -> Result<Self, MultisigError> {
        if document.doc_type != DocumentType::Vault {
            return Err(StoreError::InvalidDocument(format!(
                "{} is not a vault document",
                document.id
            ))
            .into());
        }
        let record: VaultRecord = document.parse_data()?;
        let mut vault = Vault::new(VaultParams {
            identity_ids: record.identity_ids,
            public_keys: record.public_keys,
            threshold: record.threshold,
            network: record.network,
        })?;
        vault.id = document.id.clone();
        vault.owner_id = document.owner_id.clone();
        vault.created_at = document.created_at;
        Ok(vault)
    }

    /// Document payload for this vault
    pub fn properties(&self) -> Result<serde_json::Value, MultisigError> {
        let record = VaultRecord {
            threshold: self.threshold,
            identity_ids: self.signer_identity_ids.clone(),
            public_keys: self.public_keys.clone(),
            network: self.network,
        };
        serde_json::to_value(record).map_err(|e| MultisigError::BadArguments(e.to_string()))
    }

    /// Get the total signer count (N)
    pub fn signer_count(&self) -> usize {
        self.public_keys.len()
    }

    /// Position of `public_key` in the vault's key order
    pub fn key_index(&self, public_key: &str) -> Option<usize> {
        let needle = public_key.to_lowercase();
        self.public_keys.iter().position(|k| *k == needle)
    }

    /// Check if an identity is one of the signers
    pub fn has_signer(&self, identity_id: &str) -> bool {
        self.signer_identity_ids.iter().any(|id| id == identity_id)
    }

    /// The `OP_m <keys> OP_n OP_CHECKMULTISIG` redeem script
    pub fn redeem_script(&self) -> Result<Vec<u8>, MultisigError> {
        Ok(redeem_script_for(&self.public_keys, self.threshold)?)
    }

    /// The P2SH locking script of every vault-owned output
    pub fn script_pubkey(&self) -> Result<Vec<u8>, MultisigError> {
        Ok(Address::p2sh(&self.redeem_script()?, self.network).script_pubkey())
    }

    /// Hex of `script_pubkey`, as carried by UTXO records
    pub fn script_pubkey_hex(&self) -> Result<String, MultisigError> {
        Ok(hex::encode(self.script_pubkey()?))
    }

    /// Description like "2-of-3"
    pub fn description(&self) -> String {
        format!("{}-of-{}", self.threshold, self.signer_count())
    }
}

// =============================================================================
// Registry
// =============================================================================

/// Validate, derive, persist and cache a new vault
pub async fn create_vault(
    store: &dyn DocumentStore,
    cache: &mut CoordinationCache,
    owner_id: &str,
    params: VaultParams,
) -> Result<Vault, MultisigError> {
    let mut vault = Vault::new(params)?;

    let document = store
        .create(DocumentType::Vault, owner_id, vault.properties()?)
        .await?;
    store
        .broadcast(DocumentBatch::create(vec![document.clone()]), owner_id)
        .await?;

    vault.id = document.id;
    vault.owner_id = document.owner_id;
    vault.created_at = document.created_at;
    log::info!(
        "Created {} vault {} at {}",
        vault.description(),
        vault.id,
        vault.address
    );

    cache.insert_vault(vault.clone());
    Ok(vault)
}

/// List vaults through the cache, querying the store on a miss or refresh
pub async fn list_vaults(
    store: &dyn DocumentStore,
    cache: &mut CoordinationCache,
    filter: &VaultFilter,
    refresh: bool,
) -> Result<Vec<Vault>, MultisigError> {
    let miss = match &filter.vault_id {
        Some(id) => cache.get_vault(id).is_none(),
        None => !cache.vaults_listed(),
    };
    if refresh || miss {
        cache.refresh_vaults(store, filter).await?;
    }
    Ok(cache.list_vaults(filter))
}

/// Fetch one vault, refreshing the cache entry if it is missing
pub async fn get_vault(
    store: &dyn DocumentStore,
    cache: &mut CoordinationCache,
    vault_id: &str,
    refresh: bool,
) -> Result<Vault, MultisigError> {
    if refresh || cache.get_vault(vault_id).is_none() {
        cache.refresh_vault(store, vault_id).await?;
    }
    cache
        .get_vault(vault_id)
        .cloned()
        .ok_or_else(|| MultisigError::NotFound(format!("vault {}", vault_id)))
}
