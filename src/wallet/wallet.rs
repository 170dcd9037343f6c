//! Signer accounts
//!
//! A `WalletAccount` is the on-chain side of a co-signer: it knows its
//! platform identity, holds its signing keys and can hand a finished
//! transaction to the network.

use crate::core::Transaction;
use crate::crypto::{KeyError, KeyPair};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use tokio::sync::Mutex;

/// Wallet-related errors
#[derive(Error, Debug)]
pub enum WalletError {
    #[error("No key at index {0}")]
    KeyNotFound(u32),
    #[error("Broadcast failed: {0}")]
    BroadcastFailed(String),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[error("Crypto error: {0}")]
    CryptoError(#[from] KeyError),
}

/// Identity, key access and broadcast for one co-signer
#[async_trait]
pub trait WalletAccount: Send + Sync {
    /// Platform identity that owns this account's documents
    fn identity_id(&self) -> &str;

    /// Signing key at `index`
    fn private_key(&self, index: u32) -> Result<KeyPair, WalletError>;

    /// Submit a fully signed transaction, returning its txid
    async fn broadcast_transaction(&self, tx: &Transaction) -> Result<String, WalletError>;
}

/// Serializable account data for persistence
#[derive(Debug, Serialize, Deserialize)]
struct AccountData {
    identity_id: String,
    private_key_hex: String,
}

/// Single-key account that records broadcasts in an outbox
///
/// With an outbox directory every broadcast is also written to
/// `broadcasts/<txid>.hex` for relaying by an external node.
#[derive(Debug)]
pub struct LocalAccount {
    identity_id: String,
    key_pair: KeyPair,
    outbox_dir: Option<PathBuf>,
    outbox: Mutex<Vec<String>>,
    online: AtomicBool,
}

impl LocalAccount {
    pub fn new(identity_id: &str, key_pair: KeyPair) -> Self {
        Self {
            identity_id: identity_id.to_string(),
            key_pair,
            outbox_dir: None,
            outbox: Mutex::new(Vec::new()),
            online: AtomicBool::new(true),
        }
    }

    /// Import an account from a hex private key
    pub fn from_private_key(identity_id: &str, private_key_hex: &str) -> Result<Self, WalletError> {
        Ok(Self::new(
            identity_id,
            KeyPair::from_private_key_hex(private_key_hex)?,
        ))
    }

    /// Write broadcasts under `data_dir/broadcasts`
    pub fn with_outbox_dir(mut self, data_dir: &Path) -> Self {
        self.outbox_dir = Some(data_dir.join("broadcasts"));
        self
    }

    /// Get the account's public key (hex)
    pub fn public_key(&self) -> String {
        self.key_pair.public_key_hex()
    }

    /// Simulate losing (or regaining) network access
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    /// Raw transactions broadcast so far, oldest first
    pub async fn outbox(&self) -> Vec<String> {
        self.outbox.lock().await.clone()
    }

    /// Save the account to a file
    pub fn save(&self, path: &Path) -> Result<(), WalletError> {
        let data = AccountData {
            identity_id: self.identity_id.clone(),
            private_key_hex: self.key_pair.private_key_hex(),
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(&data)?)?;
        Ok(())
    }

    /// Load an account from a file
    pub fn load(path: &Path) -> Result<Self, WalletError> {
        let json = fs::read_to_string(path)?;
        let data: AccountData = serde_json::from_str(&json)?;
        Self::from_private_key(&data.identity_id, &data.private_key_hex)
    }
}

#[async_trait]
impl WalletAccount for LocalAccount {
    fn identity_id(&self) -> &str {
        &self.identity_id
    }

    fn private_key(&self, index: u32) -> Result<KeyPair, WalletError> {
        match index {
            0 => Ok(self.key_pair.clone()),
            other => Err(WalletError::KeyNotFound(other)),
        }
    }

    async fn broadcast_transaction(&self, tx: &Transaction) -> Result<String, WalletError> {
        if !self.online.load(Ordering::SeqCst) {
            return Err(WalletError::BroadcastFailed("network unreachable".to_string()));
        }

        let txid = tx.txid();
        let raw = tx.to_hex();
        if let Some(dir) = &self.outbox_dir {
            fs::create_dir_all(dir)
                .and_then(|_| fs::write(dir.join(format!("{}.hex", txid)), &raw))
                .map_err(|e| WalletError::BroadcastFailed(e.to_string()))?;
        }
        self.outbox.lock().await.push(raw);

        log::info!("Broadcast transaction {}", txid);
        Ok(txid)
    }
}
