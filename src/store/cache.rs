//! Coordination cache
//!
//! Holds the latest vault, draft and signature documents fetched from the
//! store. Refreshes are explicit; reads never touch the store.

use super::document::{Query, StoreError, DEFAULT_QUERY_LIMIT};
use super::{DocumentStore, DocumentType};
use crate::multisig::{PartialSignature, TransactionDraft, Vault};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Which vaults to fetch or list
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultFilter {
    /// Only vaults this identity signs for
    pub signer: Option<String>,
    pub vault_id: Option<String>,
}

impl VaultFilter {
    pub fn matches(&self, vault: &Vault) -> bool {
        self.vault_id.as_ref().map_or(true, |id| *id == vault.id)
            && self.signer.as_ref().map_or(true, |s| vault.has_signer(s))
    }
}

/// Latest known coordination documents
#[derive(Debug, Clone)]
pub struct CoordinationCache {
    vaults: HashMap<String, Vault>,
    transactions: HashMap<String, TransactionDraft>,
    signatures: HashMap<String, Vec<PartialSignature>>,
    /// Set once a refresh fetched vaults without an id filter
    vaults_listed: bool,
    query_limit: usize,
}

impl Default for CoordinationCache {
    fn default() -> Self {
        Self::new(DEFAULT_QUERY_LIMIT)
    }
}

impl CoordinationCache {
    pub fn new(query_limit: usize) -> Self {
        Self {
            vaults: HashMap::new(),
            transactions: HashMap::new(),
            signatures: HashMap::new(),
            vaults_listed: false,
            query_limit: query_limit.max(1),
        }
    }

    // =========================================================================
    // Refresh
    // =========================================================================

    /// Fetch vaults matching `filter` and replace their cache entries
    ///
    /// Documents that no longer describe a valid vault are skipped.
    pub async fn refresh_vaults(
        &mut self,
        store: &dyn DocumentStore,
        filter: &VaultFilter,
    ) -> Result<usize, StoreError> {
        let mut query = Query::new().limit(self.query_limit);
        if let Some(id) = &filter.vault_id {
            query = query.where_eq("$id", id.as_str());
        }

        let documents = store.get(DocumentType::Vault, &query).await?;
        let mut loaded = 0;
        for document in &documents {
            match Vault::from_document(document) {
                Ok(vault) => {
                    if filter.matches(&vault) {
                        loaded += 1;
                    }
                    self.vaults.insert(vault.id.clone(), vault);
                }
                Err(e) => log::warn!("Skipping vault document {}: {}", document.id, e),
            }
        }
        if filter.vault_id.is_none() {
            self.vaults_listed = true;
        }
        log::debug!("Refreshed {} vault(s)", loaded);
        Ok(loaded)
    }

    pub async fn refresh_vault(
        &mut self,
        store: &dyn DocumentStore,
        vault_id: &str,
    ) -> Result<Option<&Vault>, StoreError> {
        let filter = VaultFilter {
            signer: None,
            vault_id: Some(vault_id.to_string()),
        };
        self.refresh_vaults(store, &filter).await?;
        Ok(self.vaults.get(vault_id))
    }

    /// Fetch the newest drafts of a vault
    pub async fn refresh_transactions(
        &mut self,
        store: &dyn DocumentStore,
        vault_id: &str,
    ) -> Result<usize, StoreError> {
        let query = Query::new()
            .where_eq("vaultId", vault_id)
            .limit(self.query_limit);
        self.load_transactions(store, &query).await
    }

    pub async fn refresh_transaction(
        &mut self,
        store: &dyn DocumentStore,
        transaction_id: &str,
    ) -> Result<Option<&TransactionDraft>, StoreError> {
        self.load_transactions(store, &Query::by_id(transaction_id))
            .await?;
        Ok(self.transactions.get(transaction_id))
    }

    async fn load_transactions(
        &mut self,
        store: &dyn DocumentStore,
        query: &Query,
    ) -> Result<usize, StoreError> {
        let documents = store.get(DocumentType::Transaction, query).await?;
        let mut loaded = 0;
        for document in &documents {
            match TransactionDraft::from_document(document) {
                Ok(draft) => {
                    self.transactions.insert(draft.id.clone(), draft);
                    loaded += 1;
                }
                Err(e) => log::warn!("Skipping transaction document {}: {}", document.id, e),
            }
        }
        Ok(loaded)
    }

    /// Replace the cached signatures of a draft with the store's view
    ///
    /// Every matching document is fetched; aggregation must see them all.
    pub async fn refresh_signatures(
        &mut self,
        store: &dyn DocumentStore,
        transaction_id: &str,
    ) -> Result<&[PartialSignature], StoreError> {
        let query = Query::new()
            .where_eq("transactionId", transaction_id)
            .limit(usize::MAX);
        let documents = store.get(DocumentType::Signature, &query).await?;

        let mut signatures = Vec::with_capacity(documents.len());
        for document in &documents {
            match PartialSignature::from_document(document) {
                Ok(signature) => signatures.push(signature),
                Err(e) => log::warn!("Skipping signature document {}: {}", document.id, e),
            }
        }
        let entry = self
            .signatures
            .entry(transaction_id.to_string())
            .or_default();
        *entry = signatures;
        Ok(entry.as_slice())
    }

    // =========================================================================
    // Local updates
    // =========================================================================

    pub fn insert_vault(&mut self, vault: Vault) {
        self.vaults.insert(vault.id.clone(), vault);
    }

    pub fn insert_transaction(&mut self, draft: TransactionDraft) {
        self.transactions.insert(draft.id.clone(), draft);
    }

    /// Record signatures this process just persisted
    pub fn insert_signatures(&mut self, new: Vec<PartialSignature>) {
        for signature in new {
            let entry = self
                .signatures
                .entry(signature.transaction_id.clone())
                .or_default();
            if !entry.iter().any(|s| s.id == signature.id) {
                entry.push(signature);
            }
        }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub fn get_vault(&self, vault_id: &str) -> Option<&Vault> {
        self.vaults.get(vault_id)
    }

    pub fn vault_count(&self) -> usize {
        self.vaults.len()
    }

    /// Whether the cache holds a full vault listing and not just lookups by id
    pub fn vaults_listed(&self) -> bool {
        self.vaults_listed
    }

    /// Cached vaults matching `filter`, newest first
    pub fn list_vaults(&self, filter: &VaultFilter) -> Vec<Vault> {
        let mut vaults: Vec<Vault> = self
            .vaults
            .values()
            .filter(|v| filter.matches(v))
            .cloned()
            .collect();
        vaults.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        vaults
    }

    pub fn get_transaction(&self, transaction_id: &str) -> Option<&TransactionDraft> {
        self.transactions.get(transaction_id)
    }

    /// Cached drafts of a vault, newest first
    pub fn list_transactions(&self, vault_id: &str) -> Vec<TransactionDraft> {
        let mut drafts: Vec<TransactionDraft> = self
            .transactions
            .values()
            .filter(|t| t.vault_id == vault_id)
            .cloned()
            .collect();
        drafts.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        drafts
    }

    pub fn signatures(&self, transaction_id: &str) -> &[PartialSignature] {
        self.signatures
            .get(transaction_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn has_signatures(&self, transaction_id: &str) -> bool {
        self.signatures.contains_key(transaction_id)
    }

    /// Drop everything; the next reads go back to the store
    pub fn clear(&mut self) {
        self.vaults.clear();
        self.transactions.clear();
        self.signatures.clear();
        self.vaults_listed = false;
    }
}
