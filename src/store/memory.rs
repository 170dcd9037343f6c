//! In-memory document store

use super::document::{Document, DocumentBatch, DocumentType, Query, Receipt, StoreError};
use super::{DocumentStore, IdentityDirectory};
use crate::crypto::public_key_from_hex;
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct Inner {
    documents: Vec<Document>,
    identities: HashMap<String, String>,
}

/// Process-local store, used by tests and single-process setups
#[derive(Debug)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
    online: AtomicBool,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            online: AtomicBool::new(true),
        }
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate the platform going away (or coming back)
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    fn check_online(&self) -> Result<(), StoreError> {
        if self.online.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable("memory store is offline".to_string()))
        }
    }

    /// Register the public key an identity signs with
    pub async fn register_identity(
        &self,
        identity_id: &str,
        public_key: &str,
    ) -> Result<(), StoreError> {
        public_key_from_hex(public_key).map_err(|e| StoreError::InvalidDocument(e.to_string()))?;
        self.inner
            .write()
            .await
            .identities
            .insert(identity_id.to_string(), public_key.to_lowercase());
        Ok(())
    }

    /// Number of persisted documents of every type
    pub async fn document_count(&self) -> usize {
        self.inner.read().await.documents.len()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn create(
        &self,
        doc_type: DocumentType,
        owner_id: &str,
        properties: Value,
    ) -> Result<Document, StoreError> {
        self.check_online()?;
        Document::new(doc_type, owner_id, properties)
    }

    async fn get(&self, doc_type: DocumentType, query: &Query) -> Result<Vec<Document>, StoreError> {
        self.check_online()?;
        let inner = self.inner.read().await;
        Ok(query.apply(inner.documents.iter().filter(|d| d.doc_type == doc_type)))
    }

    async fn broadcast(&self, batch: DocumentBatch, owner_id: &str) -> Result<Receipt, StoreError> {
        self.check_online()?;
        batch.validate(owner_id)?;

        let mut inner = self.inner.write().await;
        if let Some(existing) = batch
            .create
            .iter()
            .find(|d| inner.documents.iter().any(|e| e.id == d.id))
        {
            return Err(StoreError::InvalidDocument(format!(
                "document {} already exists",
                existing.id
            )));
        }

        let document_ids = batch.create.iter().map(|d| d.id.clone()).collect();
        inner.documents.extend(batch.create);
        Ok(Receipt {
            document_ids,
            timestamp: Utc::now(),
        })
    }
}

#[async_trait]
impl IdentityDirectory for MemoryStore {
    async fn public_key(&self, identity_id: &str) -> Result<String, StoreError> {
        self.check_online()?;
        self.inner
            .read()
            .await
            .identities
            .get(identity_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("identity {}", identity_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyPair;
    use serde_json::json;

    #[tokio::test]
    async fn test_create_does_not_persist_until_broadcast() {
        let store = MemoryStore::new();
        let doc = store
            .create(DocumentType::Vault, "alice", json!({"threshold": 1}))
            .await
            .unwrap();
        assert_eq!(store.document_count().await, 0);

        let receipt = store
            .broadcast(DocumentBatch::create(vec![doc.clone()]), "alice")
            .await
            .unwrap();
        assert_eq!(receipt.document_ids, vec![doc.id.clone()]);

        let found = store
            .get(DocumentType::Vault, &Query::by_id(&doc.id))
            .await
            .unwrap();
        assert_eq!(found, vec![doc]);
        assert!(store
            .get(DocumentType::Transaction, &Query::new())
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_rebroadcast_rejected() {
        let store = MemoryStore::new();
        let doc = store
            .create(DocumentType::Signature, "alice", json!({}))
            .await
            .unwrap();
        store
            .broadcast(DocumentBatch::create(vec![doc.clone()]), "alice")
            .await
            .unwrap();
        assert!(store
            .broadcast(DocumentBatch::create(vec![doc]), "alice")
            .await
            .is_err());
        assert_eq!(store.document_count().await, 1);
    }

    #[tokio::test]
    async fn test_offline_store_is_unavailable() {
        let store = MemoryStore::new();
        store.set_online(false);
        assert!(matches!(
            store.get(DocumentType::Vault, &Query::new()).await,
            Err(StoreError::Unavailable(_))
        ));
        store.set_online(true);
        assert!(store.get(DocumentType::Vault, &Query::new()).await.is_ok());
    }

    #[tokio::test]
    async fn test_identity_directory() {
        let store = MemoryStore::new();
        let kp = KeyPair::generate();
        store
            .register_identity("alice", &kp.public_key_hex())
            .await
            .unwrap();
        assert_eq!(store.public_key("alice").await.unwrap(), kp.public_key_hex());
        assert!(matches!(
            store.public_key("bob").await,
            Err(StoreError::NotFound(_))
        ));
        assert!(store.register_identity("carol", "nope").await.is_err());
    }
}
