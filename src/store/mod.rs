//! Document storage for vault coordination
//!
//! Vault definitions, spend drafts and partial signatures are exchanged as
//! append-only documents. This module provides:
//! - The document model and queries
//! - `DocumentStore` and `IdentityDirectory` traits at the platform seam
//! - An in-memory store and a shared-directory JSON file store
//! - The coordination cache holding the latest fetched documents

pub mod cache;
pub mod document;
pub mod file;
pub mod memory;

use async_trait::async_trait;
use serde_json::Value;

pub use cache::{CoordinationCache, VaultFilter};
pub use document::{
    Document, DocumentBatch, DocumentType, Query, Receipt, StoreError, DEFAULT_QUERY_LIMIT,
};
pub use file::{JsonFileStore, StoreConfig};
pub use memory::MemoryStore;

/// Document persistence, query and broadcast
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Build a document with an assigned id. Nothing is persisted until the
    /// document is broadcast.
    async fn create(
        &self,
        doc_type: DocumentType,
        owner_id: &str,
        properties: Value,
    ) -> Result<Document, StoreError>;

    /// Fetch documents of one type matching `query`, newest first
    async fn get(&self, doc_type: DocumentType, query: &Query) -> Result<Vec<Document>, StoreError>;

    /// Persist the batch's creations on behalf of `owner_id`
    async fn broadcast(&self, batch: DocumentBatch, owner_id: &str) -> Result<Receipt, StoreError>;
}

/// Identity public-key lookup
#[async_trait]
pub trait IdentityDirectory: Send + Sync {
    /// Hex-encoded compressed public key of the identity's first key
    async fn public_key(&self, identity_id: &str) -> Result<String, StoreError>;
}
