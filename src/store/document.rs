//! Coordination documents and queries
//!
//! Every vault, spend draft and partial signature is an append-only document
//! with a store-assigned id, an owner identity, a creation time and a JSON
//! payload.

use chrono::{DateTime, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Default number of documents a query returns
pub const DEFAULT_QUERY_LIMIT: usize = 10;

/// Document store errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Invalid document: {0}")]
    InvalidDocument(String),
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        StoreError::Unavailable(e.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::InvalidDocument(e.to_string())
    }
}

// =============================================================================
// Document Types
// =============================================================================

/// The three coordination document types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentType {
    Vault,
    Transaction,
    Signature,
}

impl DocumentType {
    pub const ALL: [DocumentType; 3] = [
        DocumentType::Vault,
        DocumentType::Transaction,
        DocumentType::Signature,
    ];

    /// Fully qualified schema name
    pub fn schema_name(self) -> &'static str {
        match self {
            DocumentType::Vault => "honeypot.vault",
            DocumentType::Transaction => "honeypot.transaction",
            DocumentType::Signature => "honeypot.signature",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DocumentType::Vault => "vault",
            DocumentType::Transaction => "transaction",
            DocumentType::Signature => "signature",
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.schema_name())
    }
}

impl FromStr for DocumentType {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.strip_prefix("honeypot.").unwrap_or(s);
        match name {
            "vault" => Ok(DocumentType::Vault),
            "transaction" => Ok(DocumentType::Transaction),
            "signature" => Ok(DocumentType::Signature),
            other => Err(StoreError::InvalidDocument(format!(
                "unknown document type {}",
                other
            ))),
        }
    }
}

// =============================================================================
// Document
// =============================================================================

/// A stored coordination document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: String,
    pub owner_id: String,
    pub created_at: DateTime<Utc>,
    pub doc_type: DocumentType,
    pub data: Value,
}

impl Document {
    /// Build an unpersisted document with a fresh random id
    pub fn new(doc_type: DocumentType, owner_id: &str, data: Value) -> Result<Self, StoreError> {
        if owner_id.trim().is_empty() {
            return Err(StoreError::InvalidDocument("missing owner id".to_string()));
        }
        if !data.is_object() {
            return Err(StoreError::InvalidDocument(
                "document data must be a JSON object".to_string(),
            ));
        }
        Ok(Self {
            id: generate_document_id(),
            owner_id: owner_id.to_string(),
            created_at: Utc::now(),
            doc_type,
            data,
        })
    }

    /// Look up a filter field: `$id`, `$ownerId`, or a dotted payload path
    pub fn field(&self, path: &str) -> Option<Value> {
        match path {
            "$id" => Some(Value::String(self.id.clone())),
            "$ownerId" => Some(Value::String(self.owner_id.clone())),
            _ => {
                let mut current = &self.data;
                for part in path.split('.') {
                    current = current.get(part)?;
                }
                Some(current.clone())
            }
        }
    }

    /// Deserialize the payload into a typed record
    pub fn parse_data<T: serde::de::DeserializeOwned>(&self) -> Result<T, StoreError> {
        serde_json::from_value(self.data.clone()).map_err(|e| {
            StoreError::InvalidDocument(format!("{} {}: {}", self.doc_type, self.id, e))
        })
    }
}

/// 32 random bytes, Base58 encoded
pub fn generate_document_id() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    bs58::encode(bytes).into_string()
}

// =============================================================================
// Query
// =============================================================================

/// Equality query over documents of one type, newest first
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub filters: Vec<(String, Value)>,
    pub limit: usize,
}

impl Default for Query {
    fn default() -> Self {
        Self {
            filters: Vec::new(),
            limit: DEFAULT_QUERY_LIMIT,
        }
    }
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an `==` condition
    pub fn where_eq(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.filters.push((field.to_string(), value.into()));
        self
    }

    pub fn by_id(id: &str) -> Self {
        Self::new().where_eq("$id", id).limit(1)
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn matches(&self, document: &Document) -> bool {
        self.filters
            .iter()
            .all(|(field, expected)| document.field(field).as_ref() == Some(expected))
    }

    /// Apply to documents in insertion order: filter, newest first, truncate
    pub fn apply<'a, I>(&self, documents: I) -> Vec<Document>
    where
        I: DoubleEndedIterator<Item = &'a Document>,
    {
        // Reverse first so equal timestamps keep the latest insert on top
        let mut matched: Vec<Document> = documents
            .rev()
            .filter(|d| self.matches(d))
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        matched.truncate(self.limit);
        matched
    }
}

// =============================================================================
// Batches
// =============================================================================

/// A state transition submitted to the store
#[derive(Debug, Clone, Default)]
pub struct DocumentBatch {
    pub create: Vec<Document>,
    pub replace: Vec<Document>,
    pub delete: Vec<Document>,
}

impl DocumentBatch {
    pub fn create(documents: Vec<Document>) -> Self {
        Self {
            create: documents,
            ..Default::default()
        }
    }

    /// Reject anything but creations and check ownership and id uniqueness
    pub fn validate(&self, owner_id: &str) -> Result<(), StoreError> {
        if !self.replace.is_empty() || !self.delete.is_empty() {
            return Err(StoreError::UnsupportedOperation(
                "coordination documents are append-only".to_string(),
            ));
        }
        if self.create.is_empty() {
            return Err(StoreError::InvalidDocument("empty batch".to_string()));
        }
        let mut seen = std::collections::HashSet::new();
        for document in &self.create {
            if document.owner_id != owner_id {
                return Err(StoreError::InvalidDocument(format!(
                    "document {} is not owned by {}",
                    document.id, owner_id
                )));
            }
            if !seen.insert(document.id.as_str()) {
                return Err(StoreError::InvalidDocument(format!(
                    "duplicate document id {}",
                    document.id
                )));
            }
        }
        Ok(())
    }
}

/// Acknowledgement of a persisted batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    pub document_ids: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    fn doc(data: Value) -> Document {
        Document::new(DocumentType::Vault, "owner", data).unwrap()
    }

    #[test]
    fn test_document_type_names() {
        assert_eq!(DocumentType::Signature.schema_name(), "honeypot.signature");
        assert_eq!(
            "honeypot.transaction".parse::<DocumentType>().unwrap(),
            DocumentType::Transaction
        );
        assert_eq!("vault".parse::<DocumentType>().unwrap(), DocumentType::Vault);
        assert!("honeypot.profile".parse::<DocumentType>().is_err());
    }

    #[test]
    fn test_new_document_validation() {
        assert!(Document::new(DocumentType::Vault, "", json!({})).is_err());
        assert!(Document::new(DocumentType::Vault, "owner", json!([1, 2])).is_err());

        let a = doc(json!({}));
        let b = doc(json!({}));
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_field_lookup() {
        let d = doc(json!({"vaultId": "v1", "signature": {"publicKey": "02ab"}}));
        assert_eq!(d.field("vaultId"), Some(json!("v1")));
        assert_eq!(d.field("signature.publicKey"), Some(json!("02ab")));
        assert_eq!(d.field("$id"), Some(json!(d.id.clone())));
        assert_eq!(d.field("$ownerId"), Some(json!("owner")));
        assert_eq!(d.field("missing.path"), None);
    }

    #[test]
    fn test_query_filters_orders_and_limits() {
        let mut docs = Vec::new();
        let base = Utc::now();
        for i in 0..5 {
            let mut d = doc(json!({"vaultId": if i % 2 == 0 { "even" } else { "odd" }, "n": i}));
            d.created_at = base + Duration::seconds(i);
            docs.push(d);
        }

        let even = Query::new().where_eq("vaultId", "even").apply(docs.iter());
        let ns: Vec<_> = even.iter().map(|d| d.data["n"].clone()).collect();
        assert_eq!(ns, vec![json!(4), json!(2), json!(0)]);

        let limited = Query::new().limit(2).apply(docs.iter());
        assert_eq!(limited.len(), 2);
        assert_eq!(limited[0].data["n"], json!(4));

        let by_id = Query::by_id(&docs[1].id).apply(docs.iter());
        assert_eq!(by_id.len(), 1);
        assert_eq!(by_id[0].id, docs[1].id);
    }

    #[test]
    fn test_equal_timestamps_prefer_latest_insert() {
        let mut first = doc(json!({"n": 1}));
        let mut second = doc(json!({"n": 2}));
        let now = Utc::now();
        first.created_at = now;
        second.created_at = now;
        let docs = vec![first, second];
        let result = Query::new().apply(docs.iter());
        assert_eq!(result[0].data["n"], json!(2));
    }

    #[test]
    fn test_batch_validation() {
        let d = doc(json!({}));
        assert!(DocumentBatch::create(vec![d.clone()]).validate("owner").is_ok());
        assert!(DocumentBatch::create(vec![d.clone()]).validate("other").is_err());
        assert!(DocumentBatch::create(vec![d.clone(), d.clone()])
            .validate("owner")
            .is_err());
        assert!(DocumentBatch::create(vec![]).validate("owner").is_err());

        let replace = DocumentBatch {
            replace: vec![d],
            ..Default::default()
        };
        assert!(matches!(
            replace.validate("owner"),
            Err(StoreError::UnsupportedOperation(_))
        ));
    }
}
