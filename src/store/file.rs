//! JSON file document store
//!
//! Every document is its own file, `<type>s/<id>.json`, under the data
//! directory. A document is written to a temporary file in the same directory
//! and then linked into place without overwriting, so a file either holds a
//! complete document or does not exist. Signer processes sharing a directory
//! append concurrently without any locking and see each other's documents on
//! the next read.

use super::document::{Document, DocumentBatch, DocumentType, Query, Receipt, StoreError};
use super::{DocumentStore, IdentityDirectory};
use crate::crypto::public_key_from_hex;
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// File store configuration
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub data_dir: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".vault_data"),
        }
    }
}

impl StoreConfig {
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IdentityRecord {
    identity_id: String,
    public_key: String,
}

/// Append-only document store backed by one JSON file per document
#[derive(Debug)]
pub struct JsonFileStore {
    config: StoreConfig,
}

impl JsonFileStore {
    /// Open (creating if needed) a store in `config.data_dir`
    pub fn open(config: StoreConfig) -> Result<Self, StoreError> {
        for doc_type in DocumentType::ALL {
            fs::create_dir_all(config.data_dir.join(type_dir(doc_type)))?;
        }
        fs::create_dir_all(config.data_dir.join("identities"))?;
        log::debug!("Document store at {}", config.data_dir.display());
        Ok(Self { config })
    }

    pub fn data_dir(&self) -> &Path {
        &self.config.data_dir
    }

    fn documents_dir(&self, doc_type: DocumentType) -> PathBuf {
        self.config.data_dir.join(type_dir(doc_type))
    }

    fn document_path(&self, doc_type: DocumentType, id: &str) -> PathBuf {
        self.documents_dir(doc_type).join(format!("{}.json", id))
    }

    fn identity_path(&self, identity_id: &str) -> PathBuf {
        // Identity ids are arbitrary strings; hex keeps them valid file names
        self.config
            .data_dir
            .join("identities")
            .join(format!("{}.json", hex::encode(identity_id)))
    }

    /// Every stored document of a type, oldest first
    fn load_documents(&self, doc_type: DocumentType) -> Result<Vec<Document>, StoreError> {
        let dir = self.documents_dir(doc_type);
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut documents = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let document: Document = read_json(&path)?;
            documents.push(document);
        }
        documents.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(documents)
    }

    /// Register the public key an identity signs with
    pub async fn register_identity(
        &self,
        identity_id: &str,
        public_key: &str,
    ) -> Result<(), StoreError> {
        public_key_from_hex(public_key).map_err(|e| StoreError::InvalidDocument(e.to_string()))?;

        let record = IdentityRecord {
            identity_id: identity_id.to_string(),
            public_key: public_key.to_lowercase(),
        };
        let path = self.identity_path(identity_id);
        let temp = write_temp(path.parent().unwrap_or(&self.config.data_dir), &record)?;
        // Re-registering replaces the key atomically
        temp.persist(&path).map_err(|e| StoreError::from(e.error))?;
        log::info!("Registered identity {}", identity_id);
        Ok(())
    }
}

fn type_dir(doc_type: DocumentType) -> String {
    format!("{}s", doc_type.as_str())
}

fn is_file_safe(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, StoreError> {
    let file = fs::File::open(path)?;
    let reader = BufReader::new(file);
    Ok(serde_json::from_reader(reader)?)
}

/// Serialize `value` into a uniquely named temp file inside `dir`
fn write_temp<T: Serialize>(dir: &Path, value: &T) -> Result<NamedTempFile, StoreError> {
    let mut temp = NamedTempFile::new_in(dir)?;
    {
        let mut writer = BufWriter::new(temp.as_file_mut());
        serde_json::to_writer_pretty(&mut writer, value)?;
        writer.flush()?;
    }
    temp.as_file().sync_all()?;
    Ok(temp)
}

#[async_trait]
impl DocumentStore for JsonFileStore {
    async fn create(
        &self,
        doc_type: DocumentType,
        owner_id: &str,
        properties: Value,
    ) -> Result<Document, StoreError> {
        Document::new(doc_type, owner_id, properties)
    }

    async fn get(&self, doc_type: DocumentType, query: &Query) -> Result<Vec<Document>, StoreError> {
        let documents = self.load_documents(doc_type)?;
        Ok(query.apply(documents.iter()))
    }

    async fn broadcast(&self, batch: DocumentBatch, owner_id: &str) -> Result<Receipt, StoreError> {
        batch.validate(owner_id)?;

        if let Some(bad) = batch.create.iter().find(|d| !is_file_safe(&d.id)) {
            return Err(StoreError::InvalidDocument(format!(
                "document id {:?} is not a valid file name",
                bad.id
            )));
        }
        if let Some(existing) = batch
            .create
            .iter()
            .find(|d| self.document_path(d.doc_type, &d.id).exists())
        {
            return Err(StoreError::InvalidDocument(format!(
                "document {} already exists",
                existing.id
            )));
        }

        let mut document_ids = Vec::with_capacity(batch.create.len());
        for document in &batch.create {
            let path = self.document_path(document.doc_type, &document.id);
            let temp = write_temp(&self.documents_dir(document.doc_type), document)?;
            temp.persist_noclobber(&path).map_err(|e| match e.error.kind() {
                ErrorKind::AlreadyExists => {
                    StoreError::InvalidDocument(format!("document {} already exists", document.id))
                }
                _ => StoreError::from(e.error),
            })?;
            document_ids.push(document.id.clone());
        }

        log::debug!("Persisted {} document(s) for {}", document_ids.len(), owner_id);
        Ok(Receipt {
            document_ids,
            timestamp: Utc::now(),
        })
    }
}

#[async_trait]
impl IdentityDirectory for JsonFileStore {
    async fn public_key(&self, identity_id: &str) -> Result<String, StoreError> {
        let path = self.identity_path(identity_id);
        match read_json::<IdentityRecord>(&path) {
            Ok(record) => Ok(record.public_key),
            Err(StoreError::Unavailable(_)) if !path.exists() => {
                Err(StoreError::NotFound(format!("identity {}", identity_id)))
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyPair;
    use serde_json::json;
    use tempfile::TempDir;

    fn open(dir: &TempDir) -> JsonFileStore {
        JsonFileStore::open(StoreConfig::with_data_dir(dir.path())).unwrap()
    }

    #[tokio::test]
    async fn test_documents_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir);

        let vault = store
            .create(DocumentType::Vault, "alice", json!({"threshold": 2}))
            .await
            .unwrap();
        let sig = store
            .create(DocumentType::Signature, "alice", json!({"transactionId": "t1"}))
            .await
            .unwrap();
        store
            .broadcast(DocumentBatch::create(vec![vault.clone(), sig.clone()]), "alice")
            .await
            .unwrap();

        let reopened = open(&dir);
        let vaults = reopened.get(DocumentType::Vault, &Query::new()).await.unwrap();
        assert_eq!(vaults, vec![vault]);
        let sigs = reopened
            .get(
                DocumentType::Signature,
                &Query::new().where_eq("transactionId", "t1"),
            )
            .await
            .unwrap();
        assert_eq!(sigs, vec![sig]);
    }

    #[tokio::test]
    async fn test_two_handles_share_directory() {
        let dir = TempDir::new().unwrap();
        let writer = open(&dir);
        let reader = open(&dir);

        let doc = writer
            .create(DocumentType::Transaction, "bob", json!({"vaultId": "v"}))
            .await
            .unwrap();
        writer
            .broadcast(DocumentBatch::create(vec![doc.clone()]), "bob")
            .await
            .unwrap();

        let seen = reader
            .get(DocumentType::Transaction, &Query::by_id(&doc.id))
            .await
            .unwrap();
        assert_eq!(seen.len(), 1);
        assert!(writer
            .broadcast(DocumentBatch::create(vec![doc]), "bob")
            .await
            .is_err());
    }

    #[test]
    fn test_concurrent_writers_lose_nothing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().to_path_buf();

        let writers: Vec<_> = ["alice", "bob"]
            .into_iter()
            .map(|owner| {
                let path = path.clone();
                std::thread::spawn(move || {
                    let rt = tokio::runtime::Runtime::new().unwrap();
                    rt.block_on(async {
                        let store = JsonFileStore::open(StoreConfig::with_data_dir(path)).unwrap();
                        for i in 0..20 {
                            let doc = store
                                .create(
                                    DocumentType::Signature,
                                    owner,
                                    json!({"transactionId": "t1", "n": i}),
                                )
                                .await
                                .unwrap();
                            store
                                .broadcast(DocumentBatch::create(vec![doc]), owner)
                                .await
                                .unwrap();
                        }
                    });
                })
            })
            .collect();
        for writer in writers {
            writer.join().unwrap();
        }

        let rt = tokio::runtime::Runtime::new().unwrap();
        let stored = rt
            .block_on(open(&dir).get(
                DocumentType::Signature,
                &Query::new().where_eq("transactionId", "t1").limit(100),
            ))
            .unwrap();
        assert_eq!(stored.len(), 40);
        assert_eq!(stored.iter().filter(|d| d.owner_id == "alice").count(), 20);
    }

    #[tokio::test]
    async fn test_identities_persist() {
        let dir = TempDir::new().unwrap();
        let kp = KeyPair::generate();
        open(&dir)
            .register_identity("alice", &kp.public_key_hex())
            .await
            .unwrap();
        assert_eq!(
            open(&dir).public_key("alice").await.unwrap(),
            kp.public_key_hex()
        );
        assert!(matches!(
            open(&dir).public_key("nobody").await,
            Err(StoreError::NotFound(_))
        ));

        let replacement = KeyPair::generate();
        open(&dir)
            .register_identity("alice", &replacement.public_key_hex())
            .await
            .unwrap();
        assert_eq!(
            open(&dir).public_key("alice").await.unwrap(),
            replacement.public_key_hex()
        );
    }

    #[tokio::test]
    async fn test_empty_store_reads_nothing() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir);
        assert!(store
            .get(DocumentType::Signature, &Query::new())
            .await
            .unwrap()
            .is_empty());
    }
}
