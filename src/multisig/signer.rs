//! Partial signatures and the per-signer collector
//!
//! Each co-signer independently rebuilds a draft's unsigned transaction,
//! signs every input with SIGHASH_ALL and shares the results as signature
//! documents.

use crate::core::script::SigHashType;
use crate::crypto::KeyPair;
use crate::multisig::draft::{unsigned_transaction, TransactionDraft};
use crate::multisig::vault::{MultisigError, Vault};
use crate::store::{Document, DocumentType, StoreError};
use serde::{Deserialize, Serialize};

/// One signature over one input
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureData {
    /// Signer's compressed public key (hex)
    pub public_key: String,
    /// Outpoint of the signed input
    pub prev_tx_id: String,
    pub output_index: u32,
    pub input_index: u32,
    /// DER-encoded ECDSA signature (hex), without the sighash byte
    pub signature: String,
    pub sigtype: u8,
}

/// Payload of a `honeypot.signature` document
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignatureRecord {
    transaction_id: String,
    signature: SignatureData,
}

/// A signature shared for a specific draft
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialSignature {
    /// Document id; empty until persisted
    pub id: String,
    pub transaction_id: String,
    pub signature: SignatureData,
}

impl PartialSignature {
    pub fn from_document(document: &Document) -> Result<Self, MultisigError> {
        if document.doc_type != DocumentType::Signature {
            return Err(StoreError::InvalidDocument(format!(
                "{} is not a signature document",
                document.id
            ))
            .into());
        }
        let record: SignatureRecord = document.parse_data()?;
        Ok(Self {
            id: document.id.clone(),
            transaction_id: record.transaction_id,
            signature: record.signature,
        })
    }

    pub fn properties(&self) -> Result<serde_json::Value, MultisigError> {
        let record = SignatureRecord {
            transaction_id: self.transaction_id.clone(),
            signature: self.signature.clone(),
        };
        serde_json::to_value(record).map_err(|e| MultisigError::BadArguments(e.to_string()))
    }

    /// Same signer, input and signature bytes
    pub fn same_as(&self, other: &PartialSignature) -> bool {
        self.transaction_id == other.transaction_id
            && self.signature.input_index == other.signature.input_index
            && self.signature.public_key.eq_ignore_ascii_case(&other.signature.public_key)
            && self.signature.signature.eq_ignore_ascii_case(&other.signature.signature)
    }
}

/// Sign every input of `draft` with `key`
///
/// Fails with `KeyNotAuthorized` if the key is not one of the vault's.
/// Nothing is persisted.
pub fn sign_draft(
    draft: &TransactionDraft,
    vault: &Vault,
    key: &KeyPair,
) -> Result<Vec<PartialSignature>, MultisigError> {
    let public_key = key.public_key_hex();
    if vault.key_index(&public_key).is_none() {
        return Err(MultisigError::KeyNotAuthorized(public_key));
    }

    let tx = unsigned_transaction(draft, vault)?;
    let redeem_script = vault.redeem_script()?;

    let mut signatures = Vec::with_capacity(tx.inputs.len());
    for (index, input) in tx.inputs.iter().enumerate() {
        let digest = tx.signature_hash(index, &redeem_script, SigHashType::All)?;
        let der = key.sign_digest(&digest)?;
        let outpoint = input.outpoint();
        signatures.push(PartialSignature {
            id: String::new(),
            transaction_id: draft.id.clone(),
            signature: SignatureData {
                public_key: public_key.clone(),
                prev_tx_id: outpoint.tx_id,
                output_index: outpoint.output_index,
                input_index: index as u32,
                signature: hex::encode(der),
                sigtype: SigHashType::All as u8,
            },
        });
    }

    log::debug!(
        "Signed {} input(s) of draft {} as {}",
        signatures.len(),
        draft.id,
        public_key
    );
    Ok(signatures)
}
