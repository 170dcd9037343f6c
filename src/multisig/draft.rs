//! Spend drafts: unsigned transactions proposed against a vault
//!
//! A draft records the vault UTXOs it spends, one destination output and the
//! fee. The unsigned transaction is never stored; every signer rebuilds it
//! byte-for-byte from the draft and the vault.

use crate::core::address::{Address, Network};
use crate::core::fee::{estimate_spend_size, FeeRate, DUST_LIMIT};
use crate::core::transaction::{txid_to_internal, Transaction, TransactionBuilder, Utxo};
use crate::multisig::vault::{get_vault, MultisigError, Vault};
use crate::store::{CoordinationCache, Document, DocumentBatch, DocumentStore, DocumentType, StoreError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Outputs of a vault spend: the destination plus change
const SPEND_OUTPUTS: usize = 2;

/// Destination of a spend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftOutput {
    pub address: String,
    /// Value in duffs
    pub amount: u64,
}

/// Payload of a `honeypot.transaction` document
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DraftRecord {
    vault_id: String,
    utxos: Vec<Utxo>,
    output: DraftOutput,
    fee: u64,
    #[serde(default)]
    network: Network,
}

/// An unsigned spend proposal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionDraft {
    /// Document id; empty until persisted
    pub id: String,
    pub owner_id: String,
    pub vault_id: String,
    pub inputs: Vec<Utxo>,
    pub output: DraftOutput,
    /// Fee in duffs, including any change absorbed as dust
    pub fee: u64,
    pub network: Network,
    pub created_at: DateTime<Utc>,
}

impl TransactionDraft {
    /// Sum of all input values, `None` on overflow
    pub fn input_total(&self) -> Option<u64> {
        self.inputs
            .iter()
            .try_fold(0u64, |total, u| total.checked_add(u.satoshis))
    }

    /// Value returned to the vault, `None` when the draft does not balance
    pub fn change(&self) -> Option<u64> {
        self.input_total()?
            .checked_sub(self.output.amount)?
            .checked_sub(self.fee)
    }

    pub fn from_document(document: &Document) -> Result<Self, MultisigError> {
        if document.doc_type != DocumentType::Transaction {
            return Err(StoreError::InvalidDocument(format!(
                "{} is not a transaction document",
                document.id
            ))
            .into());
        }
        let record: DraftRecord = document.parse_data()?;
        let draft = Self {
            id: document.id.clone(),
            owner_id: document.owner_id.clone(),
            vault_id: record.vault_id,
            inputs: record.utxos,
            output: record.output,
            fee: record.fee,
            network: record.network,
            created_at: document.created_at,
        };
        if draft.input_total().is_none() {
            return Err(MultisigError::BadArguments(format!(
                "draft {} input total overflows",
                draft.id
            )));
        }
        Ok(draft)
    }

    pub fn properties(&self) -> Result<serde_json::Value, MultisigError> {
        let record = DraftRecord {
            vault_id: self.vault_id.clone(),
            utxos: self.inputs.clone(),
            output: self.output.clone(),
            fee: self.fee,
            network: self.network,
        };
        serde_json::to_value(record).map_err(|e| MultisigError::BadArguments(e.to_string()))
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Build an unpersisted draft spending `inputs` from `vault`
pub fn build_draft(
    vault: &Vault,
    inputs: Vec<Utxo>,
    output: DraftOutput,
    network: Network,
    fee_rate: FeeRate,
) -> Result<TransactionDraft, MultisigError> {
    if network != vault.network {
        return Err(MultisigError::BadArguments(format!(
            "draft network {} differs from vault network {}",
            network, vault.network
        )));
    }
    if inputs.is_empty() {
        return Err(MultisigError::BadArguments("no inputs".to_string()));
    }
    if output.amount == 0 {
        return Err(MultisigError::BadArguments(
            "amount must be positive".to_string(),
        ));
    }
    Address::parse(&output.address, network)
        .map_err(|e| MultisigError::BadArguments(format!("destination: {}", e)))?;

    let vault_script = vault.script_pubkey_hex()?;
    let mut seen = HashSet::with_capacity(inputs.len());
    let mut total: u64 = 0;
    for utxo in &inputs {
        let outpoint = utxo.outpoint();
        txid_to_internal(&utxo.tx_id)?;
        if !seen.insert(outpoint.clone()) {
            return Err(MultisigError::BadArguments(format!(
                "duplicate input {}",
                outpoint
            )));
        }
        if utxo.satoshis == 0 {
            return Err(MultisigError::BadArguments(format!(
                "input {} has no value",
                outpoint
            )));
        }
        if utxo.address != vault.address {
            return Err(MultisigError::ForeignUtxo {
                outpoint: outpoint.to_string(),
                reason: format!("pays to {}", utxo.address),
            });
        }
        if utxo.script.to_lowercase() != vault_script {
            return Err(MultisigError::ForeignUtxo {
                outpoint: outpoint.to_string(),
                reason: "script is not the vault's P2SH script".to_string(),
            });
        }
        total = total
            .checked_add(utxo.satoshis)
            .ok_or_else(|| MultisigError::BadArguments("input total overflows".to_string()))?;
    }

    let size = estimate_spend_size(
        inputs.len(),
        SPEND_OUTPUTS,
        vault.threshold as usize,
        vault.signer_count(),
    );
    let mut fee = fee_rate.fee_for_size(size);
    let required = output
        .amount
        .checked_add(fee)
        .ok_or_else(|| MultisigError::BadArguments("amount overflows".to_string()))?;
    if total < required {
        return Err(MultisigError::InsufficientFunds {
            available: total,
            required,
        });
    }

    let change = total - required;
    if change < DUST_LIMIT {
        fee += change;
    }

    log::debug!(
        "Draft for vault {}: {} input(s), amount {}, fee {} ({} bytes est.)",
        vault.id,
        inputs.len(),
        output.amount,
        fee,
        size
    );

    Ok(TransactionDraft {
        id: String::new(),
        owner_id: String::new(),
        vault_id: vault.id.clone(),
        inputs,
        output,
        fee,
        network,
        created_at: Utc::now(),
    })
}

/// Rebuild the unsigned transaction a draft describes
///
/// Outputs are the destination followed by change to the vault when any
/// change remains. Fails with `BadArguments` when the draft is not for
/// this vault.
pub fn unsigned_transaction(
    draft: &TransactionDraft,
    vault: &Vault,
) -> Result<Transaction, MultisigError> {
    if draft.vault_id != vault.id {
        return Err(MultisigError::BadArguments(format!(
            "draft {} belongs to vault {}, not {}",
            draft.id, draft.vault_id, vault.id
        )));
    }
    if draft.network != vault.network {
        return Err(MultisigError::BadArguments(format!(
            "draft network {} differs from vault network {}",
            draft.network, vault.network
        )));
    }
    let change = draft.change().ok_or_else(|| {
        MultisigError::BadArguments(format!(
            "draft {} does not balance against its inputs",
            draft.id
        ))
    })?;

    let destination = Address::parse(&draft.output.address, draft.network)
        .map_err(|e| MultisigError::BadArguments(format!("destination: {}", e)))?;

    let mut builder = TransactionBuilder::new();
    for utxo in &draft.inputs {
        builder = builder.add_input(utxo)?;
    }
    builder = builder.add_output(destination.script_pubkey(), draft.output.amount);

    if change > 0 {
        builder = builder.add_output(vault.script_pubkey()?, change);
    }
    Ok(builder.build())
}

// =============================================================================
// Persistence
// =============================================================================

/// Build a draft against a cached (or freshly fetched) vault and persist it
pub async fn create_draft(
    store: &dyn DocumentStore,
    cache: &mut CoordinationCache,
    owner_id: &str,
    vault_id: &str,
    inputs: Vec<Utxo>,
    output: DraftOutput,
    fee_rate: FeeRate,
) -> Result<TransactionDraft, MultisigError> {
    let vault = get_vault(store, cache, vault_id, false).await?;
    let mut draft = build_draft(&vault, inputs, output, vault.network, fee_rate)?;

    let document = store
        .create(DocumentType::Transaction, owner_id, draft.properties()?)
        .await?;
    store
        .broadcast(DocumentBatch::create(vec![document.clone()]), owner_id)
        .await?;

    draft.id = document.id;
    draft.owner_id = document.owner_id;
    draft.created_at = document.created_at;
    log::info!(
        "Created draft {} sending {} to {} from vault {}",
        draft.id,
        draft.output.amount,
        draft.output.address,
        vault.id
    );

    cache.insert_transaction(draft.clone());
    Ok(draft)
}

/// List drafts of a vault through the cache
pub async fn list_drafts(
    store: &dyn DocumentStore,
    cache: &mut CoordinationCache,
    vault_id: &str,
    refresh: bool,
) -> Result<Vec<TransactionDraft>, MultisigError> {
    if refresh || cache.list_transactions(vault_id).is_empty() {
        cache.refresh_transactions(store, vault_id).await?;
    }
    Ok(cache.list_transactions(vault_id))
}

/// Fetch one draft, refreshing the cache entry if it is missing
pub async fn get_draft(
    store: &dyn DocumentStore,
    cache: &mut CoordinationCache,
    transaction_id: &str,
    refresh: bool,
) -> Result<TransactionDraft, MultisigError> {
    if refresh || cache.get_transaction(transaction_id).is_none() {
        cache.refresh_transaction(store, transaction_id).await?;
    }
    cache
        .get_transaction(transaction_id)
        .cloned()
        .ok_or_else(|| MultisigError::NotFound(format!("transaction {}", transaction_id)))
}
