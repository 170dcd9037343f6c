//! Partial signature aggregation
//!
//! Applies whatever signatures have been shared for a draft and reports how
//! far each input is from its threshold. Individual bad signatures are
//! reported and skipped; they never fail the aggregation.
//!
//! Each (input, vault key) pair is a slot. A valid signature fills its
//! signer's slot, and when several valid signatures compete for one slot the
//! lexicographically smallest DER wins. The result is therefore independent
//! of arrival order, idempotent, and monotone in the signature set.

use crate::core::script::{multisig_script_sig, SigHashType};
use crate::core::transaction::{Outpoint, Transaction};
use crate::crypto::{public_key_from_hex, verify_digest};
use crate::multisig::draft::{unsigned_transaction, TransactionDraft};
use crate::multisig::signer::PartialSignature;
use crate::multisig::vault::{MultisigError, Vault};
use secp256k1::PublicKey;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Why a signature was not applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RejectionReason {
    /// Wrong draft, input out of range, outpoint differs, or does not verify
    DraftMismatch,
    /// Signer is not one of the vault keys
    KeyNotAuthorized,
    /// Undecodable key or DER, or unsupported sighash type
    Malformed,
}

/// A signature that was skipped
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rejection {
    pub public_key: String,
    pub input_index: u32,
    pub reason: RejectionReason,
    pub detail: String,
}

/// Signing progress of one input
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InputState {
    Unsigned,
    PartiallySigned(usize),
    FullySigned,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputStatus {
    pub input_index: usize,
    pub outpoint: Outpoint,
    /// Public keys with a valid signature, in vault key order
    pub signers: Vec<String>,
    pub count: usize,
    pub state: InputState,
}

/// Outcome of applying signatures to a draft
#[derive(Debug, Clone)]
pub struct Aggregation {
    /// The draft's transaction with scriptSigs on every input that met
    /// the threshold
    pub transaction: Transaction,
    pub threshold: usize,
    pub inputs: Vec<InputStatus>,
    pub rejected: Vec<Rejection>,
}

impl Aggregation {
    /// Every input has at least `threshold` valid distinct-signer signatures
    pub fn is_fully_signed(&self) -> bool {
        !self.inputs.is_empty() && self.inputs.iter().all(|i| i.count >= self.threshold)
    }

    /// Number of inputs that met the threshold
    pub fn signed_inputs(&self) -> usize {
        self.inputs
            .iter()
            .filter(|i| i.count >= self.threshold)
            .count()
    }
}

/// Normalized candidate; its ordering fixes the processing order
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct Candidate {
    input_index: u32,
    public_key: String,
    signature: String,
    transaction_id: String,
    prev_tx_id: String,
    output_index: u32,
    sigtype: u8,
}

impl From<&PartialSignature> for Candidate {
    fn from(partial: &PartialSignature) -> Self {
        let data = &partial.signature;
        Self {
            input_index: data.input_index,
            public_key: data.public_key.to_lowercase(),
            signature: data.signature.to_lowercase(),
            transaction_id: partial.transaction_id.clone(),
            prev_tx_id: data.prev_tx_id.to_lowercase(),
            output_index: data.output_index,
            sigtype: data.sigtype,
        }
    }
}

/// Apply `signatures` to the transaction described by `draft`
///
/// Fails only when the draft cannot be rebuilt against this vault.
pub fn apply_signatures(
    draft: &TransactionDraft,
    vault: &Vault,
    signatures: &[PartialSignature],
) -> Result<Aggregation, MultisigError> {
    let mut transaction = unsigned_transaction(draft, vault)?;
    let redeem_script = vault.redeem_script()?;
    let threshold = vault.threshold as usize;

    let vault_keys = vault
        .public_keys
        .iter()
        .map(|k| public_key_from_hex(k))
        .collect::<Result<Vec<PublicKey>, _>>()?;
    let digests = (0..transaction.inputs.len())
        .map(|i| transaction.signature_hash(i, &redeem_script, SigHashType::All))
        .collect::<Result<Vec<_>, _>>()?;
    let outpoints: Vec<Outpoint> = transaction.inputs.iter().map(|i| i.outpoint()).collect();

    // slots[input][signer] holds the winning DER for that pair
    let mut slots: Vec<Vec<Option<Vec<u8>>>> =
        vec![vec![None; vault_keys.len()]; transaction.inputs.len()];
    let mut rejected = Vec::new();

    let candidates: BTreeSet<Candidate> = signatures.iter().map(Candidate::from).collect();
    for candidate in &candidates {
        match check_candidate(candidate, draft, &vault_keys, &outpoints, &digests) {
            Ok((input, signer, der)) => {
                let slot = &mut slots[input][signer];
                if slot.as_ref().map_or(true, |current| der < *current) {
                    *slot = Some(der);
                }
            }
            Err((reason, detail)) => {
                log::debug!(
                    "Skipping signature from {} on input {}: {}",
                    candidate.public_key,
                    candidate.input_index,
                    detail
                );
                rejected.push(Rejection {
                    public_key: candidate.public_key.clone(),
                    input_index: candidate.input_index,
                    reason,
                    detail,
                });
            }
        }
    }

    let mut inputs = Vec::with_capacity(slots.len());
    for (index, input_slots) in slots.iter().enumerate() {
        let filled: Vec<(usize, &Vec<u8>)> = input_slots
            .iter()
            .enumerate()
            .filter_map(|(signer, der)| der.as_ref().map(|d| (signer, d)))
            .collect();
        let count = filled.len();

        if count >= threshold {
            let script_signatures: Vec<Vec<u8>> = filled
                .iter()
                .take(threshold)
                .map(|(_, der)| {
                    let mut with_type = (*der).clone();
                    with_type.push(SigHashType::All as u8);
                    with_type
                })
                .collect();
            transaction.inputs[index].script_sig =
                multisig_script_sig(&script_signatures, &redeem_script)
                    .map_err(|e| MultisigError::BadArguments(e.to_string()))?;
        }

        let state = if count == 0 {
            InputState::Unsigned
        } else if count < threshold {
            InputState::PartiallySigned(count)
        } else {
            InputState::FullySigned
        };
        inputs.push(InputStatus {
            input_index: index,
            outpoint: outpoints[index].clone(),
            signers: filled
                .iter()
                .map(|(signer, _)| vault.public_keys[*signer].clone())
                .collect(),
            count,
            state,
        });
    }

    Ok(Aggregation {
        transaction,
        threshold,
        inputs,
        rejected,
    })
}

/// Validate one candidate, returning (input, signer slot, DER bytes)
fn check_candidate(
    candidate: &Candidate,
    draft: &TransactionDraft,
    vault_keys: &[PublicKey],
    outpoints: &[Outpoint],
    digests: &[Vec<u8>],
) -> Result<(usize, usize, Vec<u8>), (RejectionReason, String)> {
    let public_key = public_key_from_hex(&candidate.public_key)
        .map_err(|e| (RejectionReason::Malformed, e.to_string()))?;
    let signer = vault_keys
        .iter()
        .position(|k| *k == public_key)
        .ok_or_else(|| {
            (
                RejectionReason::KeyNotAuthorized,
                "signer is not a vault key".to_string(),
            )
        })?;

    if candidate.transaction_id != draft.id {
        return Err((
            RejectionReason::DraftMismatch,
            format!("signature is for draft {}", candidate.transaction_id),
        ));
    }
    let input = candidate.input_index as usize;
    let outpoint = outpoints.get(input).ok_or_else(|| {
        (
            RejectionReason::DraftMismatch,
            format!("input index {} out of range", input),
        )
    })?;
    if outpoint.tx_id != candidate.prev_tx_id || outpoint.output_index != candidate.output_index
    {
        return Err((
            RejectionReason::DraftMismatch,
            format!(
                "outpoint {}:{} does not match input {}",
                candidate.prev_tx_id, candidate.output_index, outpoint
            ),
        ));
    }

    if SigHashType::from_byte(candidate.sigtype) != Some(SigHashType::All) {
        return Err((
            RejectionReason::Malformed,
            format!("unsupported sighash type {:#04x}", candidate.sigtype),
        ));
    }
    let der = hex::decode(&candidate.signature)
        .map_err(|_| (RejectionReason::Malformed, "signature is not hex".to_string()))?;
    match verify_digest(&public_key, &digests[input], &der) {
        Ok(true) => Ok((input, signer, der)),
        Ok(false) => Err((
            RejectionReason::DraftMismatch,
            "signature does not verify over this draft".to_string(),
        )),
        Err(e) => Err((RejectionReason::Malformed, e.to_string())),
    }
}
