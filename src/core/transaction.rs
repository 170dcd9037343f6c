//! Transaction handling for vault spends
//!
//! Implements the legacy (pre-segwit) transaction encoding shared by Bitcoin
//! and Dash:
//! - Outpoint references with display-order (reversed) transaction ids
//! - Canonical serialization and txid computation
//! - SIGHASH_ALL signature digests for P2SH inputs

use crate::core::script::SigHashType;
use crate::crypto::double_sha256;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// =============================================================================
// Constants
// =============================================================================

/// Transaction version used for every vault spend
pub const TX_VERSION: u32 = 2;

/// Sequence number that disables locktime and replacement
pub const SEQUENCE_FINAL: u32 = 0xFFFFFFFF;

// =============================================================================
// Error Types
// =============================================================================

/// Transaction-related errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransactionError {
    #[error("Invalid transaction id: {0}")]
    InvalidTxId(String),
    #[error("Input index {index} out of range ({count} inputs)")]
    InputOutOfRange { index: usize, count: usize },
    #[error("Invalid transaction: {0}")]
    InvalidTransaction(String),
}

// =============================================================================
// Outpoint & UTXO
// =============================================================================

/// Reference to a previous transaction output
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Outpoint {
    /// Transaction id in display (big-endian hex) order
    pub tx_id: String,
    /// Index of the output in that transaction
    pub output_index: u32,
}

impl std::fmt::Display for Outpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.tx_id, self.output_index)
    }
}

/// Unspent Transaction Output funding a vault spend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Utxo {
    pub tx_id: String,
    pub output_index: u32,
    /// Address the output pays to
    pub address: String,
    /// Hex-encoded locking script of the output
    pub script: String,
    /// Value in the smallest currency unit
    pub satoshis: u64,
}

impl Utxo {
    pub fn outpoint(&self) -> Outpoint {
        Outpoint {
            tx_id: self.tx_id.clone(),
            output_index: self.output_index,
        }
    }
}

/// Decode a display-order txid into its internal (little-endian) byte order
pub fn txid_to_internal(tx_id: &str) -> Result<[u8; 32], TransactionError> {
    let bytes = hex::decode(tx_id).map_err(|_| TransactionError::InvalidTxId(tx_id.to_string()))?;
    if bytes.len() != 32 {
        return Err(TransactionError::InvalidTxId(tx_id.to_string()));
    }
    let mut internal = [0u8; 32];
    for (i, byte) in bytes.iter().rev().enumerate() {
        internal[i] = *byte;
    }
    Ok(internal)
}

// =============================================================================
// Transaction Input / Output
// =============================================================================

/// Transaction input (reference to previous output)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionInput {
    /// Previous transaction id, internal byte order
    pub prev_tx_id: [u8; 32],
    /// Index of the output in the previous transaction
    pub output_index: u32,
    /// Unlocking script (empty until signatures are applied)
    pub script_sig: Vec<u8>,
    pub sequence: u32,
}

impl TransactionInput {
    /// Create an unsigned input spending `outpoint`
    pub fn unsigned(outpoint: &Outpoint) -> Result<Self, TransactionError> {
        Ok(Self {
            prev_tx_id: txid_to_internal(&outpoint.tx_id)?,
            output_index: outpoint.output_index,
            script_sig: Vec::new(),
            sequence: SEQUENCE_FINAL,
        })
    }

    /// The outpoint this input spends, with the txid in display order
    pub fn outpoint(&self) -> Outpoint {
        let mut display = self.prev_tx_id;
        display.reverse();
        Outpoint {
            tx_id: hex::encode(display),
            output_index: self.output_index,
        }
    }
}

/// Transaction output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionOutput {
    /// Value in the smallest currency unit
    pub value: u64,
    /// Locking script
    pub script_pubkey: Vec<u8>,
}

// =============================================================================
// Transaction
// =============================================================================

/// A legacy transaction as it is signed and broadcast
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub version: u32,
    pub inputs: Vec<TransactionInput>,
    pub outputs: Vec<TransactionOutput>,
    pub lock_time: u32,
}

impl Transaction {
    /// Create a transaction with the default version and no locktime
    pub fn new(inputs: Vec<TransactionInput>, outputs: Vec<TransactionOutput>) -> Self {
        Self {
            version: TX_VERSION,
            inputs,
            outputs,
            lock_time: 0,
        }
    }

    /// Canonical wire serialization
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(10 + self.inputs.len() * 180 + self.outputs.len() * 34);
        buf.extend_from_slice(&self.version.to_le_bytes());

        write_compact_size(&mut buf, self.inputs.len() as u64);
        for input in &self.inputs {
            buf.extend_from_slice(&input.prev_tx_id);
            buf.extend_from_slice(&input.output_index.to_le_bytes());
            write_compact_size(&mut buf, input.script_sig.len() as u64);
            buf.extend_from_slice(&input.script_sig);
            buf.extend_from_slice(&input.sequence.to_le_bytes());
        }

        write_compact_size(&mut buf, self.outputs.len() as u64);
        for output in &self.outputs {
            buf.extend_from_slice(&output.value.to_le_bytes());
            write_compact_size(&mut buf, output.script_pubkey.len() as u64);
            buf.extend_from_slice(&output.script_pubkey);
        }

        buf.extend_from_slice(&self.lock_time.to_le_bytes());
        buf
    }

    /// Hex of the wire serialization, as handed to a broadcaster
    pub fn to_hex(&self) -> String {
        hex::encode(self.serialize())
    }

    /// Transaction id (double SHA-256, display order)
    pub fn txid(&self) -> String {
        let mut hash = double_sha256(&self.serialize());
        hash.reverse();
        hex::encode(hash)
    }

    /// Total value of all outputs
    pub fn total_output(&self) -> u64 {
        self.outputs
            .iter()
            .fold(0u64, |total, o| total.saturating_add(o.value))
    }

    /// Legacy signature digest for `input_index`
    ///
    /// Every scriptSig is blanked, the signed input carries `script_code`
    /// (the redeem script for P2SH), and the sighash type is appended as a
    /// little-endian u32 before double hashing.
    pub fn signature_hash(
        &self,
        input_index: usize,
        script_code: &[u8],
        sighash: SigHashType,
    ) -> Result<Vec<u8>, TransactionError> {
        if input_index >= self.inputs.len() {
            return Err(TransactionError::InputOutOfRange {
                index: input_index,
                count: self.inputs.len(),
            });
        }
        if sighash != SigHashType::All {
            return Err(TransactionError::InvalidTransaction(format!(
                "sighash {:?} is not supported",
                sighash
            )));
        }

        let mut template = self.clone();
        for (i, input) in template.inputs.iter_mut().enumerate() {
            input.script_sig = if i == input_index {
                script_code.to_vec()
            } else {
                Vec::new()
            };
        }

        let mut preimage = template.serialize();
        preimage.extend_from_slice(&sighash.as_u32().to_le_bytes());
        Ok(double_sha256(&preimage))
    }
}

/// Append a Bitcoin CompactSize integer
pub fn write_compact_size(buf: &mut Vec<u8>, n: u64) {
    match n {
        0..=0xfc => buf.push(n as u8),
        0xfd..=0xffff => {
            buf.push(0xfd);
            buf.extend_from_slice(&(n as u16).to_le_bytes());
        }
        0x1_0000..=0xffff_ffff => {
            buf.push(0xfe);
            buf.extend_from_slice(&(n as u32).to_le_bytes());
        }
        _ => {
            buf.push(0xff);
            buf.extend_from_slice(&n.to_le_bytes());
        }
    }
}

/// Encoded length of a CompactSize integer
pub fn compact_size_len(n: u64) -> usize {
    match n {
        0..=0xfc => 1,
        0xfd..=0xffff => 3,
        0x1_0000..=0xffff_ffff => 5,
        _ => 9,
    }
}

// =============================================================================
// Transaction Builder
// =============================================================================

/// Builder for unsigned transactions
#[derive(Default)]
pub struct TransactionBuilder {
    inputs: Vec<TransactionInput>,
    outputs: Vec<TransactionOutput>,
    lock_time: u32,
}

impl TransactionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an unsigned input spending a UTXO
    pub fn add_input(mut self, utxo: &Utxo) -> Result<Self, TransactionError> {
        self.inputs.push(TransactionInput::unsigned(&utxo.outpoint())?);
        Ok(self)
    }

    /// Add an output paying `value` to `script_pubkey`
    pub fn add_output(mut self, script_pubkey: Vec<u8>, value: u64) -> Self {
        self.outputs.push(TransactionOutput {
            value,
            script_pubkey,
        });
        self
    }

    /// Set locktime (block height or timestamp)
    pub fn lock_time(mut self, lock_time: u32) -> Self {
        self.lock_time = lock_time;
        self
    }

    /// Build without signing
    pub fn build(self) -> Transaction {
        let mut tx = Transaction::new(self.inputs, self.outputs);
        tx.lock_time = self.lock_time;
        tx
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_utxo(tx_byte: u8, output_index: u32) -> Utxo {
        Utxo {
            tx_id: hex::encode([tx_byte; 32]),
            output_index,
            address: "vault".to_string(),
            script: String::new(),
            satoshis: 1_000,
        }
    }

    #[test]
    fn test_txid_byte_order() {
        let display = "299456b08c94bd255ef017cdfb8169bd114ae805c19df9fd4cc8d0bcc42d47e7";
        let internal = txid_to_internal(display).unwrap();
        assert_eq!(internal[0], 0xe7);
        assert_eq!(internal[31], 0x29);

        let input = TransactionInput::unsigned(&Outpoint {
            tx_id: display.to_string(),
            output_index: 3,
        })
        .unwrap();
        assert_eq!(input.outpoint().tx_id, display);
        assert_eq!(input.outpoint().output_index, 3);
    }

    #[test]
    fn test_invalid_txid_rejected() {
        assert!(txid_to_internal("abc").is_err());
        assert!(txid_to_internal(&"zz".repeat(32)).is_err());
        assert!(txid_to_internal(&"00".repeat(31)).is_err());
    }

    #[test]
    fn test_serialization_layout() {
        let tx = TransactionBuilder::new()
            .add_input(&sample_utxo(1, 0))
            .unwrap()
            .add_output(vec![0x51], 500)
            .build();

        let bytes = tx.serialize();
        // version(4) + in count(1) + outpoint(36) + empty script(1) + sequence(4)
        // + out count(1) + value(8) + script len(1) + script(1) + locktime(4)
        assert_eq!(bytes.len(), 4 + 1 + 36 + 1 + 4 + 1 + 8 + 1 + 1 + 4);
        assert_eq!(&bytes[..4], &TX_VERSION.to_le_bytes());
        assert_eq!(bytes[4], 1);
        assert_eq!(tx.to_hex(), hex::encode(&bytes));
        assert_eq!(tx.txid().len(), 64);
        assert_eq!(tx.total_output(), 500);
    }

    #[test]
    fn test_signature_hash_depends_on_input_and_outputs() {
        let tx = TransactionBuilder::new()
            .add_input(&sample_utxo(1, 0))
            .unwrap()
            .add_input(&sample_utxo(2, 1))
            .unwrap()
            .add_output(vec![0x51], 500)
            .build();

        let code = vec![0x52, 0xae];
        let h0 = tx.signature_hash(0, &code, SigHashType::All).unwrap();
        let h1 = tx.signature_hash(1, &code, SigHashType::All).unwrap();
        assert_ne!(h0, h1);
        assert_eq!(h0, tx.signature_hash(0, &code, SigHashType::All).unwrap());

        let mut changed = tx.clone();
        changed.outputs[0].value = 499;
        assert_ne!(
            h0,
            changed.signature_hash(0, &code, SigHashType::All).unwrap()
        );
    }

    #[test]
    fn test_signature_hash_ignores_existing_script_sigs() {
        let mut tx = TransactionBuilder::new()
            .add_input(&sample_utxo(1, 0))
            .unwrap()
            .add_input(&sample_utxo(2, 0))
            .unwrap()
            .add_output(vec![0x51], 500)
            .build();
        let code = vec![0x51, 0xae];
        let before = tx.signature_hash(0, &code, SigHashType::All).unwrap();
        tx.inputs[1].script_sig = vec![0x00, 0x01, 0x02];
        let after = tx.signature_hash(0, &code, SigHashType::All).unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn test_signature_hash_bounds_and_types() {
        let tx = TransactionBuilder::new()
            .add_input(&sample_utxo(1, 0))
            .unwrap()
            .build();
        assert!(matches!(
            tx.signature_hash(1, &[], SigHashType::All),
            Err(TransactionError::InputOutOfRange { index: 1, count: 1 })
        ));
        assert!(tx.signature_hash(0, &[], SigHashType::Single).is_err());
    }

    #[test]
    fn test_compact_size() {
        let mut buf = Vec::new();
        write_compact_size(&mut buf, 0xfc);
        write_compact_size(&mut buf, 0xfd);
        write_compact_size(&mut buf, 0x1_0000);
        assert_eq!(buf, vec![0xfc, 0xfd, 0xfd, 0x00, 0xfe, 0x00, 0x00, 0x01, 0x00]);
        assert_eq!(compact_size_len(0xfc), 1);
        assert_eq!(compact_size_len(0xfd), 3);
        assert_eq!(compact_size_len(u64::MAX), 9);
    }
}
