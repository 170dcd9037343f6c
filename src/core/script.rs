//! Script construction for vault outputs and multisig spends
//!
//! Only the handful of templates a P2SH multisig vault needs are built here:
//! the bare multisig redeem script, the P2SH and P2PKH locking scripts, and
//! the `OP_0 <sigs...> <redeem>` unlocking script.

use serde::{Deserialize, Serialize};
use thiserror::Error;

// =============================================================================
// Opcodes
// =============================================================================

pub const OP_0: u8 = 0x00;
pub const OP_PUSHDATA1: u8 = 0x4c;
pub const OP_PUSHDATA2: u8 = 0x4d;
pub const OP_1: u8 = 0x51;
pub const OP_DUP: u8 = 0x76;
pub const OP_EQUAL: u8 = 0x87;
pub const OP_EQUALVERIFY: u8 = 0x88;
pub const OP_HASH160: u8 = 0xa9;
pub const OP_CHECKSIG: u8 = 0xac;
pub const OP_CHECKMULTISIG: u8 = 0xae;

/// Largest key count a P2SH redeem script can hold under the 520-byte push limit
pub const MAX_MULTISIG_KEYS: usize = 15;

/// Maximum size of a single script push
pub const MAX_SCRIPT_ELEMENT_SIZE: usize = 520;

// =============================================================================
// Script Errors
// =============================================================================

/// Script-related errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScriptError {
    #[error("Threshold {0} out of range for {1} keys")]
    InvalidThreshold(usize, usize),
    #[error("Key count {0} out of range (1..={max})", max = MAX_MULTISIG_KEYS)]
    InvalidKeyCount(usize),
    #[error("Public key must be 33 bytes, got {0}")]
    InvalidPublicKey(usize),
    #[error("Push of {0} bytes exceeds the script element limit")]
    ElementTooLarge(usize),
    #[error("Unsupported sighash type: {0:#04x}")]
    UnsupportedSigHash(u8),
}

// =============================================================================
// Signature Hash Types
// =============================================================================

/// Signature hash type determines what parts of the transaction are signed
///
/// Vault spends only ever commit to the whole transaction, so `All` is the
/// single accepted value. The others are recognised so that foreign
/// signatures can be reported precisely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[repr(u8)]
pub enum SigHashType {
    /// Sign all inputs and all outputs
    #[default]
    All = 0x01,
    /// Sign all inputs but no outputs
    None = 0x02,
    /// Sign all inputs and only the output with same index
    Single = 0x03,
}

impl SigHashType {
    /// Parse sighash type from byte (ANYONECANPAY variants are not accepted)
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(SigHashType::All),
            0x02 => Some(SigHashType::None),
            0x03 => Some(SigHashType::Single),
            _ => None,
        }
    }

    pub fn as_u32(self) -> u32 {
        self as u32
    }
}

// =============================================================================
// Script Types
// =============================================================================

/// The locking script template of an output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScriptType {
    /// Pay to Public Key Hash: `OP_DUP OP_HASH160 <20> OP_EQUALVERIFY OP_CHECKSIG`
    P2PKH { pubkey_hash: [u8; 20] },
    /// Pay to Script Hash: `OP_HASH160 <20> OP_EQUAL`
    P2SH { script_hash: [u8; 20] },
}

impl ScriptType {
    /// Encode the locking script
    pub fn script_pubkey(&self) -> Vec<u8> {
        match self {
            ScriptType::P2PKH { pubkey_hash } => {
                let mut script = Vec::with_capacity(25);
                script.extend_from_slice(&[OP_DUP, OP_HASH160, 20]);
                script.extend_from_slice(pubkey_hash);
                script.extend_from_slice(&[OP_EQUALVERIFY, OP_CHECKSIG]);
                script
            }
            ScriptType::P2SH { script_hash } => {
                let mut script = Vec::with_capacity(23);
                script.extend_from_slice(&[OP_HASH160, 20]);
                script.extend_from_slice(script_hash);
                script.push(OP_EQUAL);
                script
            }
        }
    }

    /// Get the script type name
    pub fn type_name(&self) -> &'static str {
        match self {
            ScriptType::P2PKH { .. } => "P2PKH",
            ScriptType::P2SH { .. } => "P2SH",
        }
    }

    /// Size of the locking script in bytes
    pub fn script_size(&self) -> usize {
        match self {
            ScriptType::P2PKH { .. } => 25,
            ScriptType::P2SH { .. } => 23,
        }
    }
}

// =============================================================================
// Builders
// =============================================================================

/// Encode a small integer (1..=16) as its `OP_N` opcode
fn small_int_opcode(n: usize) -> u8 {
    OP_1 + (n as u8 - 1)
}

/// Build `OP_m <pk_1> ... <pk_n> OP_n OP_CHECKMULTISIG`
///
/// Keys are committed in the order given; the caller owns the ordering.
pub fn multisig_redeem_script(
    public_keys: &[[u8; 33]],
    threshold: usize,
) -> Result<Vec<u8>, ScriptError> {
    let n = public_keys.len();
    if n == 0 || n > MAX_MULTISIG_KEYS {
        return Err(ScriptError::InvalidKeyCount(n));
    }
    if threshold == 0 || threshold > n {
        return Err(ScriptError::InvalidThreshold(threshold, n));
    }

    let mut script = Vec::with_capacity(3 + n * 34);
    script.push(small_int_opcode(threshold));
    for key in public_keys {
        script.push(33);
        script.extend_from_slice(key);
    }
    script.push(small_int_opcode(n));
    script.push(OP_CHECKMULTISIG);
    Ok(script)
}

/// Append a minimal data push of `data` to `script`
pub fn push_data(script: &mut Vec<u8>, data: &[u8]) -> Result<(), ScriptError> {
    let len = data.len();
    if len > MAX_SCRIPT_ELEMENT_SIZE {
        return Err(ScriptError::ElementTooLarge(len));
    }
    if len < OP_PUSHDATA1 as usize {
        script.push(len as u8);
    } else if len <= 0xff {
        script.push(OP_PUSHDATA1);
        script.push(len as u8);
    } else {
        script.push(OP_PUSHDATA2);
        script.extend_from_slice(&(len as u16).to_le_bytes());
    }
    script.extend_from_slice(data);
    Ok(())
}

/// Number of bytes `push_data` adds in front of a push of `len` bytes
pub fn push_prefix_len(len: usize) -> usize {
    if len < OP_PUSHDATA1 as usize {
        1
    } else if len <= 0xff {
        2
    } else {
        3
    }
}

/// Build the P2SH multisig unlocking script
///
/// `signatures` already carry their trailing sighash byte and must be in
/// the same order as their keys appear in the redeem script. The leading
/// `OP_0` feeds the extra stack item `OP_CHECKMULTISIG` pops.
pub fn multisig_script_sig(
    signatures: &[Vec<u8>],
    redeem_script: &[u8],
) -> Result<Vec<u8>, ScriptError> {
    let mut script = vec![OP_0];
    for signature in signatures {
        push_data(&mut script, signature)?;
    }
    push_data(&mut script, redeem_script)?;
    Ok(script)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(n: usize) -> Vec<[u8; 33]> {
        (0..n)
            .map(|i| {
                let mut key = [0u8; 33];
                key[0] = 0x02;
                key[32] = i as u8;
                key
            })
            .collect()
    }

    #[test]
    fn test_sighash_types() {
        assert_eq!(SigHashType::default(), SigHashType::All);
        assert_eq!(SigHashType::from_byte(0x01), Some(SigHashType::All));
        assert_eq!(SigHashType::from_byte(0x81), None);
        assert_eq!(SigHashType::All.as_u32(), 1);
    }

    #[test]
    fn test_redeem_script_layout() {
        let script = multisig_redeem_script(&keys(3), 2).unwrap();
        assert_eq!(script.len(), 3 + 3 * 34);
        assert_eq!(script[0], 0x52); // OP_2
        assert_eq!(script[1], 33);
        assert_eq!(script[script.len() - 2], 0x53); // OP_3
        assert_eq!(*script.last().unwrap(), OP_CHECKMULTISIG);
    }

    #[test]
    fn test_redeem_script_bounds() {
        assert_eq!(
            multisig_redeem_script(&keys(3), 0),
            Err(ScriptError::InvalidThreshold(0, 3))
        );
        assert_eq!(
            multisig_redeem_script(&keys(3), 4),
            Err(ScriptError::InvalidThreshold(4, 3))
        );
        assert_eq!(
            multisig_redeem_script(&[], 1),
            Err(ScriptError::InvalidKeyCount(0))
        );
        assert!(multisig_redeem_script(&keys(15), 15).is_ok());
        assert_eq!(
            multisig_redeem_script(&keys(16), 2),
            Err(ScriptError::InvalidKeyCount(16))
        );
    }

    #[test]
    fn test_push_data_prefixes() {
        let mut script = Vec::new();
        push_data(&mut script, &[0xaa; 72]).unwrap();
        assert_eq!(script[0], 72);

        let mut script = Vec::new();
        push_data(&mut script, &[0xaa; 105]).unwrap();
        assert_eq!(&script[..2], &[OP_PUSHDATA1, 105]);

        let mut script = Vec::new();
        push_data(&mut script, &[0xaa; 513]).unwrap();
        assert_eq!(&script[..3], &[OP_PUSHDATA2, 0x01, 0x02]);
        assert_eq!(push_prefix_len(513), 3);

        assert!(push_data(&mut Vec::new(), &[0u8; 521]).is_err());
    }

    #[test]
    fn test_script_pubkey_templates() {
        let p2sh = ScriptType::P2SH {
            script_hash: [7u8; 20],
        };
        let bytes = p2sh.script_pubkey();
        assert_eq!(bytes.len(), p2sh.script_size());
        assert_eq!(bytes[0], OP_HASH160);
        assert_eq!(*bytes.last().unwrap(), OP_EQUAL);

        let p2pkh = ScriptType::P2PKH {
            pubkey_hash: [9u8; 20],
        };
        assert_eq!(p2pkh.script_pubkey().len(), p2pkh.script_size());
        assert_eq!(p2pkh.type_name(), "P2PKH");
    }

    #[test]
    fn test_script_sig_starts_with_op0() {
        let redeem = multisig_redeem_script(&keys(2), 1).unwrap();
        let sig = multisig_script_sig(&[vec![0x30; 71]], &redeem).unwrap();
        assert_eq!(sig[0], OP_0);
        assert_eq!(sig[1], 71);
        assert!(sig.ends_with(&redeem));
    }
}
