//! Core chain primitives used by the vault
//!
//! This module contains the building blocks vault spends are made of:
//! - Script templates (multisig redeem, P2SH, P2PKH, unlocking scripts)
//! - Networks, Base58Check addresses and multisig address derivation
//! - Legacy transaction encoding and SIGHASH_ALL digests
//! - Fee rates and deterministic spend size estimation

pub mod address;
pub mod fee;
pub mod script;
pub mod transaction;

pub use address::{derive_address, redeem_script_for, Address, AddressError, Network};
pub use fee::{estimate_spend_size, FeeRate, DUST_LIMIT};
pub use script::{ScriptError, ScriptType, SigHashType};
pub use transaction::{
    Outpoint, Transaction, TransactionBuilder, TransactionError, TransactionInput,
    TransactionOutput, Utxo, SEQUENCE_FINAL, TX_VERSION,
};
