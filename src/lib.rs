//! Vault Coordinator: m-of-n multisig vaults for Dash-style chains
//!
//! Co-signers who never talk to each other directly coordinate through an
//! append-only document store:
//! - P2SH multisig vault addresses derived from ordered public keys
//! - Spend drafts over vault-owned UTXOs with size-based fees
//! - Per-input partial signatures (legacy SIGHASH_ALL, low-S DER)
//! - Order-independent, idempotent signature aggregation
//! - A coordination cache, typed requests, a REST API and a CLI
//!
//! # Example
//!
//! ```rust
//! use vault_coordinator::core::{derive_address, Network};
//! use vault_coordinator::crypto::KeyPair;
//!
//! let keys: Vec<String> = (0..3).map(|_| KeyPair::generate().public_key_hex()).collect();
//! let address = derive_address(&keys, 2, Network::Testnet).unwrap();
//! println!("2-of-3 vault address: {}", address);
//! ```

pub mod api;
pub mod cli;
pub mod coordinator;
pub mod core;
pub mod crypto;
pub mod multisig;
pub mod store;
pub mod wallet;

// Re-export commonly used types
pub use api::{create_router, ApiState};
pub use coordinator::{Coordinator, CoordinatorConfig, CoordinatorError, Request, Response};
pub use core::{derive_address, Address, FeeRate, Network, Transaction, Utxo};
pub use crypto::KeyPair;
pub use multisig::{
    apply_signatures, build_draft, sign_draft, ErrorCode, MultisigError, PartialSignature,
    TransactionDraft, Vault, VaultParams,
};
pub use store::{CoordinationCache, DocumentStore, JsonFileStore, MemoryStore};
pub use wallet::{LocalAccount, WalletAccount};
