//! Multi-signature vault coordination
//!
//! Provides M-of-N threshold vaults where M signatures from N registered
//! signers are required to spend each vault-owned output.
//!
//! # Example
//!
//! ```ignore
//! use vault_coordinator::multisig::{build_draft, sign_draft, apply_signatures};
//!
//! // Propose a spend from a 2-of-3 vault
//! let draft = build_draft(&vault, utxos, output, vault.network, FeeRate::default())?;
//!
//! // Each signer signs independently
//! let mut shared = sign_draft(&draft, &vault, &alice)?;
//! shared.extend(sign_draft(&draft, &vault, &carol)?);
//!
//! // Any party can aggregate and check readiness
//! let aggregation = apply_signatures(&draft, &vault, &shared)?;
//! assert!(aggregation.is_fully_signed());
//! ```

pub mod aggregator;
pub mod draft;
pub mod signer;
pub mod vault;

pub use aggregator::{apply_signatures, Aggregation, InputState, InputStatus, Rejection, RejectionReason};
pub use draft::{
    build_draft, create_draft, get_draft, list_drafts, unsigned_transaction, DraftOutput,
    TransactionDraft,
};
pub use signer::{sign_draft, PartialSignature, SignatureData};
pub use vault::{
    create_vault, get_vault, list_vaults, ErrorCode, MultisigError, Vault, VaultParams,
};
