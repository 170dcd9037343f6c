//! Cryptographic utilities for the vault
//!
//! This module provides:
//! - SHA-256, double SHA-256 and HASH160 hashing
//! - ECDSA key management (secp256k1) with DER signatures

pub mod hash;
pub mod keys;

pub use hash::{double_sha256, hash160, sha256, sha256_hex};
pub use keys::{public_key_from_hex, sign_digest, verify_digest, KeyError, KeyPair};
