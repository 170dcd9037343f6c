//! Wallet module for signer identity, key access and broadcast

pub mod wallet;

pub use wallet::{LocalAccount, WalletAccount, WalletError};
