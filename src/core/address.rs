//! Networks, Base58Check addresses and multisig address derivation
//!
//! Address = Base58Check(version || HASH160(script or pubkey)), with Dash
//! version bytes: mainnet vaults start with '7', testnet vaults with '8' or '9'.

use crate::core::script::{multisig_redeem_script, ScriptError, ScriptType, MAX_MULTISIG_KEYS};
use crate::crypto::{double_sha256, hash160, public_key_from_hex};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Address-related errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("Invalid threshold: {threshold} for {signers} signer(s)")]
    InvalidThreshold { threshold: u8, signers: usize },
    #[error("Invalid key set: {0}")]
    InvalidKeySet(String),
    #[error("Invalid address: {0}")]
    InvalidAddress(String),
    #[error("Address {address} does not belong to network {network}")]
    WrongNetwork { address: String, network: Network },
    #[error("Unknown network: {0}")]
    UnknownNetwork(String),
}

// =============================================================================
// Network
// =============================================================================

/// The chain a vault and its drafts are bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Mainnet,
    #[default]
    Testnet,
    Regtest,
}

impl Network {
    /// Version byte of pay-to-pubkey-hash addresses
    pub fn p2pkh_version(self) -> u8 {
        match self {
            Network::Mainnet => 76,
            Network::Testnet | Network::Regtest => 140,
        }
    }

    /// Version byte of pay-to-script-hash addresses
    pub fn p2sh_version(self) -> u8 {
        match self {
            Network::Mainnet => 16,
            Network::Testnet | Network::Regtest => 19,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Network::Mainnet => "mainnet",
            Network::Testnet => "testnet",
            Network::Regtest => "regtest",
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Network {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mainnet" | "main" | "livenet" => Ok(Network::Mainnet),
            "testnet" | "test" => Ok(Network::Testnet),
            "regtest" | "local" | "devnet" => Ok(Network::Regtest),
            other => Err(AddressError::UnknownNetwork(other.to_string())),
        }
    }
}

// =============================================================================
// Address
// =============================================================================

/// A decoded address: its network and the locking template it stands for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    network: Network,
    script_type: ScriptType,
}

impl Address {
    /// Pay-to-script-hash address of a redeem script
    pub fn p2sh(redeem_script: &[u8], network: Network) -> Self {
        Self {
            network,
            script_type: ScriptType::P2SH {
                script_hash: to_hash20(&hash160(redeem_script)),
            },
        }
    }

    /// Pay-to-pubkey-hash address of a compressed public key
    pub fn p2pkh(public_key: &secp256k1::PublicKey, network: Network) -> Self {
        Self {
            network,
            script_type: ScriptType::P2PKH {
                pubkey_hash: to_hash20(&hash160(&public_key.serialize())),
            },
        }
    }

    /// Decode a Base58Check address and check it belongs to `network`
    pub fn parse(address: &str, network: Network) -> Result<Self, AddressError> {
        let (version, payload) = base58check_decode(address)?;
        if payload.len() != 20 {
            return Err(AddressError::InvalidAddress(address.to_string()));
        }
        let hash = to_hash20(&payload);

        let script_type = if version == network.p2sh_version() {
            ScriptType::P2SH { script_hash: hash }
        } else if version == network.p2pkh_version() {
            ScriptType::P2PKH { pubkey_hash: hash }
        } else {
            return Err(AddressError::WrongNetwork {
                address: address.to_string(),
                network,
            });
        };

        Ok(Self {
            network,
            script_type,
        })
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn script_type(&self) -> &ScriptType {
        &self.script_type
    }

    /// The locking script paying to this address
    pub fn script_pubkey(&self) -> Vec<u8> {
        self.script_type.script_pubkey()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let encoded = match &self.script_type {
            ScriptType::P2PKH { pubkey_hash } => {
                base58check_encode(self.network.p2pkh_version(), pubkey_hash)
            }
            ScriptType::P2SH { script_hash } => {
                base58check_encode(self.network.p2sh_version(), script_hash)
            }
        };
        f.write_str(&encoded)
    }
}

fn to_hash20(bytes: &[u8]) -> [u8; 20] {
    let mut hash = [0u8; 20];
    hash.copy_from_slice(&bytes[..20]);
    hash
}

// =============================================================================
// Base58Check
// =============================================================================

/// Base58Check(version || payload || first 4 bytes of SHA256d)
pub fn base58check_encode(version: u8, payload: &[u8]) -> String {
    let mut bytes = Vec::with_capacity(1 + payload.len() + 4);
    bytes.push(version);
    bytes.extend_from_slice(payload);
    let checksum = double_sha256(&bytes);
    bytes.extend_from_slice(&checksum[..4]);
    bs58::encode(bytes).into_string()
}

/// Decode Base58Check into (version, payload), verifying the checksum
pub fn base58check_decode(encoded: &str) -> Result<(u8, Vec<u8>), AddressError> {
    let invalid = || AddressError::InvalidAddress(encoded.to_string());

    let bytes = bs58::decode(encoded).into_vec().map_err(|_| invalid())?;
    if bytes.len() < 5 {
        return Err(invalid());
    }

    let (body, checksum) = bytes.split_at(bytes.len() - 4);
    if double_sha256(body)[..4] != *checksum {
        return Err(invalid());
    }

    Ok((body[0], body[1..].to_vec()))
}

// =============================================================================
// Multisig derivation
// =============================================================================

/// Validate a vault key set and build its redeem script
///
/// Keys stay in the order given. Permuting them yields a different script
/// and therefore a different address.
pub fn redeem_script_for(public_keys: &[String], threshold: u8) -> Result<Vec<u8>, AddressError> {
    if public_keys.is_empty() {
        return Err(AddressError::InvalidKeySet("no public keys".to_string()));
    }
    if threshold == 0 || threshold as usize > public_keys.len() {
        return Err(AddressError::InvalidThreshold {
            threshold,
            signers: public_keys.len(),
        });
    }
    if public_keys.len() > MAX_MULTISIG_KEYS {
        return Err(AddressError::InvalidKeySet(format!(
            "{} keys exceeds the maximum of {}",
            public_keys.len(),
            MAX_MULTISIG_KEYS
        )));
    }

    let mut seen = HashSet::with_capacity(public_keys.len());
    let mut raw_keys = Vec::with_capacity(public_keys.len());
    for key in public_keys {
        let parsed =
            public_key_from_hex(key).map_err(|e| AddressError::InvalidKeySet(e.to_string()))?;
        let serialized = parsed.serialize();
        if !seen.insert(serialized) {
            return Err(AddressError::InvalidKeySet(format!(
                "duplicate public key {}",
                key
            )));
        }
        raw_keys.push(serialized);
    }

    multisig_redeem_script(&raw_keys, threshold as usize).map_err(|e| match e {
        ScriptError::InvalidThreshold(..) => AddressError::InvalidThreshold {
            threshold,
            signers: public_keys.len(),
        },
        other => AddressError::InvalidKeySet(other.to_string()),
    })
}

/// Derive the P2SH multisig address of `(public_keys, threshold, network)`
pub fn derive_address(
    public_keys: &[String],
    threshold: u8,
    network: Network,
) -> Result<String, AddressError> {
    let redeem_script = redeem_script_for(public_keys, threshold)?;
    Ok(Address::p2sh(&redeem_script, network).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyPair;

    fn sample_pubkeys(n: usize) -> Vec<String> {
        (0..n).map(|_| KeyPair::generate().public_key_hex()).collect()
    }

    #[test]
    fn test_network_parsing() {
        assert_eq!("testnet".parse::<Network>().unwrap(), Network::Testnet);
        assert_eq!("MAINNET".parse::<Network>().unwrap(), Network::Mainnet);
        assert_eq!("local".parse::<Network>().unwrap(), Network::Regtest);
        assert!("moon".parse::<Network>().is_err());
        assert_eq!(Network::default(), Network::Testnet);
    }

    #[test]
    fn test_address_prefixes() {
        let keys = sample_pubkeys(3);
        let mainnet = derive_address(&keys, 2, Network::Mainnet).unwrap();
        let testnet = derive_address(&keys, 2, Network::Testnet).unwrap();
        assert!(mainnet.starts_with('7'));
        assert!(testnet.starts_with('8') || testnet.starts_with('9'));

        let kp = KeyPair::generate();
        let p2pkh = Address::p2pkh(&kp.public_key, Network::Testnet).to_string();
        assert!(p2pkh.starts_with('y'));
        let p2pkh = Address::p2pkh(&kp.public_key, Network::Mainnet).to_string();
        assert!(p2pkh.starts_with('X'));
    }

    #[test]
    fn test_address_determinism() {
        let keys = sample_pubkeys(3);
        assert_eq!(
            derive_address(&keys, 2, Network::Testnet).unwrap(),
            derive_address(&keys, 2, Network::Testnet).unwrap()
        );
    }

    #[test]
    fn test_address_order_and_threshold_sensitivity() {
        let keys = sample_pubkeys(3);
        let base = derive_address(&keys, 2, Network::Testnet).unwrap();

        let mut permuted = keys.clone();
        permuted.swap(0, 2);
        assert_ne!(base, derive_address(&permuted, 2, Network::Testnet).unwrap());

        assert_ne!(base, derive_address(&keys, 3, Network::Testnet).unwrap());

        // Threshold 1: ordering is still committed in the script
        let one = derive_address(&keys, 1, Network::Testnet).unwrap();
        assert_ne!(one, derive_address(&permuted, 1, Network::Testnet).unwrap());
    }

    #[test]
    fn test_threshold_validation() {
        let keys = sample_pubkeys(3);
        assert!(matches!(
            derive_address(&keys, 0, Network::Testnet),
            Err(AddressError::InvalidThreshold { threshold: 0, .. })
        ));
        assert!(matches!(
            derive_address(&keys, 4, Network::Testnet),
            Err(AddressError::InvalidThreshold { threshold: 4, .. })
        ));
    }

    #[test]
    fn test_key_set_validation() {
        assert!(matches!(
            derive_address(&[], 1, Network::Testnet),
            Err(AddressError::InvalidKeySet(_))
        ));

        let key = KeyPair::generate().public_key_hex();
        assert!(matches!(
            derive_address(&[key.clone(), key], 1, Network::Testnet),
            Err(AddressError::InvalidKeySet(_))
        ));

        assert!(matches!(
            derive_address(&["not-a-key".to_string()], 1, Network::Testnet),
            Err(AddressError::InvalidKeySet(_))
        ));

        assert!(matches!(
            derive_address(&sample_pubkeys(16), 2, Network::Testnet),
            Err(AddressError::InvalidKeySet(_))
        ));
    }

    #[test]
    fn test_parse_round_trip_and_network_check() {
        let keys = sample_pubkeys(2);
        let encoded = derive_address(&keys, 2, Network::Testnet).unwrap();

        let parsed = Address::parse(&encoded, Network::Testnet).unwrap();
        assert_eq!(parsed.to_string(), encoded);
        assert!(matches!(parsed.script_type(), ScriptType::P2SH { .. }));

        assert!(matches!(
            Address::parse(&encoded, Network::Mainnet),
            Err(AddressError::WrongNetwork { .. })
        ));
    }

    #[test]
    fn test_parse_rejects_bad_checksum() {
        let kp = KeyPair::generate();
        let mut encoded = Address::p2pkh(&kp.public_key, Network::Testnet).to_string();
        let last = encoded.pop().unwrap();
        encoded.push(if last == '1' { '2' } else { '1' });
        assert!(matches!(
            Address::parse(&encoded, Network::Testnet),
            Err(AddressError::InvalidAddress(_))
        ));
        assert!(Address::parse("0OIl", Network::Testnet).is_err());
    }

    #[test]
    fn test_known_testnet_destination_parses() {
        // A live testnet pay-to-pubkey-hash address
        let address = Address::parse("yWmaDGGSz1hFxXkVUR6n69E3FqfpQ5qgQn", Network::Testnet);
        assert!(matches!(
            address.map(|a| a.script_type().type_name()),
            Ok("P2PKH")
        ));
    }
}
