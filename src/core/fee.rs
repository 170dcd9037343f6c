//! Fee calculation for vault spends
//!
//! Multisig spends are sized before any signature exists, so the fee is
//! computed from a deterministic worst-case size estimate. Every signer
//! reconstructing the same draft arrives at the same number.

use crate::core::script::push_prefix_len;
use crate::core::transaction::compact_size_len;
use serde::{Deserialize, Serialize};

// =============================================================================
// Constants
// =============================================================================

/// Default fee rate (duffs per byte)
pub const MIN_FEE_RATE: u64 = 1;

/// Default maximum fee rate (duffs per byte)
pub const MAX_FEE_RATE: u64 = 10_000;

/// Outputs below this value are not relayed; change this small goes to fees
pub const DUST_LIMIT: u64 = 546;

/// Upper bound of a DER signature plus its sighash byte
pub const MAX_SIGNATURE_SIZE: usize = 73;

/// Size of a pay-to-pubkey-hash or pay-to-script-hash output, rounded up
pub const OUTPUT_SIZE: usize = 34;

// =============================================================================
// Fee Rate
// =============================================================================

/// Fee rate in duffs per byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FeeRate(pub u64);

impl FeeRate {
    /// Create from duffs per byte, clamped to the accepted range
    pub fn from_sat_per_byte(rate: u64) -> Self {
        Self(rate.clamp(MIN_FEE_RATE, MAX_FEE_RATE))
    }

    /// Calculate fee for a given size
    pub fn fee_for_size(&self, size_bytes: usize) -> u64 {
        self.0.saturating_mul(size_bytes as u64)
    }

    /// Get rate as duffs per byte
    pub fn as_sat_per_byte(&self) -> u64 {
        self.0
    }
}

impl Default for FeeRate {
    fn default() -> Self {
        Self(MIN_FEE_RATE)
    }
}

// =============================================================================
// Size estimation
// =============================================================================

/// Worst-case size of one fully signed P2SH multisig input
///
/// outpoint(36) + sequence(4) + scriptSig length + scriptSig, where the
/// scriptSig is `OP_0 <sig>*threshold <redeem script>`.
pub fn multisig_input_size(threshold: usize, key_count: usize) -> usize {
    let redeem_len = 3 + key_count * 34;
    let script_sig_len = 1
        + threshold * (1 + MAX_SIGNATURE_SIZE)
        + push_prefix_len(redeem_len)
        + redeem_len;
    36 + 4 + compact_size_len(script_sig_len as u64) + script_sig_len
}

/// Worst-case size of a fully signed vault spend
pub fn estimate_spend_size(
    input_count: usize,
    output_count: usize,
    threshold: usize,
    key_count: usize,
) -> usize {
    4 + compact_size_len(input_count as u64)
        + input_count * multisig_input_size(threshold, key_count)
        + compact_size_len(output_count as u64)
        + output_count * OUTPUT_SIZE
        + 4
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fee_rate_clamping() {
        assert_eq!(FeeRate::from_sat_per_byte(0).as_sat_per_byte(), MIN_FEE_RATE);
        assert_eq!(
            FeeRate::from_sat_per_byte(1_000_000).as_sat_per_byte(),
            MAX_FEE_RATE
        );
        assert_eq!(FeeRate::default().fee_for_size(250), 250);
    }

    #[test]
    fn test_two_of_three_input_size() {
        // redeem = 105 bytes (PUSHDATA1), scriptSig = 1 + 2*74 + 2 + 105 = 256
        assert_eq!(multisig_input_size(2, 3), 36 + 4 + 3 + 256);
    }

    #[test]
    fn test_estimate_grows_with_shape() {
        let base = estimate_spend_size(1, 2, 2, 3);
        assert!(estimate_spend_size(2, 2, 2, 3) > base);
        assert!(estimate_spend_size(1, 2, 3, 3) > base);
        assert!(estimate_spend_size(1, 1, 2, 3) < base);
        assert_eq!(base, 4 + 1 + multisig_input_size(2, 3) + 1 + 2 * OUTPUT_SIZE + 4);
    }
}
