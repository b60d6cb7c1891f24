//! Ledger value unit and gas accounting.
//!
//! Balances and fees use deterministic fixed-point arithmetic so that debits
//! and credits add up exactly across blocks.

use fixed::types::I64F64;

pub type Amount = I64F64;

/// Gas charged for every transaction regardless of payload.
pub const BASE_GAS: u64 = 21_000;
/// Additional gas per byte of payload data.
pub const GAS_PER_BYTE: u64 = 68;
/// Gas prices are quoted in gwei; fees are expressed in whole ledger units.
pub const GWEI_PER_UNIT: u64 = 1_000_000_000;

pub const DEFAULT_GAS_PRICE: u64 = 5;
pub const DEFAULT_GAS_LIMIT: u64 = 21_000;
/// Fixed per-block gas ceiling reported on every block.
pub const BLOCK_GAS_LIMIT: u64 = 10_000_000;

/// Gas consumed by a transfer carrying `payload_len` UTF-8 bytes, capped at `gas_limit`.
pub fn gas_used(payload_len: usize, gas_limit: u64) -> u64 {
    let payload_gas = (payload_len as u64).saturating_mul(GAS_PER_BYTE);
    BASE_GAS.saturating_add(payload_gas).min(gas_limit)
}

/// Fee for `gas_used` at `gas_price` gwei, or `None` if it does not fit in an [`Amount`].
pub fn fee_for(gas_used: u64, gas_price: u64) -> Option<Amount> {
    let wei = (gas_used as u128).checked_mul(gas_price as u128)?;
    let wei = Amount::checked_from_num(wei)?;
    wei.checked_div(Amount::from_num(GWEI_PER_UNIT))
}

/// Converts a caller-supplied float into an [`Amount`], rejecting NaN and out-of-range values.
pub fn amount_from_f64(value: f64) -> Option<Amount> {
    if !value.is_finite() {
        return None;
    }
    Amount::checked_from_num(value)
}
