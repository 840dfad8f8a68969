//! Swap value policy: bounds checking, fee deduction and decimal
//! normalization. All amounts are U256 in the token's smallest unit.

use alloy_primitives::U256;

use crate::config::{FeeConfig, SwapConfig};
use crate::registry::RouterRegistry;
use crate::swap::SwapTxInfo;

const PER_MILLION: u64 = 1_000_000;

/// Rescale `value` from `from_decimals` into `to_decimals`.
pub fn convert_decimals(value: U256, from_decimals: u8, to_decimals: u8) -> U256 {
    if from_decimals == to_decimals {
        return value;
    }
    if to_decimals > from_decimals {
        value * U256::from(10u64).pow(U256::from(to_decimals - from_decimals))
    } else {
        value / U256::from(10u64).pow(U256::from(from_decimals - to_decimals))
    }
}

/// Swap fee for `value` under the route's fee policy, clamped to
/// `[minimum_swap_fee, maximum_swap_fee]`. A zero rate means no fee.
pub fn calc_swap_fee(value: U256, fee: &FeeConfig) -> U256 {
    if fee.swap_fee_rate_per_million == 0 {
        return U256::ZERO;
    }
    let raw = value * U256::from(fee.swap_fee_rate_per_million) / U256::from(PER_MILLION);
    raw.clamp(fee.minimum_swap_fee, fee.maximum_swap_fee)
}

/// Destination-side value: normalize decimals, then deduct the fee.
/// Returns zero when the fee consumes the whole value.
pub fn calc_swap_value(
    value: U256,
    from_decimals: u8,
    to_decimals: u8,
    fee: &FeeConfig,
) -> U256 {
    let normalized = convert_decimals(value, from_decimals, to_decimals);
    let fee_amount = calc_swap_fee(normalized, fee);
    normalized.saturating_sub(fee_amount)
}

/// Bounds check against one route's swap config, after decimal
/// normalization into destination units.
pub fn check_swap_value(
    value: U256,
    from_decimals: u8,
    to_decimals: u8,
    swap: &SwapConfig,
    fee: &FeeConfig,
) -> bool {
    if value.is_zero() {
        return false;
    }
    let normalized = convert_decimals(value, from_decimals, to_decimals);
    if normalized < swap.minimum_swap || normalized > swap.maximum_swap {
        return false;
    }
    !calc_swap_value(value, from_decimals, to_decimals, fee).is_zero()
}

/// Route-aware bounds check for a verified swap record. Fails when the
/// route has no configured swap policy.
pub fn check_token_swap_value(
    registry: &RouterRegistry,
    swap_info: &SwapTxInfo,
    from_decimals: u8,
    to_decimals: u8,
) -> bool {
    let token_id = &swap_info.erc20_swap_info.token_id;
    let Some(swap) = registry.get_swap_config(token_id, &swap_info.to_chain_id) else {
        return false;
    };
    let Some(fee) = registry.get_fee_config(token_id, &swap_info.to_chain_id) else {
        return false;
    };
    check_swap_value(swap_info.value, from_decimals, to_decimals, &swap, &fee)
}

/// Values above the route's threshold need out-of-band approval; the swap
/// still verifies, the caller decides how to queue it.
pub fn is_big_swap_value(
    registry: &RouterRegistry,
    swap_info: &SwapTxInfo,
    from_decimals: u8,
    to_decimals: u8,
) -> bool {
    let token_id = &swap_info.erc20_swap_info.token_id;
    let Some(swap) = registry.get_swap_config(token_id, &swap_info.to_chain_id) else {
        return false;
    };
    convert_decimals(swap_info.value, from_decimals, to_decimals) > swap.big_value_threshold
}

#[cfg(test)]
mod tests {
    use super::*;

    fn swap_cfg(min: u64, max: u64, big: u64) -> SwapConfig {
        SwapConfig {
            minimum_swap: U256::from(min),
            maximum_swap: U256::from(max),
            big_value_threshold: U256::from(big),
        }
    }

    fn fee_cfg(rate: u64, min: u64, max: u64) -> FeeConfig {
        FeeConfig {
            swap_fee_rate_per_million: rate,
            minimum_swap_fee: U256::from(min),
            maximum_swap_fee: U256::from(max),
        }
    }

    #[test]
    fn decimal_conversion() {
        assert_eq!(
            convert_decimals(U256::from(1u64), 6, 18),
            U256::from(10u64).pow(U256::from(12u64))
        );
        assert_eq!(
            convert_decimals(U256::from(10u64).pow(U256::from(12u64)), 18, 6),
            U256::from(1u64)
        );
        assert_eq!(convert_decimals(U256::from(7u64), 8, 8), U256::from(7u64));
    }

    #[test]
    fn fee_is_clamped() {
        let fee = fee_cfg(1000, 5, 50); // 0.1%
        assert_eq!(calc_swap_fee(U256::from(1_000u64), &fee), U256::from(5u64)); // raw 1 -> min
        assert_eq!(
            calc_swap_fee(U256::from(20_000u64), &fee),
            U256::from(20u64)
        );
        assert_eq!(
            calc_swap_fee(U256::from(1_000_000u64), &fee),
            U256::from(50u64) // raw 1000 -> max
        );
        assert_eq!(
            calc_swap_fee(U256::from(1_000u64), &fee_cfg(0, 5, 50)),
            U256::ZERO
        );
    }

    #[test]
    fn value_bounds_inclusive_and_boundaries_rejected() {
        let swap = swap_cfg(100, 10_000, 5_000);
        let fee = fee_cfg(0, 0, 0);
        assert!(check_swap_value(U256::from(100u64), 6, 6, &swap, &fee));
        assert!(check_swap_value(U256::from(10_000u64), 6, 6, &swap, &fee));
        assert!(!check_swap_value(U256::from(99u64), 6, 6, &swap, &fee));
        assert!(!check_swap_value(U256::from(10_001u64), 6, 6, &swap, &fee));
        assert!(!check_swap_value(U256::ZERO, 6, 6, &swap, &fee));
    }

    #[test]
    fn fee_consuming_whole_value_rejected() {
        let swap = swap_cfg(1, 1_000_000, 1_000_000);
        let fee = fee_cfg(1000, 500, 500);
        // normalized value 100 <= min fee 500 -> swap value zero
        assert!(!check_swap_value(U256::from(100u64), 6, 6, &swap, &fee));
    }
}
