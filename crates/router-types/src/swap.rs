//! Canonical cross-chain swap records.

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};

use crate::chain_id::ChainId;
use crate::error::SwapError;

/// Supported swap kinds. Closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SwapType {
    #[default]
    Erc20Swap,
}

impl std::str::FromStr for SwapType {
    type Err = SwapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "erc20swap" => Ok(SwapType::Erc20Swap),
            _ => Err(SwapError::SwapTypeNotSupported),
        }
    }
}

/// ERC20-style swap payload carried inside a [`SwapTxInfo`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Erc20SwapInfo {
    /// Source-chain token contract.
    pub token: String,
    /// Logical token ID shared across chains.
    pub token_id: String,
    /// Optional proxy contract to call on the destination chain.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_proxy: Option<String>,
    /// Opaque call payload forwarded to the proxy.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_data: Option<Vec<u8>>,
}

/// Canonical, chain-agnostic record of one verified swap-out.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapTxInfo {
    pub swap_type: SwapType,
    /// Source transaction id, lowercased hex without `0x`.
    pub hash: String,
    pub log_index: u64,
    pub height: u64,
    pub timestamp: u64,
    /// Transaction sender on the source chain.
    pub from: String,
    /// Contract the source transaction called into.
    pub tx_to: String,
    /// Contract that emitted the swap-out log (the router).
    pub to: String,
    /// Destination recipient, as a destination-chain address string.
    pub bind: String,
    /// Swapped value in the source token's smallest unit.
    pub value: U256,
    pub from_chain_id: ChainId,
    pub to_chain_id: ChainId,
    pub erc20_swap_info: Erc20SwapInfo,
}

impl SwapTxInfo {
    /// Start a record for `tx_hash` on the given source chain, normalizing
    /// the hash to lowercase hex without the `0x` prefix.
    pub fn new(swap_type: SwapType, tx_hash: &str, log_index: u64) -> Self {
        let hash = tx_hash
            .to_ascii_lowercase()
            .trim_start_matches("0x")
            .to_string();
        SwapTxInfo {
            swap_type,
            hash,
            log_index,
            ..Default::default()
        }
    }
}

/// Arguments to `verify_transaction` / `register_swap`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct VerifyArgs {
    pub swap_type: SwapType,
    pub log_index: u64,
    /// When set, skip the confirmation gate and return speculative info.
    pub allow_unstable: bool,
}

/// Arguments to the destination-side build → sign pipeline, derived from a
/// verified [`SwapTxInfo`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuildTxArgs {
    pub swap_type: SwapType,
    /// Source transaction id.
    pub swap_id: String,
    pub log_index: u64,
    pub from_chain_id: ChainId,
    pub to_chain_id: ChainId,
    /// Source-chain sender, for audit context only.
    pub from: String,
    /// Destination recipient.
    pub bind: String,
    /// Value in source token units, before fee and decimal conversion.
    pub original_value: U256,
    pub token_id: String,
    /// Source-chain token contract.
    pub src_token: String,
    /// Explicit nonce/sequence override; discovered via RPC when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_proxy: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_data: Option<Vec<u8>>,
}

impl BuildTxArgs {
    pub fn from_swap_info(info: &SwapTxInfo) -> Self {
        BuildTxArgs {
            swap_type: info.swap_type,
            swap_id: info.hash.clone(),
            log_index: info.log_index,
            from_chain_id: info.from_chain_id,
            to_chain_id: info.to_chain_id,
            from: info.from.clone(),
            bind: info.bind.clone(),
            original_value: info.value,
            token_id: info.erc20_swap_info.token_id.clone(),
            src_token: info.erc20_swap_info.token.clone(),
            nonce: None,
            call_proxy: info.erc20_swap_info.call_proxy.clone(),
            call_data: info.erc20_swap_info.call_data.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_normalized() {
        let info = SwapTxInfo::new(SwapType::Erc20Swap, "0xAbCd01", 2);
        assert_eq!(info.hash, "abcd01");
        assert_eq!(info.log_index, 2);
    }

    #[test]
    fn swap_type_parse() {
        assert_eq!("ERC20Swap".parse::<SwapType>().unwrap(), SwapType::Erc20Swap);
        assert!(matches!(
            "nftswap".parse::<SwapType>(),
            Err(SwapError::SwapTypeNotSupported)
        ));
    }

    #[test]
    fn build_args_inherit_swap_identity() {
        let mut info = SwapTxInfo::new(SwapType::Erc20Swap, "0xff00", 1);
        info.from_chain_id = ChainId::from_u64(1);
        info.to_chain_id = ChainId::from_u64(56);
        info.bind = "0x1111111111111111111111111111111111111111".into();
        info.value = U256::from(42u64);
        info.erc20_swap_info.token_id = "USDT".into();
        let args = BuildTxArgs::from_swap_info(&info);
        assert_eq!(args.swap_id, "ff00");
        assert_eq!(args.to_chain_id, ChainId::from_u64(56));
        assert_eq!(args.original_value, U256::from(42u64));
        assert_eq!(args.token_id, "USDT");
    }
}
