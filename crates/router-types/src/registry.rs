//! Process-wide router registry.
//!
//! Populated once at startup (and on reload) under single-writer discipline;
//! all hot-path lookups are read-only. Entries are never removed during a
//! run.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::bridge::Bridge;
use crate::chain_id::ChainId;
use crate::config::{FeeConfig, SwapConfig};
use crate::error::SwapError;
use crate::swap::SwapTxInfo;
use crate::value::check_token_swap_value;

type RouteKey = (String, ChainId);

/// Cross-chain lookup state: bridges by chain, multichain token addresses by
/// `(tokenID, chainID)`, router contracts, and per-route swap/fee policy.
#[derive(Default)]
pub struct RouterRegistry {
    bridges: RwLock<HashMap<ChainId, Arc<dyn Bridge>>>,
    multichain_tokens: RwLock<HashMap<RouteKey, String>>,
    router_contracts: RwLock<HashMap<(ChainId, String), String>>,
    swap_configs: RwLock<HashMap<RouteKey, SwapConfig>>,
    fee_configs: RwLock<HashMap<RouteKey, FeeConfig>>,
}

impl RouterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_bridge(&self, chain_id: ChainId, bridge: Arc<dyn Bridge>) {
        self.bridges.write().unwrap().insert(chain_id, bridge);
    }

    pub fn get_bridge(&self, chain_id: &ChainId) -> Option<Arc<dyn Bridge>> {
        self.bridges.read().unwrap().get(chain_id).cloned()
    }

    pub fn chain_ids(&self) -> Vec<ChainId> {
        let mut ids: Vec<ChainId> = self.bridges.read().unwrap().keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn set_multichain_token(&self, token_id: &str, chain_id: ChainId, address: String) {
        self.multichain_tokens
            .write()
            .unwrap()
            .insert((token_id.to_string(), chain_id), address);
    }

    /// The destination-chain token contract for a logical token ID.
    pub fn get_multichain_token(&self, token_id: &str, chain_id: &ChainId) -> Option<String> {
        self.multichain_tokens
            .read()
            .unwrap()
            .get(&(token_id.to_string(), *chain_id))
            .cloned()
    }

    pub fn set_router_contract(&self, chain_id: ChainId, token: &str, contract: String) {
        self.router_contracts
            .write()
            .unwrap()
            .insert((chain_id, token.to_ascii_lowercase()), contract);
    }

    pub fn get_router_contract(&self, chain_id: &ChainId, token: &str) -> Option<String> {
        self.router_contracts
            .read()
            .unwrap()
            .get(&(*chain_id, token.to_ascii_lowercase()))
            .cloned()
    }

    pub fn set_swap_config(&self, token_id: &str, chain_id: ChainId, config: SwapConfig) {
        self.swap_configs
            .write()
            .unwrap()
            .insert((token_id.to_string(), chain_id), config);
    }

    pub fn get_swap_config(&self, token_id: &str, chain_id: &ChainId) -> Option<SwapConfig> {
        self.swap_configs
            .read()
            .unwrap()
            .get(&(token_id.to_string(), *chain_id))
            .cloned()
    }

    pub fn set_fee_config(&self, token_id: &str, chain_id: ChainId, config: FeeConfig) {
        self.fee_configs
            .write()
            .unwrap()
            .insert((token_id.to_string(), chain_id), config);
    }

    pub fn get_fee_config(&self, token_id: &str, chain_id: &ChainId) -> Option<FeeConfig> {
        self.fee_configs
            .read()
            .unwrap()
            .get(&(token_id.to_string(), *chain_id))
            .cloned()
    }
}

/// Cross-chain identity checks shared by every verification pipeline.
///
/// The source adapter has already decoded the swap-out event into
/// `swap_info`; this confirms the record is routable: chain identity, token
/// registration on both sides, value policy and bind validity on the
/// destination.
pub fn check_swap_info(
    registry: &RouterRegistry,
    src_bridge: &dyn Bridge,
    swap_info: &SwapTxInfo,
) -> Result<(), SwapError> {
    if swap_info.from_chain_id != src_bridge.chain_id() {
        tracing::error!(
            txid = %swap_info.hash,
            log_index = swap_info.log_index,
            from_chain_id = %swap_info.from_chain_id,
            chain_id = %src_bridge.chain_id(),
            "swap tx with mismatched fromChainID in receipt"
        );
        return Err(SwapError::FromChainIDMismatch);
    }
    if swap_info.from_chain_id == swap_info.to_chain_id {
        return Err(SwapError::SameFromAndToChainID);
    }

    let erc20 = &swap_info.erc20_swap_info;
    let from_token = src_bridge
        .get_token_config(&erc20.token)
        .filter(|t| !t.token_id.is_empty())
        .ok_or(SwapError::MissTokenConfig)?;

    let multichain_token = registry
        .get_multichain_token(&erc20.token_id, &swap_info.to_chain_id)
        .ok_or_else(|| {
            tracing::warn!(
                token_id = %erc20.token_id,
                chain_id = %swap_info.to_chain_id,
                txid = %swap_info.hash,
                "get multichain token failed"
            );
            SwapError::MissTokenConfig
        })?;

    let to_bridge = registry
        .get_bridge(&swap_info.to_chain_id)
        .ok_or(SwapError::NoBridgeForChainID)?;
    let to_token = to_bridge
        .get_token_config(&multichain_token)
        .ok_or_else(|| {
            tracing::warn!(
                chain_id = %swap_info.to_chain_id,
                token = %multichain_token,
                "get token config failed"
            );
            SwapError::MissTokenConfig
        })?;

    if !check_token_swap_value(registry, swap_info, from_token.decimals, to_token.decimals) {
        return Err(SwapError::TxWithWrongValue);
    }

    if !to_bridge.is_valid_address(&swap_info.bind) {
        tracing::warn!(
            txid = %swap_info.hash,
            log_index = swap_info.log_index,
            bind = %swap_info.bind,
            "wrong bind address in swap"
        );
        return Err(SwapError::WrongBindAddress);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::BridgeContext;
    use crate::config::{ChainConfig, GatewayConfig, TokenConfig};
    use crate::rawtx::{RawTransaction, SignedTransaction};
    use crate::swap::{BuildTxArgs, SwapType, VerifyArgs};
    use alloy_primitives::U256;
    use std::collections::HashMap;

    /// Minimal source/destination bridge over a token table; addresses are
    /// valid when prefixed `ok`.
    struct TableBridge {
        ctx: BridgeContext,
    }

    #[async_trait::async_trait]
    impl Bridge for TableBridge {
        fn chain_config(&self) -> &ChainConfig {
            self.ctx.chain_config()
        }
        fn gateway_config(&self) -> &GatewayConfig {
            self.ctx.gateway_config()
        }
        fn get_token_config(&self, address: &str) -> Option<TokenConfig> {
            self.ctx.get_token_config(address)
        }
        fn get_router_contract(&self, token_address: &str) -> Option<String> {
            self.ctx.get_router_contract(token_address)
        }
        fn is_valid_address(&self, address: &str) -> bool {
            address.starts_with("ok")
        }
        fn public_key_to_address(&self, _pubkey_hex: &str) -> Result<String, SwapError> {
            Ok("okaddr".into())
        }
        async fn verify_transaction(
            &self,
            _tx_hash: &str,
            _args: &VerifyArgs,
        ) -> Result<SwapTxInfo, SwapError> {
            Err(SwapError::SwapTypeNotSupported)
        }
        async fn build_raw_transaction(
            &self,
            _args: &BuildTxArgs,
        ) -> Result<RawTransaction, SwapError> {
            Err(SwapError::SwapTypeNotSupported)
        }
        async fn mpc_sign_transaction(
            &self,
            _raw_tx: RawTransaction,
            _args: &BuildTxArgs,
        ) -> Result<(SignedTransaction, String), SwapError> {
            Err(SwapError::SwapTypeNotSupported)
        }
        async fn send_transaction(
            &self,
            _signed_tx: SignedTransaction,
        ) -> Result<String, SwapError> {
            Err(SwapError::SwapTypeNotSupported)
        }
    }

    fn bridge(registry: &Arc<RouterRegistry>, chain: u64, token: &str) -> Arc<TableBridge> {
        let ctx = BridgeContext::new(
            ChainConfig {
                chain_id: ChainId::from_u64(chain),
                block_chain: "test".into(),
                router_contract: "okrouter".into(),
                confirmations: 1,
                initial_height: 0,
                router_contract_overrides: HashMap::new(),
            },
            GatewayConfig {
                api_address: vec!["http://127.0.0.1:1".parse().unwrap()],
                api_address_ext: vec![],
                rpc_client_timeout: 5,
            },
            vec![TokenConfig {
                token_id: "USDT".into(),
                decimals: 6,
                contract_address: token.into(),
            }],
            registry.clone(),
        );
        Arc::new(TableBridge { ctx })
    }

    fn routed_registry() -> (Arc<RouterRegistry>, Arc<TableBridge>) {
        let registry = Arc::new(RouterRegistry::new());
        let src = bridge(&registry, 1, "srctoken");
        let dst = bridge(&registry, 2, "dsttoken");
        registry.register_bridge(ChainId::from_u64(1), src.clone());
        registry.register_bridge(ChainId::from_u64(2), dst);
        registry.set_multichain_token("USDT", ChainId::from_u64(2), "dsttoken".into());
        registry.set_swap_config(
            "USDT",
            ChainId::from_u64(2),
            SwapConfig {
                minimum_swap: U256::from(10u64),
                maximum_swap: U256::from(1_000_000u64),
                big_value_threshold: U256::from(500_000u64),
            },
        );
        registry.set_fee_config(
            "USDT",
            ChainId::from_u64(2),
            FeeConfig {
                swap_fee_rate_per_million: 0,
                minimum_swap_fee: U256::ZERO,
                maximum_swap_fee: U256::ZERO,
            },
        );
        (registry, src)
    }

    fn swap(value: u64, bind: &str) -> SwapTxInfo {
        let mut info = SwapTxInfo::new(SwapType::Erc20Swap, "0xabcd", 0);
        info.from_chain_id = ChainId::from_u64(1);
        info.to_chain_id = ChainId::from_u64(2);
        info.bind = bind.into();
        info.value = U256::from(value);
        info.erc20_swap_info.token = "srctoken".into();
        info.erc20_swap_info.token_id = "USDT".into();
        info
    }

    #[test]
    fn routable_swap_passes() {
        let (registry, src) = routed_registry();
        check_swap_info(&registry, src.as_ref(), &swap(100, "okbind")).unwrap();
    }

    #[test]
    fn from_chain_id_must_match_bridge() {
        let (registry, src) = routed_registry();
        let mut info = swap(100, "okbind");
        info.from_chain_id = ChainId::from_u64(7);
        info.to_chain_id = ChainId::from_u64(2);
        assert_eq!(
            check_swap_info(&registry, src.as_ref(), &info).unwrap_err(),
            SwapError::FromChainIDMismatch
        );
    }

    #[test]
    fn same_from_and_to_rejected() {
        let (registry, src) = routed_registry();
        let mut info = swap(100, "okbind");
        info.to_chain_id = ChainId::from_u64(1);
        assert_eq!(
            check_swap_info(&registry, src.as_ref(), &info).unwrap_err(),
            SwapError::SameFromAndToChainID
        );
    }

    #[test]
    fn unknown_token_rejected() {
        let (registry, src) = routed_registry();
        let mut info = swap(100, "okbind");
        info.erc20_swap_info.token = "unknown".into();
        assert_eq!(
            check_swap_info(&registry, src.as_ref(), &info).unwrap_err(),
            SwapError::MissTokenConfig
        );
    }

    #[test]
    fn unrouted_destination_rejected() {
        let (registry, src) = routed_registry();
        let mut info = swap(100, "okbind");
        info.to_chain_id = ChainId::from_u64(3);
        assert_eq!(
            check_swap_info(&registry, src.as_ref(), &info).unwrap_err(),
            SwapError::MissTokenConfig
        );
    }

    #[test]
    fn value_bounds_enforced() {
        let (registry, src) = routed_registry();
        assert_eq!(
            check_swap_info(&registry, src.as_ref(), &swap(9, "okbind")).unwrap_err(),
            SwapError::TxWithWrongValue
        );
        assert_eq!(
            check_swap_info(&registry, src.as_ref(), &swap(1_000_001, "okbind")).unwrap_err(),
            SwapError::TxWithWrongValue
        );
    }

    #[test]
    fn bind_validated_on_destination() {
        let (registry, src) = routed_registry();
        assert_eq!(
            check_swap_info(&registry, src.as_ref(), &swap(100, "badbind")).unwrap_err(),
            SwapError::WrongBindAddress
        );
    }
}
