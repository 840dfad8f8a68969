//! Chain-ID dispatch: pick the adapter for a configured chain.

use std::sync::Arc;

use router_chain_cosmos::CosmosBridge;
use router_chain_evm::EvmBridge;
use router_chain_lite::{
    aptos::AptosBridge, btc::BtcBridge, cardano::CardanoBridge, flow::FlowBridge,
    iota::IotaBridge, near::NearBridge, reef::ReefBridge, ripple::RippleBridge,
    stellar::StellarBridge,
};
use router_chain_solana::SolanaBridge;
use router_chain_tron::TronBridge;
use router_mpc::SignerBackend;
use router_types::{
    Bridge, BridgeContext, ChainSection, RouterConfig, RouterRegistry, SwapError,
};

/// Construct the bridge for a chain section.
///
/// Adapters are consulted in a fixed order; the EVM family is the default
/// fallthrough for any positive chain ID nobody else claims. A non-positive
/// chain ID is a fatal misconfiguration.
pub fn new_cross_chain_bridge(
    section: &ChainSection,
    registry: Arc<RouterRegistry>,
    signer: Arc<SignerBackend>,
    policy: Arc<RouterConfig>,
) -> Result<Arc<dyn Bridge>, SwapError> {
    let chain_id = section.chain.chain_id;
    if !chain_id.is_positive() {
        return Err(SwapError::WrongConfig(format!(
            "wrong chainID {chain_id}"
        )));
    }
    let ctx = BridgeContext::new(
        section.chain.clone(),
        section.gateway.clone(),
        section.tokens.clone(),
        registry,
    );

    let bridge: Arc<dyn Bridge> = if router_chain_lite::reef::supports_chain_id(&chain_id) {
        Arc::new(ReefBridge::new(EvmBridge::new(ctx, signer, policy)))
    } else if router_chain_solana::supports_chain_id(&chain_id) {
        Arc::new(SolanaBridge::new(ctx, signer)?)
    } else if router_chain_cosmos::supports_chain_id(&chain_id) {
        Arc::new(CosmosBridge::new(ctx, signer)?)
    } else if router_chain_lite::btc::supports_chain_id(&chain_id) {
        Arc::new(BtcBridge::new(ctx, signer)?)
    } else if router_chain_lite::cardano::supports_chain_id(&chain_id) {
        Arc::new(CardanoBridge::new(ctx, signer)?)
    } else if router_chain_lite::aptos::supports_chain_id(&chain_id) {
        Arc::new(AptosBridge::new(ctx, signer)?)
    } else if router_chain_tron::supports_chain_id(&chain_id) {
        Arc::new(TronBridge::new(ctx, signer, policy)?)
    } else if router_chain_lite::near::supports_chain_id(&chain_id) {
        Arc::new(NearBridge::new(ctx, signer)?)
    } else if router_chain_lite::iota::supports_chain_id(&chain_id) {
        Arc::new(IotaBridge::new(ctx, signer)?)
    } else if router_chain_lite::ripple::supports_chain_id(&chain_id) {
        Arc::new(RippleBridge::new(ctx, signer)?)
    } else if router_chain_lite::stellar::supports_chain_id(&chain_id) {
        Arc::new(StellarBridge::new(ctx, signer)?)
    } else if router_chain_lite::flow::supports_chain_id(&chain_id) {
        Arc::new(FlowBridge::new(ctx, signer)?)
    } else {
        Arc::new(EvmBridge::new(ctx, signer, policy))
    };
    Ok(bridge)
}

#[cfg(test)]
mod tests {
    use super::*;
    use router_types::{ChainConfig, ChainId, GatewayConfig, MpcConfig, Network};
    use std::collections::HashMap;

    fn section(chain_id: ChainId) -> ChainSection {
        ChainSection {
            chain: ChainConfig {
                chain_id,
                block_chain: "test".into(),
                router_contract: "0xd1c5966f9f5ee6881ff6b261bbeda45972b1b5f3".into(),
                confirmations: 3,
                initial_height: 0,
                router_contract_overrides: HashMap::new(),
            },
            gateway: GatewayConfig {
                api_address: vec!["http://127.0.0.1:8545".parse().unwrap()],
                api_address_ext: vec![],
                rpc_client_timeout: 10,
            },
            tokens: vec![],
        }
    }

    fn deps() -> (Arc<RouterRegistry>, Arc<SignerBackend>, Arc<RouterConfig>) {
        let registry = Arc::new(RouterRegistry::new());
        let mpc = MpcConfig {
            api_address: vec![],
            use_fast_mpc: false,
            sign_with_private_key: true,
            signer_private_keys: HashMap::new(),
            signer_public_keys: HashMap::new(),
            sign_timeout: 10,
        };
        let signer = Arc::new(SignerBackend::new(mpc).unwrap());
        let policy: RouterConfig = toml::from_str(
            r#"
identifier = "dispatchtest"
swap_type = "erc20swap"
[mpc]
api_address = []
sign_with_private_key = true
[[chains]]
chain_id = "56"
block_chain = "ethereum"
router_contract = "0xd1c5966f9f5ee6881ff6b261bbeda45972b1b5f3"
confirmations = 15
initial_height = 0
[chains.gateway]
api_address = ["http://127.0.0.1:8545"]
"#,
        )
        .unwrap();
        (registry, signer, Arc::new(policy))
    }

    #[test]
    fn zero_chain_id_is_fatal() {
        let (registry, signer, policy) = deps();
        let result =
            new_cross_chain_bridge(&section(ChainId::from_u64(0)), registry, signer, policy);
        assert!(matches!(result, Err(SwapError::WrongConfig(_))));
    }

    #[test]
    fn unknown_positive_chain_id_falls_through_to_evm() {
        let (registry, signer, policy) = deps();
        let bridge =
            new_cross_chain_bridge(&section(ChainId::from_u64(123_456)), registry, signer, policy)
                .unwrap();
        assert_eq!(bridge.chain_id(), ChainId::from_u64(123_456));
        // EVM address syntax, not a stub chain
        assert!(bridge.is_valid_address("0x55d398326f99059ff775485246999027b3197955"));
    }

    #[test]
    fn reef_stub_id_selects_reef_adapter() {
        let (registry, signer, policy) = deps();
        let reef_id = router_chain_lite::reef::get_stub_chain_id(Network::Mainnet);
        let bridge = new_cross_chain_bridge(&section(reef_id), registry, signer, policy).unwrap();
        assert_eq!(bridge.chain_id(), reef_id);
        // the Reef adapter accepts SS58 binds on top of EVM syntax
        assert!(bridge.is_valid_address("0x55d398326f99059ff775485246999027b3197955"));
    }

    #[test]
    fn solana_stub_id_selects_solana_adapter() {
        let (registry, signer, policy) = deps();
        let mut section = section(router_chain_solana::get_stub_chain_id(Network::Mainnet));
        section.chain.router_contract = "11111111111111111111111111111111".into();
        let bridge = new_cross_chain_bridge(&section, registry, signer, policy).unwrap();
        assert!(bridge.is_valid_address("11111111111111111111111111111111"));
        assert!(!bridge.is_valid_address("0x55d398326f99059ff775485246999027b3197955"));
    }

    #[test]
    fn configured_chain_id_round_trips() {
        let (registry, signer, policy) = deps();
        for id in [
            ChainId::from_u64(1),
            router_chain_tron::get_stub_chain_id(Network::Mainnet),
            router_chain_lite::ripple::get_stub_chain_id(Network::Mainnet),
        ] {
            let mut chain_section = section(id);
            if router_chain_tron::supports_chain_id(&id) {
                chain_section.chain.router_contract =
                    "T9yD14Nj9j7xAB4dbGeiX9h8unkKHxuWwb".into();
            } else if router_chain_lite::ripple::supports_chain_id(&id) {
                chain_section.chain.router_contract =
                    "rHb9CJAWyB4rj91VRWn96DkukG4bwdtyTh".into();
            }
            let bridge = new_cross_chain_bridge(
                &chain_section,
                registry.clone(),
                signer.clone(),
                policy.clone(),
            )
            .unwrap();
            assert_eq!(bridge.chain_config().chain_id, id);
        }
    }
}
