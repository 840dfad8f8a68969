//! The polymorphic bridge capability set.

use std::collections::HashMap;
use std::sync::Arc;

use crate::chain_id::ChainId;
use crate::config::{ChainConfig, GatewayConfig, TokenConfig};
use crate::error::SwapError;
use crate::rawtx::{RawTransaction, SignedTransaction};
use crate::registry::RouterRegistry;
use crate::swap::{BuildTxArgs, SwapTxInfo, VerifyArgs};

/// Capability set every chain adapter exposes.
///
/// Object-safe so the registry can hold heterogeneous adapters behind
/// `Arc<dyn Bridge>`. The verify → build → sign → broadcast pipeline for one
/// `(srcChainID, txHash, logIndex)` is strictly sequential; independent
/// swaps run as independent tasks.
#[async_trait::async_trait]
pub trait Bridge: Send + Sync {
    fn chain_config(&self) -> &ChainConfig;

    fn gateway_config(&self) -> &GatewayConfig;

    fn chain_id(&self) -> ChainId {
        self.chain_config().chain_id
    }

    /// Token config by on-chain contract address, if registered.
    fn get_token_config(&self, address: &str) -> Option<TokenConfig>;

    /// Router contract handling the given token, if any.
    fn get_router_contract(&self, token_address: &str) -> Option<String>;

    /// Chain-specific address syntax/checksum validation.
    fn is_valid_address(&self, address: &str) -> bool;

    /// Derive this chain's address form from a hex-encoded public key.
    fn public_key_to_address(&self, pubkey_hex: &str) -> Result<String, SwapError>;

    /// Verify a source transaction into a canonical swap record.
    async fn verify_transaction(
        &self,
        tx_hash: &str,
        args: &VerifyArgs,
    ) -> Result<SwapTxInfo, SwapError>;

    /// Verify every log entry in scope, returning parallel aligned slices:
    /// `errors[i]` belongs to `infos[i]`, `None` marking success.
    ///
    /// The default covers chains with one swap record per `(tx, logIndex)`;
    /// Cosmos overrides it to walk `logs[1..]`.
    async fn register_swap(
        &self,
        tx_hash: &str,
        args: &VerifyArgs,
    ) -> (Vec<SwapTxInfo>, Vec<Option<SwapError>>) {
        match self.verify_transaction(tx_hash, args).await {
            Ok(info) => (vec![info], vec![None]),
            Err(err) => (
                vec![SwapTxInfo::new(args.swap_type, tx_hash, args.log_index)],
                vec![Some(err)],
            ),
        }
    }

    /// Build an unsigned destination-chain transaction for the swap-in side.
    async fn build_raw_transaction(
        &self,
        args: &BuildTxArgs,
    ) -> Result<RawTransaction, SwapError>;

    /// Drive MPC (or a configured local key) to sign; returns the signed
    /// transaction and its hash text.
    async fn mpc_sign_transaction(
        &self,
        raw_tx: RawTransaction,
        args: &BuildTxArgs,
    ) -> Result<(SignedTransaction, String), SwapError>;

    /// Broadcast via the configured gateway URLs, per-chain retry policy.
    async fn send_transaction(&self, signed_tx: SignedTransaction) -> Result<String, SwapError>;
}

/// State shared by every adapter: immutable chain/gateway config, the token
/// table, and the injected registry handle.
#[derive(Clone)]
pub struct BridgeContext {
    chain_config: ChainConfig,
    gateway_config: GatewayConfig,
    /// Keyed by contract address, with a lowercase alias for hex-addressed
    /// chains. Immutable after construction.
    tokens: HashMap<String, TokenConfig>,
    registry: Arc<RouterRegistry>,
}

impl BridgeContext {
    pub fn new(
        chain_config: ChainConfig,
        gateway_config: GatewayConfig,
        tokens: Vec<TokenConfig>,
        registry: Arc<RouterRegistry>,
    ) -> Self {
        let mut table = HashMap::new();
        for token in tokens {
            // base58-style addresses are case-sensitive, hex ones are not
            let lower = token.contract_address.to_ascii_lowercase();
            if lower != token.contract_address {
                table.insert(lower, token.clone());
            }
            table.insert(token.contract_address.clone(), token);
        }
        BridgeContext {
            chain_config,
            gateway_config,
            tokens: table,
            registry,
        }
    }

    pub fn chain_config(&self) -> &ChainConfig {
        &self.chain_config
    }

    pub fn gateway_config(&self) -> &GatewayConfig {
        &self.gateway_config
    }

    pub fn chain_id(&self) -> ChainId {
        self.chain_config.chain_id
    }

    pub fn registry(&self) -> &Arc<RouterRegistry> {
        &self.registry
    }

    pub fn get_token_config(&self, address: &str) -> Option<TokenConfig> {
        self.tokens
            .get(address)
            .or_else(|| self.tokens.get(&address.to_ascii_lowercase()))
            .cloned()
    }

    pub fn get_router_contract(&self, token_address: &str) -> Option<String> {
        if let Some(contract) = self
            .chain_config
            .router_contract_overrides
            .get(&token_address.to_ascii_lowercase())
        {
            return Some(contract.clone());
        }
        if self.chain_config.router_contract.is_empty() {
            None
        } else {
            Some(self.chain_config.router_contract.clone())
        }
    }
}
