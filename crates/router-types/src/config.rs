//! Router configuration.
//!
//! The service is configured from a single TOML file. Secrets (private keys,
//! MPC endpoints) may be given as `$VAR` / `${VAR}` environment references
//! which resolve during deserialization, so key material stays out of the
//! config file.

use std::collections::HashMap;
use std::ops::Deref;
use std::path::Path;
use std::str::FromStr;

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::chain_id::ChainId;
use crate::error::SwapError;

/// Per-chain static configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ChainConfig {
    pub chain_id: ChainId,
    /// Block-chain family tag, e.g. `ethereum`, `tron`, `solana`.
    pub block_chain: String,
    /// Default router contract for this chain.
    pub router_contract: String,
    /// Confirmations floor for the stability gate.
    pub confirmations: u64,
    /// Transactions below this height are never accepted.
    pub initial_height: u64,
    /// Per-token router contract overrides, keyed by token address.
    #[serde(default)]
    pub router_contract_overrides: HashMap<String, String>,
}

impl ChainConfig {
    pub fn check_config(&self) -> Result<(), SwapError> {
        if !self.chain_id.is_positive() {
            return Err(SwapError::WrongConfig(format!(
                "non-positive chain id {}",
                self.chain_id
            )));
        }
        if self.block_chain.is_empty() {
            return Err(SwapError::WrongConfig("empty block_chain tag".into()));
        }
        if self.router_contract.is_empty() {
            return Err(SwapError::WrongConfig("empty router contract".into()));
        }
        Ok(())
    }
}

/// Gateway RPC endpoints for one chain.
///
/// `api_address` is the required primary list; `api_address_ext` is optional
/// and used only for read amplification and broadcast fan-out.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct GatewayConfig {
    pub api_address: Vec<Url>,
    #[serde(default)]
    pub api_address_ext: Vec<Url>,
    /// Per-request timeout in seconds.
    #[serde(default = "defaults::rpc_client_timeout")]
    pub rpc_client_timeout: u64,
}

impl GatewayConfig {
    /// Primary URLs followed by the extended list, in configured order.
    pub fn all_urls(&self) -> Vec<Url> {
        let mut urls = self.api_address.clone();
        urls.extend(self.api_address_ext.iter().cloned());
        urls
    }

    pub fn check_config(&self) -> Result<(), SwapError> {
        if self.api_address.is_empty() {
            return Err(SwapError::WrongConfig("empty gateway api_address".into()));
        }
        Ok(())
    }
}

/// One token deployment on one chain.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct TokenConfig {
    /// Logical token ID shared across chains.
    pub token_id: String,
    pub decimals: u8,
    pub contract_address: String,
}

impl TokenConfig {
    pub fn check_config(&self) -> Result<(), SwapError> {
        if self.token_id.is_empty() {
            return Err(SwapError::WrongConfig("empty token id".into()));
        }
        if self.contract_address.is_empty() {
            return Err(SwapError::WrongConfig("empty token contract".into()));
        }
        Ok(())
    }
}

/// Swap value bounds, in the token's smallest unit.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SwapConfig {
    #[serde(deserialize_with = "de_u256")]
    pub minimum_swap: U256,
    #[serde(deserialize_with = "de_u256")]
    pub maximum_swap: U256,
    #[serde(deserialize_with = "de_u256")]
    pub big_value_threshold: U256,
}

impl SwapConfig {
    pub fn check_config(&self) -> Result<(), SwapError> {
        if self.maximum_swap < self.minimum_swap {
            return Err(SwapError::WrongConfig(
                "maximum_swap smaller than minimum_swap".into(),
            ));
        }
        if self.big_value_threshold < self.minimum_swap {
            return Err(SwapError::WrongConfig(
                "big_value_threshold smaller than minimum_swap".into(),
            ));
        }
        Ok(())
    }
}

/// Fee policy, rate expressed per million.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct FeeConfig {
    pub swap_fee_rate_per_million: u64,
    #[serde(deserialize_with = "de_u256")]
    pub minimum_swap_fee: U256,
    #[serde(deserialize_with = "de_u256")]
    pub maximum_swap_fee: U256,
}

impl FeeConfig {
    pub fn check_config(&self) -> Result<(), SwapError> {
        if self.swap_fee_rate_per_million >= 1_000_000 {
            return Err(SwapError::WrongConfig(
                "swap_fee_rate_per_million not in [0, 1000000)".into(),
            ));
        }
        if self.maximum_swap_fee < self.minimum_swap_fee {
            return Err(SwapError::WrongConfig(
                "maximum_swap_fee smaller than minimum_swap_fee".into(),
            ));
        }
        Ok(())
    }
}

/// Fee + bounds for one `(token_id, to_chain_id)` route.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SwapRouteConfig {
    pub token_id: String,
    /// Absent means: applies to every destination chain.
    #[serde(default)]
    pub to_chain_id: Option<ChainId>,
    #[serde(flatten)]
    pub swap: SwapConfig,
    #[serde(flatten)]
    pub fee: FeeConfig,
}

/// MPC service configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct MpcConfig {
    pub api_address: Vec<Url>,
    #[serde(default)]
    pub use_fast_mpc: bool,
    /// Dev/test only: sign locally instead of calling the MPC network.
    #[serde(default)]
    pub sign_with_private_key: bool,
    /// Per-chain local signing keys, `$ENV` resolvable.
    #[serde(default)]
    pub signer_private_keys: HashMap<String, LiteralOrEnv<String>>,
    /// MPC public key per chain, hex.
    #[serde(default)]
    pub signer_public_keys: HashMap<String, String>,
    /// Signing session timeout in seconds.
    #[serde(default = "defaults::mpc_sign_timeout")]
    pub sign_timeout: u64,
}

impl MpcConfig {
    pub fn check_config(&self) -> Result<(), SwapError> {
        if !self.sign_with_private_key && self.api_address.is_empty() {
            return Err(SwapError::WrongConfig("empty mpc api_address".into()));
        }
        Ok(())
    }

    pub fn signer_private_key(&self, chain_id: &ChainId) -> Option<&str> {
        self.signer_private_keys
            .get(&chain_id.to_string())
            .map(|k| k.as_str())
    }

    pub fn signer_public_key(&self, chain_id: &ChainId) -> Option<&str> {
        self.signer_public_keys
            .get(&chain_id.to_string())
            .map(String::as_str)
    }
}

/// One chain block in the config file.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ChainSection {
    #[serde(flatten)]
    pub chain: ChainConfig,
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub tokens: Vec<TokenConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ServerConfig {
    #[serde(default = "defaults::host")]
    pub host: String,
    #[serde(default = "defaults::port")]
    pub port: u16,
}

/// Root of the TOML configuration file.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RouterConfig {
    pub identifier: String,
    pub swap_type: String,
    #[serde(default = "defaults::server")]
    pub server: ServerConfig,
    pub mpc: MpcConfig,
    pub chains: Vec<ChainSection>,
    #[serde(default)]
    pub swaps: Vec<SwapRouteConfig>,
    #[serde(default)]
    pub all_chain_ids: Vec<ChainId>,
    #[serde(default)]
    pub allow_call_by_contract: bool,
    /// Per-chain whitelists for calls routed through another contract.
    #[serde(default)]
    pub call_by_contract_whitelist: HashMap<String, Vec<String>>,
    #[serde(default)]
    pub call_by_contract_code_hash_whitelist: HashMap<String, Vec<String>>,
    /// Chains whose receipts carry an untrustworthy fromChainID field.
    #[serde(default)]
    pub dont_use_from_chain_id_in_receipt: Vec<ChainId>,
}

impl RouterConfig {
    pub fn load(path: &Path) -> Result<Self, SwapError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| SwapError::WrongConfig(format!("read {}: {e}", path.display())))?;
        let config: RouterConfig = toml::from_str(&text)
            .map_err(|e| SwapError::WrongConfig(format!("parse {}: {e}", path.display())))?;
        config.check_config()?;
        Ok(config)
    }

    pub fn check_config(&self) -> Result<(), SwapError> {
        if self.identifier.is_empty() {
            return Err(SwapError::WrongConfig("empty identifier".into()));
        }
        if self.chains.is_empty() {
            return Err(SwapError::WrongConfig("no chains configured".into()));
        }
        self.mpc.check_config()?;
        for section in &self.chains {
            section.chain.check_config()?;
            section.gateway.check_config()?;
            for token in &section.tokens {
                token.check_config()?;
            }
        }
        for route in &self.swaps {
            route.swap.check_config()?;
            route.fee.check_config()?;
        }
        Ok(())
    }

    pub fn is_use_from_chain_id_in_receipt_disabled(&self, chain_id: &ChainId) -> bool {
        self.dont_use_from_chain_id_in_receipt.contains(chain_id)
    }

    pub fn is_in_call_by_contract_whitelist(&self, chain_id: &ChainId, address: &str) -> bool {
        self.call_by_contract_whitelist
            .get(&chain_id.to_string())
            .is_some_and(|list| list.iter().any(|a| a.eq_ignore_ascii_case(address)))
    }

    pub fn has_call_by_contract_code_hash_whitelist(&self, chain_id: &ChainId) -> bool {
        self.call_by_contract_code_hash_whitelist
            .get(&chain_id.to_string())
            .is_some_and(|list| !list.is_empty())
    }

    pub fn is_in_call_by_contract_code_hash_whitelist(
        &self,
        chain_id: &ChainId,
        code_hash: &str,
    ) -> bool {
        self.call_by_contract_code_hash_whitelist
            .get(&chain_id.to_string())
            .is_some_and(|list| list.iter().any(|h| h.eq_ignore_ascii_case(code_hash)))
    }
}

mod defaults {
    use super::ServerConfig;

    pub fn rpc_client_timeout() -> u64 {
        60
    }
    pub fn mpc_sign_timeout() -> u64 {
        120
    }
    pub fn host() -> String {
        "127.0.0.1".into()
    }
    pub fn port() -> u16 {
        9733
    }
    pub fn server() -> ServerConfig {
        ServerConfig {
            host: host(),
            port: port(),
        }
    }
}

/// A string-like config value that resolves `$VAR` / `${VAR}` environment
/// references at deserialization time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiteralOrEnv<T>(T);

impl<T> LiteralOrEnv<T> {
    pub fn from_literal(value: T) -> Self {
        Self(value)
    }

    pub fn into_inner(self) -> T {
        self.0
    }
}

impl LiteralOrEnv<String> {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<T> Deref for LiteralOrEnv<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

fn parse_env_var_syntax(s: &str) -> Option<String> {
    if let Some(inner) = s.strip_prefix("${").and_then(|r| r.strip_suffix('}')) {
        return Some(inner.to_string());
    }
    let var = s.strip_prefix('$')?;
    if !var.is_empty() && var.chars().all(|c| c.is_alphanumeric() || c == '_') {
        Some(var.to_string())
    } else {
        None
    }
}

impl<'de, T> Deserialize<'de> for LiteralOrEnv<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let value = if let Some(var) = parse_env_var_syntax(&s) {
            std::env::var(&var).map_err(|_| {
                serde::de::Error::custom(format!("environment variable {var:?} not found"))
            })?
        } else {
            s
        };
        value
            .parse::<T>()
            .map(LiteralOrEnv)
            .map_err(serde::de::Error::custom)
    }
}

impl<T: Serialize> Serialize for LiteralOrEnv<T> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

/// Deserialize a U256 from a decimal (or 0x-hex) string.
pub fn de_u256<'de, D: serde::Deserializer<'de>>(deserializer: D) -> Result<U256, D::Error> {
    let s = String::deserialize(deserializer)?;
    U256::from_str(&s).map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_toml() -> &'static str {
        r#"
identifier = "routertest"
swap_type = "erc20swap"

[server]
host = "0.0.0.0"
port = 9000

[mpc]
api_address = ["http://127.0.0.1:2921"]
sign_with_private_key = false

[[chains]]
chain_id = "56"
block_chain = "ethereum"
router_contract = "0xd1c5966f9f5ee6881ff6b261bbeda45972b1b5f3"
confirmations = 15
initial_height = 1000000

[chains.gateway]
api_address = ["https://bsc-dataseed1.binance.org"]
api_address_ext = ["https://bsc-dataseed2.binance.org"]

[[chains.tokens]]
token_id = "USDT"
decimals = 18
contract_address = "0x55d398326f99059ff775485246999027b3197955"

[[swaps]]
token_id = "USDT"
swap_fee_rate_per_million = 1000
minimum_swap_fee = "1000000000000000000"
maximum_swap_fee = "10000000000000000000"
minimum_swap = "10000000000000000000"
maximum_swap = "10000000000000000000000000"
big_value_threshold = "5000000000000000000000000"
"#
    }

    #[test]
    fn parse_sample_config() {
        let config: RouterConfig = toml::from_str(sample_toml()).unwrap();
        config.check_config().unwrap();
        assert_eq!(config.chains.len(), 1);
        let section = &config.chains[0];
        assert_eq!(section.chain.chain_id, ChainId::from_u64(56));
        assert_eq!(section.gateway.all_urls().len(), 2);
        assert_eq!(section.tokens[0].token_id, "USDT");
        assert_eq!(config.swaps[0].fee.swap_fee_rate_per_million, 1000);
    }

    #[test]
    fn swap_config_bounds_validated() {
        let bad = SwapConfig {
            minimum_swap: U256::from(100u64),
            maximum_swap: U256::from(10u64),
            big_value_threshold: U256::from(1000u64),
        };
        assert!(bad.check_config().is_err());
    }

    #[test]
    fn fee_rate_validated() {
        let bad = FeeConfig {
            swap_fee_rate_per_million: 1_000_000,
            minimum_swap_fee: U256::ZERO,
            maximum_swap_fee: U256::ZERO,
        };
        assert!(bad.check_config().is_err());
    }

    #[test]
    fn literal_or_env_resolves() {
        // SAFETY: test-local variable, no concurrent env readers in this test binary.
        unsafe { std::env::set_var("ROUTER_TYPES_TEST_KEY", "deadbeef") };
        let v: LiteralOrEnv<String> = serde_json::from_str("\"$ROUTER_TYPES_TEST_KEY\"").unwrap();
        assert_eq!(v.as_str(), "deadbeef");
        let lit: LiteralOrEnv<String> = serde_json::from_str("\"plain\"").unwrap();
        assert_eq!(lit.as_str(), "plain");
    }
}
