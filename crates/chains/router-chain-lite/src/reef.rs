//! Reef adapter.
//!
//! Reef's EVM layer carries the router contract, so the whole pipeline
//! delegates to the EVM bridge; only chain-ID claiming and address
//! validation differ (Reef accepts substrate SS58 accounts as binds).

use blake2::digest::consts::U64;
use blake2::{Blake2b, Digest};

use router_chain_evm::EvmBridge;
use router_types::{
    Bridge, BuildTxArgs, ChainConfig, ChainId, GatewayConfig, Network, RawTransaction,
    SignedTransaction, SwapError, SwapTxInfo, TokenConfig, VerifyArgs, stub_chain_id,
};

type Blake2b512 = Blake2b<U64>;

const SS58_PREFIX: &[u8] = b"SS58PRE";

pub fn supports_chain_id(chain_id: &ChainId) -> bool {
    router_types::stub_chain_ids("REEF").contains(chain_id)
}

pub fn get_stub_chain_id(network: Network) -> ChainId {
    stub_chain_id("REEF", network)
}

/// SS58 account with a valid checksum.
pub fn is_valid_ss58_address(address: &str) -> bool {
    let Ok(bytes) = bs58::decode(address).into_vec() else {
        return false;
    };
    // one-byte network prefix + 32-byte key + 2-byte checksum
    if bytes.len() != 35 {
        return false;
    }
    let (body, checksum) = bytes.split_at(33);
    let mut hasher = Blake2b512::new();
    hasher.update(SS58_PREFIX);
    hasher.update(body);
    let digest = hasher.finalize();
    digest[..2] == *checksum
}

pub fn is_valid_address(address: &str) -> bool {
    router_chain_evm::is_valid_address(address) || is_valid_ss58_address(address)
}

pub struct ReefBridge {
    inner: EvmBridge,
}

impl ReefBridge {
    pub fn new(inner: EvmBridge) -> Self {
        ReefBridge { inner }
    }
}

#[async_trait::async_trait]
impl Bridge for ReefBridge {
    fn chain_config(&self) -> &ChainConfig {
        self.inner.chain_config()
    }

    fn gateway_config(&self) -> &GatewayConfig {
        self.inner.gateway_config()
    }

    fn get_token_config(&self, address: &str) -> Option<TokenConfig> {
        self.inner.get_token_config(address)
    }

    fn get_router_contract(&self, token_address: &str) -> Option<String> {
        self.inner.get_router_contract(token_address)
    }

    fn is_valid_address(&self, address: &str) -> bool {
        is_valid_address(address)
    }

    fn public_key_to_address(&self, pubkey_hex: &str) -> Result<String, SwapError> {
        self.inner.public_key_to_address(pubkey_hex)
    }

    async fn verify_transaction(
        &self,
        tx_hash: &str,
        args: &VerifyArgs,
    ) -> Result<SwapTxInfo, SwapError> {
        self.inner.verify_transaction(tx_hash, args).await
    }

    async fn build_raw_transaction(
        &self,
        args: &BuildTxArgs,
    ) -> Result<RawTransaction, SwapError> {
        self.inner.build_raw_transaction(args).await
    }

    async fn mpc_sign_transaction(
        &self,
        raw_tx: RawTransaction,
        args: &BuildTxArgs,
    ) -> Result<(SignedTransaction, String), SwapError> {
        self.inner.mpc_sign_transaction(raw_tx, args).await
    }

    async fn send_transaction(&self, signed_tx: SignedTransaction) -> Result<String, SwapError> {
        self.inner.send_transaction(signed_tx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_ss58(prefix: u8, key: [u8; 32]) -> String {
        let mut body = vec![prefix];
        body.extend_from_slice(&key);
        let mut hasher = Blake2b512::new();
        hasher.update(SS58_PREFIX);
        hasher.update(&body);
        let digest = hasher.finalize();
        body.extend_from_slice(&digest[..2]);
        bs58::encode(body).into_string()
    }

    #[test]
    fn ss58_checksum_validation() {
        let address = make_ss58(42, [7u8; 32]);
        assert!(is_valid_ss58_address(&address));
        assert!(is_valid_address(&address));

        let mut corrupted = address.clone();
        corrupted.pop();
        corrupted.push(if address.ends_with('1') { '2' } else { '1' });
        assert!(!is_valid_ss58_address(&corrupted));
    }

    #[test]
    fn evm_addresses_also_accepted() {
        assert!(is_valid_address("0x55d398326f99059fF775485246999027B3197955"));
        assert!(!is_valid_address("neither-kind-of-address"));
    }

    #[test]
    fn stub_ids_distinct_from_evm() {
        assert!(supports_chain_id(&get_stub_chain_id(Network::Mainnet)));
        assert!(!supports_chain_id(&ChainId::from_u64(1)));
    }
}
