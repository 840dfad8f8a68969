//! Flow adapter.
//!
//! Flow signs with ECDSA P-256 over SHA3-256, a curve the MPC network does
//! not serve; signing therefore requires a configured local key, matching
//! the deployment this adapter is used in.

use std::str::FromStr;
use std::sync::Arc;

use alloy_primitives::U256;
use p256::ecdsa::signature::hazmat::PrehashSigner;
use serde_json::{Value, json};
use sha3::{Digest, Sha3_256};

use router_mpc::SignerBackend;
use router_types::rawtx::{FlowRawTx, FlowSignedTx};
use router_types::{
    Bridge, BridgeContext, BuildTxArgs, ChainConfig, ChainId, GatewayConfig, Network,
    RawTransaction, SignedTransaction, SwapError, SwapTxInfo, SwapType, TokenConfig, VerifyArgs,
    check_swap_info, stub_chain_id, value::calc_swap_value,
};

use crate::broadcast::first_success;
use crate::rest::JsonRpcClient;

/// Domain separation tag for transaction envelopes, right-padded to 32
/// bytes.
const TRANSACTION_DOMAIN_TAG: &[u8] = b"FLOW-V0.0-transaction";

pub fn supports_chain_id(chain_id: &ChainId) -> bool {
    router_types::stub_chain_ids("FLOW").contains(chain_id)
}

pub fn get_stub_chain_id(network: Network) -> ChainId {
    stub_chain_id("FLOW", network)
}

pub fn is_valid_address(address: &str) -> bool {
    address
        .strip_prefix("0x")
        .is_some_and(|h| h.len() == 16 && h.chars().all(|c| c.is_ascii_hexdigit()))
}

fn domain_tagged_hash(message: &[u8]) -> [u8; 32] {
    let mut tag = TRANSACTION_DOMAIN_TAG.to_vec();
    tag.resize(32, 0);
    let mut hasher = Sha3_256::new();
    hasher.update(&tag);
    hasher.update(message);
    hasher.finalize().into()
}

pub struct FlowBridge {
    ctx: BridgeContext,
    rpc: JsonRpcClient,
    signer: Arc<SignerBackend>,
}

impl FlowBridge {
    pub fn new(ctx: BridgeContext, signer: Arc<SignerBackend>) -> Result<Self, SwapError> {
        let rpc = JsonRpcClient::new(ctx.gateway_config())?;
        Ok(FlowBridge { ctx, rpc, signer })
    }

    async fn verify_swapout_tx(
        &self,
        tx_hash: &str,
        log_index: u64,
        allow_unstable: bool,
    ) -> Result<SwapTxInfo, SwapError> {
        let mut swap_info = SwapTxInfo::new(SwapType::Erc20Swap, tx_hash, log_index);
        swap_info.from_chain_id = self.ctx.chain_id();

        let result: Value = self
            .rpc
            .get_first(&format!("v1/transaction_results/{}", swap_info.hash))
            .await
            .map_err(|_| SwapError::TxNotFound)?;
        let status = result.get("status").and_then(Value::as_str).unwrap_or("");
        match status {
            "Sealed" => {}
            "Expired" => return Err(SwapError::TxWithWrongStatus),
            _ if allow_unstable => {}
            _ => return Err(SwapError::TxNotStable),
        }
        if result
            .get("error_message")
            .and_then(Value::as_str)
            .is_some_and(|m| !m.is_empty())
        {
            return Err(SwapError::TxWithWrongStatus);
        }

        let router = &self.ctx.chain_config().router_contract;
        let events = result
            .get("events")
            .and_then(Value::as_array)
            .ok_or(SwapError::SwapoutLogNotFound)?;
        let index = usize::try_from(log_index).map_err(|_| SwapError::LogIndexOutOfRange)?;
        if index >= events.len() {
            return Err(SwapError::LogIndexOutOfRange);
        }
        let event = &events[index];
        let event_type = event.get("type").and_then(Value::as_str).unwrap_or("");
        if !event_type.contains("SwapOut") {
            return Err(SwapError::SwapoutLogNotFound);
        }
        swap_info.to = router.clone();
        swap_info.tx_to = router.clone();

        let fields = event.pointer("/payload/value/fields").and_then(Value::as_array);
        let field = |name: &str| -> Option<String> {
            fields?
                .iter()
                .find(|f| f.get("name").and_then(Value::as_str) == Some(name))?
                .pointer("/value/value")
                .and_then(Value::as_str)
                .map(str::to_string)
        };
        swap_info.bind = field("bind").ok_or(SwapError::SwapoutLogNotFound)?;
        swap_info.to_chain_id = field("toChainId")
            .ok_or(SwapError::SwapoutLogNotFound)?
            .parse()
            .map_err(|_| SwapError::SwapoutLogNotFound)?;
        let amount = field("amount").ok_or(SwapError::TxWithWrongValue)?;
        swap_info.value = U256::from_str(&amount).map_err(|_| SwapError::TxWithWrongValue)?;
        let token = field("token").ok_or(SwapError::MissTokenConfig)?;

        let token_cfg = self
            .ctx
            .get_token_config(&token)
            .ok_or(SwapError::MissTokenConfig)?;
        swap_info.erc20_swap_info.token = token;
        swap_info.erc20_swap_info.token_id = token_cfg.token_id;

        check_swap_info(self.ctx.registry(), self, &swap_info)?;
        Ok(swap_info)
    }

    async fn build_swapin_tx(&self, args: &BuildTxArgs) -> Result<FlowRawTx, SwapError> {
        let registry = self.ctx.registry();
        let token = registry
            .get_multichain_token(&args.token_id, &args.to_chain_id)
            .ok_or(SwapError::MissTokenConfig)?;
        let to_token = self
            .ctx
            .get_token_config(&token)
            .ok_or(SwapError::MissTokenConfig)?;
        let src_bridge = registry
            .get_bridge(&args.from_chain_id)
            .ok_or(SwapError::NoBridgeForChainID)?;
        let from_token = src_bridge
            .get_token_config(&args.src_token)
            .ok_or(SwapError::MissTokenConfig)?;
        let fee = registry
            .get_fee_config(&args.token_id, &args.to_chain_id)
            .ok_or(SwapError::MissTokenConfig)?;
        let amount = calc_swap_value(
            args.original_value,
            from_token.decimals,
            to_token.decimals,
            &fee,
        );
        if amount.is_zero() {
            return Err(SwapError::TxWithWrongValue);
        }
        if !is_valid_address(&args.bind) {
            return Err(SwapError::WrongBindAddress);
        }

        let router = &self.ctx.chain_config().router_contract;
        let script = format!(
            "import Router from {router}\n\ntransaction(tx: String, to: Address, amount: UFix64, fromChainId: UInt64) {{\n    execute {{\n        Router.swapin(tx: tx, to: to, amount: amount, fromChainId: fromChainId)\n    }}\n}}\n"
        );
        let arguments = vec![
            json!({ "type": "String", "value": args.swap_id }).to_string(),
            json!({ "type": "Address", "value": args.bind }).to_string(),
            json!({ "type": "UFix64", "value": amount.to_string() }).to_string(),
            json!({ "type": "UInt64", "value": args.from_chain_id.to_string() }).to_string(),
        ];
        let payer = router.clone();
        let mut envelope_message = script.clone().into_bytes();
        for argument in &arguments {
            envelope_message.extend_from_slice(argument.as_bytes());
        }
        envelope_message.extend_from_slice(payer.as_bytes());
        Ok(FlowRawTx {
            script,
            arguments,
            payer,
            envelope_message,
        })
    }

    /// Local P-256 key only; the MPC network serves secp256k1/Ed25519.
    async fn sign_tx(&self, raw: &FlowRawTx) -> Result<FlowSignedTx, SwapError> {
        let chain_id = self.ctx.chain_id();
        if !self.signer.sign_with_private_key() {
            return Err(SwapError::WrongConfig(
                "flow signing requires a local P-256 key".into(),
            ));
        }
        let priv_key = self
            .signer
            .local_private_key(&chain_id)
            .ok_or_else(|| SwapError::WrongConfig(format!("no signer key for chain {chain_id}")))?;
        let key_bytes = hex::decode(priv_key.strip_prefix("0x").unwrap_or(priv_key))
            .map_err(|e| SwapError::WrongConfig(format!("bad flow key hex: {e}")))?;
        let key = p256::ecdsa::SigningKey::from_slice(&key_bytes)
            .map_err(|e| SwapError::WrongConfig(format!("bad p256 key: {e}")))?;

        let digest = domain_tagged_hash(&raw.envelope_message);
        let signature: p256::ecdsa::Signature = key
            .sign_prehash(&digest)
            .map_err(|e| SwapError::MpcSign(e.to_string()))?;

        let mut payload = raw.envelope_message.clone();
        payload.extend_from_slice(&signature.to_bytes());
        Ok(FlowSignedTx {
            payload,
            tx_hash: hex::encode(digest),
        })
    }

    async fn broadcast(&self, signed: &FlowSignedTx) -> Result<String, SwapError> {
        let urls = self.ctx.gateway_config().all_urls();
        let rpc = &self.rpc;
        let body = json!({ "transaction": hex::encode(&signed.payload) });
        let body_ref = &body;
        let fallback = &signed.tx_hash;
        first_success(&urls, move |url| async move {
            let response = rpc.post_path(&url, "v1/transactions", body_ref).await?;
            Ok(response
                .get("id")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| fallback.clone()))
        })
        .await
    }
}

#[async_trait::async_trait]
impl Bridge for FlowBridge {
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
        is_valid_address(address)
    }

    fn public_key_to_address(&self, _pubkey_hex: &str) -> Result<String, SwapError> {
        // Flow accounts are assigned by the protocol, not derived from keys.
        Err(SwapError::WrongConfig(
            "flow addresses are not derivable from a public key".into(),
        ))
    }

    async fn verify_transaction(
        &self,
        tx_hash: &str,
        args: &VerifyArgs,
    ) -> Result<SwapTxInfo, SwapError> {
        self.verify_swapout_tx(tx_hash, args.log_index, args.allow_unstable)
            .await
    }

    async fn build_raw_transaction(
        &self,
        args: &BuildTxArgs,
    ) -> Result<RawTransaction, SwapError> {
        self.build_swapin_tx(args).await.map(RawTransaction::Flow)
    }

    async fn mpc_sign_transaction(
        &self,
        raw_tx: RawTransaction,
        _args: &BuildTxArgs,
    ) -> Result<(SignedTransaction, String), SwapError> {
        let RawTransaction::Flow(raw) = raw_tx else {
            return Err(SwapError::WrongRawTx);
        };
        let signed = self.sign_tx(&raw).await?;
        let tx_hash = signed.tx_hash.clone();
        Ok((SignedTransaction::Flow(signed), tx_hash))
    }

    async fn send_transaction(&self, signed_tx: SignedTransaction) -> Result<String, SwapError> {
        let SignedTransaction::Flow(signed) = signed_tx else {
            return Err(SwapError::WrongSignedTx);
        };
        self.broadcast(&signed).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_validation() {
        assert!(is_valid_address("0x1654653399040a61"));
        assert!(!is_valid_address("0x1654653399040a6"));
        assert!(!is_valid_address("1654653399040a61"));
        assert!(!is_valid_address("0x1654653399040a6z"));
    }

    #[test]
    fn domain_tag_changes_hash() {
        let message = b"payload";
        let tagged = domain_tagged_hash(message);
        let untagged: [u8; 32] = Sha3_256::digest(message).into();
        assert_ne!(tagged, untagged);
    }
}
