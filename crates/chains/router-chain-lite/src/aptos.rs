//! Aptos adapter.
//!
//! The REST node does the heavy lifting: `encode_submission` hands back the
//! BCS signing message for a JSON transaction, so the adapter never builds
//! BCS itself.

use std::str::FromStr;
use std::sync::Arc;

use alloy_primitives::U256;
use ed25519_dalek::Verifier;
use serde_json::{Value, json};

use router_mpc::SignerBackend;
use router_types::rawtx::{AptosRawTx, AptosSignedTx};
use router_types::{
    Bridge, BridgeContext, BuildTxArgs, ChainConfig, ChainId, GatewayConfig, Network,
    RawTransaction, SignedTransaction, SwapError, SwapTxInfo, SwapType, TokenConfig, VerifyArgs,
    check_swap_info, stub_chain_id, value::calc_swap_value,
};

use crate::broadcast::first_success;
use crate::rest::JsonRpcClient;

const DEFAULT_MAX_GAS: u64 = 2_000;
const DEFAULT_GAS_PRICE: u64 = 100;
const TX_EXPIRATION_SECS: u64 = 600;

pub fn supports_chain_id(chain_id: &ChainId) -> bool {
    router_types::stub_chain_ids("APTOS").contains(chain_id)
}

pub fn get_stub_chain_id(network: Network) -> ChainId {
    stub_chain_id("APTOS", network)
}

pub fn is_valid_address(address: &str) -> bool {
    address
        .strip_prefix("0x")
        .is_some_and(|hex_part| {
            !hex_part.is_empty()
                && hex_part.len() <= 64
                && hex_part.chars().all(|c| c.is_ascii_hexdigit())
        })
}

pub struct AptosBridge {
    ctx: BridgeContext,
    rpc: JsonRpcClient,
    signer: Arc<SignerBackend>,
}

impl AptosBridge {
    pub fn new(ctx: BridgeContext, signer: Arc<SignerBackend>) -> Result<Self, SwapError> {
        let rpc = JsonRpcClient::new(ctx.gateway_config())?;
        Ok(AptosBridge { ctx, rpc, signer })
    }

    async fn verify_swapout_tx(
        &self,
        tx_hash: &str,
        log_index: u64,
        allow_unstable: bool,
    ) -> Result<SwapTxInfo, SwapError> {
        let mut swap_info = SwapTxInfo::new(SwapType::Erc20Swap, tx_hash, log_index);
        swap_info.from_chain_id = self.ctx.chain_id();

        let tx: Value = self
            .rpc
            .get_first(&format!("v1/transactions/by_hash/{tx_hash}"))
            .await
            .map_err(|_| SwapError::TxNotFound)?;
        match tx.get("success").and_then(Value::as_bool) {
            Some(true) => {}
            Some(false) => return Err(SwapError::TxWithWrongStatus),
            // still pending in the mempool
            None if allow_unstable => {}
            None => return Err(SwapError::TxNotStable),
        }
        swap_info.height = tx
            .get("version")
            .and_then(Value::as_str)
            .and_then(|v| v.parse().ok())
            .unwrap_or_default();
        if swap_info.height < self.ctx.chain_config().initial_height {
            return Err(SwapError::TxBeforeInitialHeight);
        }
        swap_info.from = tx
            .get("sender")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let router = &self.ctx.chain_config().router_contract;
        let events = tx
            .get("events")
            .and_then(Value::as_array)
            .ok_or(SwapError::SwapoutLogNotFound)?;
        let index = usize::try_from(log_index).map_err(|_| SwapError::LogIndexOutOfRange)?;
        if index >= events.len() {
            return Err(SwapError::LogIndexOutOfRange);
        }
        let event = &events[index];
        let event_type = event.get("type").and_then(Value::as_str).unwrap_or_default();
        if !event_type.starts_with(router.as_str()) || !event_type.ends_with("SwapOutEvent") {
            return Err(SwapError::SwapoutLogNotFound);
        }
        swap_info.tx_to = router.clone();
        swap_info.to = router.clone();

        let data = event.get("data").ok_or(SwapError::ParseDataError)?;
        swap_info.bind = data
            .get("to")
            .and_then(Value::as_str)
            .ok_or(SwapError::SwapoutLogNotFound)?
            .to_string();
        swap_info.to_chain_id = data
            .get("to_chain_id")
            .and_then(Value::as_str)
            .ok_or(SwapError::SwapoutLogNotFound)?
            .parse()
            .map_err(|_| SwapError::SwapoutLogNotFound)?;
        let amount = data
            .get("amount")
            .and_then(Value::as_str)
            .ok_or(SwapError::TxWithWrongValue)?;
        swap_info.value = U256::from_str(amount).map_err(|_| SwapError::TxWithWrongValue)?;

        let token = data
            .get("token")
            .and_then(Value::as_str)
            .ok_or(SwapError::MissTokenConfig)?
            .to_string();
        let token_cfg = self
            .ctx
            .get_token_config(&token)
            .ok_or(SwapError::MissTokenConfig)?;
        swap_info.erc20_swap_info.token = token;
        swap_info.erc20_swap_info.token_id = token_cfg.token_id;

        check_swap_info(self.ctx.registry(), self, &swap_info)?;
        Ok(swap_info)
    }

    fn sender_address(&self) -> Result<(String, String), SwapError> {
        let descriptor = self.signer.ed_public_key(&self.ctx.chain_id())?;
        let bytes = hex::decode(&descriptor.pubkey_hex)
            .map_err(|_| SwapError::WrongConfig("bad aptos signer key hex".into()))?;
        // single-key auth key: sha3-256(pubkey ‖ 0x00)
        use sha3::Digest;
        let mut hasher = sha3::Sha3_256::new();
        hasher.update(&bytes);
        hasher.update([0u8]);
        let address = format!("0x{}", hex::encode(hasher.finalize()));
        Ok((descriptor.pubkey_hex, address))
    }

    async fn build_swapin_tx(&self, args: &BuildTxArgs) -> Result<AptosRawTx, SwapError> {
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

        let (pubkey_hex, sender) = self.sender_address()?;
        let account: Value = self
            .rpc
            .get_first(&format!("v1/accounts/{sender}"))
            .await?;
        let sequence_number = match args.nonce {
            Some(n) => n,
            None => account
                .get("sequence_number")
                .and_then(Value::as_str)
                .and_then(|s| s.parse().ok())
                .unwrap_or(0),
        };
        let ledger: Value = self.rpc.get_first("v1/").await?;
        let now = ledger
            .get("ledger_timestamp")
            .and_then(Value::as_str)
            .and_then(|t| t.parse::<u64>().ok())
            .map(|micros| micros / 1_000_000)
            .unwrap_or(0);

        let router = &self.ctx.chain_config().router_contract;
        let tx = json!({
            "sender": sender,
            "sequence_number": sequence_number.to_string(),
            "max_gas_amount": DEFAULT_MAX_GAS.to_string(),
            "gas_unit_price": DEFAULT_GAS_PRICE.to_string(),
            "expiration_timestamp_secs": (now + TX_EXPIRATION_SECS).to_string(),
            "payload": {
                "type": "entry_function_payload",
                "function": format!("{router}::router::swapin"),
                "type_arguments": [token],
                "arguments": [args.swap_id, args.bind, amount.to_string(), args.from_chain_id.to_string()],
            },
        });
        let signing_message: Value = self
            .rpc
            .call_first_path("v1/transactions/encode_submission", &tx)
            .await?;
        let message_hex = signing_message
            .as_str()
            .ok_or_else(|| SwapError::RpcQuery("encode_submission returned no hex".into()))?;
        let signing_message = hex::decode(message_hex.trim_start_matches("0x"))
            .map_err(|_| SwapError::ParseDataError)?;
        Ok(AptosRawTx {
            tx_json: tx.to_string(),
            signing_message,
            sender_pubkey: pubkey_hex,
        })
    }

    async fn sign_tx(&self, raw: &AptosRawTx, context: &str) -> Result<AptosSignedTx, SwapError> {
        let signature = self
            .signer
            .sign_ed(&self.ctx.chain_id(), &raw.sender_pubkey, &raw.signing_message, context)
            .await?;

        let key_bytes =
            hex::decode(&raw.sender_pubkey).map_err(|_| SwapError::SignatureVerifyFailed)?;
        let key: [u8; 32] = key_bytes
            .try_into()
            .map_err(|_| SwapError::SignatureVerifyFailed)?;
        ed25519_dalek::VerifyingKey::from_bytes(&key)
            .map_err(|_| SwapError::SignatureVerifyFailed)?
            .verify(
                &raw.signing_message,
                &ed25519_dalek::Signature::from_bytes(&signature),
            )
            .map_err(|_| SwapError::SignatureVerifyFailed)?;

        let mut tx: Value = serde_json::from_str(&raw.tx_json).map_err(|_| SwapError::WrongRawTx)?;
        tx["signature"] = json!({
            "type": "ed25519_signature",
            "public_key": format!("0x{}", raw.sender_pubkey),
            "signature": format!("0x{}", hex::encode(signature)),
        });
        // local identifier; the node returns the canonical hash at submit
        use sha3::Digest;
        let local_hash = format!("0x{}", hex::encode(sha3::Sha3_256::digest(&raw.signing_message)));
        Ok(AptosSignedTx {
            submit_json: tx.to_string(),
            tx_hash: local_hash,
        })
    }

    /// First-success submission over the gateway list.
    async fn broadcast(&self, signed: &AptosSignedTx) -> Result<String, SwapError> {
        let urls = self.ctx.gateway_config().all_urls();
        let body: Value =
            serde_json::from_str(&signed.submit_json).map_err(|_| SwapError::WrongSignedTx)?;
        let rpc = &self.rpc;
        let body_ref = &body;
        first_success(&urls, move |url| async move {
            let response = rpc.post_path(&url, "v1/transactions", body_ref).await?;
            response
                .get("hash")
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| {
                    let message = response
                        .get("message")
                        .and_then(Value::as_str)
                        .unwrap_or("submit rejected");
                    SwapError::RpcQuery(message.to_string())
                })
        })
        .await
    }
}

#[async_trait::async_trait]
impl Bridge for AptosBridge {
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

    fn public_key_to_address(&self, pubkey_hex: &str) -> Result<String, SwapError> {
        let stripped = pubkey_hex.strip_prefix("0x").unwrap_or(pubkey_hex);
        let bytes = hex::decode(stripped)
            .map_err(|e| SwapError::WrongConfig(format!("bad public key hex: {e}")))?;
        use sha3::Digest;
        let mut hasher = sha3::Sha3_256::new();
        hasher.update(&bytes);
        hasher.update([0u8]);
        Ok(format!("0x{}", hex::encode(hasher.finalize())))
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
        self.build_swapin_tx(args).await.map(RawTransaction::Aptos)
    }

    async fn mpc_sign_transaction(
        &self,
        raw_tx: RawTransaction,
        args: &BuildTxArgs,
    ) -> Result<(SignedTransaction, String), SwapError> {
        let RawTransaction::Aptos(raw) = raw_tx else {
            return Err(SwapError::WrongRawTx);
        };
        let context = format!("{}:{}:{}", args.from_chain_id, args.swap_id, args.log_index);
        let signed = self.sign_tx(&raw, &context).await?;
        let tx_hash = signed.tx_hash.clone();
        Ok((SignedTransaction::Aptos(signed), tx_hash))
    }

    async fn send_transaction(&self, signed_tx: SignedTransaction) -> Result<String, SwapError> {
        let SignedTransaction::Aptos(signed) = signed_tx else {
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
        assert!(is_valid_address("0x1"));
        assert!(is_valid_address(&format!("0x{}", "a".repeat(64))));
        assert!(!is_valid_address(&format!("0x{}", "a".repeat(65))));
        assert!(!is_valid_address("1234"));
        assert!(!is_valid_address("0x"));
        assert!(!is_valid_address("0xzz"));
    }
}
