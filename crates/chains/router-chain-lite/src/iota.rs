//! IOTA (chrysalis) adapter.
//!
//! Deposits are transfers to the router address whose message carries an
//! indexation payload with `bind:toChainID`. Broadcast failures surface as
//! `CommitMessage`.

use std::sync::Arc;

use alloy_primitives::U256;
use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};
use ed25519_dalek::Verifier;
use serde_json::{Value, json};

use router_mpc::SignerBackend;
use router_types::rawtx::{IotaRawTx, IotaSignedTx};
use router_types::{
    Bridge, BridgeContext, BuildTxArgs, ChainConfig, ChainId, GatewayConfig, Network,
    RawTransaction, SignedTransaction, SwapError, SwapTxInfo, SwapType, TokenConfig, VerifyArgs,
    check_swap_info, stub_chain_id, value::calc_swap_value,
};

use crate::broadcast::first_success;
use crate::rest::JsonRpcClient;

type Blake2b256 = Blake2b<U32>;

const SWAP_INDEX: &str = "swapout";

pub fn supports_chain_id(chain_id: &ChainId) -> bool {
    router_types::stub_chain_ids("IOTA").contains(chain_id)
}

pub fn get_stub_chain_id(network: Network) -> ChainId {
    stub_chain_id("IOTA", network)
}

pub fn is_valid_address(address: &str) -> bool {
    matches!(
        bech32::decode(address),
        Ok((hrp, data)) if (hrp.as_str() == "iota" || hrp.as_str() == "atoi") && data.len() == 33
    )
}

/// Ed25519 address: `blake2b-256(pubkey)` behind an address-type byte.
pub fn public_key_hex_to_address(pubkey_hex: &str, testnet: bool) -> Result<String, SwapError> {
    let stripped = pubkey_hex.strip_prefix("0x").unwrap_or(pubkey_hex);
    let bytes = hex::decode(stripped)
        .map_err(|e| SwapError::WrongConfig(format!("bad public key hex: {e}")))?;
    let mut payload = vec![0u8]; // address type: ed25519
    payload.extend_from_slice(&Blake2b256::digest(&bytes));
    let hrp = bech32::Hrp::parse(if testnet { "atoi" } else { "iota" })
        .map_err(|e| SwapError::WrongConfig(e.to_string()))?;
    bech32::encode::<bech32::Bech32>(hrp, &payload)
        .map_err(|e| SwapError::WrongConfig(e.to_string()))
}

pub struct IotaBridge {
    ctx: BridgeContext,
    rpc: JsonRpcClient,
    signer: Arc<SignerBackend>,
}

impl IotaBridge {
    pub fn new(ctx: BridgeContext, signer: Arc<SignerBackend>) -> Result<Self, SwapError> {
        let rpc = JsonRpcClient::new(ctx.gateway_config())?;
        Ok(IotaBridge { ctx, rpc, signer })
    }

    async fn verify_swapout_tx(
        &self,
        tx_hash: &str,
        log_index: u64,
        allow_unstable: bool,
    ) -> Result<SwapTxInfo, SwapError> {
        let mut swap_info = SwapTxInfo::new(SwapType::Erc20Swap, tx_hash, log_index);
        swap_info.from_chain_id = self.ctx.chain_id();

        let message: Value = self
            .rpc
            .get_first(&format!("api/v1/messages/{}", swap_info.hash))
            .await
            .map_err(|_| SwapError::TxNotFound)?;
        let metadata: Value = self
            .rpc
            .get_first(&format!("api/v1/messages/{}/metadata", swap_info.hash))
            .await
            .map_err(|_| SwapError::TxNotFound)?;
        let included = metadata
            .pointer("/data/ledgerInclusionState")
            .and_then(Value::as_str);
        match included {
            Some("included") => {}
            Some("conflicting") => return Err(SwapError::TxWithWrongStatus),
            _ if allow_unstable => {}
            _ => return Err(SwapError::TxNotStable),
        }

        let payload = message
            .pointer("/data/payload")
            .ok_or(SwapError::SwapoutLogNotFound)?;
        // transaction payload with an embedded indexation payload
        if payload.get("type").and_then(Value::as_u64) != Some(0) {
            return Err(SwapError::SwapoutLogNotFound);
        }
        let essence = payload.get("essence").ok_or(SwapError::SwapoutLogNotFound)?;

        let router = &self.ctx.chain_config().router_contract;
        let (_, router_data) =
            bech32::decode(router).map_err(|_| SwapError::WrongConfig("bad router address".into()))?;
        let router_hex = hex::encode(&router_data[1..]);
        let mut value = U256::ZERO;
        if let Some(outputs) = essence.get("outputs").and_then(Value::as_array) {
            for output in outputs {
                if output.pointer("/address/address").and_then(Value::as_str)
                    == Some(router_hex.as_str())
                {
                    value += U256::from(
                        output.get("amount").and_then(Value::as_u64).unwrap_or(0),
                    );
                }
            }
        }
        if value.is_zero() {
            return Err(SwapError::SwapoutLogNotFound);
        }
        swap_info.value = value;
        swap_info.to = router.clone();
        swap_info.tx_to = router.clone();

        let memo_hex = essence
            .pointer("/payload/data")
            .and_then(Value::as_str)
            .ok_or(SwapError::SwapoutLogNotFound)?;
        let memo = String::from_utf8(
            hex::decode(memo_hex).map_err(|_| SwapError::SwapoutLogNotFound)?,
        )
        .map_err(|_| SwapError::SwapoutLogNotFound)?;
        let (bind, to_chain_id) = memo
            .rsplit_once(':')
            .ok_or(SwapError::SwapoutLogNotFound)?;
        swap_info.bind = bind.to_string();
        swap_info.to_chain_id = to_chain_id
            .parse()
            .map_err(|_| SwapError::SwapoutLogNotFound)?;

        let token_cfg = self
            .ctx
            .get_token_config("iota")
            .ok_or(SwapError::MissTokenConfig)?;
        swap_info.erc20_swap_info.token = token_cfg.contract_address.clone();
        swap_info.erc20_swap_info.token_id = token_cfg.token_id;

        check_swap_info(self.ctx.registry(), self, &swap_info)?;
        Ok(swap_info)
    }

    async fn build_swapin_tx(&self, args: &BuildTxArgs) -> Result<IotaRawTx, SwapError> {
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
        let amount: u64 = amount.try_into().map_err(|_| SwapError::TxWithWrongValue)?;
        if !is_valid_address(&args.bind) {
            return Err(SwapError::WrongBindAddress);
        }

        let descriptor = self.signer.ed_public_key(&self.ctx.chain_id())?;
        let sender = public_key_hex_to_address(&descriptor.pubkey_hex, false)?;

        // newest unspent output of the router account funds the transfer
        let outputs: Value = self
            .rpc
            .get_first(&format!("api/v1/addresses/{sender}/outputs"))
            .await?;
        let output_id = outputs
            .pointer("/data/outputIds/0")
            .and_then(Value::as_str)
            .ok_or(SwapError::TxWithWrongValue)?
            .to_string();
        let output: Value = self
            .rpc
            .get_first(&format!("api/v1/outputs/{output_id}"))
            .await?;
        let balance = output
            .pointer("/data/output/amount")
            .and_then(Value::as_u64)
            .ok_or(SwapError::TxWithWrongValue)?;
        if balance < amount {
            return Err(SwapError::TxWithWrongValue);
        }

        let (_, bind_data) =
            bech32::decode(&args.bind).map_err(|_| SwapError::WrongBindAddress)?;
        let (_, sender_data) =
            bech32::decode(&sender).map_err(|_| SwapError::WrongConfig("bad sender".into()))?;

        // transaction essence, serialized per the chrysalis wire format
        let mut essence = Vec::new();
        essence.push(0u8); // essence type
        essence.extend_from_slice(&1u16.to_le_bytes()); // input count
        essence.push(0u8); // utxo input
        let tx_part = &output_id[..output_id.len() - 4];
        let index_part = &output_id[output_id.len() - 4..];
        essence.extend_from_slice(
            &hex::decode(tx_part).map_err(|_| SwapError::ParseDataError)?,
        );
        let output_index = u16::from_le_bytes(
            hex::decode(index_part)
                .map_err(|_| SwapError::ParseDataError)?
                .try_into()
                .map_err(|_| SwapError::ParseDataError)?,
        );
        essence.extend_from_slice(&output_index.to_le_bytes());
        let change = balance - amount;
        let output_count: u16 = if change > 0 { 2 } else { 1 };
        essence.extend_from_slice(&output_count.to_le_bytes());
        for (data, value) in [(&bind_data, amount), (&sender_data, change)] {
            if value == 0 {
                continue;
            }
            essence.push(0u8); // sig-locked single output
            essence.extend_from_slice(data);
            essence.extend_from_slice(&value.to_le_bytes());
        }
        essence.extend_from_slice(&0u32.to_le_bytes()); // no payload

        Ok(IotaRawTx {
            essence,
            signer_pubkey: descriptor.pubkey_hex,
        })
    }

    async fn sign_tx(&self, raw: &IotaRawTx, context: &str) -> Result<IotaSignedTx, SwapError> {
        let essence_hash: [u8; 32] = Blake2b256::digest(&raw.essence).into();
        let signature = self
            .signer
            .sign_ed(&self.ctx.chain_id(), &raw.signer_pubkey, &essence_hash, context)
            .await?;

        let key_bytes =
            hex::decode(&raw.signer_pubkey).map_err(|_| SwapError::SignatureVerifyFailed)?;
        let key: [u8; 32] = key_bytes
            .try_into()
            .map_err(|_| SwapError::SignatureVerifyFailed)?;
        ed25519_dalek::VerifyingKey::from_bytes(&key)
            .map_err(|_| SwapError::SignatureVerifyFailed)?
            .verify(
                &essence_hash,
                &ed25519_dalek::Signature::from_bytes(&signature),
            )
            .map_err(|_| SwapError::SignatureVerifyFailed)?;

        // message: essence ‖ unlock block (signature type 0)
        let mut message = raw.essence.clone();
        message.extend_from_slice(&1u16.to_le_bytes());
        message.push(0u8); // signature unlock block
        message.push(0u8); // ed25519 signature
        message.extend_from_slice(&key);
        message.extend_from_slice(&signature);

        Ok(IotaSignedTx {
            message,
            message_id: hex::encode(Blake2b256::digest(&raw.essence)),
        })
    }

    /// First-success submission; total failure is `CommitMessage`.
    async fn broadcast(&self, signed: &IotaSignedTx) -> Result<String, SwapError> {
        let urls = self.ctx.gateway_config().all_urls();
        let rpc = &self.rpc;
        let payload = json!({ "payload": hex::encode(&signed.message) });
        let payload_ref = &payload;
        first_success(&urls, move |url| async move {
            let response = rpc.post_path(&url, "api/v1/messages", payload_ref).await?;
            response
                .pointer("/data/messageId")
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or(SwapError::CommitMessage)
        })
        .await
        .map_err(|_| SwapError::CommitMessage)
    }
}

#[async_trait::async_trait]
impl Bridge for IotaBridge {
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
        public_key_hex_to_address(pubkey_hex, false)
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
        self.build_swapin_tx(args).await.map(RawTransaction::Iota)
    }

    async fn mpc_sign_transaction(
        &self,
        raw_tx: RawTransaction,
        args: &BuildTxArgs,
    ) -> Result<(SignedTransaction, String), SwapError> {
        let RawTransaction::Iota(raw) = raw_tx else {
            return Err(SwapError::WrongRawTx);
        };
        let context = format!("{}:{}:{}", args.from_chain_id, args.swap_id, args.log_index);
        let signed = self.sign_tx(&raw, &context).await?;
        let message_id = signed.message_id.clone();
        Ok((SignedTransaction::Iota(signed), message_id))
    }

    async fn send_transaction(&self, signed_tx: SignedTransaction) -> Result<String, SwapError> {
        let SignedTransaction::Iota(signed) = signed_tx else {
            return Err(SwapError::WrongSignedTx);
        };
        self.broadcast(&signed).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_derivation_and_validation() {
        let address = public_key_hex_to_address(&hex::encode([5u8; 32]), false).unwrap();
        assert!(address.starts_with("iota1"));
        assert!(is_valid_address(&address));
        let testnet = public_key_hex_to_address(&hex::encode([5u8; 32]), true).unwrap();
        assert!(testnet.starts_with("atoi1"));
        assert!(!is_valid_address("iota1short"));
    }
}
