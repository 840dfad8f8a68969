//! NEAR adapter.
//!
//! Transactions are borsh-serialized and signed over their sha256. The
//! broadcast path is deliberately best-effort-all: every gateway gets the
//! transaction, any single acceptance is a success.

use std::str::FromStr;
use std::sync::Arc;

use alloy_primitives::U256;
use base64::Engine;
use borsh::{BorshDeserialize, BorshSerialize};
use serde_json::{Value, json};
use sha2::{Digest, Sha256};

use router_mpc::SignerBackend;
use router_types::rawtx::{NearRawTx, NearSignedTx};
use router_types::{
    Bridge, BridgeContext, BuildTxArgs, ChainConfig, ChainId, GatewayConfig, Network,
    RawTransaction, SignedTransaction, SwapError, SwapTxInfo, SwapType, TokenConfig, VerifyArgs,
    check_swap_info, stub_chain_id, value::calc_swap_value,
};

use crate::broadcast::best_effort_all;
use crate::rest::JsonRpcClient;

pub fn supports_chain_id(chain_id: &ChainId) -> bool {
    router_types::stub_chain_ids("NEAR").contains(chain_id)
}

pub fn get_stub_chain_id(network: Network) -> ChainId {
    stub_chain_id("NEAR", network)
}

/// Named accounts are 2-64 chars of lowercase alphanumerics separated by
/// `.`/`_`/`-`; implicit accounts are 64 hex chars.
pub fn is_valid_address(address: &str) -> bool {
    let len = address.len();
    if !(2..=64).contains(&len) {
        return false;
    }
    if len == 64 && address.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()) {
        return true;
    }
    let mut previous_separator = true;
    for c in address.chars() {
        match c {
            'a'..='z' | '0'..='9' => previous_separator = false,
            '.' | '_' | '-' => {
                if previous_separator {
                    return false;
                }
                previous_separator = true;
            }
            _ => return false,
        }
    }
    !previous_separator
}

#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct NearPublicKey {
    pub key_type: u8,
    pub data: [u8; 32],
}

#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct NearSignature {
    pub key_type: u8,
    pub data: [u8; 64],
}

/// Action set in the protocol's borsh variant order; only `Transfer` and
/// `FunctionCall` are ever built here.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub enum NearAction {
    CreateAccount,
    DeployContract { code: Vec<u8> },
    FunctionCall {
        method_name: String,
        args: Vec<u8>,
        gas: u64,
        deposit: u128,
    },
    Transfer { deposit: u128 },
}

#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct NearTransaction {
    pub signer_id: String,
    pub public_key: NearPublicKey,
    pub nonce: u64,
    pub receiver_id: String,
    pub block_hash: [u8; 32],
    pub actions: Vec<NearAction>,
}

#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct NearSignedTransaction {
    pub transaction: NearTransaction,
    pub signature: NearSignature,
}

pub struct NearBridge {
    ctx: BridgeContext,
    rpc: JsonRpcClient,
    signer: Arc<SignerBackend>,
}

impl NearBridge {
    pub fn new(ctx: BridgeContext, signer: Arc<SignerBackend>) -> Result<Self, SwapError> {
        let rpc = JsonRpcClient::new(ctx.gateway_config())?;
        Ok(NearBridge { ctx, rpc, signer })
    }

    async fn rpc_result(&self, method: &str, params: Value) -> Result<Value, SwapError> {
        let response = self
            .rpc
            .call_first(&json!({
                "jsonrpc": "2.0",
                "id": "router",
                "method": method,
                "params": params,
            }))
            .await?;
        if let Some(error) = response.get("error") {
            return Err(SwapError::RpcQuery(error.to_string()));
        }
        response
            .get("result")
            .cloned()
            .ok_or_else(|| SwapError::RpcQuery(format!("{method}: empty result")))
    }

    async fn verify_swapout_tx(
        &self,
        tx_hash: &str,
        log_index: u64,
        allow_unstable: bool,
    ) -> Result<SwapTxInfo, SwapError> {
        let mut swap_info = SwapTxInfo {
            hash: tx_hash.to_string(),
            ..SwapTxInfo::new(SwapType::Erc20Swap, "", log_index)
        };
        swap_info.from_chain_id = self.ctx.chain_id();

        let router = self.ctx.chain_config().router_contract.clone();
        let result = self
            .rpc_result("EXPERIMENTAL_tx_status", json!([tx_hash, router]))
            .await
            .map_err(|_| SwapError::TxNotFound)?;

        let status = result.get("status").ok_or(SwapError::TxNotStable)?;
        if status.get("SuccessValue").is_none() && status.get("SuccessReceiptId").is_none() {
            if allow_unstable && status.get("Failure").is_none() {
                return Err(SwapError::TxNotStable);
            }
            return Err(SwapError::TxWithWrongStatus);
        }
        if result.pointer("/transaction/receiver_id").and_then(Value::as_str)
            != Some(router.as_str())
        {
            return Err(SwapError::TxWithWrongContract);
        }
        swap_info.from = result
            .pointer("/transaction/signer_id")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        swap_info.tx_to = router.clone();
        swap_info.to = router.clone();

        let actions = result
            .pointer("/transaction/actions")
            .and_then(Value::as_array)
            .ok_or(SwapError::SwapoutLogNotFound)?;
        let index = usize::try_from(log_index).map_err(|_| SwapError::LogIndexOutOfRange)?;
        if index >= actions.len() {
            return Err(SwapError::LogIndexOutOfRange);
        }
        let call = actions[index]
            .get("FunctionCall")
            .ok_or(SwapError::SwapoutLogNotFound)?;
        if call.get("method_name").and_then(Value::as_str) != Some("swap_out") {
            return Err(SwapError::SwapoutLogNotFound);
        }
        let args_base64 = call
            .get("args")
            .and_then(Value::as_str)
            .ok_or(SwapError::ParseDataError)?;
        let args_bytes = base64::engine::general_purpose::STANDARD
            .decode(args_base64)
            .map_err(|_| SwapError::ParseDataError)?;
        let args: Value =
            serde_json::from_slice(&args_bytes).map_err(|_| SwapError::ParseDataError)?;

        swap_info.bind = args
            .get("bind")
            .and_then(Value::as_str)
            .ok_or(SwapError::SwapoutLogNotFound)?
            .to_string();
        swap_info.to_chain_id = args
            .get("to_chain_id")
            .and_then(Value::as_str)
            .ok_or(SwapError::SwapoutLogNotFound)?
            .parse()
            .map_err(|_| SwapError::SwapoutLogNotFound)?;
        let amount = args
            .get("amount")
            .and_then(Value::as_str)
            .ok_or(SwapError::TxWithWrongValue)?;
        swap_info.value = U256::from_str(amount).map_err(|_| SwapError::TxWithWrongValue)?;

        let token = args
            .get("token")
            .and_then(Value::as_str)
            .unwrap_or("near")
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

    fn signer_key(&self) -> Result<(String, [u8; 32], String), SwapError> {
        let descriptor = self.signer.ed_public_key(&self.ctx.chain_id())?;
        let bytes = hex::decode(&descriptor.pubkey_hex)
            .map_err(|_| SwapError::WrongConfig("bad near signer key hex".into()))?;
        let key: [u8; 32] = bytes
            .try_into()
            .map_err(|_| SwapError::WrongConfig("near signer key must be 32 bytes".into()))?;
        // implicit account of the MPC key
        let account = hex::encode(key);
        Ok((descriptor.pubkey_hex, key, account))
    }

    async fn build_swapin_tx(&self, args: &BuildTxArgs) -> Result<NearRawTx, SwapError> {
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
        let deposit: u128 = amount.try_into().map_err(|_| SwapError::TxWithWrongValue)?;
        if !is_valid_address(&args.bind) {
            return Err(SwapError::WrongBindAddress);
        }

        let (_, key, account) = self.signer_key()?;
        let nonce = match args.nonce {
            Some(n) => n,
            None => {
                let result = self
                    .rpc_result(
                        "query",
                        json!({
                            "request_type": "view_access_key",
                            "finality": "optimistic",
                            "account_id": account,
                            "public_key": format!("ed25519:{}", bs58::encode(&key).into_string()),
                        }),
                    )
                    .await?;
                result.get("nonce").and_then(Value::as_u64).unwrap_or(0) + 1
            }
        };
        let block = self
            .rpc_result("block", json!({ "finality": "final" }))
            .await?;
        let block_hash_b58 = block
            .pointer("/header/hash")
            .and_then(Value::as_str)
            .ok_or_else(|| SwapError::RpcQuery("block missing hash".into()))?;
        let block_hash: [u8; 32] = bs58::decode(block_hash_b58)
            .into_vec()
            .map_err(|_| SwapError::ParseDataError)?
            .try_into()
            .map_err(|_| SwapError::ParseDataError)?;

        let transaction = NearTransaction {
            signer_id: account,
            public_key: NearPublicKey { key_type: 0, data: key },
            nonce,
            receiver_id: args.bind.clone(),
            block_hash,
            actions: vec![NearAction::Transfer { deposit }],
        };
        let payload = borsh::to_vec(&transaction).map_err(|_| SwapError::ParseDataError)?;
        let descriptor = self.signer.ed_public_key(&self.ctx.chain_id())?;
        Ok(NearRawTx {
            payload,
            signer_pubkey: descriptor.pubkey_hex,
        })
    }

    async fn sign_tx(&self, raw: &NearRawTx, context: &str) -> Result<NearSignedTx, SwapError> {
        let transaction = NearTransaction::try_from_slice(&raw.payload)
            .map_err(|_| SwapError::WrongRawTx)?;
        let digest: [u8; 32] = Sha256::digest(&raw.payload).into();

        let signature = self
            .signer
            .sign_ed(&self.ctx.chain_id(), &raw.signer_pubkey, &digest, context)
            .await?;
        use ed25519_dalek::Verifier;
        ed25519_dalek::VerifyingKey::from_bytes(&transaction.public_key.data)
            .map_err(|_| SwapError::SignatureVerifyFailed)?
            .verify(&digest, &ed25519_dalek::Signature::from_bytes(&signature))
            .map_err(|_| SwapError::SignatureVerifyFailed)?;

        let signed = NearSignedTransaction {
            transaction,
            signature: NearSignature {
                key_type: 0,
                data: signature,
            },
        };
        let payload = borsh::to_vec(&signed).map_err(|_| SwapError::ParseDataError)?;
        Ok(NearSignedTx {
            payload,
            tx_hash: bs58::encode(digest).into_string(),
        })
    }

    /// Submit to every gateway; any single success wins and the last
    /// successful hash is returned.
    async fn broadcast(&self, signed: &NearSignedTx) -> Result<String, SwapError> {
        let urls = self.ctx.gateway_config().all_urls();
        let encoded = base64::engine::general_purpose::STANDARD.encode(&signed.payload);
        let rpc = &self.rpc;
        let fallback_hash = signed.tx_hash.clone();
        best_effort_all(&urls, move |url| {
            let encoded = encoded.clone();
            let fallback_hash = fallback_hash.clone();
            async move {
                let response = rpc
                    .call_url(
                        &url,
                        &json!({
                            "jsonrpc": "2.0",
                            "id": "router",
                            "method": "broadcast_tx_commit",
                            "params": [encoded],
                        }),
                    )
                    .await?;
                if let Some(error) = response.get("error") {
                    return Err(SwapError::RpcQuery(error.to_string()));
                }
                Ok(response
                    .pointer("/result/transaction/hash")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or(fallback_hash))
            }
        })
        .await
        .map_err(|_| SwapError::BroadcastTx)
    }
}

#[async_trait::async_trait]
impl Bridge for NearBridge {
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
        if bytes.len() != 32 {
            return Err(SwapError::WrongConfig(
                "near public key must be 32 bytes".into(),
            ));
        }
        Ok(hex::encode(bytes))
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
        self.build_swapin_tx(args).await.map(RawTransaction::Near)
    }

    async fn mpc_sign_transaction(
        &self,
        raw_tx: RawTransaction,
        args: &BuildTxArgs,
    ) -> Result<(SignedTransaction, String), SwapError> {
        let RawTransaction::Near(raw) = raw_tx else {
            return Err(SwapError::WrongRawTx);
        };
        let context = format!("{}:{}:{}", args.from_chain_id, args.swap_id, args.log_index);
        let signed = self.sign_tx(&raw, &context).await?;
        let tx_hash = signed.tx_hash.clone();
        Ok((SignedTransaction::Near(signed), tx_hash))
    }

    async fn send_transaction(&self, signed_tx: SignedTransaction) -> Result<String, SwapError> {
        let SignedTransaction::Near(signed) = signed_tx else {
            return Err(SwapError::WrongSignedTx);
        };
        self.broadcast(&signed).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn account_id_validation() {
        assert!(is_valid_address("router.near"));
        assert!(is_valid_address("alice_bob-1.near"));
        assert!(is_valid_address(&"a".repeat(64))); // implicit hex account
        assert!(!is_valid_address("a"));
        assert!(!is_valid_address("Upper.near"));
        assert!(!is_valid_address(".leading"));
        assert!(!is_valid_address("trailing."));
        assert!(!is_valid_address("double..dot"));
    }

    #[test]
    fn transaction_borsh_roundtrip() {
        let transaction = NearTransaction {
            signer_id: "router.near".into(),
            public_key: NearPublicKey {
                key_type: 0,
                data: [7u8; 32],
            },
            nonce: 42,
            receiver_id: "alice.near".into(),
            block_hash: [9u8; 32],
            actions: vec![NearAction::Transfer {
                deposit: 1_000_000_000_000_000_000_000_000,
            }],
        };
        let bytes = borsh::to_vec(&transaction).unwrap();
        let decoded = NearTransaction::try_from_slice(&bytes).unwrap();
        assert_eq!(decoded, transaction);
        // Transfer is borsh variant 3, right before its u128 deposit
        assert_eq!(bytes[bytes.len() - 17], 3);
    }

    #[test]
    fn signed_transaction_appends_signature() {
        let transaction = NearTransaction {
            signer_id: "r.near".into(),
            public_key: NearPublicKey {
                key_type: 0,
                data: [1u8; 32],
            },
            nonce: 1,
            receiver_id: "a.near".into(),
            block_hash: [2u8; 32],
            actions: vec![NearAction::Transfer { deposit: 5 }],
        };
        let signed = NearSignedTransaction {
            transaction: transaction.clone(),
            signature: NearSignature {
                key_type: 0,
                data: [3u8; 64],
            },
        };
        let tx_bytes = borsh::to_vec(&transaction).unwrap();
        let signed_bytes = borsh::to_vec(&signed).unwrap();
        assert_eq!(signed_bytes.len(), tx_bytes.len() + 1 + 64);
        assert!(signed_bytes.starts_with(&tx_bytes));
    }
}
