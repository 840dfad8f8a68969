//! Ripple (XRP Ledger) adapter.
//!
//! Swap-outs are payments into the router account carrying the routing
//! request as a memo. Signing covers `STX\0 ‖ blob` for Ed25519 keys and
//! the sha512-half of the same payload for ECDSA keys; the two paths stay
//! separate on purpose.

use std::str::FromStr;
use std::sync::Arc;

use alloy_primitives::U256;
use ed25519_dalek::Verifier;
use ripemd::Ripemd160;
use serde_json::{Value, json};
use sha2::{Digest, Sha256, Sha512};

use router_mpc::{SignerBackend, SigningCurve};
use router_types::rawtx::{RippleRawTx, RippleSignedTx};
use router_types::{
    Bridge, BridgeContext, BuildTxArgs, ChainConfig, ChainId, GatewayConfig, Network,
    RawTransaction, SignedTransaction, SwapError, SwapTxInfo, SwapType, TokenConfig, VerifyArgs,
    check_swap_info, stub_chain_id, value::calc_swap_value,
};

use crate::broadcast::{RPC_RETRY_INTERVAL, RPC_RETRY_TIMES, retry_rounds};
use crate::der::der_encode_signature;
use crate::rest::JsonRpcClient;

/// Signing prefix for single-signed transactions (`STX\0`).
const HASH_PREFIX_SIGN: [u8; 4] = [0x53, 0x54, 0x58, 0x00];
/// Hash prefix for computing a signed transaction's id (`TXN\0`).
const HASH_PREFIX_TX_ID: [u8; 4] = [0x54, 0x58, 0x4E, 0x00];

const PAYMENT_FLAG_FULLY_CANONICAL: u32 = 0x8000_0000;
const DEFAULT_FEE_DROPS: u64 = 10;

pub fn supports_chain_id(chain_id: &ChainId) -> bool {
    router_types::stub_chain_ids("RIPPLE").contains(chain_id)
}

pub fn get_stub_chain_id(network: Network) -> ChainId {
    stub_chain_id("RIPPLE", network)
}

pub fn is_valid_address(address: &str) -> bool {
    decode_account_id(address).is_ok()
}

/// Decode an `r…` address into its 20-byte account id.
pub fn decode_account_id(address: &str) -> Result<[u8; 20], SwapError> {
    let bytes = bs58::decode(address)
        .with_alphabet(bs58::Alphabet::RIPPLE)
        .with_check(None)
        .into_vec()
        .map_err(|_| SwapError::WrongBindAddress)?;
    if bytes.len() != 21 || bytes[0] != 0 {
        return Err(SwapError::WrongBindAddress);
    }
    let mut account = [0u8; 20];
    account.copy_from_slice(&bytes[1..]);
    Ok(account)
}

pub fn encode_account_id(account: &[u8; 20]) -> String {
    let mut payload = vec![0u8];
    payload.extend_from_slice(account);
    bs58::encode(payload)
        .with_alphabet(bs58::Alphabet::RIPPLE)
        .with_check()
        .into_string()
}

/// Account id of a public key: hash160 over the 33-byte key form
/// (Ed25519 keys carry the `0xED` tag byte).
pub fn public_key_hex_to_address(pubkey_hex: &str) -> Result<String, SwapError> {
    let stripped = pubkey_hex.strip_prefix("0x").unwrap_or(pubkey_hex);
    let mut bytes = hex::decode(stripped)
        .map_err(|e| SwapError::WrongConfig(format!("bad public key hex: {e}")))?;
    if bytes.len() == 32 {
        let mut tagged = vec![0xEDu8];
        tagged.append(&mut bytes);
        bytes = tagged;
    }
    if bytes.len() != 33 {
        return Err(SwapError::WrongConfig(
            "ripple public key must be 33 bytes".into(),
        ));
    }
    let hash: [u8; 20] = Ripemd160::digest(Sha256::digest(&bytes)).into();
    Ok(encode_account_id(&hash))
}

fn sha512_half(data: &[u8]) -> [u8; 32] {
    let digest = Sha512::digest(data);
    let mut half = [0u8; 32];
    half.copy_from_slice(&digest[..32]);
    half
}

// ---------------------------------------------------------------------------
// Payment serialization (the subset of the binary codec a swap-in needs).
// Fields are emitted in canonical (type, field) order.
// ---------------------------------------------------------------------------

fn field_header(type_code: u8, field_code: u8) -> Vec<u8> {
    match (type_code < 16, field_code < 16) {
        (true, true) => vec![(type_code << 4) | field_code],
        (true, false) => vec![type_code << 4, field_code],
        (false, true) => vec![field_code, type_code],
        (false, false) => vec![0, type_code, field_code],
    }
}

fn push_u16(out: &mut Vec<u8>, type_code: u8, field_code: u8, value: u16) {
    out.extend(field_header(type_code, field_code));
    out.extend_from_slice(&value.to_be_bytes());
}

fn push_u32(out: &mut Vec<u8>, type_code: u8, field_code: u8, value: u32) {
    out.extend(field_header(type_code, field_code));
    out.extend_from_slice(&value.to_be_bytes());
}

fn push_xrp_amount(out: &mut Vec<u8>, field_code: u8, drops: u64) {
    out.extend(field_header(6, field_code));
    // native amount: positive bit 0x4000... on top of the drop count
    out.extend_from_slice(&(drops | 0x4000_0000_0000_0000).to_be_bytes());
}

fn push_vl(out: &mut Vec<u8>, type_code: u8, field_code: u8, data: &[u8]) {
    out.extend(field_header(type_code, field_code));
    // single-byte length is enough for keys, signatures and account ids
    out.push(data.len() as u8);
    out.extend_from_slice(data);
}

/// Serialize a payment for signing (`TxnSignature` omitted) or for
/// submission (`signature` attached).
fn serialize_payment(
    account: &[u8; 20],
    destination: &[u8; 20],
    drops: u64,
    fee_drops: u64,
    sequence: u32,
    destination_tag: Option<u32>,
    signing_pubkey: &[u8],
    signature: Option<&[u8]>,
) -> Vec<u8> {
    let mut out = Vec::new();
    push_u16(&mut out, 1, 2, 0); // TransactionType: Payment
    push_u32(&mut out, 2, 2, PAYMENT_FLAG_FULLY_CANONICAL); // Flags
    push_u32(&mut out, 2, 4, sequence); // Sequence
    if let Some(tag) = destination_tag {
        push_u32(&mut out, 2, 14, tag); // DestinationTag
    }
    push_xrp_amount(&mut out, 1, drops); // Amount
    push_xrp_amount(&mut out, 8, fee_drops); // Fee
    push_vl(&mut out, 7, 3, signing_pubkey); // SigningPubKey
    if let Some(signature) = signature {
        push_vl(&mut out, 7, 4, signature); // TxnSignature
    }
    push_vl(&mut out, 8, 1, account); // Account
    push_vl(&mut out, 8, 3, destination); // Destination
    out
}

pub struct RippleBridge {
    ctx: BridgeContext,
    rpc: JsonRpcClient,
    signer: Arc<SignerBackend>,
}

impl RippleBridge {
    pub fn new(ctx: BridgeContext, signer: Arc<SignerBackend>) -> Result<Self, SwapError> {
        let rpc = JsonRpcClient::new(ctx.gateway_config())?;
        Ok(RippleBridge { ctx, rpc, signer })
    }

    async fn rpc_result(&self, method: &str, params: Value) -> Result<Value, SwapError> {
        let response = self
            .rpc
            .call_first(&json!({ "method": method, "params": [params] }))
            .await?;
        let result = response
            .get("result")
            .cloned()
            .ok_or_else(|| SwapError::RpcQuery(format!("{method}: empty result")))?;
        if result.get("error").is_some() {
            let message = result
                .get("error_message")
                .and_then(Value::as_str)
                .unwrap_or("rpc error");
            return Err(SwapError::RpcQuery(format!("{method}: {message}")));
        }
        Ok(result)
    }

    /// Next sequence for the router account; without an explicit override
    /// the "current" (pending-inclusive) ledger view is used so in-flight
    /// transactions do not gap-lock the queue.
    async fn next_sequence(&self, account: &str) -> Result<u32, SwapError> {
        let result = self
            .rpc_result(
                "account_info",
                json!({ "account": account, "ledger_index": "current", "queue": true }),
            )
            .await?;
        let sequence = result
            .pointer("/account_data/Sequence")
            .and_then(Value::as_u64)
            .ok_or_else(|| SwapError::RpcQuery("account_info missing sequence".into()))?;
        let queued = result
            .pointer("/queue_data/txn_count")
            .and_then(Value::as_u64)
            .unwrap_or(0);
        Ok((sequence + queued) as u32)
    }

    async fn verify_swapout_tx(
        &self,
        tx_hash: &str,
        log_index: u64,
        allow_unstable: bool,
    ) -> Result<SwapTxInfo, SwapError> {
        let mut swap_info = SwapTxInfo::new(SwapType::Erc20Swap, tx_hash, log_index);
        swap_info.from_chain_id = self.ctx.chain_id();

        let result = self
            .rpc_result("tx", json!({ "transaction": tx_hash, "binary": false }))
            .await
            .map_err(|_| SwapError::TxNotFound)?;

        if result.get("TransactionType").and_then(Value::as_str) != Some("Payment") {
            return Err(SwapError::SwapoutLogNotFound);
        }
        let validated = result
            .get("validated")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        if !allow_unstable && !validated {
            return Err(SwapError::TxNotStable);
        }
        if result.pointer("/meta/TransactionResult").and_then(Value::as_str)
            != Some("tesSUCCESS")
        {
            return Err(SwapError::TxWithWrongStatus);
        }
        swap_info.height = result
            .get("ledger_index")
            .and_then(Value::as_u64)
            .unwrap_or_default();
        if swap_info.height < self.ctx.chain_config().initial_height {
            return Err(SwapError::TxBeforeInitialHeight);
        }

        let router = &self.ctx.chain_config().router_contract;
        if result.get("Destination").and_then(Value::as_str) != Some(router.as_str()) {
            return Err(SwapError::TxWithWrongContract);
        }
        swap_info.from = result
            .get("Account")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        swap_info.tx_to = router.clone();
        swap_info.to = router.clone();

        // the canonical delivered amount decides the swap value
        let delivered = result
            .pointer("/meta/delivered_amount")
            .and_then(Value::as_str)
            .ok_or(SwapError::TxWithWrongValue)?;
        swap_info.value = U256::from_str(delivered).map_err(|_| SwapError::TxWithWrongValue)?;

        let memo_hex = result
            .pointer("/Memos/0/Memo/MemoData")
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
            .get_token_config("XRP")
            .ok_or(SwapError::MissTokenConfig)?;
        swap_info.erc20_swap_info.token = token_cfg.contract_address.clone();
        swap_info.erc20_swap_info.token_id = token_cfg.token_id;

        check_swap_info(self.ctx.registry(), self, &swap_info)?;
        Ok(swap_info)
    }

    async fn build_swapin_tx(&self, args: &BuildTxArgs) -> Result<RippleRawTx, SwapError> {
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
        let drops: u64 = amount.try_into().map_err(|_| SwapError::TxWithWrongValue)?;

        let descriptor = self.signer.public_key(&self.ctx.chain_id())?;
        let account = public_key_hex_to_address(&descriptor.pubkey_hex)?;
        let destination = decode_account_id(&args.bind)?;
        let sequence = match args.nonce {
            Some(n) => n as u32,
            None => self.next_sequence(&account).await?,
        };

        let signing_pubkey = tagged_pubkey_bytes(&descriptor.pubkey_hex)?;
        let blob = serialize_payment(
            &decode_account_id(&account)?,
            &destination,
            drops,
            DEFAULT_FEE_DROPS,
            sequence,
            None,
            &signing_pubkey,
            None,
        );
        let tx_json = json!({
            "TransactionType": "Payment",
            "Account": account,
            "Destination": args.bind,
            "Amount": drops.to_string(),
            "Fee": DEFAULT_FEE_DROPS.to_string(),
            "Sequence": sequence,
        });
        Ok(RippleRawTx {
            tx_json: tx_json.to_string(),
            signing_blob: blob,
            signer_pubkey: descriptor.pubkey_hex,
            sequence,
        })
    }

    async fn sign_tx(
        &self,
        raw: &RippleRawTx,
        context: &str,
    ) -> Result<RippleSignedTx, SwapError> {
        let descriptor = self.signer.public_key(&self.ctx.chain_id())?;
        let chain_id = self.ctx.chain_id();

        let mut sign_content = HASH_PREFIX_SIGN.to_vec();
        sign_content.extend_from_slice(&raw.signing_blob);

        let signature: Vec<u8> = match descriptor.curve {
            SigningCurve::Ed25519 => {
                // Ed25519 signs the prefixed blob itself, not a hash of it.
                let signature = self
                    .signer
                    .sign_ed(&chain_id, &descriptor.pubkey_hex, &sign_content, context)
                    .await?;
                let key_bytes = hex::decode(&descriptor.pubkey_hex)
                    .map_err(|_| SwapError::SignatureVerifyFailed)?;
                let key: [u8; 32] = key_bytes
                    .try_into()
                    .map_err(|_| SwapError::SignatureVerifyFailed)?;
                ed25519_dalek::VerifyingKey::from_bytes(&key)
                    .map_err(|_| SwapError::SignatureVerifyFailed)?
                    .verify(&sign_content, &ed25519_dalek::Signature::from_bytes(&signature))
                    .map_err(|_| SwapError::SignatureVerifyFailed)?;
                signature.to_vec()
            }
            SigningCurve::Secp256k1 => {
                let digest = sha512_half(&sign_content);
                let rsv = self
                    .signer
                    .sign_ec(&chain_id, &descriptor.pubkey_hex, &digest, context)
                    .await?;
                // DER-encode r ‖ s for the ledger
                der_encode_signature(&rsv[..64])?
            }
        };

        let signing_pubkey = tagged_pubkey_bytes(&raw.signer_pubkey)?;
        let account = public_key_hex_to_address(&raw.signer_pubkey)?;
        let tx_json: Value =
            serde_json::from_str(&raw.tx_json).map_err(|_| SwapError::WrongRawTx)?;
        let destination = tx_json
            .get("Destination")
            .and_then(Value::as_str)
            .ok_or(SwapError::WrongRawTx)?;
        let drops: u64 = tx_json
            .get("Amount")
            .and_then(Value::as_str)
            .and_then(|a| a.parse().ok())
            .ok_or(SwapError::WrongRawTx)?;

        let blob = serialize_payment(
            &decode_account_id(&account)?,
            &decode_account_id(destination)?,
            drops,
            DEFAULT_FEE_DROPS,
            raw.sequence,
            None,
            &signing_pubkey,
            Some(&signature),
        );
        let mut id_content = HASH_PREFIX_TX_ID.to_vec();
        id_content.extend_from_slice(&blob);
        let tx_hash = hex::encode_upper(sha512_half(&id_content));
        Ok(RippleSignedTx {
            tx_blob_hex: hex::encode_upper(&blob),
            tx_hash,
        })
    }

    /// `RPC_RETRY_TIMES` rounds over every gateway with a pause between
    /// rounds.
    async fn broadcast(&self, signed: &RippleSignedTx) -> Result<String, SwapError> {
        let urls = self.ctx.gateway_config().all_urls();
        let body = json!({
            "method": "submit",
            "params": [{ "tx_blob": signed.tx_blob_hex }],
        });
        let tx_hash = signed.tx_hash.clone();
        let rpc = &self.rpc;
        retry_rounds(&urls, RPC_RETRY_TIMES, RPC_RETRY_INTERVAL, move |url| {
            let body = body.clone();
            let tx_hash = tx_hash.clone();
            async move {
                let response = rpc.call_url(&url, &body).await?;
                let engine = response
                    .pointer("/result/engine_result")
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                if !engine.starts_with("tes") && !engine.starts_with("ter") {
                    tracing::warn!(engine, "send tx with error result");
                }
                Ok(tx_hash)
            }
        })
        .await
    }
}

fn tagged_pubkey_bytes(pubkey_hex: &str) -> Result<Vec<u8>, SwapError> {
    let stripped = pubkey_hex.strip_prefix("0x").unwrap_or(pubkey_hex);
    let mut bytes = hex::decode(stripped)
        .map_err(|e| SwapError::WrongConfig(format!("bad public key hex: {e}")))?;
    if bytes.len() == 32 {
        let mut tagged = vec![0xEDu8];
        tagged.append(&mut bytes);
        bytes = tagged;
    }
    Ok(bytes)
}

#[async_trait::async_trait]
impl Bridge for RippleBridge {
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
        public_key_hex_to_address(pubkey_hex)
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
        self.build_swapin_tx(args).await.map(RawTransaction::Ripple)
    }

    async fn mpc_sign_transaction(
        &self,
        raw_tx: RawTransaction,
        args: &BuildTxArgs,
    ) -> Result<(SignedTransaction, String), SwapError> {
        let RawTransaction::Ripple(raw) = raw_tx else {
            return Err(SwapError::WrongRawTx);
        };
        let context = format!("{}:{}:{}", args.from_chain_id, args.swap_id, args.log_index);
        let signed = self.sign_tx(&raw, &context).await?;
        let tx_hash = signed.tx_hash.clone();
        Ok((SignedTransaction::Ripple(signed), tx_hash))
    }

    async fn send_transaction(&self, signed_tx: SignedTransaction) -> Result<String, SwapError> {
        let SignedTransaction::Ripple(signed) = signed_tx else {
            return Err(SwapError::WrongSignedTx);
        };
        self.broadcast(&signed).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_address_roundtrip() {
        // XRPL genesis account
        let address = "rHb9CJAWyB4rj91VRWn96DkukG4bwdtyTh";
        let account = decode_account_id(address).unwrap();
        assert_eq!(encode_account_id(&account), address);
        assert!(is_valid_address(address));
        assert!(!is_valid_address("rInvalidChecksum111111111111111111"));
        assert!(!is_valid_address("0x1111111111111111111111111111111111111111"));
    }

    #[test]
    fn ed25519_pubkey_address_is_valid() {
        let address = public_key_hex_to_address(&hex::encode([7u8; 32])).unwrap();
        assert!(is_valid_address(&address));
        // the tagged 33-byte form maps to the same account
        let tagged = format!("ed{}", hex::encode([7u8; 32]));
        assert_eq!(public_key_hex_to_address(&tagged).unwrap(), address);
    }

    #[test]
    fn signing_blob_carries_prefix_only_at_sign_time() {
        let account = [1u8; 20];
        let destination = [2u8; 20];
        let blob = serialize_payment(&account, &destination, 5000, 10, 7, None, &[0xED; 33], None);
        // TransactionType header first
        assert_eq!(blob[0], 0x12);
        assert_eq!(&blob[1..3], &0u16.to_be_bytes());
        // no STX prefix inside the blob itself
        assert_ne!(&blob[..4], &HASH_PREFIX_SIGN);
        let signed = serialize_payment(
            &account,
            &destination,
            5000,
            10,
            7,
            None,
            &[0xED; 33],
            Some(&[9u8; 64]),
        );
        assert!(signed.len() > blob.len());
    }

}
