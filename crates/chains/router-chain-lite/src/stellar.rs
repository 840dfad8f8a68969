//! Stellar adapter.
//!
//! Addresses are strkey-encoded Ed25519 keys; payments into the router
//! account carry `bind:toChainID` as a text memo. The XDR writer below
//! covers exactly one shape: a single native-asset payment.

use std::sync::Arc;

use alloy_primitives::U256;
use data_encoding::BASE32_NOPAD;
use ed25519_dalek::Verifier;
use serde_json::Value;
use sha2::{Digest, Sha256};

use router_mpc::SignerBackend;
use router_types::rawtx::{StellarRawTx, StellarSignedTx};
use router_types::{
    Bridge, BridgeContext, BuildTxArgs, ChainConfig, ChainId, GatewayConfig, Network,
    RawTransaction, SignedTransaction, SwapError, SwapTxInfo, SwapType, TokenConfig, VerifyArgs,
    check_swap_info, stub_chain_id, value::calc_swap_value,
};

use crate::broadcast::first_success;
use crate::rest::JsonRpcClient;

/// strkey version byte for account IDs (`G…`).
const VERSION_ACCOUNT_ID: u8 = 6 << 3;
const NETWORK_PASSPHRASE: &str = "Public Global Stellar Network ; September 2015";
/// ENVELOPE_TYPE_TX
const ENVELOPE_TYPE_TX: u32 = 2;
const BASE_FEE_STROOPS: u32 = 100;
/// Token table key for the native asset (amounts in stroops).
const XLM_TOKEN_KEY: &str = "native";

pub fn supports_chain_id(chain_id: &ChainId) -> bool {
    router_types::stub_chain_ids("STELLAR").contains(chain_id)
}

pub fn get_stub_chain_id(network: Network) -> ChainId {
    stub_chain_id("STELLAR", network)
}

// CRC16-XModem, the strkey checksum.
fn crc16(data: &[u8]) -> u16 {
    let mut crc: u16 = 0;
    for byte in data {
        crc ^= (*byte as u16) << 8;
        for _ in 0..8 {
            crc = if crc & 0x8000 != 0 {
                (crc << 1) ^ 0x1021
            } else {
                crc << 1
            };
        }
    }
    crc
}

pub fn encode_strkey(payload: &[u8; 32]) -> String {
    let mut data = vec![VERSION_ACCOUNT_ID];
    data.extend_from_slice(payload);
    let checksum = crc16(&data);
    data.extend_from_slice(&checksum.to_le_bytes());
    BASE32_NOPAD.encode(&data)
}

pub fn decode_strkey(address: &str) -> Result<[u8; 32], SwapError> {
    let data = BASE32_NOPAD
        .decode(address.as_bytes())
        .map_err(|_| SwapError::WrongBindAddress)?;
    if data.len() != 35 || data[0] != VERSION_ACCOUNT_ID {
        return Err(SwapError::WrongBindAddress);
    }
    let (body, checksum) = data.split_at(33);
    if crc16(body).to_le_bytes() != checksum {
        return Err(SwapError::WrongBindAddress);
    }
    body[1..].try_into().map_err(|_| SwapError::WrongBindAddress)
}

pub fn is_valid_address(address: &str) -> bool {
    decode_strkey(address).is_ok()
}

/// Hex public key (optionally `0xED`-tagged) to a `G…` address.
pub fn public_key_hex_to_address(pubkey_hex: &str) -> Result<String, SwapError> {
    let stripped = pubkey_hex.strip_prefix("0x").unwrap_or(pubkey_hex);
    let bytes = hex::decode(stripped)
        .map_err(|e| SwapError::WrongConfig(format!("bad public key hex: {e}")))?;
    let key: [u8; 32] = match bytes.len() {
        33 if bytes[0] == 0xED => bytes[1..].try_into().expect("length checked"),
        32 => bytes.try_into().expect("length checked"),
        _ => {
            return Err(SwapError::WrongConfig(
                "stellar public key must be 32 bytes".into(),
            ));
        }
    };
    Ok(encode_strkey(&key))
}

// ---------------------------------------------------------------------------
// XDR writer for a single-payment TransactionV1Envelope.
// ---------------------------------------------------------------------------

fn xdr_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_be_bytes());
}

fn xdr_u64(out: &mut Vec<u8>, value: u64) {
    out.extend_from_slice(&value.to_be_bytes());
}

fn xdr_string(out: &mut Vec<u8>, value: &str) {
    xdr_u32(out, value.len() as u32);
    out.extend_from_slice(value.as_bytes());
    let pad = (4 - value.len() % 4) % 4;
    out.extend(std::iter::repeat_n(0u8, pad));
}

fn xdr_account(out: &mut Vec<u8>, key: &[u8; 32]) {
    xdr_u32(out, 0); // KEY_TYPE_ED25519
    out.extend_from_slice(key);
}

/// Transaction XDR (the part that gets hashed and signed).
fn encode_tx_xdr(
    source: &[u8; 32],
    destination: &[u8; 32],
    stroops: i64,
    sequence: i64,
    memo_text: &str,
) -> Vec<u8> {
    let mut out = Vec::new();
    xdr_account(&mut out, source);
    xdr_u32(&mut out, BASE_FEE_STROOPS);
    xdr_u64(&mut out, sequence as u64);
    xdr_u32(&mut out, 0); // preconditions: none
    xdr_u32(&mut out, 1); // memo type: text
    xdr_string(&mut out, memo_text);
    xdr_u32(&mut out, 1); // one operation
    xdr_u32(&mut out, 0); // no per-op source account
    xdr_u32(&mut out, 1); // op type: payment
    xdr_account(&mut out, destination);
    xdr_u32(&mut out, 0); // asset: native
    xdr_u64(&mut out, stroops as u64);
    xdr_u32(&mut out, 0); // ext
    out
}

/// The signing payload: sha256 of network id, envelope type tag and tx.
fn transaction_hash(tx_xdr: &[u8]) -> [u8; 32] {
    let network_id = Sha256::digest(NETWORK_PASSPHRASE.as_bytes());
    let mut payload = network_id.to_vec();
    let mut envelope_type = Vec::new();
    xdr_u32(&mut envelope_type, ENVELOPE_TYPE_TX);
    payload.extend_from_slice(&envelope_type);
    payload.extend_from_slice(tx_xdr);
    Sha256::digest(&payload).into()
}

fn encode_envelope(tx_xdr: &[u8], pubkey: &[u8; 32], signature: &[u8; 64]) -> Vec<u8> {
    let mut out = tx_xdr.to_vec();
    xdr_u32(&mut out, 1); // one decorated signature
    out.extend_from_slice(&pubkey[28..]); // hint: last 4 bytes of the key
    xdr_u32(&mut out, 64);
    out.extend_from_slice(signature);
    out
}

pub struct StellarBridge {
    ctx: BridgeContext,
    rpc: JsonRpcClient,
    signer: Arc<SignerBackend>,
}

impl StellarBridge {
    pub fn new(ctx: BridgeContext, signer: Arc<SignerBackend>) -> Result<Self, SwapError> {
        let rpc = JsonRpcClient::new(ctx.gateway_config())?;
        Ok(StellarBridge { ctx, rpc, signer })
    }

    async fn verify_swapout_tx(
        &self,
        tx_hash: &str,
        log_index: u64,
        // a transaction in a closed ledger is final, no unstable window
        _allow_unstable: bool,
    ) -> Result<SwapTxInfo, SwapError> {
        let mut swap_info = SwapTxInfo::new(SwapType::Erc20Swap, tx_hash, log_index);
        swap_info.from_chain_id = self.ctx.chain_id();

        let tx: Value = self
            .rpc
            .get_first(&format!("transactions/{}", swap_info.hash))
            .await
            .map_err(|_| SwapError::TxNotFound)?;
        if tx.get("successful").and_then(Value::as_bool) != Some(true) {
            return Err(SwapError::TxWithWrongStatus);
        }
        swap_info.height = tx.get("ledger").and_then(Value::as_u64).unwrap_or_default();
        if swap_info.height < self.ctx.chain_config().initial_height {
            return Err(SwapError::TxBeforeInitialHeight);
        }

        let memo = tx
            .get("memo")
            .and_then(Value::as_str)
            .ok_or(SwapError::SwapoutLogNotFound)?;
        let (bind, to_chain_id) = memo
            .rsplit_once(':')
            .ok_or(SwapError::SwapoutLogNotFound)?;
        swap_info.bind = bind.to_string();
        swap_info.to_chain_id = to_chain_id
            .parse()
            .map_err(|_| SwapError::SwapoutLogNotFound)?;

        // the canonical payment into the router account carries the value
        let router = &self.ctx.chain_config().router_contract;
        let payments: Value = self
            .rpc
            .get_first(&format!("transactions/{}/payments", swap_info.hash))
            .await?;
        let records = payments
            .pointer("/_embedded/records")
            .and_then(Value::as_array)
            .ok_or(SwapError::SwapoutLogNotFound)?;
        let payment = records
            .iter()
            .find(|r| {
                r.get("type").and_then(Value::as_str) == Some("payment")
                    && r.get("to").and_then(Value::as_str) == Some(router.as_str())
                    && r.get("asset_type").and_then(Value::as_str) == Some("native")
            })
            .ok_or(SwapError::SwapoutLogNotFound)?;
        let amount = payment
            .get("amount")
            .and_then(Value::as_str)
            .ok_or(SwapError::TxWithWrongValue)?;
        swap_info.value = parse_stroops(amount)?;
        swap_info.from = payment
            .get("from")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        swap_info.to = router.clone();
        swap_info.tx_to = router.clone();

        let token_cfg = self
            .ctx
            .get_token_config(XLM_TOKEN_KEY)
            .ok_or(SwapError::MissTokenConfig)?;
        swap_info.erc20_swap_info.token = token_cfg.contract_address.clone();
        swap_info.erc20_swap_info.token_id = token_cfg.token_id;

        check_swap_info(self.ctx.registry(), self, &swap_info)?;
        Ok(swap_info)
    }

    async fn build_swapin_tx(&self, args: &BuildTxArgs) -> Result<StellarRawTx, SwapError> {
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
        let stroops: i64 = i64::try_from(u64::try_from(amount).map_err(|_| SwapError::TxWithWrongValue)?)
            .map_err(|_| SwapError::TxWithWrongValue)?;

        let descriptor = self.signer.ed_public_key(&self.ctx.chain_id())?;
        let source_address = public_key_hex_to_address(&descriptor.pubkey_hex)?;
        let source = decode_strkey(&source_address)?;
        let destination = decode_strkey(&args.bind)?;

        let account: Value = self
            .rpc
            .get_first(&format!("accounts/{source_address}"))
            .await?;
        let sequence: i64 = account
            .get("sequence")
            .and_then(Value::as_str)
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| SwapError::RpcQuery("account missing sequence".into()))?;
        let next_sequence = match args.nonce {
            Some(n) => n as i64,
            None => sequence + 1,
        };

        let memo = format!("swapin:{}", &args.swap_id[..args.swap_id.len().min(20)]);
        let tx_xdr = encode_tx_xdr(&source, &destination, stroops, next_sequence, &memo);
        let tx_hash = transaction_hash(&tx_xdr);
        Ok(StellarRawTx {
            envelope_xdr: tx_xdr,
            tx_hash: tx_hash.to_vec(),
            signer_pubkey: descriptor.pubkey_hex,
        })
    }

    async fn sign_tx(
        &self,
        raw: &StellarRawTx,
        context: &str,
    ) -> Result<StellarSignedTx, SwapError> {
        let signature = self
            .signer
            .sign_ed(&self.ctx.chain_id(), &raw.signer_pubkey, &raw.tx_hash, context)
            .await?;

        let key_bytes = hex::decode(
            raw.signer_pubkey
                .strip_prefix("0x")
                .unwrap_or(&raw.signer_pubkey),
        )
        .map_err(|_| SwapError::SignatureVerifyFailed)?;
        let key: [u8; 32] = if key_bytes.len() == 33 && key_bytes[0] == 0xED {
            key_bytes[1..].try_into().expect("length checked")
        } else {
            key_bytes
                .try_into()
                .map_err(|_| SwapError::SignatureVerifyFailed)?
        };
        ed25519_dalek::VerifyingKey::from_bytes(&key)
            .map_err(|_| SwapError::SignatureVerifyFailed)?
            .verify(&raw.tx_hash, &ed25519_dalek::Signature::from_bytes(&signature))
            .map_err(|_| SwapError::SignatureVerifyFailed)?;

        let envelope = encode_envelope(&raw.envelope_xdr, &key, &signature);
        use base64::Engine;
        Ok(StellarSignedTx {
            envelope_xdr_base64: base64::engine::general_purpose::STANDARD.encode(&envelope),
            tx_hash: hex::encode(&raw.tx_hash),
        })
    }

    async fn broadcast(&self, signed: &StellarSignedTx) -> Result<String, SwapError> {
        let urls = self.ctx.gateway_config().all_urls();
        let rpc = &self.rpc;
        let envelope = &signed.envelope_xdr_base64;
        let fallback = &signed.tx_hash;
        first_success(&urls, move |url| async move {
            let response = rpc
                .post_path(
                    &url,
                    "transactions",
                    &serde_json::json!({ "tx": envelope }),
                )
                .await?;
            if let Some(hash) = response.get("hash").and_then(Value::as_str) {
                return Ok(hash.to_string());
            }
            if response.get("successful").and_then(Value::as_bool) == Some(true) {
                return Ok(fallback.clone());
            }
            Err(SwapError::BroadcastTx)
        })
        .await
    }
}

/// Horizon renders amounts as decimals with 7 fractional digits; swap math
/// runs on integer stroops.
fn parse_stroops(amount: &str) -> Result<U256, SwapError> {
    let (whole, frac) = amount.split_once('.').unwrap_or((amount, ""));
    if frac.len() > 7 {
        return Err(SwapError::TxWithWrongValue);
    }
    let mut frac = frac.to_string();
    while frac.len() < 7 {
        frac.push('0');
    }
    let whole: u64 = whole.parse().map_err(|_| SwapError::TxWithWrongValue)?;
    let frac: u64 = if frac.is_empty() {
        0
    } else {
        frac.parse().map_err(|_| SwapError::TxWithWrongValue)?
    };
    Ok(U256::from(whole) * U256::from(10_000_000u64) + U256::from(frac))
}

#[async_trait::async_trait]
impl Bridge for StellarBridge {
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
        self.build_swapin_tx(args).await.map(RawTransaction::Stellar)
    }

    async fn mpc_sign_transaction(
        &self,
        raw_tx: RawTransaction,
        args: &BuildTxArgs,
    ) -> Result<(SignedTransaction, String), SwapError> {
        let RawTransaction::Stellar(raw) = raw_tx else {
            return Err(SwapError::WrongRawTx);
        };
        let context = format!("{}:{}:{}", args.from_chain_id, args.swap_id, args.log_index);
        let signed = self.sign_tx(&raw, &context).await?;
        let tx_hash = signed.tx_hash.clone();
        Ok((SignedTransaction::Stellar(signed), tx_hash))
    }

    async fn send_transaction(&self, signed_tx: SignedTransaction) -> Result<String, SwapError> {
        let SignedTransaction::Stellar(signed) = signed_tx else {
            return Err(SwapError::WrongSignedTx);
        };
        self.broadcast(&signed).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strkey_roundtrip() {
        let key = [7u8; 32];
        let address = encode_strkey(&key);
        assert!(address.starts_with('G'));
        assert_eq!(address.len(), 56);
        assert_eq!(decode_strkey(&address).unwrap(), key);
        assert!(is_valid_address(&address));
    }

    #[test]
    fn corrupted_strkey_rejected() {
        let mut address = encode_strkey(&[7u8; 32]);
        // flip one character
        let replacement = if address.ends_with('A') { 'B' } else { 'A' };
        address.pop();
        address.push(replacement);
        assert!(!is_valid_address(&address));
        assert!(!is_valid_address("GSHORT"));
    }

    #[test]
    fn ed_tagged_pubkey_to_address() {
        let key = [9u8; 32];
        let plain = public_key_hex_to_address(&hex::encode(key)).unwrap();
        let tagged = public_key_hex_to_address(&format!("ed{}", hex::encode(key))).unwrap();
        assert_eq!(plain, tagged);
        assert_eq!(decode_strkey(&plain).unwrap(), key);
    }

    #[test]
    fn stroop_parsing() {
        assert_eq!(parse_stroops("1").unwrap(), U256::from(10_000_000u64));
        assert_eq!(parse_stroops("0.0000001").unwrap(), U256::from(1u64));
        assert_eq!(parse_stroops("2.5").unwrap(), U256::from(25_000_000u64));
        assert!(parse_stroops("1.00000001").is_err());
        assert!(parse_stroops("abc").is_err());
    }

    #[test]
    fn tx_hash_depends_on_network_and_content() {
        let source = [1u8; 32];
        let destination = [2u8; 32];
        let a = transaction_hash(&encode_tx_xdr(&source, &destination, 100, 7, "m"));
        let b = transaction_hash(&encode_tx_xdr(&source, &destination, 101, 7, "m"));
        assert_ne!(a, b);
    }
}
