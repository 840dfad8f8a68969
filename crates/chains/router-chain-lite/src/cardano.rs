//! Cardano adapter.
//!
//! Cardano is UTXO-based, so consecutive swap-ins must chain: each build
//! spends the change output of the previously broadcast transaction. The
//! chaining state is owned by the bridge and updated atomically on every
//! successful broadcast; builds are serialized through the same lock.

use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;

use alloy_primitives::U256;
use blake2::digest::consts::{U28, U32};
use blake2::{Blake2b, Digest};
use ed25519_dalek::Verifier;
use serde_json::Value;

use router_mpc::SignerBackend;
use router_types::rawtx::{CardanoRawTx, CardanoSignedTx};
use router_types::{
    Bridge, BridgeContext, BuildTxArgs, ChainConfig, ChainId, GatewayConfig, Network,
    RawTransaction, SignedTransaction, SwapError, SwapTxInfo, SwapType, TokenConfig, VerifyArgs,
    check_swap_info, stub_chain_id, value::calc_swap_value,
};

use crate::broadcast::first_success;
use crate::rest::JsonRpcClient;

type Blake2b256 = Blake2b<U32>;
type Blake2b224 = Blake2b<U28>;

const LOVELACE: &str = "lovelace";
const DEFAULT_FEE_LOVELACE: u64 = 200_000;
/// Metadata label carrying the swap-out routing request.
const SWAP_METADATA_LABEL: &str = "6723";

pub fn supports_chain_id(chain_id: &ChainId) -> bool {
    router_types::stub_chain_ids("CARDANO").contains(chain_id)
}

pub fn get_stub_chain_id(network: Network) -> ChainId {
    stub_chain_id("CARDANO", network)
}

pub fn is_valid_address(address: &str) -> bool {
    matches!(bech32::decode(address), Ok((hrp, _)) if hrp.as_str() == "addr" || hrp.as_str() == "addr_test")
}

/// UTXO key the next build spends.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChainingInputKey {
    pub tx_hash: String,
    pub tx_index: u32,
}

/// Output chaining state: the previous transaction's change output and the
/// assets left on it.
///
/// Updated unconditionally on broadcast success; a ledger rollback can
/// orphan the chain until the state is reseeded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionChaining {
    pub input_key: ChainingInputKey,
    pub assets_map: BTreeMap<String, String>,
}

// ---------------------------------------------------------------------------
// Minimal CBOR encoding (uint / bytes / array / map), enough for a
// payment-only transaction body and its witness set.
// ---------------------------------------------------------------------------

fn cbor_type_header(out: &mut Vec<u8>, major: u8, value: u64) {
    let major = major << 5;
    match value {
        0..=23 => out.push(major | value as u8),
        24..=0xff => {
            out.push(major | 24);
            out.push(value as u8);
        }
        0x100..=0xffff => {
            out.push(major | 25);
            out.extend_from_slice(&(value as u16).to_be_bytes());
        }
        0x1_0000..=0xffff_ffff => {
            out.push(major | 26);
            out.extend_from_slice(&(value as u32).to_be_bytes());
        }
        _ => {
            out.push(major | 27);
            out.extend_from_slice(&value.to_be_bytes());
        }
    }
}

fn cbor_uint(out: &mut Vec<u8>, value: u64) {
    cbor_type_header(out, 0, value);
}

fn cbor_bytes(out: &mut Vec<u8>, data: &[u8]) {
    cbor_type_header(out, 2, data.len() as u64);
    out.extend_from_slice(data);
}

fn cbor_array(out: &mut Vec<u8>, len: u64) {
    cbor_type_header(out, 4, len);
}

fn cbor_map(out: &mut Vec<u8>, len: u64) {
    cbor_type_header(out, 5, len);
}

fn address_bytes(address: &str) -> Result<Vec<u8>, SwapError> {
    let (_, data) = bech32::decode(address).map_err(|_| SwapError::WrongBindAddress)?;
    Ok(data)
}

/// The payment-only transaction body `{0: inputs, 1: outputs, 2: fee}`.
fn encode_tx_body(
    input: &ChainingInputKey,
    outputs: &[(Vec<u8>, u64)],
    fee: u64,
) -> Result<Vec<u8>, SwapError> {
    let input_hash = hex::decode(&input.tx_hash).map_err(|_| SwapError::WrongRawTx)?;
    let mut out = Vec::new();
    cbor_map(&mut out, 3);
    cbor_uint(&mut out, 0);
    cbor_array(&mut out, 1);
    cbor_array(&mut out, 2);
    cbor_bytes(&mut out, &input_hash);
    cbor_uint(&mut out, input.tx_index as u64);
    cbor_uint(&mut out, 1);
    cbor_array(&mut out, outputs.len() as u64);
    for (address, amount) in outputs {
        cbor_array(&mut out, 2);
        cbor_bytes(&mut out, address);
        cbor_uint(&mut out, *amount);
    }
    cbor_uint(&mut out, 2);
    cbor_uint(&mut out, fee);
    Ok(out)
}

/// `[body, {0: [[vkey, signature]]}, true, null]`
fn encode_signed_tx(body: &[u8], vkey: &[u8], signature: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    cbor_array(&mut out, 4);
    out.extend_from_slice(body);
    cbor_map(&mut out, 1);
    cbor_uint(&mut out, 0);
    cbor_array(&mut out, 1);
    cbor_array(&mut out, 2);
    cbor_bytes(&mut out, vkey);
    cbor_bytes(&mut out, signature);
    out.push(0xf5); // true
    out.push(0xf6); // null
    out
}

pub struct CardanoBridge {
    ctx: BridgeContext,
    rpc: JsonRpcClient,
    signer: Arc<SignerBackend>,
    /// Serializes builds and carries the output chain between them.
    chaining: tokio::sync::Mutex<TransactionChaining>,
}

impl CardanoBridge {
    pub fn new(ctx: BridgeContext, signer: Arc<SignerBackend>) -> Result<Self, SwapError> {
        let rpc = JsonRpcClient::new(ctx.gateway_config())?;
        Ok(CardanoBridge {
            ctx,
            rpc,
            signer,
            chaining: tokio::sync::Mutex::new(TransactionChaining::default()),
        })
    }

    /// Seed the chaining state, e.g. at startup from the router account's
    /// newest UTXO.
    pub async fn seed_chaining(&self, state: TransactionChaining) {
        *self.chaining.lock().await = state;
    }

    pub async fn chaining_state(&self) -> TransactionChaining {
        self.chaining.lock().await.clone()
    }

    fn router_address_bytes(&self) -> Result<Vec<u8>, SwapError> {
        address_bytes(&self.ctx.chain_config().router_contract)
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
            .get_first(&format!("api/v0/txs/{}", swap_info.hash))
            .await
            .map_err(|_| SwapError::TxNotFound)?;
        let height = tx
            .get("block_height")
            .and_then(Value::as_u64)
            .ok_or(SwapError::TxNotFound)?;
        if height < self.ctx.chain_config().initial_height {
            return Err(SwapError::TxBeforeInitialHeight);
        }
        swap_info.height = height;

        if !allow_unstable {
            let latest: Value = self.rpc.get_first("api/v0/blocks/latest").await?;
            let tip = latest
                .get("height")
                .and_then(Value::as_u64)
                .unwrap_or_default();
            if tip.saturating_sub(height) + 1 < self.ctx.chain_config().confirmations {
                return Err(SwapError::TxNotStable);
            }
        }

        // the single output paying the router account carries the value
        let utxos: Value = self
            .rpc
            .get_first(&format!("api/v0/txs/{}/utxos", swap_info.hash))
            .await?;
        let router = &self.ctx.chain_config().router_contract;
        let mut value = U256::ZERO;
        if let Some(outputs) = utxos.get("outputs").and_then(Value::as_array) {
            for output in outputs {
                if output.get("address").and_then(Value::as_str) != Some(router.as_str()) {
                    continue;
                }
                if let Some(amounts) = output.get("amount").and_then(Value::as_array) {
                    for amount in amounts {
                        if amount.get("unit").and_then(Value::as_str) == Some(LOVELACE)
                            && let Some(quantity) =
                                amount.get("quantity").and_then(Value::as_str)
                        {
                            value += U256::from_str(quantity)
                                .map_err(|_| SwapError::TxWithWrongValue)?;
                        }
                    }
                }
            }
        }
        if value.is_zero() {
            return Err(SwapError::SwapoutLogNotFound);
        }
        swap_info.value = value;
        swap_info.to = router.clone();
        swap_info.tx_to = router.clone();

        // routing request rides the transaction metadata
        let metadata: Value = self
            .rpc
            .get_first(&format!("api/v0/txs/{}/metadata", swap_info.hash))
            .await?;
        let entry = metadata
            .as_array()
            .and_then(|entries| {
                entries.iter().find(|e| {
                    e.get("label").and_then(Value::as_str) == Some(SWAP_METADATA_LABEL)
                })
            })
            .ok_or(SwapError::SwapoutLogNotFound)?;
        let bind = entry
            .pointer("/json_metadata/bind")
            .and_then(Value::as_str)
            .ok_or(SwapError::SwapoutLogNotFound)?;
        let to_chain_id = entry
            .pointer("/json_metadata/toChainId")
            .and_then(Value::as_str)
            .ok_or(SwapError::SwapoutLogNotFound)?;
        swap_info.bind = bind.to_string();
        swap_info.to_chain_id = to_chain_id
            .parse()
            .map_err(|_| SwapError::SwapoutLogNotFound)?;

        let token_cfg = self
            .ctx
            .get_token_config(LOVELACE)
            .ok_or(SwapError::MissTokenConfig)?;
        swap_info.erc20_swap_info.token = token_cfg.contract_address.clone();
        swap_info.erc20_swap_info.token_id = token_cfg.token_id;

        check_swap_info(self.ctx.registry(), self, &swap_info)?;
        Ok(swap_info)
    }

    async fn build_swapin_tx(&self, args: &BuildTxArgs) -> Result<CardanoRawTx, SwapError> {
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

        // Builds are serialized: the next transaction spends this one's
        // change output, so two concurrent builds would double-spend.
        let chaining = self.chaining.lock().await;
        if chaining.input_key.tx_hash.is_empty() {
            return Err(SwapError::WrongConfig(
                "cardano chaining state not seeded".into(),
            ));
        }
        let balance: u64 = chaining
            .assets_map
            .get(LOVELACE)
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);
        let needed = amount + DEFAULT_FEE_LOVELACE;
        if balance < needed {
            return Err(SwapError::TxWithWrongValue);
        }
        let change = balance - needed;

        let bind_bytes = address_bytes(&args.bind)?;
        let router_bytes = self.router_address_bytes()?;
        let outputs = vec![(bind_bytes, amount), (router_bytes, change)];
        let body = encode_tx_body(&chaining.input_key, &outputs, DEFAULT_FEE_LOVELACE)?;
        let tx_hash = hex::encode(Blake2b256::digest(&body));

        let mut assets_map = chaining.assets_map.clone();
        assets_map.insert(LOVELACE.to_string(), change.to_string());
        let descriptor = self.signer.ed_public_key(&self.ctx.chain_id())?;
        Ok(CardanoRawTx {
            body_cbor: body,
            tx_hash,
            // change output index the next build chains off
            tx_index: 1,
            assets_map,
            signer_pubkey: descriptor.pubkey_hex,
        })
    }

    async fn sign_tx(
        &self,
        raw: &CardanoRawTx,
        context: &str,
    ) -> Result<CardanoSignedTx, SwapError> {
        let tx_hash_bytes = hex::decode(&raw.tx_hash).map_err(|_| SwapError::WrongRawTx)?;
        let signature = self
            .signer
            .sign_ed(&self.ctx.chain_id(), &raw.signer_pubkey, &tx_hash_bytes, context)
            .await?;

        let key_bytes =
            hex::decode(&raw.signer_pubkey).map_err(|_| SwapError::SignatureVerifyFailed)?;
        let key: [u8; 32] = key_bytes
            .clone()
            .try_into()
            .map_err(|_| SwapError::SignatureVerifyFailed)?;
        ed25519_dalek::VerifyingKey::from_bytes(&key)
            .map_err(|_| SwapError::SignatureVerifyFailed)?
            .verify(&tx_hash_bytes, &ed25519_dalek::Signature::from_bytes(&signature))
            .map_err(|_| SwapError::SignatureVerifyFailed)?;

        Ok(CardanoSignedTx {
            tx_cbor: encode_signed_tx(&raw.body_cbor, &key_bytes, &signature),
            tx_hash: raw.tx_hash.clone(),
            tx_index: raw.tx_index,
            assets_map: raw.assets_map.clone(),
        })
    }

    /// Chain the next build off this broadcast. Inclusion is not awaited
    /// before chaining; that is the accepted rollback risk.
    pub async fn apply_chaining_update(&self, signed: &CardanoSignedTx) {
        let mut chaining = self.chaining.lock().await;
        chaining.input_key.tx_hash = signed.tx_hash.clone();
        chaining.input_key.tx_index = signed.tx_index;
        chaining.assets_map = signed.assets_map.clone();
    }

    async fn broadcast(&self, signed: &CardanoSignedTx) -> Result<String, SwapError> {
        let urls = self.ctx.gateway_config().all_urls();
        let tx_hex = hex::encode(&signed.tx_cbor);
        let rpc = &self.rpc;
        let submitted = first_success(&urls, move |url| {
            let tx_hex = tx_hex.clone();
            async move {
                let response = rpc
                    .post_path(&url, "api/v0/tx/submit", &serde_json::json!({ "tx": tx_hex }))
                    .await?;
                response
                    .as_str()
                    .map(str::to_string)
                    .filter(|s| !s.is_empty())
                    .ok_or(SwapError::BroadcastTx)
            }
        })
        .await?;
        tracing::info!(txhash = %submitted, saved = %signed.tx_hash, "cardano submit tx");
        self.apply_chaining_update(signed).await;
        Ok(signed.tx_hash.clone())
    }
}

/// Enterprise address of an Ed25519 payment key.
pub fn public_key_hex_to_address(pubkey_hex: &str, testnet: bool) -> Result<String, SwapError> {
    let stripped = pubkey_hex.strip_prefix("0x").unwrap_or(pubkey_hex);
    let bytes = hex::decode(stripped)
        .map_err(|e| SwapError::WrongConfig(format!("bad public key hex: {e}")))?;
    let key_hash = Blake2b224::digest(&bytes);
    let (header, hrp) = if testnet {
        (0x60u8, "addr_test")
    } else {
        (0x61u8, "addr")
    };
    let mut payload = vec![header];
    payload.extend_from_slice(&key_hash);
    let hrp = bech32::Hrp::parse(hrp).map_err(|e| SwapError::WrongConfig(e.to_string()))?;
    bech32::encode::<bech32::Bech32>(hrp, &payload)
        .map_err(|e| SwapError::WrongConfig(e.to_string()))
}

#[async_trait::async_trait]
impl Bridge for CardanoBridge {
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
        self.build_swapin_tx(args).await.map(RawTransaction::Cardano)
    }

    async fn mpc_sign_transaction(
        &self,
        raw_tx: RawTransaction,
        args: &BuildTxArgs,
    ) -> Result<(SignedTransaction, String), SwapError> {
        let RawTransaction::Cardano(raw) = raw_tx else {
            return Err(SwapError::WrongRawTx);
        };
        let context = format!("{}:{}:{}", args.from_chain_id, args.swap_id, args.log_index);
        let signed = self.sign_tx(&raw, &context).await?;
        let tx_hash = signed.tx_hash.clone();
        Ok((SignedTransaction::Cardano(signed), tx_hash))
    }

    async fn send_transaction(&self, signed_tx: SignedTransaction) -> Result<String, SwapError> {
        let SignedTransaction::Cardano(signed) = signed_tx else {
            return Err(SwapError::WrongSignedTx);
        };
        self.broadcast(&signed).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use router_types::{MpcConfig, RouterRegistry};
    use std::collections::HashMap;

    fn test_bridge() -> CardanoBridge {
        let address = public_key_hex_to_address(&hex::encode([3u8; 32]), false).unwrap();
        let chain = ChainConfig {
            chain_id: get_stub_chain_id(Network::Mainnet),
            block_chain: "cardano".into(),
            router_contract: address,
            confirmations: 1,
            initial_height: 0,
            router_contract_overrides: HashMap::new(),
        };
        let gateway = GatewayConfig {
            api_address: vec!["http://127.0.0.1:3100".parse().unwrap()],
            api_address_ext: vec![],
            rpc_client_timeout: 10,
        };
        let ctx = BridgeContext::new(chain, gateway, vec![], Arc::new(RouterRegistry::new()));
        let mpc = MpcConfig {
            api_address: vec![],
            use_fast_mpc: false,
            sign_with_private_key: true,
            signer_private_keys: HashMap::new(),
            signer_public_keys: HashMap::new(),
            sign_timeout: 10,
        };
        CardanoBridge::new(ctx, Arc::new(SignerBackend::new(mpc).unwrap())).unwrap()
    }

    #[test]
    fn address_derivation_and_validation() {
        let address = public_key_hex_to_address(&hex::encode([9u8; 32]), false).unwrap();
        assert!(address.starts_with("addr1"));
        assert!(is_valid_address(&address));
        let testnet = public_key_hex_to_address(&hex::encode([9u8; 32]), true).unwrap();
        assert!(testnet.starts_with("addr_test1"));
        assert!(is_valid_address(&testnet));
        assert!(!is_valid_address("stake1notpayment"));
    }

    #[tokio::test]
    async fn chaining_state_updates_on_broadcast_success() {
        let bridge = test_bridge();
        bridge
            .seed_chaining(TransactionChaining {
                input_key: ChainingInputKey {
                    tx_hash: hex::encode([1u8; 32]),
                    tx_index: 0,
                },
                assets_map: BTreeMap::from([(LOVELACE.to_string(), "10000000".to_string())]),
            })
            .await;

        let signed = CardanoSignedTx {
            tx_cbor: vec![0x84],
            tx_hash: hex::encode([2u8; 32]),
            tx_index: 1,
            assets_map: BTreeMap::from([(LOVELACE.to_string(), "7000000".to_string())]),
        };
        bridge.apply_chaining_update(&signed).await;

        let state = bridge.chaining_state().await;
        assert_eq!(state.input_key.tx_hash, signed.tx_hash);
        assert_eq!(state.input_key.tx_index, 1);
        assert_eq!(state.assets_map, signed.assets_map);
    }

    #[test]
    fn tx_body_is_deterministic_cbor() {
        let input = ChainingInputKey {
            tx_hash: hex::encode([1u8; 32]),
            tx_index: 3,
        };
        let outputs = vec![(vec![0x61u8; 29], 5_000_000u64), (vec![0x62u8; 29], 1_000u64)];
        let body = encode_tx_body(&input, &outputs, DEFAULT_FEE_LOVELACE).unwrap();
        let again = encode_tx_body(&input, &outputs, DEFAULT_FEE_LOVELACE).unwrap();
        assert_eq!(body, again);
        // map(3) header
        assert_eq!(body[0], 0xa3);
        assert_eq!(
            hex::encode(Blake2b256::digest(&body)),
            hex::encode(Blake2b256::digest(&again))
        );
    }
}
