//! Bitcoin adapter.
//!
//! Deposits pay the router's P2PKH address with an `OP_RETURN` output
//! carrying `bind:toChainID`. Swap-ins spend a single router UTXO with a
//! legacy SIGHASH_ALL signature. Gateways speak the blockbook REST API.

use std::str::FromStr;
use std::sync::Arc;

use alloy_primitives::U256;
use ripemd::Ripemd160;
use serde_json::Value;
use sha2::{Digest, Sha256};

use router_mpc::SignerBackend;
use router_types::rawtx::{BtcRawTx, BtcSignedTx};
use router_types::{
    Bridge, BridgeContext, BuildTxArgs, ChainConfig, ChainId, GatewayConfig, Network,
    RawTransaction, SignedTransaction, SwapError, SwapTxInfo, SwapType, TokenConfig, VerifyArgs,
    check_swap_info, stub_chain_id, value::calc_swap_value,
};

use crate::broadcast::first_success;
use crate::rest::JsonRpcClient;

const P2PKH_VERSION: u8 = 0x00;
const P2SH_VERSION: u8 = 0x05;
const SIGHASH_ALL: u32 = 1;
const DEFAULT_FEE_SATS: u64 = 10_000;
/// Token table key for the single native asset.
const BTC_TOKEN_KEY: &str = "btc";

pub fn supports_chain_id(chain_id: &ChainId) -> bool {
    router_types::stub_chain_ids("BTC").contains(chain_id)
}

pub fn get_stub_chain_id(network: Network) -> ChainId {
    stub_chain_id("BTC", network)
}

fn hash160(data: &[u8]) -> [u8; 20] {
    Ripemd160::digest(Sha256::digest(data)).into()
}

fn sha256d(data: &[u8]) -> [u8; 32] {
    Sha256::digest(Sha256::digest(data)).into()
}

/// Base58check P2PKH/P2SH, or segwit bech32 (`bc1…`).
pub fn is_valid_address(address: &str) -> bool {
    if let Ok(bytes) = bs58::decode(address).with_check(None).into_vec() {
        return bytes.len() == 21 && (bytes[0] == P2PKH_VERSION || bytes[0] == P2SH_VERSION);
    }
    matches!(
        bech32::segwit::decode(address),
        Ok((hrp, _version, program))
            if hrp.as_str() == "bc" && (program.len() == 20 || program.len() == 32)
    )
}

pub fn public_key_hex_to_address(pubkey_hex: &str) -> Result<String, SwapError> {
    let stripped = pubkey_hex.strip_prefix("0x").unwrap_or(pubkey_hex);
    let pubkey = hex::decode(stripped)
        .map_err(|e| SwapError::WrongConfig(format!("bad public key hex: {e}")))?;
    let mut payload = vec![P2PKH_VERSION];
    payload.extend_from_slice(&hash160(&pubkey));
    Ok(bs58::encode(payload).with_check().into_string())
}

fn script_pubkey_for(address: &str) -> Result<Vec<u8>, SwapError> {
    let Ok(bytes) = bs58::decode(address).with_check(None).into_vec() else {
        // segwit v0: OP_0 <program>
        let (hrp, version, program) =
            bech32::segwit::decode(address).map_err(|_| SwapError::WrongBindAddress)?;
        if hrp.as_str() != "bc" || version.to_u8() != 0 {
            return Err(SwapError::WrongBindAddress);
        }
        let mut script = vec![0x00, program.len() as u8];
        script.extend_from_slice(&program);
        return Ok(script);
    };
    if bytes.len() != 21 {
        return Err(SwapError::WrongBindAddress);
    }
    Ok(match bytes[0] {
        // OP_DUP OP_HASH160 <20> OP_EQUALVERIFY OP_CHECKSIG
        P2PKH_VERSION => {
            let mut script = vec![0x76, 0xa9, 0x14];
            script.extend_from_slice(&bytes[1..]);
            script.extend_from_slice(&[0x88, 0xac]);
            script
        }
        // OP_HASH160 <20> OP_EQUAL
        P2SH_VERSION => {
            let mut script = vec![0xa9, 0x14];
            script.extend_from_slice(&bytes[1..]);
            script.push(0x87);
            script
        }
        _ => return Err(SwapError::WrongBindAddress),
    })
}

fn push_varint(out: &mut Vec<u8>, value: u64) {
    match value {
        0..=0xfc => out.push(value as u8),
        0xfd..=0xffff => {
            out.push(0xfd);
            out.extend_from_slice(&(value as u16).to_le_bytes());
        }
        _ => {
            out.push(0xfe);
            out.extend_from_slice(&(value as u32).to_le_bytes());
        }
    }
}

struct TxInput {
    txid: [u8; 32],
    vout: u32,
    script: Vec<u8>,
}

struct TxOutput {
    value: u64,
    script: Vec<u8>,
}

fn serialize_tx(inputs: &[TxInput], outputs: &[TxOutput]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&1u32.to_le_bytes()); // version
    push_varint(&mut out, inputs.len() as u64);
    for input in inputs {
        let mut txid = input.txid;
        txid.reverse(); // little-endian on the wire
        out.extend_from_slice(&txid);
        out.extend_from_slice(&input.vout.to_le_bytes());
        push_varint(&mut out, input.script.len() as u64);
        out.extend_from_slice(&input.script);
        out.extend_from_slice(&0xffff_ffffu32.to_le_bytes()); // sequence
    }
    push_varint(&mut out, outputs.len() as u64);
    for output in outputs {
        out.extend_from_slice(&output.value.to_le_bytes());
        push_varint(&mut out, output.script.len() as u64);
        out.extend_from_slice(&output.script);
    }
    out.extend_from_slice(&0u32.to_le_bytes()); // locktime
    out
}

pub struct BtcBridge {
    ctx: BridgeContext,
    rpc: JsonRpcClient,
    signer: Arc<SignerBackend>,
}

impl BtcBridge {
    pub fn new(ctx: BridgeContext, signer: Arc<SignerBackend>) -> Result<Self, SwapError> {
        let rpc = JsonRpcClient::new(ctx.gateway_config())?;
        Ok(BtcBridge { ctx, rpc, signer })
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
            .get_first(&format!("api/v2/tx/{}", swap_info.hash))
            .await
            .map_err(|_| SwapError::TxNotFound)?;
        let height = tx
            .get("blockHeight")
            .and_then(Value::as_u64)
            .unwrap_or_default();
        if height == 0 {
            if !allow_unstable {
                return Err(SwapError::TxNotStable);
            }
        } else if height < self.ctx.chain_config().initial_height {
            return Err(SwapError::TxBeforeInitialHeight);
        }
        swap_info.height = height;
        swap_info.timestamp = tx
            .get("blockTime")
            .and_then(Value::as_u64)
            .unwrap_or_default();
        if !allow_unstable {
            let confirmations = tx
                .get("confirmations")
                .and_then(Value::as_u64)
                .unwrap_or_default();
            if confirmations < self.ctx.chain_config().confirmations {
                return Err(SwapError::TxNotStable);
            }
        }

        let router = &self.ctx.chain_config().router_contract;
        let vout = tx
            .get("vout")
            .and_then(Value::as_array)
            .ok_or(SwapError::SwapoutLogNotFound)?;
        let mut value = U256::ZERO;
        let mut memo = None;
        for output in vout {
            let addresses = output
                .get("addresses")
                .and_then(Value::as_array)
                .map(|a| {
                    a.iter()
                        .filter_map(Value::as_str)
                        .collect::<Vec<_>>()
                })
                .unwrap_or_default();
            if addresses.contains(&router.as_str()) {
                let amount = output
                    .get("value")
                    .and_then(Value::as_str)
                    .ok_or(SwapError::TxWithWrongValue)?;
                value += U256::from_str(amount).map_err(|_| SwapError::TxWithWrongValue)?;
                continue;
            }
            // OP_RETURN output: 6a <len> <payload>
            if let Some(script) = output.get("hex").and_then(Value::as_str)
                && let Some(payload) = script.strip_prefix("6a")
                && payload.len() > 2
                && let Ok(bytes) = hex::decode(&payload[2..])
                && let Ok(text) = String::from_utf8(bytes)
            {
                memo = Some(text);
            }
        }
        if value.is_zero() {
            return Err(SwapError::SwapoutLogNotFound);
        }
        swap_info.value = value;
        swap_info.to = router.clone();
        swap_info.tx_to = router.clone();
        swap_info.from = tx
            .pointer("/vin/0/addresses/0")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let memo = memo.ok_or(SwapError::SwapoutLogNotFound)?;
        let (bind, to_chain_id) = memo
            .rsplit_once(':')
            .ok_or(SwapError::SwapoutLogNotFound)?;
        swap_info.bind = bind.to_string();
        swap_info.to_chain_id = to_chain_id
            .parse()
            .map_err(|_| SwapError::SwapoutLogNotFound)?;

        let token_cfg = self
            .ctx
            .get_token_config(BTC_TOKEN_KEY)
            .ok_or(SwapError::MissTokenConfig)?;
        swap_info.erc20_swap_info.token = token_cfg.contract_address.clone();
        swap_info.erc20_swap_info.token_id = token_cfg.token_id;

        check_swap_info(self.ctx.registry(), self, &swap_info)?;
        Ok(swap_info)
    }

    async fn build_swapin_tx(&self, args: &BuildTxArgs) -> Result<BtcRawTx, SwapError> {
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
        let sats: u64 = amount.try_into().map_err(|_| SwapError::TxWithWrongValue)?;

        let descriptor = self.signer.public_key(&self.ctx.chain_id())?;
        let sender = public_key_hex_to_address(&descriptor.pubkey_hex)?;

        // largest confirmed UTXO funds the spend
        let utxos: Value = self
            .rpc
            .get_first(&format!("api/v2/utxo/{sender}"))
            .await?;
        let utxo = utxos
            .as_array()
            .and_then(|list| {
                list.iter().max_by_key(|u| {
                    u.get("value")
                        .and_then(Value::as_str)
                        .and_then(|v| v.parse::<u64>().ok())
                        .unwrap_or(0)
                })
            })
            .ok_or(SwapError::TxWithWrongValue)?;
        let utxo_value: u64 = utxo
            .get("value")
            .and_then(Value::as_str)
            .and_then(|v| v.parse().ok())
            .ok_or(SwapError::TxWithWrongValue)?;
        let needed = sats + DEFAULT_FEE_SATS;
        if utxo_value < needed {
            return Err(SwapError::TxWithWrongValue);
        }
        let txid_hex = utxo
            .get("txid")
            .and_then(Value::as_str)
            .ok_or(SwapError::ParseDataError)?;
        let txid: [u8; 32] = hex::decode(txid_hex)
            .map_err(|_| SwapError::ParseDataError)?
            .try_into()
            .map_err(|_| SwapError::ParseDataError)?;
        let vout = utxo.get("vout").and_then(Value::as_u64).unwrap_or(0) as u32;

        let outputs = vec![
            TxOutput {
                value: sats,
                script: script_pubkey_for(&args.bind)?,
            },
            TxOutput {
                value: utxo_value - needed,
                script: script_pubkey_for(&sender)?,
            },
        ];

        // sighash preimage: input script replaced by the spent scriptPubKey
        let sender_script = script_pubkey_for(&sender)?;
        let mut preimage = serialize_tx(
            &[TxInput {
                txid,
                vout,
                script: sender_script,
            }],
            &outputs,
        );
        preimage.extend_from_slice(&SIGHASH_ALL.to_le_bytes());
        let sig_hash = sha256d(&preimage);

        let unsigned = serialize_tx(
            &[TxInput {
                txid,
                vout,
                script: Vec::new(),
            }],
            &outputs,
        );
        Ok(BtcRawTx {
            unsigned,
            sig_hashes: vec![sig_hash.to_vec()],
            signer_pubkey: descriptor.pubkey_hex,
        })
    }

    async fn sign_tx(&self, raw: &BtcRawTx, context: &str) -> Result<BtcSignedTx, SwapError> {
        let sig_hash: [u8; 32] = raw
            .sig_hashes
            .first()
            .and_then(|h| h.as_slice().try_into().ok())
            .ok_or(SwapError::WrongRawTx)?;
        let rsv = self
            .signer
            .sign_ec(&self.ctx.chain_id(), &raw.signer_pubkey, &sig_hash, context)
            .await?;
        let der = crate::der::der_encode_signature(&rsv[..64])?;

        // scriptSig: <der ‖ hashtype> <pubkey>
        let pubkey = hex::decode(&raw.signer_pubkey)
            .map_err(|_| SwapError::SignatureVerifyFailed)?;
        let mut script = Vec::new();
        script.push((der.len() + 1) as u8);
        script.extend_from_slice(&der);
        script.push(SIGHASH_ALL as u8);
        script.push(pubkey.len() as u8);
        script.extend_from_slice(&pubkey);

        // splice the script into the single input of the unsigned tx
        let unsigned = &raw.unsigned;
        if unsigned.len() < 42 {
            return Err(SwapError::WrongRawTx);
        }
        let mut signed = Vec::with_capacity(unsigned.len() + script.len());
        // version(4) + input count(1) + txid(32) + vout(4)
        signed.extend_from_slice(&unsigned[..41]);
        push_varint(&mut signed, script.len() as u64);
        signed.extend_from_slice(&script);
        // skip the empty script length byte of the unsigned form
        signed.extend_from_slice(&unsigned[42..]);

        let mut tx_hash = sha256d(&signed);
        tx_hash.reverse();
        Ok(BtcSignedTx {
            raw_hex: hex::encode(&signed),
            tx_hash: hex::encode(tx_hash),
        })
    }

    async fn broadcast(&self, signed: &BtcSignedTx) -> Result<String, SwapError> {
        let urls = self.ctx.gateway_config().all_urls();
        let rpc = &self.rpc;
        let raw_hex = &signed.raw_hex;
        first_success(&urls, move |url| async move {
            let response = rpc
                .post_path(&url, "api/v2/sendtx/", &Value::String(raw_hex.clone()))
                .await?;
            response
                .pointer("/result")
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or(SwapError::BroadcastTx)
        })
        .await
    }
}

#[async_trait::async_trait]
impl Bridge for BtcBridge {
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
        self.build_swapin_tx(args).await.map(RawTransaction::Btc)
    }

    async fn mpc_sign_transaction(
        &self,
        raw_tx: RawTransaction,
        args: &BuildTxArgs,
    ) -> Result<(SignedTransaction, String), SwapError> {
        let RawTransaction::Btc(raw) = raw_tx else {
            return Err(SwapError::WrongRawTx);
        };
        let context = format!("{}:{}:{}", args.from_chain_id, args.swap_id, args.log_index);
        let signed = self.sign_tx(&raw, &context).await?;
        let tx_hash = signed.tx_hash.clone();
        Ok((SignedTransaction::Btc(signed), tx_hash))
    }

    async fn send_transaction(&self, signed_tx: SignedTransaction) -> Result<String, SwapError> {
        let SignedTransaction::Btc(signed) = signed_tx else {
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
        // genesis coinbase address
        assert!(is_valid_address("1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa"));
        assert!(!is_valid_address("1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNb"));
        assert!(!is_valid_address("0x1111111111111111111111111111111111111111"));
    }

    #[test]
    fn pubkey_address_roundtrip() {
        let pubkey = "0279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798";
        let address = public_key_hex_to_address(pubkey).unwrap();
        assert!(is_valid_address(&address));
        assert!(address.starts_with('1'));
    }

    #[test]
    fn script_pubkey_shapes() {
        let p2pkh = script_pubkey_for("1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa").unwrap();
        assert_eq!(p2pkh.len(), 25);
        assert_eq!(p2pkh[0], 0x76);
        assert_eq!(*p2pkh.last().unwrap(), 0xac);
    }

    #[test]
    fn tx_serialization_layout() {
        let inputs = vec![TxInput {
            txid: [1u8; 32],
            vout: 2,
            script: vec![],
        }];
        let outputs = vec![TxOutput {
            value: 5000,
            script: vec![0x76, 0xa9],
        }];
        let tx = serialize_tx(&inputs, &outputs);
        assert_eq!(&tx[..4], &1u32.to_le_bytes());
        assert_eq!(tx[4], 1); // one input
        // txid is little-endian on the wire
        assert_eq!(&tx[5..37], &[1u8; 32]);
        assert_eq!(&tx[37..41], &2u32.to_le_bytes());
        assert_eq!(tx[41], 0); // empty script
        assert_eq!(&tx[tx.len() - 4..], &0u32.to_le_bytes());
    }
}
