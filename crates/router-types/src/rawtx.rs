//! Chain-native transaction payloads as closed tagged unions.
//!
//! The bridge trait is object-safe, so raw and signed transactions cross the
//! trait boundary as enums rather than associated types. Each adapter only
//! accepts its own variant and fails with `WrongRawTx` / `WrongSignedTx`
//! otherwise.

use std::collections::BTreeMap;

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};

/// Unsigned EVM legacy transaction fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvmRawTx {
    pub chain_id: u64,
    pub nonce: u64,
    pub gas_price: u128,
    pub gas_limit: u64,
    /// Recipient contract, 0x hex.
    pub to: String,
    pub value: U256,
    pub data: Vec<u8>,
}

/// Signed EVM transaction: 2718 envelope bytes plus the tx hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvmSignedTx {
    pub encoded: Vec<u8>,
    pub tx_hash: String,
}

/// Tron transaction as returned by the wallet REST API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TronRawTx {
    /// sha256 of the raw data, hex.
    pub txid: String,
    pub raw_data_hex: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TronSignedTx {
    pub txid: String,
    pub raw_data_hex: String,
    /// 65-byte rsv signature, hex.
    pub signature: String,
}

/// Cosmos DIRECT-mode transaction waiting for a secp256k1 signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CosmosRawTx {
    pub body_bytes: Vec<u8>,
    pub auth_info_bytes: Vec<u8>,
    pub chain_id: String,
    pub account_number: u64,
    pub sequence: u64,
    /// Compressed secp256k1 key, hex.
    pub signer_pubkey: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CosmosSignedTx {
    /// Broadcastable tx payload, base64.
    pub tx_bytes: String,
    pub tx_hash: String,
}

/// Serialized Solana message awaiting signatures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolanaRawTx {
    pub message: Vec<u8>,
    /// Required signer, base58.
    pub signer_pubkey: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolanaSignedTx {
    pub message: Vec<u8>,
    /// 64-byte signatures, order matching the message header.
    pub signatures: Vec<Vec<u8>>,
}

/// Ripple payment awaiting a signature over `STX\0 ‖ blob`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RippleRawTx {
    pub tx_json: String,
    /// Serialized signing payload without the prefix.
    pub signing_blob: Vec<u8>,
    pub signer_pubkey: String,
    pub sequence: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RippleSignedTx {
    pub tx_blob_hex: String,
    pub tx_hash: String,
}

/// Borsh-serialized NEAR transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NearRawTx {
    pub payload: Vec<u8>,
    pub signer_pubkey: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NearSignedTx {
    /// Borsh-serialized signed transaction.
    pub payload: Vec<u8>,
    pub tx_hash: String,
}

/// Aptos entry-function call plus its REST signing message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AptosRawTx {
    pub tx_json: String,
    pub signing_message: Vec<u8>,
    pub sender_pubkey: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AptosSignedTx {
    /// Submittable JSON body with the signature attached.
    pub submit_json: String,
    pub tx_hash: String,
}

/// Cardano transaction draft chained off the previous broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardanoRawTx {
    pub body_cbor: Vec<u8>,
    /// blake2b-256 of the body, hex.
    pub tx_hash: String,
    /// Output index of the change output the next build chains off.
    pub tx_index: u32,
    /// Remaining assets on the change output after this spend.
    pub assets_map: BTreeMap<String, String>,
    pub signer_pubkey: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardanoSignedTx {
    pub tx_cbor: Vec<u8>,
    pub tx_hash: String,
    pub tx_index: u32,
    pub assets_map: BTreeMap<String, String>,
}

/// IOTA message payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IotaRawTx {
    pub essence: Vec<u8>,
    pub signer_pubkey: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IotaSignedTx {
    pub message: Vec<u8>,
    pub message_id: String,
}

/// Single-input BTC spend draft.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BtcRawTx {
    /// Serialized unsigned transaction.
    pub unsigned: Vec<u8>,
    /// Sighash (double sha256) per input, 32 bytes each.
    pub sig_hashes: Vec<Vec<u8>>,
    pub signer_pubkey: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BtcSignedTx {
    pub raw_hex: String,
    pub tx_hash: String,
}

/// Stellar payment envelope awaiting a signature over the tagged hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StellarRawTx {
    pub envelope_xdr: Vec<u8>,
    /// The signing content: sha256 of network id, envelope type tag and tx.
    pub tx_hash: Vec<u8>,
    pub signer_pubkey: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StellarSignedTx {
    pub envelope_xdr_base64: String,
    pub tx_hash: String,
}

/// Flow transaction signed with a local P-256 key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowRawTx {
    pub script: String,
    pub arguments: Vec<String>,
    pub payer: String,
    pub envelope_message: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowSignedTx {
    pub payload: Vec<u8>,
    pub tx_hash: String,
}

/// Unsigned chain-native transaction, one variant per adapter family.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RawTransaction {
    Evm(EvmRawTx),
    Tron(TronRawTx),
    Cosmos(CosmosRawTx),
    Solana(SolanaRawTx),
    Ripple(RippleRawTx),
    Near(NearRawTx),
    Aptos(AptosRawTx),
    Cardano(CardanoRawTx),
    Iota(IotaRawTx),
    Btc(BtcRawTx),
    Stellar(StellarRawTx),
    Flow(FlowRawTx),
}

/// Signed chain-native transaction ready for broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignedTransaction {
    Evm(EvmSignedTx),
    Tron(TronSignedTx),
    Cosmos(CosmosSignedTx),
    Solana(SolanaSignedTx),
    Ripple(RippleSignedTx),
    Near(NearSignedTx),
    Aptos(AptosSignedTx),
    Cardano(CardanoSignedTx),
    Iota(IotaSignedTx),
    Btc(BtcSignedTx),
    Stellar(StellarSignedTx),
    Flow(FlowSignedTx),
}
