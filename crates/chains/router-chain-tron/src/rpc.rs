//! Tron wallet REST API client.
//!
//! Tron transactions are protobuf messages; the wallet REST endpoints
//! expose them as JSON plus `raw_data_hex`, which is what gets hashed and
//! signed. Broadcast re-wraps `raw_data_hex` and the signature into the
//! protobuf `Transaction` envelope by hand.

use std::time::Duration;

use serde::Deserialize;
use serde_json::json;
use url::Url;

use router_types::{GatewayConfig, SwapError};

#[derive(Debug, Clone, Deserialize)]
pub struct TronLog {
    /// 20-byte account hash, hex without the 0x41 tag.
    pub address: String,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub data: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TronReceipt {
    #[serde(default)]
    pub result: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TronTxInfo {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub block_number: u64,
    #[serde(default)]
    pub block_time_stamp: u64,
    #[serde(default)]
    pub receipt: Option<TronReceipt>,
    #[serde(default)]
    pub log: Vec<TronLog>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TronRet {
    #[serde(default, rename = "contractRet")]
    pub contract_ret: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TronContractValue {
    #[serde(default)]
    pub owner_address: String,
    #[serde(default)]
    pub contract_address: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TronContractParameter {
    pub value: TronContractValue,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TronContract {
    #[serde(rename = "type")]
    pub contract_type: String,
    pub parameter: TronContractParameter,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TronRawData {
    #[serde(default)]
    pub contract: Vec<TronContract>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TronTransaction {
    #[serde(default, rename = "txID")]
    pub tx_id: String,
    #[serde(default)]
    pub ret: Vec<TronRet>,
    pub raw_data: Option<TronRawData>,
    #[serde(default)]
    pub raw_data_hex: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TriggerResult {
    pub transaction: Option<TronTransaction>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BroadcastResult {
    #[serde(default)]
    pub result: bool,
    #[serde(default)]
    pub txid: String,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NowBlock {
    pub block_header: Option<NowBlockHeader>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NowBlockHeader {
    pub raw_data: Option<NowBlockRaw>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NowBlockRaw {
    #[serde(default)]
    pub number: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SmartContract {
    #[serde(default)]
    pub bytecode: String,
}

pub struct TronRpcClient {
    http: reqwest::Client,
    urls: Vec<Url>,
}

impl TronRpcClient {
    pub fn new(gateway: &GatewayConfig) -> Result<Self, SwapError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(gateway.rpc_client_timeout))
            .build()
            .map_err(SwapError::rpc)?;
        Ok(TronRpcClient {
            http,
            urls: gateway.all_urls(),
        })
    }

    async fn post<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> Result<T, SwapError> {
        let mut last_err = SwapError::RpcQuery("no gateway configured".into());
        for url in &self.urls {
            let endpoint = match url.join(path) {
                Ok(e) => e,
                Err(e) => {
                    last_err = SwapError::rpc(e);
                    continue;
                }
            };
            match self.http.post(endpoint).json(&body).send().await {
                Ok(response) => match response.json::<T>().await {
                    Ok(parsed) => return Ok(parsed),
                    Err(e) => last_err = SwapError::rpc(e),
                },
                Err(e) => last_err = SwapError::rpc(e),
            }
        }
        Err(last_err)
    }

    pub async fn get_transaction_info(&self, txid: &str) -> Result<TronTxInfo, SwapError> {
        self.post("wallet/gettransactioninfobyid", json!({ "value": txid }))
            .await
    }

    pub async fn get_transaction(&self, txid: &str) -> Result<TronTransaction, SwapError> {
        self.post("wallet/gettransactionbyid", json!({ "value": txid }))
            .await
    }

    pub async fn get_latest_block_number(&self) -> Result<u64, SwapError> {
        let block: NowBlock = self.post("wallet/getnowblock", json!({})).await?;
        block
            .block_header
            .and_then(|h| h.raw_data)
            .map(|r| r.number)
            .ok_or_else(|| SwapError::RpcQuery("getnowblock missing header".into()))
    }

    pub async fn get_contract_bytecode(&self, address_hex: &str) -> Result<Vec<u8>, SwapError> {
        let contract: SmartContract = self
            .post("wallet/getcontract", json!({ "value": address_hex }))
            .await?;
        hex::decode(&contract.bytecode).map_err(|_| SwapError::ParseDataError)
    }

    /// Build an unsigned contract call through the wallet node.
    pub async fn trigger_smart_contract(
        &self,
        owner_hex: &str,
        contract_hex: &str,
        function_selector: &str,
        parameter_hex: &str,
        fee_limit: u64,
    ) -> Result<TronTransaction, SwapError> {
        let result: TriggerResult = self
            .post(
                "wallet/triggersmartcontract",
                json!({
                    "owner_address": owner_hex,
                    "contract_address": contract_hex,
                    "function_selector": function_selector,
                    "parameter": parameter_hex,
                    "fee_limit": fee_limit,
                    "call_value": 0,
                }),
            )
            .await?;
        result
            .transaction
            .filter(|t| !t.raw_data_hex.is_empty())
            .ok_or_else(|| SwapError::RpcQuery("triggersmartcontract returned no tx".into()))
    }

    /// Broadcast a protobuf-encoded transaction, trying every gateway and
    /// returning on the first acceptance.
    pub async fn broadcast_hex(&self, tx_hex: &str) -> Result<String, SwapError> {
        let mut last_err = SwapError::BroadcastTx;
        for url in &self.urls {
            let endpoint = match url.join("wallet/broadcasthex") {
                Ok(e) => e,
                Err(e) => {
                    last_err = SwapError::rpc(e);
                    continue;
                }
            };
            let response = self
                .http
                .post(endpoint)
                .json(&json!({ "transaction": tx_hex }))
                .send()
                .await;
            match response {
                Ok(r) => match r.json::<BroadcastResult>().await {
                    Ok(result) if result.result => return Ok(result.txid),
                    Ok(result) => {
                        tracing::warn!(message = ?result.message, "tron broadcast rejected");
                        last_err = SwapError::BroadcastTx;
                    }
                    Err(e) => last_err = SwapError::rpc(e),
                },
                Err(e) => last_err = SwapError::rpc(e),
            }
        }
        Err(last_err)
    }
}

/// Protobuf `Transaction` envelope: field 1 `raw_data` (message), field 2
/// repeated `signature` (bytes).
pub fn encode_transaction_protobuf(raw_data: &[u8], signature: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(raw_data.len() + signature.len() + 8);
    out.push(0x0a); // field 1, wire type 2
    write_varint(&mut out, raw_data.len() as u64);
    out.extend_from_slice(raw_data);
    out.push(0x12); // field 2, wire type 2
    write_varint(&mut out, signature.len() as u64);
    out.extend_from_slice(signature);
    out
}

fn write_varint(out: &mut Vec<u8>, mut value: u64) {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            return;
        }
        out.push(byte | 0x80);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protobuf_envelope_layout() {
        let raw = vec![0xAAu8; 3];
        let sig = vec![0xBBu8; 65];
        let tx = encode_transaction_protobuf(&raw, &sig);
        assert_eq!(&tx[..2], &[0x0a, 3]);
        assert_eq!(&tx[2..5], raw.as_slice());
        assert_eq!(&tx[5..7], &[0x12, 65]);
        assert_eq!(&tx[7..], sig.as_slice());
    }

    #[test]
    fn varint_multibyte() {
        let mut out = Vec::new();
        write_varint(&mut out, 300);
        assert_eq!(out, vec![0xac, 0x02]);
    }
}
