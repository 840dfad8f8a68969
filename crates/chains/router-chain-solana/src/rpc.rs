//! Solana JSON-RPC client over the configured gateways.

use std::time::Duration;

use serde::Deserialize;
use serde_json::{Value, json};
use url::Url;

use router_types::{GatewayConfig, SwapError};

#[derive(Debug, Clone, Deserialize)]
pub struct RpcMessageHeader {
    #[serde(rename = "numRequiredSignatures")]
    pub num_required_signatures: u8,
    #[serde(rename = "numReadonlySignedAccounts")]
    pub num_readonly_signed_accounts: u8,
    #[serde(rename = "numReadonlyUnsignedAccounts")]
    pub num_readonly_unsigned_accounts: u8,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RpcInstruction {
    #[serde(rename = "programIdIndex")]
    pub program_id_index: usize,
    #[serde(default)]
    pub accounts: Vec<usize>,
    /// base58-encoded instruction data
    #[serde(default)]
    pub data: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RpcMessage {
    #[serde(rename = "accountKeys")]
    pub account_keys: Vec<String>,
    pub header: RpcMessageHeader,
    #[serde(default)]
    pub instructions: Vec<RpcInstruction>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RpcInnerTransaction {
    pub message: RpcMessage,
    #[serde(default)]
    pub signatures: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RpcTransactionMeta {
    pub err: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RpcConfirmedTransaction {
    pub slot: u64,
    #[serde(rename = "blockTime")]
    pub block_time: Option<i64>,
    pub transaction: RpcInnerTransaction,
    pub meta: Option<RpcTransactionMeta>,
}

#[derive(Debug, Clone, Deserialize)]
struct RpcError {
    message: String,
}

#[derive(Debug, Clone, Deserialize)]
struct RpcEnvelope<T> {
    result: Option<T>,
    error: Option<RpcError>,
}

pub struct SolanaRpcClient {
    http: reqwest::Client,
    urls: Vec<Url>,
}

impl SolanaRpcClient {
    pub fn new(gateway: &GatewayConfig) -> Result<Self, SwapError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(gateway.rpc_client_timeout))
            .build()
            .map_err(SwapError::rpc)?;
        Ok(SolanaRpcClient {
            http,
            urls: gateway.all_urls(),
        })
    }

    async fn call<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<T, SwapError> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });
        let mut last_err = SwapError::RpcQuery("no gateway configured".into());
        for url in &self.urls {
            match self.http.post(url.clone()).json(&body).send().await {
                Ok(response) => match response.json::<RpcEnvelope<T>>().await {
                    Ok(envelope) => {
                        if let Some(error) = envelope.error {
                            last_err = SwapError::RpcQuery(error.message);
                            continue;
                        }
                        if let Some(result) = envelope.result {
                            return Ok(result);
                        }
                        last_err = SwapError::TxNotFound;
                    }
                    Err(e) => last_err = SwapError::rpc(e),
                },
                Err(e) => last_err = SwapError::rpc(e),
            }
        }
        Err(last_err)
    }

    pub async fn get_latest_blockhash(&self) -> Result<[u8; 32], SwapError> {
        #[derive(Deserialize)]
        struct BlockhashValue {
            blockhash: String,
        }
        #[derive(Deserialize)]
        struct BlockhashResult {
            value: BlockhashValue,
        }
        let result: BlockhashResult = self
            .call(
                "getLatestBlockhash",
                json!([{ "commitment": "finalized" }]),
            )
            .await?;
        let bytes = bs58::decode(&result.value.blockhash)
            .into_vec()
            .map_err(|_| SwapError::ParseDataError)?;
        bytes.try_into().map_err(|_| SwapError::ParseDataError)
    }

    pub async fn get_slot(&self) -> Result<u64, SwapError> {
        self.call("getSlot", json!([{ "commitment": "finalized" }]))
            .await
    }

    pub async fn get_transaction(
        &self,
        signature: &str,
    ) -> Result<RpcConfirmedTransaction, SwapError> {
        self.call(
            "getTransaction",
            json!([
                signature,
                {
                    "encoding": "json",
                    "commitment": "confirmed",
                    "maxSupportedTransactionVersion": 0,
                }
            ]),
        )
        .await
    }

    /// Submit a base64 transaction, first acceptance wins.
    pub async fn send_transaction(&self, tx_base64: &str) -> Result<String, SwapError> {
        let params = json!([
            tx_base64,
            { "encoding": "base64", "skipPreflight": true }
        ]);
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "sendTransaction",
            "params": params,
        });
        let mut last_err = SwapError::BroadcastTx;
        for url in &self.urls {
            match self.http.post(url.clone()).json(&body).send().await {
                Ok(response) => match response.json::<RpcEnvelope<String>>().await {
                    Ok(envelope) => {
                        if let Some(signature) = envelope.result {
                            return Ok(signature);
                        }
                        if let Some(error) = envelope.error {
                            tracing::warn!(error = %error.message, "solana send rejected");
                            last_err = SwapError::RpcQuery(error.message);
                        }
                    }
                    Err(e) => last_err = SwapError::rpc(e),
                },
                Err(e) => last_err = SwapError::rpc(e),
            }
        }
        Err(last_err)
    }
}
