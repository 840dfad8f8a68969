//! Cosmos LCD (REST) client.

use std::time::Duration;

use serde::Deserialize;
use serde_json::json;
use url::Url;

use router_types::{GatewayConfig, SwapError};

#[derive(Debug, Clone, Deserialize)]
pub struct EventAttribute {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub attributes: Vec<EventAttribute>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TxLog {
    #[serde(default)]
    pub events: Vec<Event>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TxResponse {
    #[serde(default)]
    pub height: String,
    #[serde(default)]
    pub txhash: String,
    #[serde(default)]
    pub code: u32,
    #[serde(default)]
    pub logs: Vec<TxLog>,
    #[serde(default)]
    pub timestamp: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TxBody {
    #[serde(default)]
    pub memo: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Tx {
    pub body: Option<TxBody>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GetTxResult {
    pub tx: Option<Tx>,
    pub tx_response: Option<TxResponse>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BlockHeader {
    #[serde(default)]
    pub height: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Block {
    pub header: Option<BlockHeader>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LatestBlockResult {
    pub block: Option<Block>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BaseAccount {
    #[serde(default)]
    pub account_number: String,
    #[serde(default)]
    pub sequence: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccountResult {
    pub account: Option<AccountEnvelope>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccountEnvelope {
    // vesting and module accounts nest the base account
    pub base_account: Option<BaseAccount>,
    #[serde(default)]
    pub account_number: Option<String>,
    #[serde(default)]
    pub sequence: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NodeInfoResult {
    pub default_node_info: Option<DefaultNodeInfo>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DefaultNodeInfo {
    #[serde(default)]
    pub network: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BroadcastResult {
    pub tx_response: Option<TxResponse>,
}

pub struct CosmosRpcClient {
    http: reqwest::Client,
    urls: Vec<Url>,
}

impl CosmosRpcClient {
    pub fn new(gateway: &GatewayConfig) -> Result<Self, SwapError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(gateway.rpc_client_timeout))
            .build()
            .map_err(SwapError::rpc)?;
        Ok(CosmosRpcClient {
            http,
            urls: gateway.all_urls(),
        })
    }

    async fn get<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, SwapError> {
        let mut last_err = SwapError::RpcQuery("no gateway configured".into());
        for url in &self.urls {
            let endpoint = match url.join(path) {
                Ok(e) => e,
                Err(e) => {
                    last_err = SwapError::rpc(e);
                    continue;
                }
            };
            match self.http.get(endpoint).send().await {
                Ok(response) => match response.json::<T>().await {
                    Ok(parsed) => return Ok(parsed),
                    Err(e) => last_err = SwapError::rpc(e),
                },
                Err(e) => last_err = SwapError::rpc(e),
            }
        }
        Err(last_err)
    }

    pub async fn get_transaction(&self, tx_hash: &str) -> Result<GetTxResult, SwapError> {
        self.get(&format!("cosmos/tx/v1beta1/txs/{tx_hash}")).await
    }

    pub async fn get_latest_block_height(&self) -> Result<u64, SwapError> {
        let result: LatestBlockResult = self
            .get("cosmos/base/tendermint/v1beta1/blocks/latest")
            .await?;
        result
            .block
            .and_then(|b| b.header)
            .and_then(|h| h.height.parse().ok())
            .ok_or_else(|| SwapError::RpcQuery("latest block missing height".into()))
    }

    pub async fn get_chain_id(&self) -> Result<String, SwapError> {
        let result: NodeInfoResult = self
            .get("cosmos/base/tendermint/v1beta1/node_info")
            .await?;
        result
            .default_node_info
            .map(|n| n.network)
            .filter(|n| !n.is_empty())
            .ok_or_else(|| SwapError::RpcQuery("node info missing network".into()))
    }

    pub async fn get_account(&self, address: &str) -> Result<(u64, u64), SwapError> {
        let result: AccountResult = self
            .get(&format!("cosmos/auth/v1beta1/accounts/{address}"))
            .await?;
        let envelope = result
            .account
            .ok_or_else(|| SwapError::RpcQuery("account not found".into()))?;
        let (number, sequence) = match envelope.base_account {
            Some(base) => (base.account_number, base.sequence),
            None => (
                envelope.account_number.unwrap_or_default(),
                envelope.sequence.unwrap_or_default(),
            ),
        };
        Ok((
            number.parse().unwrap_or_default(),
            sequence.parse().unwrap_or_default(),
        ))
    }

    /// Broadcast in sync mode, trying every gateway; first acceptance wins.
    pub async fn broadcast_tx(&self, tx_bytes_base64: &str) -> Result<String, SwapError> {
        let body = json!({
            "tx_bytes": tx_bytes_base64,
            "mode": "BROADCAST_MODE_SYNC",
        });
        let mut last_err = SwapError::BroadcastTx;
        for url in &self.urls {
            let endpoint = match url.join("cosmos/tx/v1beta1/txs") {
                Ok(e) => e,
                Err(e) => {
                    last_err = SwapError::rpc(e);
                    continue;
                }
            };
            match self.http.post(endpoint).json(&body).send().await {
                Ok(response) => match response.json::<BroadcastResult>().await {
                    Ok(result) => match result.tx_response {
                        Some(tx_response) if tx_response.code == 0 => {
                            return Ok(tx_response.txhash);
                        }
                        Some(tx_response) => {
                            tracing::warn!(code = tx_response.code, "cosmos broadcast rejected");
                            last_err = SwapError::BroadcastTx;
                        }
                        None => last_err = SwapError::BroadcastTx,
                    },
                    Err(e) => last_err = SwapError::rpc(e),
                },
                Err(e) => last_err = SwapError::rpc(e),
            }
        }
        Err(last_err)
    }
}
