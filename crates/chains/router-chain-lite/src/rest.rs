//! Shared HTTP plumbing for the long-tail adapters: JSON POST/GET against
//! the gateway list with first-working-URL fallback for reads.

use std::time::Duration;

use serde_json::Value;
use url::Url;

use router_types::{GatewayConfig, SwapError};

pub struct JsonRpcClient {
    http: reqwest::Client,
    urls: Vec<Url>,
}

impl JsonRpcClient {
    pub fn new(gateway: &GatewayConfig) -> Result<Self, SwapError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(gateway.rpc_client_timeout))
            .build()
            .map_err(SwapError::rpc)?;
        Ok(JsonRpcClient {
            http,
            urls: gateway.all_urls(),
        })
    }

    pub fn urls(&self) -> &[Url] {
        &self.urls
    }

    /// POST `body` to the given URL and return the parsed JSON response.
    pub async fn call_url(&self, url: &Url, body: &Value) -> Result<Value, SwapError> {
        let response = self
            .http
            .post(url.clone())
            .json(body)
            .send()
            .await
            .map_err(SwapError::rpc)?;
        response.json().await.map_err(SwapError::rpc)
    }

    /// POST `body` to each gateway in order, returning the first parsed
    /// response.
    pub async fn call_first(&self, body: &Value) -> Result<Value, SwapError> {
        let mut last_err = SwapError::RpcQuery("no gateway configured".into());
        for url in &self.urls {
            match self.call_url(url, body).await {
                Ok(value) => return Ok(value),
                Err(e) => last_err = e,
            }
        }
        Err(last_err)
    }

    /// GET `path` (joined onto each gateway) returning the first parsed
    /// response.
    pub async fn get_first(&self, path: &str) -> Result<Value, SwapError> {
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
                Ok(response) => match response.json().await {
                    Ok(value) => return Ok(value),
                    Err(e) => last_err = SwapError::rpc(e),
                },
                Err(e) => last_err = SwapError::rpc(e),
            }
        }
        Err(last_err)
    }

    /// POST `body` to `path` joined onto each gateway, returning the first
    /// parsed response.
    pub async fn call_first_path(&self, path: &str, body: &Value) -> Result<Value, SwapError> {
        let mut last_err = SwapError::RpcQuery("no gateway configured".into());
        for url in &self.urls {
            match self.post_path(url, path, body).await {
                Ok(value) => return Ok(value),
                Err(e) => last_err = e,
            }
        }
        Err(last_err)
    }

    /// POST `body` to `path` on a specific gateway URL.
    pub async fn post_path(
        &self,
        url: &Url,
        path: &str,
        body: &Value,
    ) -> Result<Value, SwapError> {
        let endpoint = url.join(path).map_err(SwapError::rpc)?;
        let response = self
            .http
            .post(endpoint)
            .json(body)
            .send()
            .await
            .map_err(SwapError::rpc)?;
        response.json().await.map_err(SwapError::rpc)
    }
}
