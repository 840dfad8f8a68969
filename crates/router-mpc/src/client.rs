//! HTTP client for the external MPC threshold-signing service.
//!
//! The network protocol behind these two calls (keygen, session management,
//! acceptance voting) lives in the MPC service itself; the router only ever
//! asks it to sign one hash (ECDSA) or one message (Ed25519) and demands
//! exactly one `rsv` back.

use std::time::Duration;

use serde::Deserialize;
use serde_json::json;
use url::Url;

use router_types::{MpcConfig, SwapError};

/// Result of one signing session: the MPC key ID and the produced
/// signatures.
#[derive(Debug, Clone, Deserialize)]
pub struct SignResult {
    pub key_id: String,
    pub rsvs: Vec<String>,
}

/// Thin JSON-RPC client over the configured MPC gateway endpoints.
pub struct MpcClient {
    http: reqwest::Client,
    api_address: Vec<Url>,
    use_fast_mpc: bool,
}

impl MpcClient {
    pub fn new(config: &MpcConfig) -> Result<Self, SwapError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.sign_timeout))
            .build()
            .map_err(SwapError::rpc)?;
        Ok(MpcClient {
            http,
            api_address: config.api_address.clone(),
            use_fast_mpc: config.use_fast_mpc,
        })
    }

    fn method(&self, name: &str) -> String {
        if self.use_fast_mpc {
            format!("fastmpc_{name}")
        } else {
            format!("mpc_{name}")
        }
    }

    async fn call_sign(
        &self,
        curve: &str,
        pubkey_hex: &str,
        content_hex: &str,
        context: &str,
    ) -> Result<SignResult, SwapError> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": self.method("signOne"),
            "params": [{
                "curve": curve,
                "pubkey": pubkey_hex,
                "content": content_hex,
                "context": context,
            }],
        });

        #[derive(Deserialize)]
        struct RpcError {
            message: String,
        }
        #[derive(Deserialize)]
        struct RpcResponse {
            result: Option<SignResult>,
            error: Option<RpcError>,
        }

        let mut last_err = SwapError::MpcSign("no mpc endpoint reachable".into());
        for url in &self.api_address {
            let response = match self.http.post(url.clone()).json(&body).send().await {
                Ok(r) => r,
                Err(e) => {
                    tracing::warn!(url = %url, error = %e, "mpc sign request failed");
                    last_err = SwapError::rpc(e);
                    continue;
                }
            };
            let parsed: RpcResponse = match response.json().await {
                Ok(p) => p,
                Err(e) => {
                    last_err = SwapError::rpc(e);
                    continue;
                }
            };
            if let Some(err) = parsed.error {
                last_err = SwapError::MpcSign(err.message);
                continue;
            }
            if let Some(result) = parsed.result {
                return Ok(result);
            }
            last_err = SwapError::MpcSign("empty mpc response".into());
        }
        Err(last_err)
    }

    /// Request one ECDSA (secp256k1) signature over a 32-byte hash.
    ///
    /// Returns the key ID and the single `rsv`; more than one rsv is a
    /// fatal protocol violation.
    pub async fn sign_one_ec(
        &self,
        pubkey_hex: &str,
        sign_hash_hex: &str,
        context: &str,
    ) -> Result<(String, String), SwapError> {
        let result = self
            .call_sign("secp256k1", pubkey_hex, sign_hash_hex, context)
            .await?;
        require_one_rsv(result)
    }

    /// Request one Ed25519 signature over a hex-encoded message. The pubkey
    /// is the pure 32-byte key hex (no `0xED` tag); the MPC service
    /// hex-decodes the content before signing.
    pub async fn sign_one_ed(
        &self,
        pubkey_hex: &str,
        sign_content_hex: &str,
        context: &str,
    ) -> Result<(String, String), SwapError> {
        let result = self
            .call_sign("ed25519", pubkey_hex, sign_content_hex, context)
            .await?;
        require_one_rsv(result)
    }
}

fn require_one_rsv(result: SignResult) -> Result<(String, String), SwapError> {
    let SignResult { key_id, mut rsvs } = result;
    if rsvs.len() != 1 {
        tracing::error!(key_id = %key_id, count = rsvs.len(), "mpc returned wrong rsv count");
        return Err(SwapError::MultipleRsv);
    }
    Ok((key_id, rsvs.remove(0)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_rsv_accepted() {
        let result = SignResult {
            key_id: "k".into(),
            rsvs: vec!["aa".into()],
        };
        let (key_id, rsv) = require_one_rsv(result).unwrap();
        assert_eq!(key_id, "k");
        assert_eq!(rsv, "aa");
    }

    #[test]
    fn many_rsvs_are_a_protocol_error() {
        let result = SignResult {
            key_id: "k".into(),
            rsvs: vec!["aa".into(), "bb".into()],
        };
        let err = require_one_rsv(result).unwrap_err();
        assert_eq!(err, SwapError::MultipleRsv);
        assert_eq!(
            err.to_string(),
            "get sign status require one rsv but return many"
        );
    }

    #[test]
    fn zero_rsvs_are_a_protocol_error() {
        let result = SignResult {
            key_id: "k".into(),
            rsvs: vec![],
        };
        assert_eq!(require_one_rsv(result).unwrap_err(), SwapError::MultipleRsv);
    }
}
