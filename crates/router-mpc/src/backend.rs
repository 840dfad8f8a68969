//! Signing backend handed to every chain adapter.
//!
//! Dispatches between the MPC network and configured local keys. The
//! adapters stay in charge of what gets signed (per-chain prehash vs
//! prefix-message quirks) and of verifying the returned signature before
//! embedding it into a chain-native envelope.

use router_types::{ChainId, MpcConfig, SwapError};

use crate::client::MpcClient;
use crate::key::{KeyDescriptor, SigningCurve, format_public_key_to_pure_hex};
use crate::local;

pub struct SignerBackend {
    config: MpcConfig,
    client: Option<MpcClient>,
}

impl SignerBackend {
    pub fn new(config: MpcConfig) -> Result<Self, SwapError> {
        let client = if config.sign_with_private_key {
            None
        } else {
            Some(MpcClient::new(&config)?)
        };
        Ok(SignerBackend { config, client })
    }

    pub fn sign_with_private_key(&self) -> bool {
        self.config.sign_with_private_key
    }

    pub fn local_private_key(&self, chain_id: &ChainId) -> Option<&str> {
        self.config.signer_private_key(chain_id)
    }

    /// The signing key descriptor for a chain: derived from the local key in
    /// dev mode, from the configured MPC public key otherwise. Local dev
    /// keys are interpreted on the secp256k1 curve here; Ed25519 chains use
    /// [`SignerBackend::ed_public_key`].
    pub fn public_key(&self, chain_id: &ChainId) -> Result<KeyDescriptor, SwapError> {
        if self.config.sign_with_private_key {
            let priv_key = self.local_private_key(chain_id).ok_or_else(|| {
                SwapError::WrongConfig(format!("no local signer key for chain {chain_id}"))
            })?;
            return Ok(KeyDescriptor {
                pubkey_hex: local::ec_public_key_hex(priv_key)?,
                curve: SigningCurve::Secp256k1,
            });
        }
        let configured = self.config.signer_public_key(chain_id).ok_or_else(|| {
            SwapError::WrongConfig(format!("no mpc public key for chain {chain_id}"))
        })?;
        KeyDescriptor::from_hex(configured)
    }

    /// The Ed25519 signing key for a chain. Fails when the configured key
    /// is not on that curve.
    pub fn ed_public_key(&self, chain_id: &ChainId) -> Result<KeyDescriptor, SwapError> {
        if self.config.sign_with_private_key {
            let priv_key = self.local_private_key(chain_id).ok_or_else(|| {
                SwapError::WrongConfig(format!("no local signer key for chain {chain_id}"))
            })?;
            return Ok(KeyDescriptor {
                pubkey_hex: local::ed_public_key_hex(priv_key)?,
                curve: SigningCurve::Ed25519,
            });
        }
        let configured = self.config.signer_public_key(chain_id).ok_or_else(|| {
            SwapError::WrongConfig(format!("no mpc public key for chain {chain_id}"))
        })?;
        let descriptor = KeyDescriptor::from_hex(configured)?;
        if descriptor.curve != SigningCurve::Ed25519 {
            return Err(SwapError::WrongConfig(format!(
                "chain {chain_id} needs an ed25519 signer key"
            )));
        }
        Ok(descriptor)
    }

    /// ECDSA signature (65-byte rsv) over a 32-byte hash.
    pub async fn sign_ec(
        &self,
        chain_id: &ChainId,
        pubkey_hex: &str,
        sign_hash: &[u8; 32],
        context: &str,
    ) -> Result<Vec<u8>, SwapError> {
        if let Some(priv_key) = self.local_key_if_enabled(chain_id) {
            return local::sign_ec_with_private_key(priv_key, sign_hash);
        }
        let client = self.client()?;
        let (key_id, rsv) = client
            .sign_one_ec(pubkey_hex, &hex::encode(sign_hash), context)
            .await?;
        tracing::info!(key_id = %key_id, context, "mpc ec signing done");
        decode_rsv(&rsv, 65)
    }

    /// Ed25519 signature (64 bytes) over the raw message content. The MPC
    /// service receives the content hex-encoded and decodes before signing.
    pub async fn sign_ed(
        &self,
        chain_id: &ChainId,
        pubkey_hex: &str,
        content: &[u8],
        context: &str,
    ) -> Result<[u8; 64], SwapError> {
        if let Some(priv_key) = self.local_key_if_enabled(chain_id) {
            return local::sign_ed_with_private_key(priv_key, content);
        }
        let client = self.client()?;
        let pure_pubkey = format_public_key_to_pure_hex(pubkey_hex)?;
        let (key_id, rsv) = client
            .sign_one_ed(&pure_pubkey, &hex::encode(content), context)
            .await?;
        tracing::info!(key_id = %key_id, context, "mpc ed signing done");
        let bytes = decode_rsv(&rsv, 64)?;
        Ok(bytes.try_into().expect("length checked"))
    }

    fn local_key_if_enabled(&self, chain_id: &ChainId) -> Option<&str> {
        if self.config.sign_with_private_key {
            self.local_private_key(chain_id)
        } else {
            None
        }
    }

    fn client(&self) -> Result<&MpcClient, SwapError> {
        self.client
            .as_ref()
            .ok_or_else(|| SwapError::WrongConfig("mpc client not configured".into()))
    }
}

fn decode_rsv(rsv_hex: &str, expect_len: usize) -> Result<Vec<u8>, SwapError> {
    let stripped = rsv_hex.strip_prefix("0x").unwrap_or(rsv_hex);
    let bytes =
        hex::decode(stripped).map_err(|e| SwapError::MpcSign(format!("bad rsv hex: {e}")))?;
    // ECDSA rsv may come back without the recovery byte.
    if bytes.len() == expect_len || (expect_len == 65 && bytes.len() == 64) {
        Ok(bytes)
    } else {
        Err(SwapError::MpcSign(format!(
            "rsv length {} not {expect_len}",
            bytes.len()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rsv_length_enforced() {
        assert!(decode_rsv(&"00".repeat(65), 65).is_ok());
        assert!(decode_rsv(&"00".repeat(64), 65).is_ok());
        assert!(decode_rsv(&"00".repeat(64), 64).is_ok());
        assert!(decode_rsv(&"00".repeat(63), 64).is_err());
        assert!(decode_rsv("zz", 64).is_err());
    }
}
