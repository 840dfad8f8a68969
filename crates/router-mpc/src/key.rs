//! MPC key descriptors and curve classification.

use router_types::SwapError;

/// Signing curve of an MPC key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SigningCurve {
    Secp256k1,
    Ed25519,
}

/// A threshold-signing key held by the MPC network.
#[derive(Debug, Clone)]
pub struct KeyDescriptor {
    /// Hex without `0x`, `0xED` prefix stripped for Ed25519 keys.
    pub pubkey_hex: String,
    pub curve: SigningCurve,
}

/// Classify a raw public key by its encoding.
///
/// Ed25519 keys are 32 bytes, or 33 bytes carrying a leading `0xED` tag;
/// anything else is treated as an ECDSA (secp256k1) key.
pub fn classify_public_key(pubkey: &[u8]) -> SigningCurve {
    match pubkey.len() {
        33 if pubkey[0] == 0xED => SigningCurve::Ed25519,
        32 => SigningCurve::Ed25519,
        _ => SigningCurve::Secp256k1,
    }
}

/// Strip `0x` and, for Ed25519, the `0xED` tag byte, returning the pure
/// key hex the MPC service expects.
pub fn format_public_key_to_pure_hex(pubkey_hex: &str) -> Result<String, SwapError> {
    let stripped = pubkey_hex
        .strip_prefix("0x")
        .or_else(|| pubkey_hex.strip_prefix("0X"))
        .unwrap_or(pubkey_hex);
    let bytes = hex::decode(stripped)
        .map_err(|e| SwapError::WrongConfig(format!("bad public key hex: {e}")))?;
    match classify_public_key(&bytes) {
        SigningCurve::Ed25519 if bytes.len() == 33 => Ok(hex::encode(&bytes[1..])),
        _ => Ok(stripped.to_ascii_lowercase()),
    }
}

impl KeyDescriptor {
    pub fn from_hex(pubkey_hex: &str) -> Result<Self, SwapError> {
        let stripped = pubkey_hex
            .strip_prefix("0x")
            .or_else(|| pubkey_hex.strip_prefix("0X"))
            .unwrap_or(pubkey_hex);
        let bytes = hex::decode(stripped)
            .map_err(|e| SwapError::WrongConfig(format!("bad public key hex: {e}")))?;
        let curve = classify_public_key(&bytes);
        Ok(KeyDescriptor {
            pubkey_hex: format_public_key_to_pure_hex(pubkey_hex)?,
            curve,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ed25519_by_tag_byte() {
        let mut key = vec![0xEDu8];
        key.extend_from_slice(&[7u8; 32]);
        assert_eq!(classify_public_key(&key), SigningCurve::Ed25519);
    }

    #[test]
    fn ed25519_by_length() {
        assert_eq!(classify_public_key(&[7u8; 32]), SigningCurve::Ed25519);
    }

    #[test]
    fn everything_else_is_ecdsa() {
        assert_eq!(classify_public_key(&[2u8; 33]), SigningCurve::Secp256k1);
        assert_eq!(classify_public_key(&[4u8; 65]), SigningCurve::Secp256k1);
        assert_eq!(classify_public_key(&[1u8; 20]), SigningCurve::Secp256k1);
    }

    #[test]
    fn ed_prefix_is_stripped() {
        let tagged = format!("0xed{}", hex::encode([9u8; 32]));
        let pure = format_public_key_to_pure_hex(&tagged).unwrap();
        assert_eq!(pure, hex::encode([9u8; 32]));

        let descriptor = KeyDescriptor::from_hex(&tagged).unwrap();
        assert_eq!(descriptor.curve, SigningCurve::Ed25519);
        assert_eq!(descriptor.pubkey_hex.len(), 64);
    }
}
