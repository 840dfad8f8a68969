//! Local-key signing, for dev and test deployments only. Production routers
//! sign through the MPC network.

use ed25519_dalek::Signer as _;
use k256::ecdsa::SigningKey;
use k256::ecdsa::signature::hazmat::PrehashSigner;

use router_types::SwapError;

fn decode_key(priv_key_hex: &str) -> Result<Vec<u8>, SwapError> {
    let stripped = priv_key_hex.strip_prefix("0x").unwrap_or(priv_key_hex);
    hex::decode(stripped).map_err(|e| SwapError::WrongConfig(format!("bad private key hex: {e}")))
}

/// ECDSA secp256k1 signature over a 32-byte prehash, as a 65-byte rsv.
pub fn sign_ec_with_private_key(priv_key_hex: &str, hash: &[u8; 32]) -> Result<Vec<u8>, SwapError> {
    let bytes = decode_key(priv_key_hex)?;
    let key = SigningKey::from_slice(&bytes)
        .map_err(|e| SwapError::WrongConfig(format!("bad secp256k1 key: {e}")))?;
    let (signature, recovery_id): (k256::ecdsa::Signature, _) = key
        .sign_prehash(hash)
        .map_err(|e| SwapError::MpcSign(e.to_string()))?;
    let mut rsv = signature.to_vec();
    rsv.push(recovery_id.to_byte());
    Ok(rsv)
}

/// Compressed SEC1 public key hex for a local secp256k1 key.
pub fn ec_public_key_hex(priv_key_hex: &str) -> Result<String, SwapError> {
    let bytes = decode_key(priv_key_hex)?;
    let key = SigningKey::from_slice(&bytes)
        .map_err(|e| SwapError::WrongConfig(format!("bad secp256k1 key: {e}")))?;
    Ok(hex::encode(
        key.verifying_key().to_encoded_point(true).as_bytes(),
    ))
}

/// Ed25519 signature over the raw message bytes.
pub fn sign_ed_with_private_key(priv_key_hex: &str, message: &[u8]) -> Result<[u8; 64], SwapError> {
    let bytes = decode_key(priv_key_hex)?;
    let seed: [u8; 32] = bytes
        .as_slice()
        .try_into()
        .map_err(|_| SwapError::WrongConfig("ed25519 key must be 32 bytes".into()))?;
    let key = ed25519_dalek::SigningKey::from_bytes(&seed);
    Ok(key.sign(message).to_bytes())
}

/// Public key hex for a local Ed25519 key.
pub fn ed_public_key_hex(priv_key_hex: &str) -> Result<String, SwapError> {
    let bytes = decode_key(priv_key_hex)?;
    let seed: [u8; 32] = bytes
        .as_slice()
        .try_into()
        .map_err(|_| SwapError::WrongConfig("ed25519 key must be 32 bytes".into()))?;
    let key = ed25519_dalek::SigningKey::from_bytes(&seed);
    Ok(hex::encode(key.verifying_key().to_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::Verifier;

    const EC_KEY: &str = "4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";
    const ED_KEY: &str = "9d61b19deffd5a60ba844af492ec2cc44449c5697b326919703bac031cae7f60";

    #[test]
    fn ec_signature_recovers() {
        let hash = [0x11u8; 32];
        let rsv = sign_ec_with_private_key(EC_KEY, &hash).unwrap();
        assert_eq!(rsv.len(), 65);

        let recovery_id = k256::ecdsa::RecoveryId::from_byte(rsv[64]).unwrap();
        let signature = k256::ecdsa::Signature::from_slice(&rsv[..64]).unwrap();
        let recovered =
            k256::ecdsa::VerifyingKey::recover_from_prehash(&hash, &signature, recovery_id)
                .unwrap();
        let expected = ec_public_key_hex(EC_KEY).unwrap();
        assert_eq!(
            hex::encode(recovered.to_encoded_point(true).as_bytes()),
            expected
        );
    }

    #[test]
    fn ed_signature_verifies() {
        let message = b"swap router signing test";
        let signature = sign_ed_with_private_key(ED_KEY, message).unwrap();
        let pubkey_hex = ed_public_key_hex(ED_KEY).unwrap();
        let pubkey: [u8; 32] = hex::decode(pubkey_hex).unwrap().try_into().unwrap();
        let vk = ed25519_dalek::VerifyingKey::from_bytes(&pubkey).unwrap();
        vk.verify(message, &ed25519_dalek::Signature::from_bytes(&signature))
            .unwrap();
    }
}
