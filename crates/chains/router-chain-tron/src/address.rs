//! Tron address handling: 21-byte payloads (0x41 tag + 20 account bytes)
//! shown as base58check.

use alloy_primitives::{B256, keccak256};

use router_types::SwapError;

/// Address tag byte for Tron mainnet-format addresses.
pub const ADDRESS_PREFIX: u8 = 0x41;

/// Base58check-encode a 21-byte Tron address payload.
pub fn encode_address(payload: &[u8; 21]) -> String {
    bs58::encode(payload).with_check().into_string()
}

/// Decode a base58check Tron address into its 21-byte payload.
pub fn decode_address(address: &str) -> Result<[u8; 21], SwapError> {
    let bytes = bs58::decode(address)
        .with_check(None)
        .into_vec()
        .map_err(|_| SwapError::WrongBindAddress)?;
    let payload: [u8; 21] = bytes
        .try_into()
        .map_err(|_| SwapError::WrongBindAddress)?;
    if payload[0] != ADDRESS_PREFIX {
        return Err(SwapError::WrongBindAddress);
    }
    Ok(payload)
}

pub fn is_valid_address(address: &str) -> bool {
    decode_address(address).is_ok()
}

/// Tron address from the trailing 20 bytes of an EVM-style value (a log
/// topic word or a 20-byte account hash).
pub fn address_from_evm_bytes(bytes: &[u8]) -> String {
    let mut payload = [0u8; 21];
    payload[0] = ADDRESS_PREFIX;
    let tail = &bytes[bytes.len().saturating_sub(20)..];
    payload[21 - tail.len()..].copy_from_slice(tail);
    encode_address(&payload)
}

/// Tron address from a 32-byte topic word.
pub fn address_from_topic(word: &B256) -> String {
    address_from_evm_bytes(word.as_slice())
}

/// Tron hex form (`41…`, 21 bytes) used by the wallet REST API.
pub fn address_to_hex(address: &str) -> Result<String, SwapError> {
    Ok(hex::encode(decode_address(address)?))
}

/// Tron address from the wallet REST API hex form.
pub fn address_from_hex(hex_address: &str) -> Result<String, SwapError> {
    let bytes = hex::decode(hex_address).map_err(|_| SwapError::ParseDataError)?;
    let payload: [u8; 21] = bytes.try_into().map_err(|_| SwapError::ParseDataError)?;
    Ok(encode_address(&payload))
}

/// Derive the Tron address of a secp256k1 public key: keccak of the
/// uncompressed key, trailing 20 bytes, 0x41 tag, base58check.
pub fn public_key_hex_to_address(pubkey_hex: &str) -> Result<String, SwapError> {
    let evm_address = router_chain_evm::public_key_hex_to_address(pubkey_hex)?;
    Ok(address_from_evm_bytes(evm_address.as_slice()))
}

/// Keccak-based account hash equality, ignoring display encoding.
pub fn addresses_equal(a: &str, b: &str) -> bool {
    match (decode_address(a), decode_address(b)) {
        (Ok(pa), Ok(pb)) => pa == pb,
        _ => a.eq_ignore_ascii_case(b),
    }
}

/// Code hash text for the call-by-contract whitelist.
pub fn code_hash_hex(code: &[u8]) -> String {
    format!("{:#x}", keccak256(code))
}

#[cfg(test)]
mod tests {
    use super::*;

    // TRX burn address, the canonical base58check test vector.
    const BURN: &str = "T9yD14Nj9j7xAB4dbGeiX9h8unkKHxuWwb";

    #[test]
    fn decode_known_address() {
        let payload = decode_address(BURN).unwrap();
        assert_eq!(payload[0], ADDRESS_PREFIX);
        assert_eq!(encode_address(&payload), BURN);
    }

    #[test]
    fn hex_roundtrip() {
        let hex_form = address_to_hex(BURN).unwrap();
        assert!(hex_form.starts_with("41"));
        assert_eq!(address_from_hex(&hex_form).unwrap(), BURN);
    }

    #[test]
    fn topic_word_conversion() {
        let payload = decode_address(BURN).unwrap();
        let mut word = [0u8; 32];
        word[12..].copy_from_slice(&payload[1..]);
        assert_eq!(address_from_topic(&B256::from(word)), BURN);
    }

    #[test]
    fn invalid_addresses_rejected() {
        assert!(!is_valid_address("TronNotBase58Check"));
        assert!(!is_valid_address(
            "0x55d398326f99059ff775485246999027b3197955"
        ));
        assert!(is_valid_address(BURN));
    }

    #[test]
    fn public_key_to_address_is_valid() {
        let pubkey = "0479be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798483ada7726a3c4655da4fbfc0e1108a8fd17b448a68554199c47d08ffb10d4b8";
        let address = public_key_hex_to_address(pubkey).unwrap();
        assert!(is_valid_address(&address));
        assert!(address.starts_with('T'));
    }
}
