//! Anchor-style instruction discriminators.
//!
//! Each router-program instruction is tagged by the leading 8 bytes of
//! `SHA-256("global:<method>")`. These values are wire-frozen.

use sha2::{Digest, Sha256};

/// 8-byte instruction discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SigHash(pub [u8; 8]);

impl SigHash {
    pub fn as_bytes(&self) -> &[u8; 8] {
        &self.0
    }

    pub fn to_u64(self) -> u64 {
        u64::from_be_bytes(self.0)
    }

    pub fn from_u64(value: u64) -> Self {
        SigHash(value.to_be_bytes())
    }
}

impl std::fmt::Display for SigHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// Compute the discriminator for a global method name.
pub fn calc_sighash(method: &str) -> SigHash {
    let digest = Sha256::digest(format!("global:{method}").as_bytes());
    let mut tag = [0u8; 8];
    tag.copy_from_slice(&digest[..8]);
    SigHash(tag)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn swapin_mint_discriminator() {
        assert_eq!(calc_sighash("swapin_mint").to_string(), "bfe596d89e2bfab4");
    }

    #[test]
    fn u64_roundtrip() {
        let h = calc_sighash("swapin_native");
        assert_eq!(SigHash::from_u64(h.to_u64()), h);
    }
}
