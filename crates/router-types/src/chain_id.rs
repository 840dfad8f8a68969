//! Numeric chain identifiers.
//!
//! Every ledger the router connects to is addressed by a decimal chain ID.
//! EVM networks use their native EIP-155 value. Ledgers without a numeric
//! chain ID (Solana, Ripple, Cardano, ...) are assigned a *stub* chain ID:
//! the big-integer value of the chain's uppercase ASCII tag, folded into the
//! reserved range `[STUB_CHAIN_ID_BASE, 2 * STUB_CHAIN_ID_BASE)`, plus a
//! per-network offset.

use std::fmt;
use std::str::FromStr;

use alloy_primitives::U256;
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

/// Start of the reserved stub chain ID range (`1e15`).
pub const STUB_CHAIN_ID_BASE: u64 = 1_000_000_000_000_000;

/// A decimal chain identifier, arbitrary precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct ChainId(U256);

impl ChainId {
    pub fn new(value: U256) -> Self {
        Self(value)
    }

    pub fn from_u64(value: u64) -> Self {
        Self(U256::from(value))
    }

    pub fn inner(&self) -> U256 {
        self.0
    }

    /// Chain IDs must be strictly positive; zero or unparsable values are a
    /// configuration error.
    pub fn is_positive(&self) -> bool {
        !self.0.is_zero()
    }

    /// Lossy conversion for chains whose wire formats carry a `u64` chain ID
    /// (EVM transaction envelopes, Solana swap-in params).
    pub fn as_u64(&self) -> u64 {
        self.0.as_limbs()[0]
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ChainId {
    fn from(value: u64) -> Self {
        Self::from_u64(value)
    }
}

impl From<U256> for ChainId {
    fn from(value: U256) -> Self {
        Self(value)
    }
}

/// Error returned when parsing an invalid chain ID string.
#[derive(Debug, thiserror::Error)]
#[error("invalid chain id {0:?}")]
pub struct ChainIdFormatError(String);

impl FromStr for ChainId {
    type Err = ChainIdFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        U256::from_str(s)
            .map(Self)
            .map_err(|_| ChainIdFormatError(s.into()))
    }
}

impl Serialize for ChainId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for ChainId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        ChainId::from_str(&s).map_err(de::Error::custom)
    }
}

/// Network flavor used when deriving stub chain IDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Network {
    Mainnet,
    Testnet,
    Devnet,
}

impl Network {
    fn offset(self) -> u64 {
        match self {
            Network::Mainnet => 0,
            Network::Testnet => 1,
            Network::Devnet => 2,
        }
    }
}

impl FromStr for Network {
    type Err = ChainIdFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mainnet" => Ok(Network::Mainnet),
            "testnet" => Ok(Network::Testnet),
            "devnet" => Ok(Network::Devnet),
            other => Err(ChainIdFormatError(other.into())),
        }
    }
}

/// Derive the stub chain ID for a ledger tag (e.g. `"SOLANA"`, `"XRP"`).
///
/// `stub = (bigint(tag) mod BASE) + BASE + network_offset`, which keeps every
/// stub inside the reserved range and distinct per network flavor.
pub fn stub_chain_id(tag: &str, network: Network) -> ChainId {
    let base = U256::from(STUB_CHAIN_ID_BASE);
    let raw = U256::from_be_slice(tag.as_bytes());
    ChainId(raw % base + base + U256::from(network.offset()))
}

/// All three network flavors of a tag's stub chain ID, mainnet first.
pub fn stub_chain_ids(tag: &str) -> [ChainId; 3] {
    [
        stub_chain_id(tag, Network::Mainnet),
        stub_chain_id(tag, Network::Testnet),
        stub_chain_id(tag, Network::Devnet),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stub_ids_are_in_reserved_range() {
        for tag in ["SOLANA", "XRP", "BTC", "CARDANO", "NEAR", "IOTA", "FLOW"] {
            for id in stub_chain_ids(tag) {
                assert!(id.inner() >= U256::from(STUB_CHAIN_ID_BASE), "{tag}");
                assert!(id.inner() < U256::from(2 * STUB_CHAIN_ID_BASE), "{tag}");
            }
        }
    }

    #[test]
    fn stub_ids_distinct_per_network() {
        let [m, t, d] = stub_chain_ids("SOLANA");
        assert_ne!(m, t);
        assert_ne!(t, d);
        assert_eq!(t.inner(), m.inner() + U256::from(1u64));
        assert_eq!(d.inner(), m.inner() + U256::from(2u64));
    }

    #[test]
    fn parse_roundtrip() {
        let id: ChainId = "1000005574560".parse().unwrap();
        assert_eq!(id.to_string(), "1000005574560");
        assert!(id.is_positive());
        assert!(!ChainId::default().is_positive());
    }

    #[test]
    fn serde_as_decimal_string() {
        let id = ChainId::from_u64(56);
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"56\"");
        let back: ChainId = serde_json::from_str("\"56\"").unwrap();
        assert_eq!(back, id);
    }
}
