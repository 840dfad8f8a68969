//! Core types for the cross-chain swap router.
//!
//! This crate defines everything the chain adapters share: the numeric
//! [`ChainId`] scheme, the object-safe [`Bridge`] capability set, the
//! canonical [`SwapTxInfo`] record, token/swap/fee configuration, the swap
//! error taxonomy, and the process-wide [`RouterRegistry`].

mod bridge;
mod chain_id;
pub mod config;
mod error;
pub mod rawtx;
mod registry;
mod swap;
pub mod value;

pub use bridge::{Bridge, BridgeContext};
pub use chain_id::{ChainId, ChainIdFormatError, Network, STUB_CHAIN_ID_BASE, stub_chain_id, stub_chain_ids};
pub use config::{
    ChainConfig, ChainSection, FeeConfig, GatewayConfig, LiteralOrEnv, MpcConfig, RouterConfig,
    ServerConfig, SwapConfig, SwapRouteConfig, TokenConfig,
};
pub use error::SwapError;
pub use rawtx::{RawTransaction, SignedTransaction};
pub use registry::{RouterRegistry, check_swap_info};
pub use swap::{BuildTxArgs, Erc20SwapInfo, SwapTxInfo, SwapType, VerifyArgs};
