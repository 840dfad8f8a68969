//! EVM-family chain adapter.
//!
//! The reference implementation of the verify/build/sign/broadcast pipeline.
//! Dispatch treats the EVM family as the default fallthrough: any positive
//! chain ID no other adapter claims is handled here.

mod adapter;
mod bridge;
pub mod logparse;
mod provider;
mod verify;

pub use bridge::{EvmBridge, is_valid_address, public_key_hex_to_address};
pub use verify::extract_eip1167_master;
