//! Solana chain adapter.
//!
//! Swap metadata rides router-program instructions rather than event logs:
//! the codec in [`instructions`] is the wire contract, discriminated by the
//! anchor-style sighash in [`sighash`].

mod adapter;
mod bridge;
pub mod instructions;
mod rpc;
pub mod sighash;
pub mod types;

pub use bridge::{NATIVE_TOKEN_KEY, SolanaBridge, get_stub_chain_id, is_valid_address, supports_chain_id};
