//! Tron chain adapter.
//!
//! Shares the router's event ABI with the EVM adapter but carries Tron's
//! protobuf transaction format and base58check addresses. Wallet REST
//! endpoints stand in for JSON-RPC.

pub mod address;
mod adapter;
mod bridge;
mod rpc;

pub use bridge::{TronBridge, get_stub_chain_id, supports_chain_id};
