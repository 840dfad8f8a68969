//! Cosmos-SDK chain adapter.
//!
//! Swap-outs are plain bank transfers into the router account with the
//! routing request in the transaction memo. Verification walks the event
//! logs; building emits a DIRECT-mode `MsgSend` back out.

mod adapter;
mod bridge;
pub mod memo;
mod proto;
mod rpc;

pub use bridge::{CosmosBridge, get_stub_chain_id, supports_chain_id};
