//! MPC threshold-signing client.
//!
//! The router never holds production keys: signing happens in an external
//! MPC service reached over JSON-RPC. This crate wraps that narrow
//! interface (`sign_one_ec` / `sign_one_ed`, exactly one `rsv` required),
//! classifies key curves, and offers local-key signing for dev setups.

mod backend;
mod client;
mod key;
pub mod local;

pub use backend::SignerBackend;
pub use client::{MpcClient, SignResult};
pub use key::{KeyDescriptor, SigningCurve, classify_public_key, format_public_key_to_pure_hex};
