//! The swap pipeline: verify on the source chain, then build → sign →
//! broadcast on the destination chain.
//!
//! Each `(srcChainID, txHash, logIndex)` is one independent task; the four
//! stages within a task are strictly sequential.

use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;

use router_types::{
    BuildTxArgs, ChainId, RouterConfig, RouterRegistry, SwapError, SwapTxInfo, SwapType,
    VerifyArgs, value,
};

/// Completed pipeline run for one swap.
#[derive(Debug, Clone, Serialize)]
pub struct SwapOutcome {
    pub swap_info: SwapTxInfo,
    /// Destination-chain transaction hash.
    pub swapin_tx_hash: String,
}

pub struct AppState {
    pub config: Arc<RouterConfig>,
    pub registry: Arc<RouterRegistry>,
    /// Outcome cache keyed by `chainID:txHash:logIndex`.
    pub results: DashMap<String, Result<SwapOutcome, SwapError>>,
}

impl AppState {
    pub fn result_key(chain_id: &ChainId, tx_hash: &str, log_index: u64) -> String {
        format!("{chain_id}:{tx_hash}:{log_index}")
    }
}

/// Verify all swap records a source transaction carries.
pub async fn register_swap(
    state: &AppState,
    chain_id: ChainId,
    tx_hash: &str,
    log_index: u64,
) -> Result<(Vec<SwapTxInfo>, Vec<Option<SwapError>>), SwapError> {
    let bridge = state
        .registry
        .get_bridge(&chain_id)
        .ok_or(SwapError::NoBridgeForChainID)?;
    let args = VerifyArgs {
        swap_type: SwapType::Erc20Swap,
        log_index,
        allow_unstable: false,
    };
    Ok(bridge.register_swap(tx_hash, &args).await)
}

/// Run the full pipeline for one swap and cache the outcome.
pub async fn process_swap(
    state: &AppState,
    chain_id: ChainId,
    tx_hash: &str,
    log_index: u64,
) -> Result<SwapOutcome, SwapError> {
    let result = run_pipeline(state, chain_id, tx_hash, log_index).await;
    state.results.insert(
        AppState::result_key(&chain_id, tx_hash, log_index),
        result.clone(),
    );
    result
}

async fn run_pipeline(
    state: &AppState,
    chain_id: ChainId,
    tx_hash: &str,
    log_index: u64,
) -> Result<SwapOutcome, SwapError> {
    let src_bridge = state
        .registry
        .get_bridge(&chain_id)
        .ok_or(SwapError::NoBridgeForChainID)?;

    let verify_args = VerifyArgs {
        swap_type: SwapType::Erc20Swap,
        log_index,
        allow_unstable: false,
    };
    let swap_info = src_bridge.verify_transaction(tx_hash, &verify_args).await?;

    if let (Some(from_token), Some(dest_bridge)) = (
        src_bridge.get_token_config(&swap_info.erc20_swap_info.token),
        state.registry.get_bridge(&swap_info.to_chain_id),
    ) {
        let to_decimals = state
            .registry
            .get_multichain_token(&swap_info.erc20_swap_info.token_id, &swap_info.to_chain_id)
            .and_then(|token| dest_bridge.get_token_config(&token))
            .map(|t| t.decimals)
            .unwrap_or(from_token.decimals);
        if value::is_big_swap_value(
            &state.registry,
            &swap_info,
            from_token.decimals,
            to_decimals,
        ) {
            tracing::warn!(
                txid = %swap_info.hash,
                value = %swap_info.value,
                "big value swap, queued for out-of-band approval"
            );
        }
    }

    let dest_bridge = state
        .registry
        .get_bridge(&swap_info.to_chain_id)
        .ok_or(SwapError::NoBridgeForChainID)?;
    let build_args = BuildTxArgs::from_swap_info(&swap_info);

    let raw_tx = dest_bridge.build_raw_transaction(&build_args).await?;
    let (signed_tx, sign_hash) = dest_bridge.mpc_sign_transaction(raw_tx, &build_args).await?;
    let sent_hash = dest_bridge.send_transaction(signed_tx).await?;

    tracing::info!(
        src_chain = %chain_id,
        dest_chain = %swap_info.to_chain_id,
        txid = %swap_info.hash,
        log_index,
        sign_hash = %sign_hash,
        swapin_tx = %sent_hash,
        "swap pipeline done"
    );
    Ok(SwapOutcome {
        swap_info,
        swapin_tx_hash: sent_hash,
    })
}
