//! HTTP surface: the observer posts swap events here.

use std::sync::Arc;

use axum::Router;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use serde::{Deserialize, Serialize};
use serde_json::json;

use router_types::{ChainId, SwapError};

use crate::pipeline::{self, AppState};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/swap/register", post(register_swap))
        .route("/swap/process", post(process_swap))
        .route("/swap/result/{chain_id}/{tx_hash}/{log_index}", get(swap_result))
        .route("/status", get(status))
}

#[derive(Debug, Deserialize)]
struct SwapRequest {
    chain_id: ChainId,
    tx_hash: String,
    #[serde(default)]
    log_index: u64,
}

#[derive(Debug, Serialize)]
struct RegisterEntry {
    swap_info: router_types::SwapTxInfo,
    error: Option<String>,
}

fn error_response(err: &SwapError) -> Response {
    let status = if err.is_recoverable() {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::BAD_REQUEST
    };
    (status, axum::Json(json!({ "error": err.to_string() }))).into_response()
}

async fn register_swap(
    State(state): State<Arc<AppState>>,
    axum::Json(request): axum::Json<SwapRequest>,
) -> Response {
    match pipeline::register_swap(&state, request.chain_id, &request.tx_hash, request.log_index)
        .await
    {
        Ok((infos, errors)) => {
            let entries: Vec<RegisterEntry> = infos
                .into_iter()
                .zip(errors)
                .map(|(swap_info, error)| RegisterEntry {
                    swap_info,
                    error: error.map(|e| e.to_string()),
                })
                .collect();
            axum::Json(entries).into_response()
        }
        Err(err) => error_response(&err),
    }
}

async fn process_swap(
    State(state): State<Arc<AppState>>,
    axum::Json(request): axum::Json<SwapRequest>,
) -> Response {
    match pipeline::process_swap(&state, request.chain_id, &request.tx_hash, request.log_index)
        .await
    {
        Ok(outcome) => axum::Json(outcome).into_response(),
        Err(err) => error_response(&err),
    }
}

async fn swap_result(
    State(state): State<Arc<AppState>>,
    Path((chain_id, tx_hash, log_index)): Path<(ChainId, String, u64)>,
) -> Response {
    let key = AppState::result_key(&chain_id, &tx_hash, log_index);
    match state.results.get(&key) {
        Some(entry) => match entry.value() {
            Ok(outcome) => axum::Json(outcome.clone()).into_response(),
            Err(err) => error_response(err),
        },
        None => (
            StatusCode::NOT_FOUND,
            axum::Json(json!({ "error": "no result for swap" })),
        )
            .into_response(),
    }
}

async fn status(State(state): State<Arc<AppState>>) -> Response {
    let chains: Vec<String> = state
        .registry
        .chain_ids()
        .iter()
        .map(ChainId::to_string)
        .collect();
    axum::Json(json!({
        "identifier": state.config.identifier,
        "swap_type": state.config.swap_type,
        "chains": chains,
    }))
    .into_response()
}
