//! Cross-chain swap router service.
//!
//! Loads the TOML configuration, constructs one bridge per configured chain
//! through the chain-ID dispatch, fills the router registry, and serves the
//! swap pipeline over HTTP:
//!
//! - `POST /swap/register` – verify every swap record a source tx carries
//! - `POST /swap/process` – verify → build → MPC-sign → broadcast one swap
//! - `GET /swap/result/{chain}/{tx}/{index}` – cached pipeline outcome
//! - `GET /status` – configured chains

mod dispatch;
mod handlers;
mod pipeline;
mod shutdown;
mod telemetry;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::http::Method;
use clap::Parser;
use dashmap::DashMap;
use dotenvy::dotenv;
use tower_http::cors;

use router_mpc::SignerBackend;
use router_types::{RouterConfig, RouterRegistry, SwapError};

use crate::pipeline::AppState;

#[derive(Debug, Parser)]
#[command(name = "swap-router", about = "Cross-chain swap router service")]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long, env = "ROUTER_CONFIG")]
    config: PathBuf,
}

/// Build every configured bridge and fill the cross-chain lookup maps.
fn init_router(config: &Arc<RouterConfig>) -> Result<Arc<RouterRegistry>, SwapError> {
    let registry = Arc::new(RouterRegistry::new());
    let signer = Arc::new(SignerBackend::new(config.mpc.clone())?);

    for section in &config.chains {
        let chain_id = section.chain.chain_id;
        let bridge = dispatch::new_cross_chain_bridge(
            section,
            registry.clone(),
            signer.clone(),
            config.clone(),
        )?;
        registry.register_bridge(chain_id, bridge);
        for token in &section.tokens {
            registry.set_multichain_token(
                &token.token_id,
                chain_id,
                token.contract_address.clone(),
            );
            registry.set_router_contract(
                chain_id,
                &token.contract_address,
                section.chain.router_contract.clone(),
            );
        }
        tracing::info!(
            chain_id = %chain_id,
            block_chain = %section.chain.block_chain,
            tokens = section.tokens.len(),
            "bridge registered"
        );
    }

    for route in &config.swaps {
        let chain_ids: Vec<_> = match route.to_chain_id {
            Some(chain_id) => vec![chain_id],
            None => config.chains.iter().map(|s| s.chain.chain_id).collect(),
        };
        for chain_id in chain_ids {
            registry.set_swap_config(&route.token_id, chain_id, route.swap.clone());
            registry.set_fee_config(&route.token_id, chain_id, route.fee.clone());
        }
    }
    Ok(registry)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    telemetry::init();

    let args = Args::parse();
    let config = Arc::new(RouterConfig::load(&args.config)?);
    tracing::info!(
        identifier = %config.identifier,
        chains = config.chains.len(),
        "configuration loaded"
    );

    let registry = init_router(&config)?;
    let state = Arc::new(AppState {
        config: config.clone(),
        registry,
        results: DashMap::new(),
    });

    let app = handlers::routes().with_state(state).layer(
        cors::CorsLayer::new()
            .allow_origin(cors::Any)
            .allow_methods([Method::GET, Method::POST])
            .allow_headers(cors::Any),
    );

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    tracing::info!("starting swap router at http://{addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;

    let shutdown = shutdown::Shutdown::try_new()?;
    let token = shutdown.token();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { token.cancelled().await })
        .await?;

    Ok(())
}
