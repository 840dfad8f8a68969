//! Gateway RPC access for EVM chains.
//!
//! One provider per configured URL. Reads walk the primary list first, then
//! the extended list; broadcast fans out to every URL and returns on the
//! first acceptance.

use alloy_primitives::{Address, B256, Bytes};
use alloy_provider::{Provider, RootProvider};
use alloy_rpc_types_eth::{BlockNumberOrTag, TransactionReceipt, TransactionRequest};

use router_types::{GatewayConfig, SwapError};

pub struct EvmGateway {
    providers: Vec<RootProvider>,
}

impl EvmGateway {
    pub fn new(gateway: &GatewayConfig) -> Self {
        let providers = gateway
            .all_urls()
            .into_iter()
            .map(RootProvider::new_http)
            .collect();
        EvmGateway { providers }
    }

    async fn try_each<'a, T, F, Fut>(&'a self, mut op: F) -> Result<T, SwapError>
    where
        F: FnMut(&'a RootProvider) -> Fut,
        Fut: Future<Output = Result<T, alloy_transport::TransportError>> + 'a,
    {
        let mut last_err = SwapError::RpcQuery("no gateway configured".into());
        for provider in &self.providers {
            match op(provider).await {
                Ok(value) => return Ok(value),
                Err(e) => last_err = SwapError::rpc(e),
            }
        }
        Err(last_err)
    }

    pub async fn get_transaction_receipt(
        &self,
        tx_hash: B256,
    ) -> Result<Option<TransactionReceipt>, SwapError> {
        self.try_each(|p| p.get_transaction_receipt(tx_hash)).await
    }

    pub async fn get_latest_block_number(&self) -> Result<u64, SwapError> {
        self.try_each(|p| p.get_block_number()).await
    }

    pub async fn get_block_timestamp(&self, number: u64) -> Result<u64, SwapError> {
        let block = self
            .try_each(|p| p.get_block_by_number(BlockNumberOrTag::Number(number)).into_future())
            .await?;
        block
            .map(|b| b.header.timestamp)
            .ok_or(SwapError::TxNotFound)
    }

    /// Account nonce including pending transactions.
    pub async fn get_pending_nonce(&self, address: Address) -> Result<u64, SwapError> {
        self.try_each(|p| p.get_transaction_count(address).pending().into_future())
            .await
    }

    pub async fn get_gas_price(&self) -> Result<u128, SwapError> {
        self.try_each(|p| p.get_gas_price()).await
    }

    pub async fn estimate_gas(&self, tx: TransactionRequest) -> Result<u64, SwapError> {
        self.try_each(|p| p.estimate_gas(tx.clone()).into_future())
            .await
    }

    pub async fn get_code(&self, address: Address) -> Result<Bytes, SwapError> {
        self.try_each(|p| p.get_code_at(address).into_future())
            .await
    }

    /// Broadcast raw transaction bytes to every gateway, returning the hash
    /// of the first accepted submission.
    pub async fn send_raw_transaction(&self, encoded: &[u8]) -> Result<B256, SwapError> {
        let mut last_err = SwapError::BroadcastTx;
        for provider in &self.providers {
            match provider.send_raw_transaction(encoded).await {
                Ok(pending) => return Ok(*pending.tx_hash()),
                Err(e) => {
                    tracing::warn!(error = %e, "send raw transaction failed");
                    last_err = SwapError::rpc(e);
                }
            }
        }
        Err(last_err)
    }
}
