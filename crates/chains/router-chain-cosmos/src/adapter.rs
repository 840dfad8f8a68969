use router_types::{
    Bridge, BuildTxArgs, ChainConfig, GatewayConfig, RawTransaction, SignedTransaction, SwapError,
    SwapTxInfo, TokenConfig, VerifyArgs,
};

use crate::bridge::CosmosBridge;

#[async_trait::async_trait]
impl Bridge for CosmosBridge {
    fn chain_config(&self) -> &ChainConfig {
        self.ctx.chain_config()
    }

    fn gateway_config(&self) -> &GatewayConfig {
        self.ctx.gateway_config()
    }

    fn get_token_config(&self, address: &str) -> Option<TokenConfig> {
        self.ctx.get_token_config(address)
    }

    fn get_router_contract(&self, token_address: &str) -> Option<String> {
        self.ctx.get_router_contract(token_address)
    }

    fn is_valid_address(&self, address: &str) -> bool {
        self.validate_address(address)
    }

    fn public_key_to_address(&self, pubkey_hex: &str) -> Result<String, SwapError> {
        self.pubkey_to_address(pubkey_hex)
    }

    async fn verify_transaction(
        &self,
        tx_hash: &str,
        args: &VerifyArgs,
    ) -> Result<SwapTxInfo, SwapError> {
        let (mut infos, mut errs) = self
            .register_erc20_swap_tx(tx_hash, args.log_index)
            .await;
        match errs.remove(0) {
            Some(err) => Err(err),
            None => Ok(infos.remove(0)),
        }
    }

    async fn register_swap(
        &self,
        tx_hash: &str,
        args: &VerifyArgs,
    ) -> (Vec<SwapTxInfo>, Vec<Option<SwapError>>) {
        self.register_erc20_swap_tx(tx_hash, args.log_index).await
    }

    async fn build_raw_transaction(
        &self,
        args: &BuildTxArgs,
    ) -> Result<RawTransaction, SwapError> {
        self.build_swapin_tx(args).await.map(RawTransaction::Cosmos)
    }

    async fn mpc_sign_transaction(
        &self,
        raw_tx: RawTransaction,
        args: &BuildTxArgs,
    ) -> Result<(SignedTransaction, String), SwapError> {
        let RawTransaction::Cosmos(raw) = raw_tx else {
            return Err(SwapError::WrongRawTx);
        };
        let context = format!("{}:{}:{}", args.from_chain_id, args.swap_id, args.log_index);
        let signed = self.sign_tx(&raw, &context).await?;
        let tx_hash = signed.tx_hash.clone();
        Ok((SignedTransaction::Cosmos(signed), tx_hash))
    }

    async fn send_transaction(&self, signed_tx: SignedTransaction) -> Result<String, SwapError> {
        let SignedTransaction::Cosmos(signed) = signed_tx else {
            return Err(SwapError::WrongSignedTx);
        };
        let tx_hash = self.rpc.broadcast_tx(&signed.tx_bytes).await?;
        if tx_hash.is_empty() {
            Ok(signed.tx_hash)
        } else {
            Ok(tx_hash)
        }
    }
}
