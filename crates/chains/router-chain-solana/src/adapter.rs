use router_mpc::format_public_key_to_pure_hex;
use router_types::{
    Bridge, BuildTxArgs, ChainConfig, GatewayConfig, RawTransaction, SignedTransaction, SwapError,
    SwapTxInfo, TokenConfig, VerifyArgs,
};

use crate::bridge::{SolanaBridge, is_valid_address};

#[async_trait::async_trait]
impl Bridge for SolanaBridge {
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
        is_valid_address(address)
    }

    fn public_key_to_address(&self, pubkey_hex: &str) -> Result<String, SwapError> {
        let pure = format_public_key_to_pure_hex(pubkey_hex)?;
        let bytes = hex::decode(&pure)
            .map_err(|e| SwapError::WrongConfig(format!("bad public key hex: {e}")))?;
        if bytes.len() != 32 {
            return Err(SwapError::WrongConfig(
                "solana public key must be 32 bytes".into(),
            ));
        }
        Ok(bs58::encode(&bytes).into_string())
    }

    async fn verify_transaction(
        &self,
        tx_hash: &str,
        args: &VerifyArgs,
    ) -> Result<SwapTxInfo, SwapError> {
        self.verify_swapout_tx(tx_hash, args.log_index, args.allow_unstable)
            .await
    }

    async fn build_raw_transaction(
        &self,
        args: &BuildTxArgs,
    ) -> Result<RawTransaction, SwapError> {
        self.build_swapin_tx(args).await.map(RawTransaction::Solana)
    }

    async fn mpc_sign_transaction(
        &self,
        raw_tx: RawTransaction,
        args: &BuildTxArgs,
    ) -> Result<(SignedTransaction, String), SwapError> {
        let RawTransaction::Solana(raw) = raw_tx else {
            return Err(SwapError::WrongRawTx);
        };
        let context = format!("{}:{}:{}", args.from_chain_id, args.swap_id, args.log_index);
        let signed = self.sign_tx(&raw, &context).await?;
        let tx_hash = signed
            .signatures
            .first()
            .map(|s| bs58::encode(s).into_string())
            .unwrap_or_default();
        Ok((SignedTransaction::Solana(signed), tx_hash))
    }

    async fn send_transaction(&self, signed_tx: SignedTransaction) -> Result<String, SwapError> {
        let SignedTransaction::Solana(signed) = signed_tx else {
            return Err(SwapError::WrongSignedTx);
        };
        self.broadcast(&signed).await
    }
}
