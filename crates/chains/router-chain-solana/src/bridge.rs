//! Solana bridge.

use std::str::FromStr;
use std::sync::Arc;

use alloy_primitives::U256;
use base64::Engine;
use ed25519_dalek::Verifier;
use solana_pubkey::Pubkey;

use router_mpc::SignerBackend;
use router_types::rawtx::{SolanaRawTx, SolanaSignedTx};
use router_types::{
    BridgeContext, BuildTxArgs, ChainId, Network, SwapError, SwapTxInfo, SwapType,
    check_swap_info, stub_chain_id, value::calc_swap_value,
};

use crate::instructions::{
    RouterInstruction, new_swapin_mint, new_swapin_native, new_swapin_transfer,
};
use crate::rpc::{RpcConfirmedTransaction, SolanaRpcClient};
use crate::types::{
    AccountMeta, CompiledInstructionInput, Message, SYSTEM_PROGRAM_ID, TOKEN_PROGRAM_ID,
    serialize_transaction,
};

/// Token table key for the native lamport "token".
pub const NATIVE_TOKEN_KEY: &str = "native";

pub fn supports_chain_id(chain_id: &ChainId) -> bool {
    router_types::stub_chain_ids("SOLANA").contains(chain_id)
}

pub fn get_stub_chain_id(network: Network) -> ChainId {
    stub_chain_id("SOLANA", network)
}

pub fn is_valid_address(address: &str) -> bool {
    Pubkey::from_str(address).is_ok()
}

pub struct SolanaBridge {
    pub(crate) ctx: BridgeContext,
    pub(crate) rpc: SolanaRpcClient,
    pub(crate) signer: Arc<SignerBackend>,
}

impl SolanaBridge {
    pub fn new(ctx: BridgeContext, signer: Arc<SignerBackend>) -> Result<Self, SwapError> {
        let rpc = SolanaRpcClient::new(ctx.gateway_config())?;
        Ok(SolanaBridge { ctx, rpc, signer })
    }

    fn router_program(&self) -> Result<Pubkey, SwapError> {
        Pubkey::from_str(&self.ctx.chain_config().router_contract)
            .map_err(|_| SwapError::MissRouterInfo)
    }

    fn mpc_pubkey(&self) -> Result<(String, Pubkey), SwapError> {
        let descriptor = self.signer.ed_public_key(&self.ctx.chain_id())?;
        let bytes = hex::decode(&descriptor.pubkey_hex)
            .map_err(|_| SwapError::WrongConfig("bad solana signer key hex".into()))?;
        let key: [u8; 32] = bytes
            .try_into()
            .map_err(|_| SwapError::WrongConfig("solana signer key must be 32 bytes".into()))?;
        Ok((descriptor.pubkey_hex, Pubkey::new_from_array(key)))
    }

    pub(crate) async fn verify_swapout_tx(
        &self,
        tx_hash: &str,
        log_index: u64,
        allow_unstable: bool,
    ) -> Result<SwapTxInfo, SwapError> {
        let mut swap_info = SwapTxInfo {
            // Solana signatures are base58, keep them verbatim.
            hash: tx_hash.to_string(),
            ..SwapTxInfo::new(SwapType::Erc20Swap, "", log_index)
        };
        swap_info.from_chain_id = self.ctx.chain_id();

        let tx = self.rpc.get_transaction(tx_hash).await?;
        if tx.slot < self.ctx.chain_config().initial_height {
            return Err(SwapError::TxBeforeInitialHeight);
        }
        if tx.meta.as_ref().is_some_and(|m| m.err.is_some()) {
            return Err(SwapError::TxWithWrongStatus);
        }
        swap_info.height = tx.slot;
        swap_info.timestamp = tx.block_time.unwrap_or_default().max(0) as u64;

        if !allow_unstable {
            let latest = self.rpc.get_slot().await?;
            let confirmations = latest.saturating_sub(tx.slot) + 1;
            if confirmations < self.ctx.chain_config().confirmations {
                return Err(SwapError::TxNotStable);
            }
        }

        let instruction = self.decode_router_instruction(&tx, log_index)?;
        self.fill_swapout_info(&mut swap_info, &tx, instruction)?;
        check_swap_info(self.ctx.registry(), self, &swap_info)?;

        if !allow_unstable {
            tracing::info!(
                txid = %swap_info.hash,
                bind = %swap_info.bind,
                value = %swap_info.value,
                to_chain_id = %swap_info.to_chain_id,
                token = %swap_info.erc20_swap_info.token,
                "verify router swap tx stable pass"
            );
        }
        Ok(swap_info)
    }

    /// Decode the `log_index`-th instruction of the transaction; it must
    /// target the router program.
    fn decode_router_instruction(
        &self,
        tx: &RpcConfirmedTransaction,
        log_index: u64,
    ) -> Result<RouterInstruction, SwapError> {
        let message = &tx.transaction.message;
        let index = usize::try_from(log_index).map_err(|_| SwapError::LogIndexOutOfRange)?;
        if index >= message.instructions.len() {
            return Err(SwapError::LogIndexOutOfRange);
        }
        let instruction = &message.instructions[index];

        let program = message
            .account_keys
            .get(instruction.program_id_index)
            .ok_or(SwapError::ParseDataError)?;
        if *program != self.ctx.chain_config().router_contract {
            return Err(SwapError::TxWithWrongContract);
        }

        let header = &message.header;
        let total = message.account_keys.len();
        let signers = header.num_required_signatures as usize;
        let metas = instruction
            .accounts
            .iter()
            .map(|&account_index| {
                let key = message
                    .account_keys
                    .get(account_index)
                    .ok_or(SwapError::ParseDataError)?;
                let pubkey = Pubkey::from_str(key).map_err(|_| SwapError::ParseDataError)?;
                let is_signer = account_index < signers;
                let is_writable = if is_signer {
                    account_index
                        < signers.saturating_sub(header.num_readonly_signed_accounts as usize)
                } else {
                    account_index
                        < total.saturating_sub(header.num_readonly_unsigned_accounts as usize)
                };
                Ok(AccountMeta {
                    pubkey,
                    is_signer,
                    is_writable,
                })
            })
            .collect::<Result<Vec<_>, SwapError>>()?;

        let data = bs58::decode(&instruction.data)
            .into_vec()
            .map_err(|_| SwapError::ParseDataError)?;
        RouterInstruction::decode(&metas, &data)
    }

    fn fill_swapout_info(
        &self,
        swap_info: &mut SwapTxInfo,
        tx: &RpcConfirmedTransaction,
        instruction: RouterInstruction,
    ) -> Result<(), SwapError> {
        let (params, accounts) = match instruction {
            RouterInstruction::SwapoutBurn { params, accounts }
            | RouterInstruction::SwapoutTransfer { params, accounts } => {
                (params, Some(accounts))
            }
            RouterInstruction::SwapoutNative { params, .. } => (params, None),
            _ => return Err(SwapError::SwapoutLogNotFound),
        };

        // Token/source accounts sit at [from, routerAccount, mint, ...] for
        // the SPL swap-out forms; native swaps move lamports.
        let token = match &accounts {
            Some(metas) => metas
                .get(2)
                .map(|m| m.pubkey.to_string())
                .ok_or(SwapError::ParseDataError)?,
            None => NATIVE_TOKEN_KEY.to_string(),
        };
        swap_info.from = tx
            .transaction
            .message
            .account_keys
            .first()
            .cloned()
            .unwrap_or_default();
        swap_info.tx_to = self.ctx.chain_config().router_contract.clone();
        swap_info.to = self.ctx.chain_config().router_contract.clone();
        swap_info.bind = params.to;
        swap_info.value = U256::from(params.amount);
        swap_info.to_chain_id = ChainId::from_u64(params.to_chain_id);

        let token_cfg = self
            .ctx
            .get_token_config(&token)
            .ok_or(SwapError::MissTokenConfig)?;
        swap_info.erc20_swap_info.token = token;
        swap_info.erc20_swap_info.token_id = token_cfg.token_id;
        Ok(())
    }

    pub(crate) async fn build_swapin_tx(
        &self,
        args: &BuildTxArgs,
    ) -> Result<SolanaRawTx, SwapError> {
        let registry = self.ctx.registry();
        let token = registry
            .get_multichain_token(&args.token_id, &args.to_chain_id)
            .ok_or(SwapError::MissTokenConfig)?;
        let to_token = self
            .ctx
            .get_token_config(&token)
            .ok_or(SwapError::MissTokenConfig)?;
        let src_bridge = registry
            .get_bridge(&args.from_chain_id)
            .ok_or(SwapError::NoBridgeForChainID)?;
        let from_token = src_bridge
            .get_token_config(&args.src_token)
            .ok_or(SwapError::MissTokenConfig)?;
        let fee = registry
            .get_fee_config(&args.token_id, &args.to_chain_id)
            .ok_or(SwapError::MissTokenConfig)?;
        let amount = calc_swap_value(
            args.original_value,
            from_token.decimals,
            to_token.decimals,
            &fee,
        );
        if amount.is_zero() {
            return Err(SwapError::TxWithWrongValue);
        }
        let amount: u64 = amount.try_into().map_err(|_| SwapError::TxWithWrongValue)?;

        let (_, mpc) = self.mpc_pubkey()?;
        let router_program = self.router_program()?;
        let router_account = Pubkey::from_str(
            &self
                .ctx
                .get_router_contract(&token)
                .ok_or(SwapError::MissRouterInfo)?,
        )
        .map_err(|_| SwapError::MissRouterInfo)?;
        let to = Pubkey::from_str(&args.bind).map_err(|_| SwapError::WrongBindAddress)?;
        let from_chain_id = args.from_chain_id.as_u64();

        let instruction = if token == NATIVE_TOKEN_KEY {
            let system = Pubkey::from_str(SYSTEM_PROGRAM_ID).expect("const system program id");
            new_swapin_native(&args.swap_id, amount, from_chain_id, mpc, router_account, to, system)
        } else {
            let mint = Pubkey::from_str(&token).map_err(|_| SwapError::MissTokenConfig)?;
            let token_program =
                Pubkey::from_str(TOKEN_PROGRAM_ID).expect("const token program id");
            // Mintable router tokens carry the `any` token ID prefix; plain
            // liquidity tokens move out of the router's pool account.
            if args.token_id.to_ascii_lowercase().starts_with("any") {
                new_swapin_mint(
                    &args.swap_id,
                    amount,
                    from_chain_id,
                    mpc,
                    router_account,
                    to,
                    mint,
                    token_program,
                )
            } else {
                new_swapin_transfer(
                    &args.swap_id,
                    amount,
                    from_chain_id,
                    mpc,
                    router_account,
                    router_account,
                    to,
                    mint,
                    token_program,
                )
            }
        };

        let recent_blockhash = self.rpc.get_latest_blockhash().await?;
        let input = CompiledInstructionInput {
            program_id: router_program,
            accounts: instruction.account_metas(),
            data: instruction.encode()?,
        };
        let message = Message::compile(mpc, &input, recent_blockhash)?;
        Ok(SolanaRawTx {
            message: message.serialize(),
            signer_pubkey: mpc.to_string(),
        })
    }

    pub(crate) async fn sign_tx(
        &self,
        raw: &SolanaRawTx,
        context: &str,
    ) -> Result<SolanaSignedTx, SwapError> {
        let (pubkey_hex, mpc) = self.mpc_pubkey()?;
        if raw.signer_pubkey != mpc.to_string() {
            return Err(SwapError::WrongRawTx);
        }
        let signature = self
            .signer
            .sign_ed(&self.ctx.chain_id(), &pubkey_hex, &raw.message, context)
            .await?;

        let verifying_key = ed25519_dalek::VerifyingKey::from_bytes(&mpc.to_bytes())
            .map_err(|_| SwapError::SignatureVerifyFailed)?;
        verifying_key
            .verify(&raw.message, &ed25519_dalek::Signature::from_bytes(&signature))
            .map_err(|_| SwapError::SignatureVerifyFailed)?;

        Ok(SolanaSignedTx {
            message: raw.message.clone(),
            signatures: vec![signature.to_vec()],
        })
    }

    pub(crate) async fn broadcast(&self, signed: &SolanaSignedTx) -> Result<String, SwapError> {
        let signatures = signed
            .signatures
            .iter()
            .map(|s| {
                s.as_slice()
                    .try_into()
                    .map_err(|_| SwapError::WrongSignedTx)
            })
            .collect::<Result<Vec<[u8; 64]>, _>>()?;
        let tx = serialize_transaction(&signatures, &signed.message);
        let encoded = base64::engine::general_purpose::STANDARD.encode(&tx);
        let sent = self.rpc.send_transaction(&encoded).await?;
        let local_hash = signatures
            .first()
            .map(|s| bs58::encode(s).into_string())
            .unwrap_or_default();
        if !sent.is_empty() && sent != local_hash {
            tracing::warn!(sent, local_hash, "broadcast returned different signature");
        }
        Ok(if sent.is_empty() { local_hash } else { sent })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_validation() {
        assert!(is_valid_address("11111111111111111111111111111111"));
        assert!(is_valid_address(TOKEN_PROGRAM_ID));
        assert!(!is_valid_address("0x1111111111111111111111111111111111111111"));
        assert!(!is_valid_address("not-base58-0OIl"));
    }

    #[test]
    fn stub_chain_ids_claimed() {
        assert!(supports_chain_id(&get_stub_chain_id(Network::Mainnet)));
        assert!(supports_chain_id(&get_stub_chain_id(Network::Devnet)));
        assert!(!supports_chain_id(&ChainId::from_u64(1)));
    }
}
