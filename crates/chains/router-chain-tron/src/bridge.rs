//! Tron bridge: the EVM pipeline shape over protobuf transactions and
//! base58check addresses.

use std::str::FromStr;
use std::sync::Arc;

use alloy_primitives::{Address, B256, Signature, U256};
use alloy_sol_types::{SolCall, sol};
use sha2::{Digest, Sha256};

use router_mpc::SignerBackend;
use router_types::rawtx::{TronRawTx, TronSignedTx};
use router_types::{
    BridgeContext, BuildTxArgs, ChainId, Network, RouterConfig, SwapError, SwapTxInfo, SwapType,
    check_swap_info, stub_chain_id, value::calc_swap_value,
};

use router_chain_evm::extract_eip1167_master;
use router_chain_evm::logparse::{BindField, parse_swapout_log};

use crate::address;
use crate::rpc::{TronRpcClient, TronTransaction, encode_transaction_protobuf};

sol! {
    function anySwapIn(bytes32 txs, address token, address to, uint256 amount, uint256 fromChainID);
}

const TRIGGER_SMART_CONTRACT: &str = "TriggerSmartContract";
const DEFAULT_FEE_LIMIT: u64 = 300_000_000;

pub fn supports_chain_id(chain_id: &ChainId) -> bool {
    router_types::stub_chain_ids("TRON").contains(chain_id)
}

pub fn get_stub_chain_id(network: Network) -> ChainId {
    stub_chain_id("TRON", network)
}

pub struct TronBridge {
    pub(crate) ctx: BridgeContext,
    pub(crate) rpc: TronRpcClient,
    pub(crate) signer: Arc<SignerBackend>,
    pub(crate) policy: Arc<RouterConfig>,
}

impl TronBridge {
    pub fn new(
        ctx: BridgeContext,
        signer: Arc<SignerBackend>,
        policy: Arc<RouterConfig>,
    ) -> Result<Self, SwapError> {
        let rpc = TronRpcClient::new(ctx.gateway_config())?;
        Ok(TronBridge {
            ctx,
            rpc,
            signer,
            policy,
        })
    }

    fn mpc_tron_address(&self) -> Result<(String, String), SwapError> {
        let descriptor = self.signer.public_key(&self.ctx.chain_id())?;
        let address = address::public_key_hex_to_address(&descriptor.pubkey_hex)?;
        Ok((descriptor.pubkey_hex, address))
    }

    pub(crate) async fn verify_erc20_swap_tx(
        &self,
        tx_hash: &str,
        log_index: u64,
        allow_unstable: bool,
    ) -> Result<SwapTxInfo, SwapError> {
        let mut swap_info = SwapTxInfo::new(SwapType::Erc20Swap, tx_hash, log_index);

        self.check_tx_success(&mut swap_info, allow_unstable).await?;

        let tx_info = self.rpc.get_transaction_info(&swap_info.hash).await?;
        let index = usize::try_from(log_index).map_err(|_| SwapError::LogIndexOutOfRange)?;
        if index >= tx_info.log.len() {
            return Err(SwapError::LogIndexOutOfRange);
        }
        self.verify_swapout_log(&mut swap_info, &tx_info.log[index])?;

        self.check_call_by_contract(&swap_info).await?;
        check_swap_info(self.ctx.registry(), self, &swap_info)?;

        if !allow_unstable {
            tracing::info!(
                from = %swap_info.from,
                bind = %swap_info.bind,
                value = %swap_info.value,
                txid = %swap_info.hash,
                log_index = swap_info.log_index,
                height = swap_info.height,
                from_chain_id = %swap_info.from_chain_id,
                to_chain_id = %swap_info.to_chain_id,
                token = %swap_info.erc20_swap_info.token,
                token_id = %swap_info.erc20_swap_info.token_id,
                "verify router swap tx stable pass"
            );
        }
        Ok(swap_info)
    }

    async fn check_tx_success(
        &self,
        swap_info: &mut SwapTxInfo,
        allow_unstable: bool,
    ) -> Result<(), SwapError> {
        let tx_info = self.rpc.get_transaction_info(&swap_info.hash).await?;
        if tx_info.block_number == 0 {
            return Err(SwapError::TxNotFound);
        }
        if tx_info.block_number < self.ctx.chain_config().initial_height {
            return Err(SwapError::TxBeforeInitialHeight);
        }
        swap_info.height = tx_info.block_number;
        swap_info.timestamp = tx_info.block_time_stamp / 1000;

        if !allow_unstable {
            let latest = self.rpc.get_latest_block_number().await?;
            let confirmations = latest.saturating_sub(tx_info.block_number) + 1;
            if confirmations < self.ctx.chain_config().confirmations {
                return Err(SwapError::TxNotStable);
            }
        }
        if let Some(receipt) = &tx_info.receipt
            && receipt.result.as_deref().is_some_and(|r| r != "SUCCESS")
        {
            return Err(SwapError::TxWithWrongStatus);
        }

        let tx = self.rpc.get_transaction(&swap_info.hash).await?;
        let ret = tx.ret.first().ok_or(SwapError::TxWithWrongStatus)?;
        if ret.contract_ret.as_deref() != Some("SUCCESS") {
            return Err(SwapError::TxWithWrongStatus);
        }
        let contract = tx
            .raw_data
            .as_ref()
            .and_then(|r| r.contract.first())
            .ok_or(SwapError::TxWithWrongStatus)?;
        if contract.contract_type != TRIGGER_SMART_CONTRACT {
            return Err(SwapError::TxWithWrongContract);
        }
        swap_info.from = address::address_from_hex(&contract.parameter.value.owner_address)?;
        swap_info.tx_to = address::address_from_hex(&contract.parameter.value.contract_address)?;
        Ok(())
    }

    fn verify_swapout_log(
        &self,
        swap_info: &mut SwapTxInfo,
        rlog: &crate::rpc::TronLog,
    ) -> Result<(), SwapError> {
        let emitter_bytes = hex::decode(&rlog.address).map_err(|_| SwapError::ParseDataError)?;
        swap_info.to = address::address_from_evm_bytes(&emitter_bytes);

        let topics = rlog
            .topics
            .iter()
            .map(|t| B256::from_str(&format!("0x{}", t.trim_start_matches("0x"))))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| SwapError::TxWithWrongTopics)?;
        let data = hex::decode(rlog.data.trim_start_matches("0x"))
            .map_err(|_| SwapError::ParseDataError)?;

        let parsed = parse_swapout_log(&topics, &data)?;

        let erc20 = &mut swap_info.erc20_swap_info;
        erc20.token = address::address_from_topic(&parsed.token_word);
        swap_info.from = address::address_from_topic(&parsed.from_word);
        swap_info.bind = match parsed.bind {
            // The bind of the three-address form is a destination-chain EVM
            // address, kept in lower hex.
            BindField::AddressWord(word) => format!("{:#x}", Address::from_word(word)),
            BindField::Text(text) => text,
        };
        swap_info.value = parsed.value;
        let chain_id = self.ctx.chain_id();
        swap_info.from_chain_id = match parsed.from_chain_id {
            Some(from) if !self.policy.is_use_from_chain_id_in_receipt_disabled(&chain_id) => {
                from.into()
            }
            _ => chain_id,
        };
        swap_info.to_chain_id = parsed.to_chain_id.into();
        erc20.call_proxy = parsed.call_proxy.filter(|p| !p.is_empty());
        erc20.call_data = parsed.call_data.filter(|d| !d.is_empty());

        let token = swap_info.erc20_swap_info.token.clone();
        let token_cfg = self
            .ctx
            .get_token_config(&token)
            .ok_or(SwapError::MissTokenConfig)?;
        swap_info.erc20_swap_info.token_id = token_cfg.token_id;

        let router_contract = self
            .ctx
            .get_router_contract(&token)
            .ok_or(SwapError::MissRouterInfo)?;
        if !address::addresses_equal(&swap_info.to, &router_contract) {
            tracing::warn!(have = %swap_info.to, want = %router_contract, "router contract mismatch");
            return Err(SwapError::TxWithWrongContract);
        }
        Ok(())
    }

    async fn check_call_by_contract(&self, swap_info: &SwapTxInfo) -> Result<(), SwapError> {
        let tx_to = &swap_info.tx_to;
        let router_contract = self
            .ctx
            .get_router_contract(&swap_info.erc20_swap_info.token)
            .ok_or(SwapError::MissRouterInfo)?;
        if address::addresses_equal(tx_to, &router_contract) || self.policy.allow_call_by_contract
        {
            return Ok(());
        }
        let chain_id = self.ctx.chain_id();
        if self.policy.is_in_call_by_contract_whitelist(&chain_id, tx_to) {
            return Ok(());
        }
        let bytecode = match address::address_to_hex(tx_to) {
            Ok(tx_to_hex) => self.rpc.get_contract_bytecode(&tx_to_hex).await.ok(),
            Err(_) => None,
        };
        if let Some(code) = bytecode {
            if let Some(master) = extract_eip1167_master(&code) {
                let master = address::address_from_evm_bytes(master.as_slice());
                if self
                    .policy
                    .is_in_call_by_contract_whitelist(&chain_id, &master)
                {
                    return Ok(());
                }
            }
            if self.policy.has_call_by_contract_code_hash_whitelist(&chain_id)
                && !code.is_empty()
                && self.policy.is_in_call_by_contract_code_hash_whitelist(
                    &chain_id,
                    &address::code_hash_hex(&code),
                )
            {
                return Ok(());
            }
        }
        tracing::warn!(tx_to = %tx_to, want = %router_contract, "tx to with wrong contract");
        Err(SwapError::TxWithWrongContract)
    }

    pub(crate) async fn build_swapin_tx(&self, args: &BuildTxArgs) -> Result<TronRawTx, SwapError> {
        let registry = self.ctx.registry();
        let multichain_token = registry
            .get_multichain_token(&args.token_id, &args.to_chain_id)
            .ok_or(SwapError::MissTokenConfig)?;
        let to_token = self
            .ctx
            .get_token_config(&multichain_token)
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

        let router_contract = self
            .ctx
            .get_router_contract(&multichain_token)
            .ok_or(SwapError::MissRouterInfo)?;

        let mut swap_id = [0u8; 32];
        let id_bytes = hex::decode(&args.swap_id).map_err(|_| SwapError::ParseDataError)?;
        if id_bytes.len() != 32 {
            return Err(SwapError::ParseDataError);
        }
        swap_id.copy_from_slice(&id_bytes);

        let token_payload = address::decode_address(&multichain_token)?;
        let bind: Address = args.bind.parse().map_err(|_| SwapError::WrongBindAddress)?;
        let call = anySwapInCall {
            txs: B256::from(swap_id),
            token: Address::from_slice(&token_payload[1..]),
            to: bind,
            amount,
            fromChainID: args.from_chain_id.inner(),
        };
        let parameter_hex = hex::encode(&call.abi_encode()[4..]);

        let (_, owner) = self.mpc_tron_address()?;
        let tx: TronTransaction = self
            .rpc
            .trigger_smart_contract(
                &address::address_to_hex(&owner)?,
                &address::address_to_hex(&router_contract)?,
                "anySwapIn(bytes32,address,address,uint256,uint256)",
                &parameter_hex,
                DEFAULT_FEE_LIMIT,
            )
            .await?;
        Ok(TronRawTx {
            txid: tx.tx_id,
            raw_data_hex: tx.raw_data_hex,
        })
    }

    pub(crate) async fn sign_tx(
        &self,
        raw: &TronRawTx,
        context: &str,
    ) -> Result<TronSignedTx, SwapError> {
        let raw_data = hex::decode(&raw.raw_data_hex).map_err(|_| SwapError::WrongRawTx)?;
        let digest: [u8; 32] = Sha256::digest(&raw_data).into();
        if !raw.txid.is_empty() && raw.txid != hex::encode(digest) {
            return Err(SwapError::WrongRawTx);
        }

        let (pubkey_hex, expected) = self.mpc_tron_address()?;
        let rsv = self
            .signer
            .sign_ec(&self.ctx.chain_id(), &pubkey_hex, &digest, context)
            .await?;
        if rsv.len() != 65 {
            return Err(SwapError::SignatureVerifyFailed);
        }
        let v = rsv[64];
        let parity = if v >= 27 { (v - 27) & 1 == 1 } else { v & 1 == 1 };
        let signature = Signature::new(
            U256::from_be_slice(&rsv[0..32]),
            U256::from_be_slice(&rsv[32..64]),
            parity,
        );
        let recovered = signature
            .recover_address_from_prehash(&B256::from(digest))
            .map_err(|_| SwapError::SignatureVerifyFailed)?;
        if address::address_from_evm_bytes(recovered.as_slice()) != expected {
            tracing::error!(%recovered, %expected, "mpc signature does not match signer");
            return Err(SwapError::SignatureVerifyFailed);
        }

        Ok(TronSignedTx {
            txid: hex::encode(digest),
            raw_data_hex: raw.raw_data_hex.clone(),
            signature: hex::encode(&rsv),
        })
    }

    pub(crate) async fn broadcast(&self, signed: &TronSignedTx) -> Result<String, SwapError> {
        let raw_data = hex::decode(&signed.raw_data_hex).map_err(|_| SwapError::WrongSignedTx)?;
        let signature = hex::decode(&signed.signature).map_err(|_| SwapError::WrongSignedTx)?;
        let tx = encode_transaction_protobuf(&raw_data, &signature);
        let txid = self.rpc.broadcast_hex(&hex::encode(tx)).await?;
        if txid.is_empty() {
            Ok(signed.txid.clone())
        } else {
            Ok(txid)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use router_types::STUB_CHAIN_ID_BASE;

    #[test]
    fn stub_chain_ids_claimed() {
        let mainnet = get_stub_chain_id(Network::Mainnet);
        assert!(supports_chain_id(&mainnet));
        assert!(supports_chain_id(&get_stub_chain_id(Network::Testnet)));
        assert!(!supports_chain_id(&ChainId::from_u64(56)));
        assert!(mainnet.inner() >= alloy_primitives::U256::from(STUB_CHAIN_ID_BASE));
    }
}
