//! EVM swap-out verification pipeline.

use alloy_primitives::{Address, B256, keccak256};

use router_types::{SwapError, SwapTxInfo, SwapType, check_swap_info};

use crate::bridge::EvmBridge;
use crate::logparse::{BindField, parse_swapout_log};

/// EIP-1167 minimal proxy runtime code: prefix ‖ master(20) ‖ suffix.
const EIP1167_PREFIX: &[u8] = &[
    0x36, 0x3d, 0x3d, 0x37, 0x3d, 0x3d, 0x3d, 0x36, 0x3d, 0x73,
];
const EIP1167_SUFFIX: &[u8] = &[
    0x5a, 0xf4, 0x3d, 0x82, 0x80, 0x3e, 0x90, 0x3d, 0x91, 0x60, 0x2b, 0x57, 0xfd, 0x5b, 0xf3,
];

impl EvmBridge {
    pub(crate) async fn verify_erc20_swap_tx(
        &self,
        tx_hash: &str,
        log_index: u64,
        allow_unstable: bool,
    ) -> Result<SwapTxInfo, SwapError> {
        let mut swap_info = SwapTxInfo::new(SwapType::Erc20Swap, tx_hash, log_index);
        let hash: B256 = format!("0x{}", swap_info.hash)
            .parse()
            .map_err(|_| SwapError::TxNotFound)?;

        let receipt = self
            .gateway
            .get_transaction_receipt(hash)
            .await?
            .ok_or(SwapError::TxNotFound)?;
        let height = receipt.block_number.ok_or(SwapError::TxNotFound)?;
        if height < self.ctx.chain_config().initial_height {
            return Err(SwapError::TxBeforeInitialHeight);
        }
        if !receipt.status() {
            return Err(SwapError::TxWithWrongStatus);
        }
        swap_info.height = height;
        swap_info.timestamp = self.gateway.get_block_timestamp(height).await?;

        if !allow_unstable {
            let latest = self.gateway.get_latest_block_number().await?;
            let confirmations = latest.saturating_sub(height) + 1;
            if confirmations < self.ctx.chain_config().confirmations {
                return Err(SwapError::TxNotStable);
            }
        }

        swap_info.from = format!("{:#x}", receipt.from);
        swap_info.tx_to = receipt
            .to
            .map(|a| format!("{a:#x}"))
            .unwrap_or_default();

        let logs = receipt.inner.logs();
        let index = usize::try_from(log_index).map_err(|_| SwapError::LogIndexOutOfRange)?;
        if index >= logs.len() {
            return Err(SwapError::LogIndexOutOfRange);
        }
        let rlog = &logs[index];

        self.verify_swapout_log(&mut swap_info, rlog)?;
        self.check_call_by_contract(&swap_info).await?;
        check_swap_info(self.ctx.registry(), self, &swap_info)?;

        if !allow_unstable {
            tracing::info!(
                from = %swap_info.from,
                to = %swap_info.to,
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

    fn verify_swapout_log(
        &self,
        swap_info: &mut SwapTxInfo,
        rlog: &alloy_rpc_types_eth::Log,
    ) -> Result<(), SwapError> {
        let emitter = rlog.inner.address;
        swap_info.to = format!("{emitter:#x}");

        let parsed = parse_swapout_log(rlog.inner.data.topics(), &rlog.inner.data.data)?;
        if rlog.removed {
            return Err(SwapError::TxWithRemovedLog);
        }

        let erc20 = &mut swap_info.erc20_swap_info;
        erc20.token = format!("{:#x}", Address::from_word(parsed.token_word));
        swap_info.from = format!("{:#x}", Address::from_word(parsed.from_word));
        swap_info.bind = match parsed.bind {
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
        if !swap_info.to.eq_ignore_ascii_case(&router_contract) {
            tracing::warn!(have = %swap_info.to, want = %router_contract, "router contract mismatch");
            return Err(SwapError::TxWithWrongContract);
        }
        Ok(())
    }

    /// Accept a swap routed through another contract only when policy allows
    /// it: global flag, per-chain whitelist, a whitelisted EIP-1167 master,
    /// or a whitelisted code hash.
    pub(crate) async fn check_call_by_contract(
        &self,
        swap_info: &SwapTxInfo,
    ) -> Result<(), SwapError> {
        let tx_to = &swap_info.tx_to;
        let router_contract = self
            .ctx
            .get_router_contract(&swap_info.erc20_swap_info.token)
            .ok_or(SwapError::MissRouterInfo)?;

        if tx_to.eq_ignore_ascii_case(&router_contract) || self.policy.allow_call_by_contract {
            return Ok(());
        }
        let chain_id = self.ctx.chain_id();
        if self.policy.is_in_call_by_contract_whitelist(&chain_id, tx_to) {
            return Ok(());
        }
        if let Some(master) = self.get_eip1167_master(tx_to).await {
            let master = format!("{master:#x}");
            if self
                .policy
                .is_in_call_by_contract_whitelist(&chain_id, &master)
            {
                return Ok(());
            }
        }
        if self.policy.has_call_by_contract_code_hash_whitelist(&chain_id) {
            let code_hash = self.get_contract_code_hash(tx_to).await;
            if let Some(code_hash) = code_hash
                && self
                    .policy
                    .is_in_call_by_contract_code_hash_whitelist(&chain_id, &code_hash)
            {
                return Ok(());
            }
        }
        tracing::warn!(tx_to = %tx_to, want = %router_contract, "tx to with wrong contract");
        Err(SwapError::TxWithWrongContract)
    }

    async fn get_eip1167_master(&self, contract: &str) -> Option<Address> {
        let address: Address = contract.parse().ok()?;
        let code = self.gateway.get_code(address).await.ok()?;
        extract_eip1167_master(&code)
    }

    async fn get_contract_code_hash(&self, contract: &str) -> Option<String> {
        let address: Address = contract.parse().ok()?;
        let code = self.gateway.get_code(address).await.ok()?;
        if code.is_empty() {
            return None;
        }
        Some(format!("{:#x}", keccak256(&code)))
    }
}

/// Master address embedded in EIP-1167 minimal proxy runtime code, if the
/// code matches the canonical 45-byte pattern.
pub fn extract_eip1167_master(code: &[u8]) -> Option<Address> {
    if code.len() != EIP1167_PREFIX.len() + 20 + EIP1167_SUFFIX.len() {
        return None;
    }
    if !code.starts_with(EIP1167_PREFIX) || !code.ends_with(EIP1167_SUFFIX) {
        return None;
    }
    Some(Address::from_slice(&code[EIP1167_PREFIX.len()..EIP1167_PREFIX.len() + 20]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eip1167_master_extraction() {
        let master = Address::repeat_byte(0x5a);
        let mut code = EIP1167_PREFIX.to_vec();
        code.extend_from_slice(master.as_slice());
        code.extend_from_slice(EIP1167_SUFFIX);
        assert_eq!(extract_eip1167_master(&code), Some(master));

        assert_eq!(extract_eip1167_master(&code[..44]), None);
        let mut wrong = code.clone();
        wrong[0] = 0x00;
        assert_eq!(extract_eip1167_master(&wrong), None);
    }
}
