//! Cosmos bridge: memo-encoded swap metadata and event-log verification.

use std::sync::Arc;

use alloy_primitives::U256;
use base64::Engine;
use bech32::Hrp;
use ripemd::Ripemd160;
use sha2::{Digest, Sha256};

use router_mpc::SignerBackend;
use router_types::rawtx::{CosmosRawTx, CosmosSignedTx};
use router_types::{
    BridgeContext, BuildTxArgs, ChainId, Network, SwapError, SwapTxInfo, SwapType,
    check_swap_info, stub_chain_id, value::calc_swap_value,
};

use crate::memo::{parse_memo, split_coin_amount};
use crate::proto;
use crate::rpc::{CosmosRpcClient, TxLog};

const DEFAULT_GAS_LIMIT: u64 = 200_000;
const DEFAULT_FEE_AMOUNT: &str = "2000";

pub fn supports_chain_id(chain_id: &ChainId) -> bool {
    router_types::stub_chain_ids("COSMOS").contains(chain_id)
}

pub fn get_stub_chain_id(network: Network) -> ChainId {
    stub_chain_id("COSMOS", network)
}

pub struct CosmosBridge {
    pub(crate) ctx: BridgeContext,
    pub(crate) rpc: CosmosRpcClient,
    pub(crate) signer: Arc<SignerBackend>,
    /// Bech32 human-readable prefix, taken from the router account.
    pub(crate) bech32_prefix: String,
}

impl CosmosBridge {
    pub fn new(ctx: BridgeContext, signer: Arc<SignerBackend>) -> Result<Self, SwapError> {
        let rpc = CosmosRpcClient::new(ctx.gateway_config())?;
        let router = ctx.chain_config().router_contract.clone();
        let bech32_prefix = router
            .rfind('1')
            .map(|i| router[..i].to_string())
            .filter(|p| !p.is_empty())
            .ok_or_else(|| {
                SwapError::WrongConfig("cosmos router contract is not bech32".into())
            })?;
        Ok(CosmosBridge {
            ctx,
            rpc,
            signer,
            bech32_prefix,
        })
    }

    pub(crate) fn validate_address(&self, address: &str) -> bool {
        match bech32::decode(address) {
            Ok((hrp, _)) => hrp.as_str() == self.bech32_prefix,
            Err(_) => false,
        }
    }

    pub(crate) fn pubkey_to_address(&self, pubkey_hex: &str) -> Result<String, SwapError> {
        let stripped = pubkey_hex.strip_prefix("0x").unwrap_or(pubkey_hex);
        let pubkey = hex::decode(stripped)
            .map_err(|e| SwapError::WrongConfig(format!("bad public key hex: {e}")))?;
        if pubkey.len() != 33 {
            return Err(SwapError::WrongConfig(
                "cosmos needs a compressed secp256k1 key".into(),
            ));
        }
        let sha = Sha256::digest(&pubkey);
        let account_hash = Ripemd160::digest(sha);
        let hrp = Hrp::parse(&self.bech32_prefix)
            .map_err(|e| SwapError::WrongConfig(format!("bad bech32 prefix: {e}")))?;
        bech32::encode::<bech32::Bech32>(hrp, &account_hash)
            .map_err(|e| SwapError::WrongConfig(format!("bech32 encode: {e}")))
    }

    /// Walk `logs[1..]` (or the single requested index) and decode each into
    /// a swap record, returning parallel aligned slices.
    pub(crate) async fn register_erc20_swap_tx(
        &self,
        tx_hash: &str,
        log_index: u64,
    ) -> (Vec<SwapTxInfo>, Vec<Option<SwapError>>) {
        let mut common = SwapTxInfo::new(SwapType::Erc20Swap, tx_hash, log_index);
        common.from_chain_id = self.ctx.chain_id();

        // the LCD wants the hash as submitted, not normalized
        let result = match self.rpc.get_transaction(tx_hash).await {
            Ok(r) => r,
            Err(e) => return (vec![common], vec![Some(e)]),
        };
        let Some(tx_response) = result.tx_response else {
            return (vec![common], vec![Some(SwapError::TxNotFound)]);
        };
        if tx_response.code != 0 {
            return (vec![common], vec![Some(SwapError::TxWithWrongStatus)]);
        }
        common.height = tx_response.height.parse().unwrap_or_default();
        if common.height < self.ctx.chain_config().initial_height {
            return (vec![common], vec![Some(SwapError::TxBeforeInitialHeight)]);
        }

        let memo = result
            .tx
            .and_then(|t| t.body)
            .map(|b| b.memo)
            .unwrap_or_default();
        if let Err(e) = parse_memo(&mut common, &memo) {
            return (vec![common], vec![Some(e)]);
        }

        // Event logs are 1-based here: index 0 means "all".
        let log_count = tx_response.logs.len() as u64;
        let (start, end) = if log_index == 0 {
            (1, log_count + 1)
        } else if log_index > log_count {
            return (vec![common], vec![Some(SwapError::LogIndexOutOfRange)]);
        } else {
            (log_index, log_index + 1)
        };

        let mut swap_infos = Vec::new();
        let mut errs = Vec::new();
        for i in start..end {
            let mut swap_info = common.clone();
            swap_info.log_index = i;
            let mut err = self
                .parse_amount_total(&tx_response.logs[(i - 1) as usize], &mut swap_info);
            if err.is_none() {
                err = check_swap_info(self.ctx.registry(), self, &swap_info).err();
            }
            if let Some(e) = &err {
                tracing::debug!(tx_hash, log_index = i, error = %e, "register swap entry failed");
            }
            swap_infos.push(swap_info);
            errs.push(err);
        }
        if swap_infos.is_empty() {
            return (vec![common], vec![Some(SwapError::SwapoutLogNotFound)]);
        }
        (swap_infos, errs)
    }

    /// Decode one event log: a `transfer` event whose recipient is the
    /// router account carries the deposited coin.
    fn parse_amount_total(
        &self,
        log: &TxLog,
        swap_info: &mut SwapTxInfo,
    ) -> Option<SwapError> {
        let router = &self.ctx.chain_config().router_contract;
        let mut total = U256::ZERO;
        let mut denom = String::new();
        for event in &log.events {
            if event.event_type != "transfer" {
                continue;
            }
            let mut recipient = None;
            let mut sender = None;
            let mut amount = None;
            for attribute in &event.attributes {
                match attribute.key.as_str() {
                    "recipient" => recipient = Some(attribute.value.as_str()),
                    "sender" => sender = Some(attribute.value.as_str()),
                    "amount" => amount = Some(attribute.value.as_str()),
                    _ => {}
                }
            }
            if recipient != Some(router.as_str()) {
                continue;
            }
            let Some(amount) = amount else {
                return Some(SwapError::ParseDataError);
            };
            let (value, coin_denom) = match split_coin_amount(amount) {
                Ok(v) => v,
                Err(e) => return Some(e),
            };
            if !denom.is_empty() && denom != coin_denom {
                continue;
            }
            denom = coin_denom;
            total += U256::from(value);
            if let Some(sender) = sender {
                swap_info.from = sender.to_string();
            }
        }
        if total.is_zero() || denom.is_empty() {
            return Some(SwapError::SwapoutLogNotFound);
        }
        let token_cfg = match self.ctx.get_token_config(&denom) {
            Some(t) => t,
            None => return Some(SwapError::MissTokenConfig),
        };
        swap_info.to = router.clone();
        swap_info.tx_to = router.clone();
        swap_info.value = total;
        swap_info.erc20_swap_info.token = denom;
        swap_info.erc20_swap_info.token_id = token_cfg.token_id;
        None
    }

    pub(crate) async fn build_swapin_tx(
        &self,
        args: &BuildTxArgs,
    ) -> Result<CosmosRawTx, SwapError> {
        let registry = self.ctx.registry();
        let denom = registry
            .get_multichain_token(&args.token_id, &args.to_chain_id)
            .ok_or(SwapError::MissTokenConfig)?;
        let to_token = self
            .ctx
            .get_token_config(&denom)
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
        if !self.validate_address(&args.bind) {
            return Err(SwapError::WrongBindAddress);
        }

        let descriptor = self.signer.public_key(&self.ctx.chain_id())?;
        let sender = self.pubkey_to_address(&descriptor.pubkey_hex)?;
        let (account_number, sequence) = self.rpc.get_account(&sender).await?;
        let sequence = args.nonce.unwrap_or(sequence);
        let chain_id = self.rpc.get_chain_id().await?;

        let memo = format!("swapin:{}", args.swap_id);
        let body_bytes = proto::tx_body(
            &[proto::msg_send_any(
                &sender,
                &args.bind,
                &denom,
                &amount.to_string(),
            )],
            &memo,
        );
        let pubkey = hex::decode(&descriptor.pubkey_hex).map_err(|_| {
            SwapError::WrongConfig("bad cosmos signer public key hex".into())
        })?;
        let auth_info_bytes = proto::auth_info(
            &pubkey,
            sequence,
            &denom,
            DEFAULT_FEE_AMOUNT,
            DEFAULT_GAS_LIMIT,
        );
        Ok(CosmosRawTx {
            body_bytes,
            auth_info_bytes,
            chain_id,
            account_number,
            sequence,
            signer_pubkey: descriptor.pubkey_hex,
        })
    }

    pub(crate) async fn sign_tx(
        &self,
        raw: &CosmosRawTx,
        context: &str,
    ) -> Result<CosmosSignedTx, SwapError> {
        let sign_doc = proto::sign_doc(
            &raw.body_bytes,
            &raw.auth_info_bytes,
            &raw.chain_id,
            raw.account_number,
        );
        let digest: [u8; 32] = Sha256::digest(&sign_doc).into();

        let rsv = self
            .signer
            .sign_ec(&self.ctx.chain_id(), &raw.signer_pubkey, &digest, context)
            .await?;
        if rsv.len() < 64 {
            return Err(SwapError::SignatureVerifyFailed);
        }
        let signature = &rsv[..64];

        let pubkey = hex::decode(&raw.signer_pubkey)
            .map_err(|_| SwapError::SignatureVerifyFailed)?;
        let verifying_key = k256::ecdsa::VerifyingKey::from_sec1_bytes(&pubkey)
            .map_err(|_| SwapError::SignatureVerifyFailed)?;
        let parsed = k256::ecdsa::Signature::from_slice(signature)
            .map_err(|_| SwapError::SignatureVerifyFailed)?;
        use k256::ecdsa::signature::hazmat::PrehashVerifier;
        verifying_key
            .verify_prehash(&digest, &parsed)
            .map_err(|_| SwapError::SignatureVerifyFailed)?;

        let tx_raw = proto::tx_raw(&raw.body_bytes, &raw.auth_info_bytes, signature);
        let tx_hash = hex::encode_upper(Sha256::digest(&tx_raw));
        Ok(CosmosSignedTx {
            tx_bytes: base64::engine::general_purpose::STANDARD.encode(&tx_raw),
            tx_hash,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use router_types::{
        ChainConfig, GatewayConfig, MpcConfig, RouterRegistry, TokenConfig,
    };
    use std::collections::HashMap;

    fn test_bridge() -> CosmosBridge {
        let chain = ChainConfig {
            chain_id: get_stub_chain_id(Network::Mainnet),
            block_chain: "cosmos".into(),
            router_contract: "cosmos1fl48vsnmsdzcv85q5d2q4z5ajdha8yu34mf0eh".into(),
            confirmations: 1,
            initial_height: 0,
            router_contract_overrides: HashMap::new(),
        };
        let gateway = GatewayConfig {
            api_address: vec!["http://127.0.0.1:1317".parse().unwrap()],
            api_address_ext: vec![],
            rpc_client_timeout: 10,
        };
        let tokens = vec![TokenConfig {
            token_id: "ATOM".into(),
            decimals: 6,
            contract_address: "uatom".into(),
        }];
        let registry = Arc::new(RouterRegistry::new());
        let ctx = BridgeContext::new(chain, gateway, tokens, registry);
        let mpc = MpcConfig {
            api_address: vec![],
            use_fast_mpc: false,
            sign_with_private_key: true,
            signer_private_keys: HashMap::new(),
            signer_public_keys: HashMap::new(),
            sign_timeout: 10,
        };
        CosmosBridge::new(ctx, Arc::new(SignerBackend::new(mpc).unwrap())).unwrap()
    }

    #[test]
    fn bech32_prefix_from_router_account() {
        let bridge = test_bridge();
        assert_eq!(bridge.bech32_prefix, "cosmos");
        assert!(bridge.validate_address("cosmos1fl48vsnmsdzcv85q5d2q4z5ajdha8yu34mf0eh"));
        assert!(!bridge.validate_address("osmo1fl48vsnmsdzcv85q5d2q4z5ajdha8yu34mf0eh"));
        assert!(!bridge.validate_address("0x1111111111111111111111111111111111111111"));
    }

    #[test]
    fn pubkey_to_address_is_valid() {
        let bridge = test_bridge();
        let pubkey = "02b4632d08485ff1df2db55b9dafd23347d1c47a457072a1e87be26896549a8737";
        let address = bridge.pubkey_to_address(pubkey).unwrap();
        assert!(bridge.validate_address(&address));
    }

    #[test]
    fn transfer_event_to_router_parsed() {
        use crate::rpc::{Event, EventAttribute};
        let bridge = test_bridge();
        let log = TxLog {
            events: vec![Event {
                event_type: "transfer".into(),
                attributes: vec![
                    EventAttribute {
                        key: "recipient".into(),
                        value: bridge.ctx.chain_config().router_contract.clone(),
                    },
                    EventAttribute {
                        key: "sender".into(),
                        value: "cosmos1senderaddress".into(),
                    },
                    EventAttribute {
                        key: "amount".into(),
                        value: "2500000uatom".into(),
                    },
                ],
            }],
        };
        let mut info = SwapTxInfo::new(SwapType::Erc20Swap, "aa", 1);
        assert!(bridge.parse_amount_total(&log, &mut info).is_none());
        assert_eq!(info.value, U256::from(2_500_000u64));
        assert_eq!(info.erc20_swap_info.token, "uatom");
        assert_eq!(info.erc20_swap_info.token_id, "ATOM");
        assert_eq!(info.from, "cosmos1senderaddress");
    }

    #[test]
    fn transfer_to_other_account_ignored() {
        use crate::rpc::{Event, EventAttribute};
        let bridge = test_bridge();
        let log = TxLog {
            events: vec![Event {
                event_type: "transfer".into(),
                attributes: vec![
                    EventAttribute {
                        key: "recipient".into(),
                        value: "cosmos1somebodyelse".into(),
                    },
                    EventAttribute {
                        key: "amount".into(),
                        value: "2500000uatom".into(),
                    },
                ],
            }],
        };
        let mut info = SwapTxInfo::new(SwapType::Erc20Swap, "aa", 1);
        assert_eq!(
            bridge.parse_amount_total(&log, &mut info),
            Some(SwapError::SwapoutLogNotFound)
        );
    }
}
