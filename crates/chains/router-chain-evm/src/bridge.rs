//! EVM-family bridge: the reference verify/build/sign/broadcast pipeline.

use std::str::FromStr;
use std::sync::Arc;

use alloy_consensus::{SignableTransaction, TxEnvelope, TxLegacy};
use alloy_eips::eip2718::Encodable2718;
use alloy_primitives::{Address, B256, Signature, TxKind, U256};
use alloy_sol_types::{SolCall, sol};

use router_mpc::SignerBackend;
use router_types::rawtx::{EvmRawTx, EvmSignedTx};
use router_types::{BridgeContext, BuildTxArgs, RouterConfig, SwapError, value::calc_swap_value};

use crate::provider::EvmGateway;

sol! {
    function anySwapIn(bytes32 txs, address token, address to, uint256 amount, uint256 fromChainID);
}

/// Gas limit headroom applied on top of the node's estimate, percent.
const GAS_LIMIT_HEADROOM_PERCENT: u64 = 20;

pub struct EvmBridge {
    pub(crate) ctx: BridgeContext,
    pub(crate) gateway: EvmGateway,
    pub(crate) signer: Arc<SignerBackend>,
    pub(crate) policy: Arc<RouterConfig>,
}

impl EvmBridge {
    pub fn new(
        ctx: BridgeContext,
        signer: Arc<SignerBackend>,
        policy: Arc<RouterConfig>,
    ) -> Self {
        let gateway = EvmGateway::new(ctx.gateway_config());
        EvmBridge {
            ctx,
            gateway,
            signer,
            policy,
        }
    }

    pub(crate) fn mpc_address(&self) -> Result<(String, Address), SwapError> {
        let descriptor = self.signer.public_key(&self.ctx.chain_id())?;
        let address = public_key_hex_to_address(&descriptor.pubkey_hex)?;
        Ok((descriptor.pubkey_hex, address))
    }

    /// Encode the destination-side `anySwapIn` router call.
    pub(crate) fn build_swapin_calldata(
        &self,
        args: &BuildTxArgs,
        token: Address,
        amount: U256,
    ) -> Result<Vec<u8>, SwapError> {
        let mut swap_id = [0u8; 32];
        let id_bytes =
            hex::decode(&args.swap_id).map_err(|_| SwapError::ParseDataError)?;
        if id_bytes.len() != 32 {
            return Err(SwapError::ParseDataError);
        }
        swap_id.copy_from_slice(&id_bytes);
        let to = parse_address(&args.bind).ok_or(SwapError::WrongBindAddress)?;
        let call = anySwapInCall {
            txs: B256::from(swap_id),
            token,
            to,
            amount,
            fromChainID: args.from_chain_id.inner(),
        };
        Ok(call.abi_encode())
    }

    /// Resolve the destination token and fee-adjusted amount for a swap-in.
    pub(crate) fn resolve_swapin_token(
        &self,
        args: &BuildTxArgs,
    ) -> Result<(Address, U256), SwapError> {
        let registry = self.ctx.registry();
        let multichain_token = registry
            .get_multichain_token(&args.token_id, &args.to_chain_id)
            .ok_or(SwapError::MissTokenConfig)?;
        let token = parse_address(&multichain_token).ok_or(SwapError::MissTokenConfig)?;
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
        Ok((token, amount))
    }

    pub(crate) async fn build_swapin_tx(
        &self,
        args: &BuildTxArgs,
    ) -> Result<EvmRawTx, SwapError> {
        let (token, amount) = self.resolve_swapin_token(args)?;
        let router_contract = self
            .ctx
            .get_router_contract(&format!("{token:#x}"))
            .ok_or(SwapError::MissRouterInfo)?;
        let router = parse_address(&router_contract).ok_or(SwapError::MissRouterInfo)?;
        let data = self.build_swapin_calldata(args, token, amount)?;

        let (_, sender) = self.mpc_address()?;
        let nonce = match args.nonce {
            Some(n) => n,
            None => self.gateway.get_pending_nonce(sender).await?,
        };
        let gas_price = self.gateway.get_gas_price().await?;
        let request = alloy_rpc_types_eth::TransactionRequest {
            from: Some(sender),
            to: Some(TxKind::Call(router)),
            input: alloy_rpc_types_eth::TransactionInput::new(data.clone().into()),
            ..Default::default()
        };
        let estimate = self.gateway.estimate_gas(request).await?;
        let gas_limit = estimate + estimate * GAS_LIMIT_HEADROOM_PERCENT / 100;

        Ok(EvmRawTx {
            chain_id: self.ctx.chain_id().as_u64(),
            nonce,
            gas_price,
            gas_limit,
            to: format!("{router:#x}"),
            value: U256::ZERO,
            data,
        })
    }

    pub(crate) async fn sign_legacy_tx(
        &self,
        raw: &EvmRawTx,
        context: &str,
    ) -> Result<EvmSignedTx, SwapError> {
        let to = parse_address(&raw.to).ok_or(SwapError::WrongRawTx)?;
        let tx = TxLegacy {
            chain_id: Some(raw.chain_id),
            nonce: raw.nonce,
            gas_price: raw.gas_price,
            gas_limit: raw.gas_limit,
            to: TxKind::Call(to),
            value: raw.value,
            input: raw.data.clone().into(),
        };
        let sign_hash = tx.signature_hash();

        let (pubkey_hex, expected) = self.mpc_address()?;
        let rsv = self
            .signer
            .sign_ec(&self.ctx.chain_id(), &pubkey_hex, &sign_hash.0, context)
            .await?;
        let signature = signature_from_rsv(&rsv, &sign_hash, expected)?;

        let recovered = signature
            .recover_address_from_prehash(&sign_hash)
            .map_err(|_| SwapError::SignatureVerifyFailed)?;
        if recovered != expected {
            tracing::error!(%recovered, %expected, "mpc signature does not match signer");
            return Err(SwapError::SignatureVerifyFailed);
        }

        let signed = tx.into_signed(signature);
        let tx_hash = format!("{:#x}", signed.hash());
        let envelope = TxEnvelope::Legacy(signed);
        Ok(EvmSignedTx {
            encoded: envelope.encoded_2718(),
            tx_hash,
        })
    }
}

/// Assemble an alloy signature from a 64/65-byte rsv, recovering the parity
/// byte when the MPC service omits it.
fn signature_from_rsv(
    rsv: &[u8],
    sign_hash: &B256,
    expected: Address,
) -> Result<Signature, SwapError> {
    if rsv.len() != 64 && rsv.len() != 65 {
        return Err(SwapError::SignatureVerifyFailed);
    }
    let r = U256::from_be_slice(&rsv[0..32]);
    let s = U256::from_be_slice(&rsv[32..64]);
    if rsv.len() == 65 {
        // v arrives as a recovery id (0/1) or in legacy 27/28 form
        let v = rsv[64];
        let parity = if v >= 27 { (v - 27) & 1 == 1 } else { v & 1 == 1 };
        return Ok(Signature::new(r, s, parity));
    }
    for parity in [false, true] {
        let candidate = Signature::new(r, s, parity);
        if candidate
            .recover_address_from_prehash(sign_hash)
            .is_ok_and(|a| a == expected)
        {
            return Ok(candidate);
        }
    }
    Err(SwapError::SignatureVerifyFailed)
}

pub(crate) fn parse_address(s: &str) -> Option<Address> {
    Address::from_str(s).ok()
}

/// Syntax check: 0x-prefixed 20-byte hex.
pub fn is_valid_address(address: &str) -> bool {
    parse_address(address).is_some()
}

/// Keccak address of a hex-encoded secp256k1 public key (compressed or
/// uncompressed).
pub fn public_key_hex_to_address(pubkey_hex: &str) -> Result<Address, SwapError> {
    let stripped = pubkey_hex.strip_prefix("0x").unwrap_or(pubkey_hex);
    let bytes = hex::decode(stripped)
        .map_err(|e| SwapError::WrongConfig(format!("bad public key hex: {e}")))?;
    let key = k256::ecdsa::VerifyingKey::from_sec1_bytes(&bytes)
        .map_err(|e| SwapError::WrongConfig(format!("bad secp256k1 public key: {e}")))?;
    Ok(Address::from_public_key(&key))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_validation() {
        assert!(is_valid_address(
            "0x55d398326f99059fF775485246999027B3197955"
        ));
        assert!(!is_valid_address("55d398326f99059f"));
        assert!(!is_valid_address("r3KC9kcSvn7ZKKpGHaujvrMRtp8rpJw2of"));
    }

    #[test]
    fn public_key_to_address_roundtrip() {
        // Well-known test vector: key 0x01.
        let pubkey = "0479be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798483ada7726a3c4655da4fbfc0e1108a8fd17b448a68554199c47d08ffb10d4b8";
        let address = public_key_hex_to_address(pubkey).unwrap();
        assert_eq!(
            format!("{address:#x}"),
            "0x7e5f4552091a69125d5dfcb7b8c2659029395bdf"
        );
        assert!(is_valid_address(&format!("{address:#x}")));
    }

    #[test]
    fn rsv_missing_parity_is_recovered() {
        let key = k256::ecdsa::SigningKey::from_slice(&[7u8; 32]).unwrap();
        let hash = B256::repeat_byte(0x42);
        use k256::ecdsa::signature::hazmat::PrehashSigner;
        let (sig, recid): (k256::ecdsa::Signature, k256::ecdsa::RecoveryId) =
            key.sign_prehash(&hash.0).unwrap();
        let expected = Address::from_public_key(key.verifying_key());

        let mut rsv65 = sig.to_vec();
        rsv65.push(recid.to_byte());
        let s65 = signature_from_rsv(&rsv65, &hash, expected).unwrap();
        assert_eq!(s65.recover_address_from_prehash(&hash).unwrap(), expected);

        let rsv64 = sig.to_vec();
        let s64 = signature_from_rsv(&rsv64, &hash, expected).unwrap();
        assert_eq!(s64.recover_address_from_prehash(&hash).unwrap(), expected);
    }

    #[test]
    fn swapin_calldata_shape() {
        let call = anySwapInCall {
            txs: B256::repeat_byte(1),
            token: Address::repeat_byte(2),
            to: Address::repeat_byte(3),
            amount: U256::from(10u64),
            fromChainID: U256::from(56u64),
        };
        let encoded = call.abi_encode();
        assert_eq!(encoded.len(), 4 + 5 * 32);
        assert_eq!(&encoded[..4], anySwapInCall::SELECTOR.as_slice());
    }
}
