//! Swap-out memo parsing.
//!
//! Cosmos deposits carry the routing request in the transaction memo as
//! `<bind>:<toChainID>`; the transfer event supplies token and value.

use router_types::{ChainId, SwapError, SwapTxInfo};

/// Parse the swap memo into the record's bind and destination chain.
pub fn parse_memo(swap_info: &mut SwapTxInfo, memo: &str) -> Result<(), SwapError> {
    let (bind, to_chain_id) = memo.rsplit_once(':').ok_or(SwapError::SwapoutLogNotFound)?;
    if bind.is_empty() {
        return Err(SwapError::SwapoutLogNotFound);
    }
    let to_chain_id: ChainId = to_chain_id
        .parse()
        .map_err(|_| SwapError::SwapoutLogNotFound)?;
    if !to_chain_id.is_positive() {
        return Err(SwapError::SwapoutLogNotFound);
    }
    swap_info.bind = bind.to_string();
    swap_info.to_chain_id = to_chain_id;
    Ok(())
}

/// Split a Cosmos coin string like `1000uatom` into `(amount, denom)`.
pub fn split_coin_amount(coin: &str) -> Result<(u128, String), SwapError> {
    let digits_end = coin
        .find(|c: char| !c.is_ascii_digit())
        .ok_or(SwapError::ParseDataError)?;
    if digits_end == 0 {
        return Err(SwapError::ParseDataError);
    }
    let amount = coin[..digits_end]
        .parse::<u128>()
        .map_err(|_| SwapError::ParseDataError)?;
    Ok((amount, coin[digits_end..].to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use router_types::SwapType;

    #[test]
    fn memo_with_bind_and_chain() {
        let mut info = SwapTxInfo::new(SwapType::Erc20Swap, "aa", 0);
        parse_memo(&mut info, "0x1234567890123456789012345678901234567890:56").unwrap();
        assert_eq!(info.bind, "0x1234567890123456789012345678901234567890");
        assert_eq!(info.to_chain_id, ChainId::from_u64(56));
    }

    #[test]
    fn bad_memos_rejected() {
        let mut info = SwapTxInfo::new(SwapType::Erc20Swap, "aa", 0);
        assert!(parse_memo(&mut info, "no separator").is_err());
        assert!(parse_memo(&mut info, ":56").is_err());
        assert!(parse_memo(&mut info, "addr:notanumber").is_err());
        assert!(parse_memo(&mut info, "addr:0").is_err());
    }

    #[test]
    fn coin_amount_split() {
        assert_eq!(
            split_coin_amount("1000uatom").unwrap(),
            (1000, "uatom".to_string())
        );
        assert_eq!(
            split_coin_amount("5ibc/27394FB092D2EC").unwrap(),
            (5, "ibc/27394FB092D2EC".to_string())
        );
        assert!(split_coin_amount("uatom").is_err());
        assert!(split_coin_amount("123").is_err());
    }
}
