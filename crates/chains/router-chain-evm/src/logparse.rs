//! Swap-out event log decoding.
//!
//! The router contract emits one of three event forms; topic 0 selects the
//! decoder. These layouts are wire-frozen and shared with the Tron adapter,
//! which carries the same ABI behind a different address encoding.

use alloy_primitives::{B256, U256, b256};

use router_types::SwapError;

/// `LogAnySwapOut(address token, address from, address to, uint256 amount, uint256 fromChainID, uint256 toChainID)`
pub const LOG_ANY_SWAP_OUT_TOPIC: B256 =
    b256!("97116cf6cd4f6412bb47914d6db18da9e16ab2142f543b86e207c24fbd16b23a");
/// `LogAnySwapOut(address token, address from, string to, uint256 amount, uint256 fromChainID, uint256 toChainID)`
pub const LOG_ANY_SWAP_OUT2_TOPIC: B256 =
    b256!("409e0ad946b19f77602d6cf11d59e1796ddaa4828159a0b4fb7fa2ff6b161b79");
/// `LogAnySwapOutAndCall(address token, address from, string to, uint256 amount, uint256 fromChainID, uint256 toChainID, string anycallProxy, bytes data)`
pub const LOG_ANY_SWAP_OUT_AND_CALL_TOPIC: B256 =
    b256!("8e7e5695fff09074d4c7d6c71615fd382427677f75f460c522357233f3bd3ec3");

/// Bind recipient as carried by the event: an address topic for the
/// three-address form, a string for the string-recipient forms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindField {
    /// 32-byte topic word holding a right-aligned 20-byte address.
    AddressWord(B256),
    Text(String),
}

/// Decoded swap-out event, address words left in topic form so each chain
/// family applies its own address encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapoutLog {
    pub token_word: B256,
    pub from_word: B256,
    pub bind: BindField,
    pub value: U256,
    /// `None` when the form does not carry a trustworthy fromChainID and
    /// the bridge's own chain config must be used.
    pub from_chain_id: Option<U256>,
    pub to_chain_id: U256,
    pub call_proxy: Option<String>,
    pub call_data: Option<Vec<u8>>,
}

/// Decode a router swap-out log. Unknown topic 0 yields
/// [`SwapError::SwapoutLogNotFound`].
pub fn parse_swapout_log(topics: &[B256], data: &[u8]) -> Result<SwapoutLog, SwapError> {
    let topic0 = topics.first().ok_or(SwapError::TxWithWrongTopics)?;
    match *topic0 {
        LOG_ANY_SWAP_OUT_TOPIC => parse_swapout(topics, data),
        LOG_ANY_SWAP_OUT2_TOPIC => parse_swapout2(topics, data, false),
        LOG_ANY_SWAP_OUT_AND_CALL_TOPIC => parse_swapout2(topics, data, true),
        _ => Err(SwapError::SwapoutLogNotFound),
    }
}

fn parse_swapout(topics: &[B256], data: &[u8]) -> Result<SwapoutLog, SwapError> {
    if topics.len() != 4 {
        return Err(SwapError::TxWithWrongTopics);
    }
    if data.len() != 96 {
        return Err(SwapError::ParseDataError);
    }
    Ok(SwapoutLog {
        token_word: topics[1],
        from_word: topics[2],
        bind: BindField::AddressWord(topics[3]),
        value: get_big_int(data, 0)?,
        // This form's payload fromChainID is ignored; the bridge's own
        // chain config is authoritative.
        from_chain_id: None,
        to_chain_id: get_big_int(data, 64)?,
        call_proxy: None,
        call_data: None,
    })
}

fn parse_swapout2(topics: &[B256], data: &[u8], with_call: bool) -> Result<SwapoutLog, SwapError> {
    if topics.len() != 3 {
        return Err(SwapError::TxWithWrongTopics);
    }
    let min_len = if with_call { 288 } else { 160 };
    if data.len() < min_len {
        return Err(SwapError::ParseDataError);
    }
    let (call_proxy, call_data) = if with_call {
        (
            Some(parse_string_in_data(data, 128)?),
            Some(parse_bytes_in_data(data, 160)?),
        )
    } else {
        (None, None)
    };
    Ok(SwapoutLog {
        token_word: topics[1],
        from_word: topics[2],
        bind: BindField::Text(parse_string_in_data(data, 0)?),
        value: get_big_int(data, 32)?,
        from_chain_id: Some(get_big_int(data, 64)?),
        to_chain_id: get_big_int(data, 96)?,
        call_proxy,
        call_data,
    })
}

/// Read the 32-byte word at `offset` as an unsigned big integer.
pub fn get_big_int(data: &[u8], offset: usize) -> Result<U256, SwapError> {
    let end = offset.checked_add(32).ok_or(SwapError::ParseDataError)?;
    let word = data.get(offset..end).ok_or(SwapError::ParseDataError)?;
    Ok(U256::from_be_slice(word))
}

/// Decode a dynamically-offset ABI string whose offset word sits at `pos`.
pub fn parse_string_in_data(data: &[u8], pos: usize) -> Result<String, SwapError> {
    let bytes = parse_bytes_in_data(data, pos)?;
    String::from_utf8(bytes).map_err(|_| SwapError::ParseDataError)
}

/// Decode a dynamically-offset ABI `bytes` whose offset word sits at `pos`.
pub fn parse_bytes_in_data(data: &[u8], pos: usize) -> Result<Vec<u8>, SwapError> {
    let offset = get_big_int(data, pos)?;
    let offset = usize::try_from(offset).map_err(|_| SwapError::ParseDataError)?;
    let length = get_big_int(data, offset)?;
    let length = usize::try_from(length).map_err(|_| SwapError::ParseDataError)?;
    let start = offset.checked_add(32).ok_or(SwapError::ParseDataError)?;
    let end = start.checked_add(length).ok_or(SwapError::ParseDataError)?;
    data.get(start..end)
        .map(<[u8]>::to_vec)
        .ok_or(SwapError::ParseDataError)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{Address, address};

    fn word_of_address(addr: Address) -> B256 {
        addr.into_word()
    }

    fn u256_word(v: u64) -> [u8; 32] {
        B256::from(U256::from(v)).0
    }

    #[test]
    fn parse_three_address_form() {
        let token = address!("55d398326f99059ff775485246999027b3197955");
        let sender = address!("1111111111111111111111111111111111111111");
        let bind = address!("2222222222222222222222222222222222222222");
        let topics = vec![
            LOG_ANY_SWAP_OUT_TOPIC,
            word_of_address(token),
            word_of_address(sender),
            word_of_address(bind),
        ];
        let mut data = Vec::new();
        data.extend_from_slice(&u256_word(1_000_000));
        data.extend_from_slice(&u256_word(56));
        data.extend_from_slice(&u256_word(137));

        let log = parse_swapout_log(&topics, &data).unwrap();
        assert_eq!(log.token_word, word_of_address(token));
        assert_eq!(log.from_word, word_of_address(sender));
        assert_eq!(log.bind, BindField::AddressWord(word_of_address(bind)));
        assert_eq!(log.value, U256::from(1_000_000u64));
        assert!(log.from_chain_id.is_none());
        assert_eq!(log.to_chain_id, U256::from(137u64));
        assert!(log.call_proxy.is_none());
    }

    #[test]
    fn parse_string_recipient_form() {
        let token = address!("55d398326f99059ff775485246999027b3197955");
        let sender = address!("1111111111111111111111111111111111111111");
        let bind = "r3KC9kcSvn7ZKKpGHaujvrMRtp8rpJw2of";
        let topics = vec![
            LOG_ANY_SWAP_OUT2_TOPIC,
            word_of_address(token),
            word_of_address(sender),
        ];
        // head: bind offset, value, fromChainID, toChainID; tail: bind
        let mut data = Vec::new();
        data.extend_from_slice(&u256_word(128));
        data.extend_from_slice(&u256_word(777));
        data.extend_from_slice(&u256_word(56));
        data.extend_from_slice(&u256_word(1_000_005_788_240));
        data.extend_from_slice(&u256_word(bind.len() as u64));
        let mut tail = bind.as_bytes().to_vec();
        tail.resize(64, 0);
        data.extend_from_slice(&tail);

        let log = parse_swapout_log(&topics, &data).unwrap();
        assert_eq!(log.bind, BindField::Text(bind.to_string()));
        assert_eq!(log.value, U256::from(777u64));
        assert_eq!(log.from_chain_id, Some(U256::from(56u64)));
        assert_eq!(log.to_chain_id, U256::from(1_000_005_788_240u64));
    }

    #[test]
    fn unknown_topic_rejected() {
        let topics = vec![B256::repeat_byte(0xab)];
        assert_eq!(
            parse_swapout_log(&topics, &[]).unwrap_err(),
            SwapError::SwapoutLogNotFound
        );
    }

    #[test]
    fn short_data_rejected() {
        let topics = vec![
            LOG_ANY_SWAP_OUT_TOPIC,
            B256::ZERO,
            B256::ZERO,
            B256::ZERO,
        ];
        assert_eq!(
            parse_swapout_log(&topics, &[0u8; 95]).unwrap_err(),
            SwapError::ParseDataError
        );
    }

    #[test]
    fn wrong_topic_count_rejected() {
        let topics = vec![LOG_ANY_SWAP_OUT_TOPIC, B256::ZERO, B256::ZERO];
        assert_eq!(
            parse_swapout_log(&topics, &[0u8; 96]).unwrap_err(),
            SwapError::TxWithWrongTopics
        );
    }

    #[test]
    fn dynamic_bytes_bounds_checked() {
        // offset points past the buffer
        let mut data = vec![0u8; 64];
        data[31] = 0xF0;
        assert_eq!(
            parse_bytes_in_data(&data, 0).unwrap_err(),
            SwapError::ParseDataError
        );
    }
}
