//! Minimal protobuf writer for SIGN_MODE_DIRECT transactions.
//!
//! Only the handful of cosmos-sdk messages the swap-in path needs
//! (`MsgSend`, `TxBody`, `AuthInfo`, `SignDoc`, `TxRaw`) are encoded, by
//! hand, with the standard length-delimited wire format.

const WIRE_VARINT: u8 = 0;
const WIRE_LEN: u8 = 2;

fn tag(field: u32, wire: u8) -> u8 {
    ((field << 3) as u8) | wire
}

fn write_varint(out: &mut Vec<u8>, mut value: u64) {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            return;
        }
        out.push(byte | 0x80);
    }
}

fn put_varint(out: &mut Vec<u8>, field: u32, value: u64) {
    if value == 0 {
        return;
    }
    out.push(tag(field, WIRE_VARINT));
    write_varint(out, value);
}

fn put_bytes(out: &mut Vec<u8>, field: u32, value: &[u8]) {
    if value.is_empty() {
        return;
    }
    out.push(tag(field, WIRE_LEN));
    write_varint(out, value.len() as u64);
    out.extend_from_slice(value);
}

fn put_string(out: &mut Vec<u8>, field: u32, value: &str) {
    put_bytes(out, field, value.as_bytes());
}

/// `cosmos.base.v1beta1.Coin`
pub fn coin(denom: &str, amount: &str) -> Vec<u8> {
    let mut out = Vec::new();
    put_string(&mut out, 1, denom);
    put_string(&mut out, 2, amount);
    out
}

/// `cosmos.bank.v1beta1.MsgSend` wrapped in `google.protobuf.Any`.
pub fn msg_send_any(from: &str, to: &str, denom: &str, amount: &str) -> Vec<u8> {
    let mut msg = Vec::new();
    put_string(&mut msg, 1, from);
    put_string(&mut msg, 2, to);
    put_bytes(&mut msg, 3, &coin(denom, amount));

    let mut any = Vec::new();
    put_string(&mut any, 1, "/cosmos.bank.v1beta1.MsgSend");
    put_bytes(&mut any, 2, &msg);
    any
}

/// `cosmos.tx.v1beta1.TxBody`
pub fn tx_body(messages: &[Vec<u8>], memo: &str) -> Vec<u8> {
    let mut out = Vec::new();
    for message in messages {
        put_bytes(&mut out, 1, message);
    }
    put_string(&mut out, 2, memo);
    out
}

/// `cosmos.tx.v1beta1.AuthInfo` with a single DIRECT-mode secp256k1 signer.
pub fn auth_info(
    pubkey_compressed: &[u8],
    sequence: u64,
    fee_denom: &str,
    fee_amount: &str,
    gas_limit: u64,
) -> Vec<u8> {
    let mut pubkey = Vec::new();
    put_bytes(&mut pubkey, 1, pubkey_compressed);

    let mut pubkey_any = Vec::new();
    put_string(&mut pubkey_any, 1, "/cosmos.crypto.secp256k1.PubKey");
    put_bytes(&mut pubkey_any, 2, &pubkey);

    let mut single = Vec::new();
    put_varint(&mut single, 1, 1); // SIGN_MODE_DIRECT
    let mut mode_info = Vec::new();
    put_bytes(&mut mode_info, 1, &single);

    let mut signer_info = Vec::new();
    put_bytes(&mut signer_info, 1, &pubkey_any);
    put_bytes(&mut signer_info, 2, &mode_info);
    put_varint(&mut signer_info, 3, sequence);

    let mut fee = Vec::new();
    if !fee_amount.is_empty() && fee_amount != "0" {
        put_bytes(&mut fee, 1, &coin(fee_denom, fee_amount));
    }
    put_varint(&mut fee, 2, gas_limit);

    let mut out = Vec::new();
    put_bytes(&mut out, 1, &signer_info);
    put_bytes(&mut out, 2, &fee);
    out
}

/// `cosmos.tx.v1beta1.SignDoc`, the DIRECT-mode signing payload.
pub fn sign_doc(
    body_bytes: &[u8],
    auth_info_bytes: &[u8],
    chain_id: &str,
    account_number: u64,
) -> Vec<u8> {
    let mut out = Vec::new();
    put_bytes(&mut out, 1, body_bytes);
    put_bytes(&mut out, 2, auth_info_bytes);
    put_string(&mut out, 3, chain_id);
    put_varint(&mut out, 4, account_number);
    out
}

/// `cosmos.tx.v1beta1.TxRaw`, the broadcast payload.
pub fn tx_raw(body_bytes: &[u8], auth_info_bytes: &[u8], signature: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    put_bytes(&mut out, 1, body_bytes);
    put_bytes(&mut out, 2, auth_info_bytes);
    put_bytes(&mut out, 3, signature);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coin_layout() {
        let c = coin("uatom", "1000");
        // field 1 "uatom", field 2 "1000"
        assert_eq!(c[0], 0x0a);
        assert_eq!(c[1] as usize, 5);
        assert_eq!(&c[2..7], b"uatom");
        assert_eq!(c[7], 0x12);
        assert_eq!(c[8] as usize, 4);
        assert_eq!(&c[9..13], b"1000");
    }

    #[test]
    fn msg_send_any_has_type_url() {
        let any = msg_send_any("cosmos1from", "cosmos1to", "uatom", "7");
        let type_url = b"/cosmos.bank.v1beta1.MsgSend";
        assert_eq!(any[0], 0x0a);
        assert_eq!(any[1] as usize, type_url.len());
        assert_eq!(&any[2..2 + type_url.len()], type_url);
    }

    #[test]
    fn sign_doc_differs_from_tx_raw() {
        let body = tx_body(&[msg_send_any("a", "b", "u", "1")], "memo");
        let auth = auth_info(&[2u8; 33], 5, "u", "100", 200_000);
        let doc = sign_doc(&body, &auth, "testhub-1", 42);
        let raw = tx_raw(&body, &auth, &[1u8; 64]);
        assert_ne!(doc, raw);
        // Both embed body and auth info as their first two fields.
        assert_eq!(doc[0], 0x0a);
        assert_eq!(raw[0], 0x0a);
    }
}
