//! Minimal DER encoding of a 64-byte `r ‖ s` ECDSA signature, shared by the
//! chains whose ledgers want DER rather than fixed-width rsv.

use router_types::SwapError;

pub fn der_encode_signature(rs: &[u8]) -> Result<Vec<u8>, SwapError> {
    if rs.len() != 64 {
        return Err(SwapError::SignatureVerifyFailed);
    }
    let encode_int = |bytes: &[u8]| -> Vec<u8> {
        let trimmed: Vec<u8> = bytes.iter().copied().skip_while(|b| *b == 0).collect();
        let mut body = if trimmed.first().is_some_and(|b| b & 0x80 != 0) {
            let mut padded = vec![0u8];
            padded.extend(trimmed);
            padded
        } else if trimmed.is_empty() {
            vec![0u8]
        } else {
            trimmed
        };
        let mut out = vec![0x02, body.len() as u8];
        out.append(&mut body);
        out
    };
    let r = encode_int(&rs[..32]);
    let s = encode_int(&rs[32..]);
    let mut out = vec![0x30, (r.len() + s.len()) as u8];
    out.extend(r);
    out.extend(s);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_leading_zeroes_and_pads_high_bit() {
        let mut rs = [0u8; 64];
        rs[0] = 0x80;
        rs[63] = 0x01;
        let der = der_encode_signature(&rs).unwrap();
        assert_eq!(der[0], 0x30);
        assert_eq!(der[2], 0x02);
        assert_eq!(der[3], 33);
        assert_eq!(*der.last().unwrap(), 0x01);
        assert!(der_encode_signature(&[0u8; 63]).is_err());
    }
}
