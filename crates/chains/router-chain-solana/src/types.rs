//! Minimal Solana message/transaction types.
//!
//! Only what the swap-in path needs: positional account metadata, legacy
//! message compilation with the canonical signer/writability ordering, and
//! the short-vec wire encoding.

use solana_pubkey::Pubkey;

use router_types::SwapError;

/// Well-known program IDs.
pub const SYSTEM_PROGRAM_ID: &str = "11111111111111111111111111111111";
pub const TOKEN_PROGRAM_ID: &str = "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA";
pub const ATA_PROGRAM_ID: &str = "ATokenGPvbdGVxr1b2hvZbsiqW5xWH25efTNsLJA8knL";
pub const SYSVAR_RENT_ID: &str = "SysvarRent111111111111111111111111111111111";

/// Positional account metadata attached to an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountMeta {
    pub pubkey: Pubkey,
    pub is_signer: bool,
    pub is_writable: bool,
}

impl AccountMeta {
    pub fn new(pubkey: Pubkey, is_signer: bool) -> Self {
        AccountMeta {
            pubkey,
            is_signer,
            is_writable: true,
        }
    }

    pub fn new_readonly(pubkey: Pubkey, is_signer: bool) -> Self {
        AccountMeta {
            pubkey,
            is_signer,
            is_writable: false,
        }
    }
}

/// An instruction ready for message compilation.
#[derive(Debug, Clone)]
pub struct CompiledInstructionInput {
    pub program_id: Pubkey,
    pub accounts: Vec<AccountMeta>,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageHeader {
    pub num_required_signatures: u8,
    pub num_readonly_signed_accounts: u8,
    pub num_readonly_unsigned_accounts: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledInstruction {
    pub program_id_index: u8,
    pub accounts: Vec<u8>,
    pub data: Vec<u8>,
}

/// A legacy Solana message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub header: MessageHeader,
    pub account_keys: Vec<Pubkey>,
    pub recent_blockhash: [u8; 32],
    pub instructions: Vec<CompiledInstruction>,
}

impl Message {
    /// Compile one instruction with `fee_payer` as the only required signer.
    pub fn compile(
        fee_payer: Pubkey,
        instruction: &CompiledInstructionInput,
        recent_blockhash: [u8; 32],
    ) -> Result<Self, SwapError> {
        let mut metas = vec![AccountMeta::new(fee_payer, true)];
        for meta in &instruction.accounts {
            match metas.iter_mut().find(|m| m.pubkey == meta.pubkey) {
                Some(existing) => {
                    existing.is_signer |= meta.is_signer;
                    existing.is_writable |= meta.is_writable;
                }
                None => metas.push(*meta),
            }
        }
        if !metas.iter().any(|m| m.pubkey == instruction.program_id) {
            metas.push(AccountMeta::new_readonly(instruction.program_id, false));
        }

        // Canonical ordering: writable signers, readonly signers, writable
        // non-signers, readonly non-signers.
        let mut ordered: Vec<AccountMeta> = Vec::with_capacity(metas.len());
        for (want_signer, want_writable) in
            [(true, true), (true, false), (false, true), (false, false)]
        {
            ordered.extend(
                metas
                    .iter()
                    .filter(|m| m.is_signer == want_signer && m.is_writable == want_writable),
            );
        }

        let num_required_signatures = ordered.iter().filter(|m| m.is_signer).count() as u8;
        let num_readonly_signed_accounts = ordered
            .iter()
            .filter(|m| m.is_signer && !m.is_writable)
            .count() as u8;
        let num_readonly_unsigned_accounts = ordered
            .iter()
            .filter(|m| !m.is_signer && !m.is_writable)
            .count() as u8;

        let account_keys: Vec<Pubkey> = ordered.iter().map(|m| m.pubkey).collect();
        let index_of = |key: &Pubkey| -> Result<u8, SwapError> {
            account_keys
                .iter()
                .position(|k| k == key)
                .map(|i| i as u8)
                .ok_or(SwapError::ParseDataError)
        };

        let compiled = CompiledInstruction {
            program_id_index: index_of(&instruction.program_id)?,
            accounts: instruction
                .accounts
                .iter()
                .map(|m| index_of(&m.pubkey))
                .collect::<Result<Vec<_>, _>>()?,
            data: instruction.data.clone(),
        };

        Ok(Message {
            header: MessageHeader {
                num_required_signatures,
                num_readonly_signed_accounts,
                num_readonly_unsigned_accounts,
            },
            account_keys,
            recent_blockhash,
            instructions: vec![compiled],
        })
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.push(self.header.num_required_signatures);
        out.push(self.header.num_readonly_signed_accounts);
        out.push(self.header.num_readonly_unsigned_accounts);
        encode_shortvec_len(&mut out, self.account_keys.len());
        for key in &self.account_keys {
            out.extend_from_slice(&key.to_bytes());
        }
        out.extend_from_slice(&self.recent_blockhash);
        encode_shortvec_len(&mut out, self.instructions.len());
        for instruction in &self.instructions {
            out.push(instruction.program_id_index);
            encode_shortvec_len(&mut out, instruction.accounts.len());
            out.extend_from_slice(&instruction.accounts);
            encode_shortvec_len(&mut out, instruction.data.len());
            out.extend_from_slice(&instruction.data);
        }
        out
    }
}

/// Serialize a signed transaction: signature short-vec followed by the
/// message bytes.
pub fn serialize_transaction(signatures: &[[u8; 64]], message_bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(1 + signatures.len() * 64 + message_bytes.len());
    encode_shortvec_len(&mut out, signatures.len());
    for signature in signatures {
        out.extend_from_slice(signature);
    }
    out.extend_from_slice(message_bytes);
    out
}

/// Solana's compact-u16 length prefix.
pub fn encode_shortvec_len(out: &mut Vec<u8>, mut len: usize) {
    loop {
        let mut byte = (len & 0x7f) as u8;
        len >>= 7;
        if len != 0 {
            byte |= 0x80;
        }
        out.push(byte);
        if len == 0 {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn key(byte: u8) -> Pubkey {
        Pubkey::new_from_array([byte; 32])
    }

    #[test]
    fn shortvec_encoding() {
        let mut out = Vec::new();
        encode_shortvec_len(&mut out, 0);
        assert_eq!(out, vec![0]);
        out.clear();
        encode_shortvec_len(&mut out, 5);
        assert_eq!(out, vec![5]);
        out.clear();
        encode_shortvec_len(&mut out, 0x7f);
        assert_eq!(out, vec![0x7f]);
        out.clear();
        encode_shortvec_len(&mut out, 0x80);
        assert_eq!(out, vec![0x80, 0x01]);
        out.clear();
        encode_shortvec_len(&mut out, 0x3fff);
        assert_eq!(out, vec![0xff, 0x7f]);
    }

    #[test]
    fn compile_orders_signers_first() {
        let payer = key(1);
        let writable = key(2);
        let readonly = key(3);
        let program = Pubkey::from_str(SYSTEM_PROGRAM_ID).unwrap();
        let instruction = CompiledInstructionInput {
            program_id: program,
            accounts: vec![
                AccountMeta::new_readonly(readonly, false),
                AccountMeta::new(writable, false),
                AccountMeta::new(payer, true),
            ],
            data: vec![1, 2, 3],
        };
        let message = Message::compile(payer, &instruction, [9u8; 32]).unwrap();
        assert_eq!(message.header.num_required_signatures, 1);
        assert_eq!(message.account_keys[0], payer);
        assert_eq!(message.account_keys[1], writable);
        // readonly non-signers last
        assert!(message.account_keys[2..].contains(&readonly));
        assert!(message.account_keys[2..].contains(&program));

        let compiled = &message.instructions[0];
        assert_eq!(compiled.data, vec![1, 2, 3]);
        assert_eq!(compiled.accounts.len(), 3);
        // first referenced account is the readonly one
        assert_eq!(
            message.account_keys[compiled.accounts[0] as usize],
            readonly
        );
    }

    #[test]
    fn duplicate_metas_merge_flags() {
        let payer = key(1);
        let program = Pubkey::from_str(SYSTEM_PROGRAM_ID).unwrap();
        let instruction = CompiledInstructionInput {
            program_id: program,
            accounts: vec![
                AccountMeta::new_readonly(payer, false),
                AccountMeta::new(payer, true),
            ],
            data: vec![],
        };
        let message = Message::compile(payer, &instruction, [0u8; 32]).unwrap();
        // payer appears once, as a writable signer
        assert_eq!(
            message
                .account_keys
                .iter()
                .filter(|k| **k == payer)
                .count(),
            1
        );
        assert_eq!(message.header.num_required_signatures, 1);
    }

    #[test]
    fn transaction_layout() {
        let payer = key(1);
        let program = Pubkey::from_str(SYSTEM_PROGRAM_ID).unwrap();
        let instruction = CompiledInstructionInput {
            program_id: program,
            accounts: vec![AccountMeta::new(payer, true)],
            data: vec![7],
        };
        let message = Message::compile(payer, &instruction, [3u8; 32]).unwrap();
        let bytes = message.serialize();
        let tx = serialize_transaction(&[[0xAB; 64]], &bytes);
        assert_eq!(tx[0], 1);
        assert_eq!(&tx[1..65], &[0xAB; 64]);
        assert_eq!(&tx[65..], bytes.as_slice());
    }
}
