//! Router-program instruction codec.
//!
//! Instructions serialize as `bigEndianUint64(sighash) ‖ borsh(payload)`.
//! Account metadata is positional runtime data and never part of the
//! payload, so decoding happens in two steps: the borsh payload first, then
//! a `set_accounts` post-hook that recovers account identity from the
//! compiled account list.

use borsh::{BorshDeserialize, BorshSerialize};
use solana_pubkey::Pubkey;

use router_types::SwapError;

use crate::sighash::SigHash;
use crate::types::AccountMeta;

// Wire-frozen discriminators: leading 8 bytes of SHA-256("global:<name>").
pub const INITIALIZE_TYPE_ID: SigHash = SigHash(hex_literal(0xafaf6d1f0d989bed));
pub const CREATE_ASSOCIATED_TOKEN_TYPE_ID: SigHash = SigHash(hex_literal(0x9105c275d5740bde));
pub const CHANGE_MPC_TYPE_ID: SigHash = SigHash(hex_literal(0x2ba8f0e21522a8ab));
pub const APPLY_MPC_TYPE_ID: SigHash = SigHash(hex_literal(0x2f6cb805db108c96));
pub const SWAPIN_MINT_TYPE_ID: SigHash = SigHash(hex_literal(0xbfe596d89e2bfab4));
pub const SWAPIN_TRANSFER_TYPE_ID: SigHash = SigHash(hex_literal(0xc8abfa6f944bb0c4));
pub const SWAPIN_NATIVE_TYPE_ID: SigHash = SigHash(hex_literal(0x475cf26f2e26f77a));
pub const SWAPOUT_BURN_TYPE_ID: SigHash = SigHash(hex_literal(0x76f70b25faacecef));
pub const SWAPOUT_TRANSFER_TYPE_ID: SigHash = SigHash(hex_literal(0x9152207ca5bb83bc));
pub const SWAPOUT_NATIVE_TYPE_ID: SigHash = SigHash(hex_literal(0x3b8e03e8d609f08f));
pub const SKIM_LAMPORTS_TYPE_ID: SigHash = SigHash(hex_literal(0xff2ebac3ceab6f31));
pub const ENABLE_SWAP_TRADE_TYPE_ID: SigHash = SigHash(hex_literal(0x5a884acc75571026));

const fn hex_literal(value: u64) -> [u8; 8] {
    value.to_be_bytes()
}

/// Swap-in payload: source tx id, amount, source chain.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct SwapinParams {
    pub tx: String,
    pub amount: u64,
    pub from_chain_id: u64,
}

/// Swap-out payload: destination recipient, amount, destination chain.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct SwapoutParams {
    pub to: String,
    pub amount: u64,
    pub to_chain_id: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct ChangeMpcParams {
    pub new_mpc: [u8; 32],
}

#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct SkimLamportsParams {
    pub amount: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct EnableSwapTradeParams {
    pub enable: bool,
}

/// Fixed account order: `[MPC, RouterAccount, To, TokenMint, TokenProgram]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapinMintAccounts {
    pub mpc: AccountMeta,
    pub router_account: AccountMeta,
    pub to: AccountMeta,
    pub token_mint: AccountMeta,
    pub token_program: AccountMeta,
}

/// Fixed account order: `[MPC, RouterAccount, From, To, TokenMint, TokenProgram]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapinTransferAccounts {
    pub mpc: AccountMeta,
    pub router_account: AccountMeta,
    pub from: AccountMeta,
    pub to: AccountMeta,
    pub token_mint: AccountMeta,
    pub token_program: AccountMeta,
}

/// Fixed account order: `[MPC, RouterAccount, To, SystemProgram]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapinNativeAccounts {
    pub mpc: AccountMeta,
    pub router_account: AccountMeta,
    pub to: AccountMeta,
    pub system_program: AccountMeta,
}

/// Fixed account order: `[MPC, RouterAccount, NewMPC]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeMpcAccounts {
    pub mpc: AccountMeta,
    pub router_account: AccountMeta,
    pub new_mpc: AccountMeta,
}

/// Fixed account order: `[Payer, Authority, Mint, AssociatedToken, Rent,
/// SystemProgram, TokenProgram, AssociatedTokenProgram]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateAssociatedTokenAccounts {
    pub payer: AccountMeta,
    pub authority: AccountMeta,
    pub mint: AccountMeta,
    pub associated_token: AccountMeta,
    pub rent: AccountMeta,
    pub system_program: AccountMeta,
    pub token_program: AccountMeta,
    pub associated_token_program: AccountMeta,
}

/// Fixed account order: `[MPC, RouterAccount]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnableSwapTradeAccounts {
    pub mpc: AccountMeta,
    pub router_account: AccountMeta,
}

/// The router program's instruction set, discriminated by sighash.
///
/// Account fields are `None` until `set_accounts` runs; swap-out and
/// administrative variants without a fixed published order keep the raw
/// positional list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouterInstruction {
    Initialize {
        accounts: Vec<AccountMeta>,
    },
    CreateAssociatedToken {
        accounts: Option<CreateAssociatedTokenAccounts>,
    },
    ChangeMpc {
        params: ChangeMpcParams,
        accounts: Option<ChangeMpcAccounts>,
    },
    ApplyMpc {
        params: ChangeMpcParams,
        accounts: Option<ChangeMpcAccounts>,
    },
    SwapinMint {
        params: SwapinParams,
        accounts: Option<SwapinMintAccounts>,
    },
    SwapinTransfer {
        params: SwapinParams,
        accounts: Option<SwapinTransferAccounts>,
    },
    SwapinNative {
        params: SwapinParams,
        accounts: Option<SwapinNativeAccounts>,
    },
    SwapoutBurn {
        params: SwapoutParams,
        accounts: Vec<AccountMeta>,
    },
    SwapoutTransfer {
        params: SwapoutParams,
        accounts: Vec<AccountMeta>,
    },
    SwapoutNative {
        params: SwapoutParams,
        accounts: Vec<AccountMeta>,
    },
    SkimLamports {
        params: SkimLamportsParams,
        accounts: Vec<AccountMeta>,
    },
    EnableSwapTrade {
        params: EnableSwapTradeParams,
        accounts: Option<EnableSwapTradeAccounts>,
    },
}

impl RouterInstruction {
    pub fn type_id(&self) -> SigHash {
        match self {
            RouterInstruction::Initialize { .. } => INITIALIZE_TYPE_ID,
            RouterInstruction::CreateAssociatedToken { .. } => CREATE_ASSOCIATED_TOKEN_TYPE_ID,
            RouterInstruction::ChangeMpc { .. } => CHANGE_MPC_TYPE_ID,
            RouterInstruction::ApplyMpc { .. } => APPLY_MPC_TYPE_ID,
            RouterInstruction::SwapinMint { .. } => SWAPIN_MINT_TYPE_ID,
            RouterInstruction::SwapinTransfer { .. } => SWAPIN_TRANSFER_TYPE_ID,
            RouterInstruction::SwapinNative { .. } => SWAPIN_NATIVE_TYPE_ID,
            RouterInstruction::SwapoutBurn { .. } => SWAPOUT_BURN_TYPE_ID,
            RouterInstruction::SwapoutTransfer { .. } => SWAPOUT_TRANSFER_TYPE_ID,
            RouterInstruction::SwapoutNative { .. } => SWAPOUT_NATIVE_TYPE_ID,
            RouterInstruction::SkimLamports { .. } => SKIM_LAMPORTS_TYPE_ID,
            RouterInstruction::EnableSwapTrade { .. } => ENABLE_SWAP_TRADE_TYPE_ID,
        }
    }

    /// `sighash ‖ borsh(payload)`; accounts are never serialized.
    pub fn encode(&self) -> Result<Vec<u8>, SwapError> {
        let mut out = self.type_id().0.to_vec();
        let payload = match self {
            RouterInstruction::Initialize { .. }
            | RouterInstruction::CreateAssociatedToken { .. } => Vec::new(),
            RouterInstruction::ChangeMpc { params, .. }
            | RouterInstruction::ApplyMpc { params, .. } => borsh_vec(params)?,
            RouterInstruction::SwapinMint { params, .. }
            | RouterInstruction::SwapinTransfer { params, .. }
            | RouterInstruction::SwapinNative { params, .. } => borsh_vec(params)?,
            RouterInstruction::SwapoutBurn { params, .. }
            | RouterInstruction::SwapoutTransfer { params, .. }
            | RouterInstruction::SwapoutNative { params, .. } => borsh_vec(params)?,
            RouterInstruction::SkimLamports { params, .. } => borsh_vec(params)?,
            RouterInstruction::EnableSwapTrade { params, .. } => borsh_vec(params)?,
        };
        out.extend_from_slice(&payload);
        Ok(out)
    }

    /// Decode instruction data and attach the positional account list.
    pub fn decode(accounts: &[AccountMeta], data: &[u8]) -> Result<Self, SwapError> {
        if data.len() < 8 {
            return Err(SwapError::ParseDataError);
        }
        let mut tag = [0u8; 8];
        tag.copy_from_slice(&data[..8]);
        let payload = &data[8..];

        let mut instruction = match SigHash(tag) {
            INITIALIZE_TYPE_ID => RouterInstruction::Initialize { accounts: vec![] },
            CREATE_ASSOCIATED_TOKEN_TYPE_ID => {
                RouterInstruction::CreateAssociatedToken { accounts: None }
            }
            CHANGE_MPC_TYPE_ID => RouterInstruction::ChangeMpc {
                params: borsh_from(payload)?,
                accounts: None,
            },
            APPLY_MPC_TYPE_ID => RouterInstruction::ApplyMpc {
                params: borsh_from(payload)?,
                accounts: None,
            },
            SWAPIN_MINT_TYPE_ID => RouterInstruction::SwapinMint {
                params: borsh_from(payload)?,
                accounts: None,
            },
            SWAPIN_TRANSFER_TYPE_ID => RouterInstruction::SwapinTransfer {
                params: borsh_from(payload)?,
                accounts: None,
            },
            SWAPIN_NATIVE_TYPE_ID => RouterInstruction::SwapinNative {
                params: borsh_from(payload)?,
                accounts: None,
            },
            SWAPOUT_BURN_TYPE_ID => RouterInstruction::SwapoutBurn {
                params: borsh_from(payload)?,
                accounts: vec![],
            },
            SWAPOUT_TRANSFER_TYPE_ID => RouterInstruction::SwapoutTransfer {
                params: borsh_from(payload)?,
                accounts: vec![],
            },
            SWAPOUT_NATIVE_TYPE_ID => RouterInstruction::SwapoutNative {
                params: borsh_from(payload)?,
                accounts: vec![],
            },
            SKIM_LAMPORTS_TYPE_ID => RouterInstruction::SkimLamports {
                params: borsh_from(payload)?,
                accounts: vec![],
            },
            ENABLE_SWAP_TRADE_TYPE_ID => RouterInstruction::EnableSwapTrade {
                params: borsh_from(payload)?,
                accounts: None,
            },
            _ => return Err(SwapError::SwapoutLogNotFound),
        };
        instruction.set_accounts(accounts)?;
        Ok(instruction)
    }

    /// Populate typed account records from the positional list. Borsh alone
    /// cannot recover account identity, hence this post-hook.
    pub fn set_accounts(&mut self, metas: &[AccountMeta]) -> Result<(), SwapError> {
        let need = |n: usize| -> Result<(), SwapError> {
            if metas.len() < n {
                Err(SwapError::ParseDataError)
            } else {
                Ok(())
            }
        };
        match self {
            RouterInstruction::Initialize { accounts }
            | RouterInstruction::SwapoutBurn { accounts, .. }
            | RouterInstruction::SwapoutTransfer { accounts, .. }
            | RouterInstruction::SwapoutNative { accounts, .. }
            | RouterInstruction::SkimLamports { accounts, .. } => {
                *accounts = metas.to_vec();
            }
            RouterInstruction::CreateAssociatedToken { accounts } => {
                need(8)?;
                *accounts = Some(CreateAssociatedTokenAccounts {
                    payer: metas[0],
                    authority: metas[1],
                    mint: metas[2],
                    associated_token: metas[3],
                    rent: metas[4],
                    system_program: metas[5],
                    token_program: metas[6],
                    associated_token_program: metas[7],
                });
            }
            RouterInstruction::ChangeMpc { accounts, .. }
            | RouterInstruction::ApplyMpc { accounts, .. } => {
                need(3)?;
                *accounts = Some(ChangeMpcAccounts {
                    mpc: metas[0],
                    router_account: metas[1],
                    new_mpc: metas[2],
                });
            }
            RouterInstruction::SwapinMint { accounts, .. } => {
                need(5)?;
                *accounts = Some(SwapinMintAccounts {
                    mpc: metas[0],
                    router_account: metas[1],
                    to: metas[2],
                    token_mint: metas[3],
                    token_program: metas[4],
                });
            }
            RouterInstruction::SwapinTransfer { accounts, .. } => {
                need(6)?;
                *accounts = Some(SwapinTransferAccounts {
                    mpc: metas[0],
                    router_account: metas[1],
                    from: metas[2],
                    to: metas[3],
                    token_mint: metas[4],
                    token_program: metas[5],
                });
            }
            RouterInstruction::SwapinNative { accounts, .. } => {
                need(4)?;
                *accounts = Some(SwapinNativeAccounts {
                    mpc: metas[0],
                    router_account: metas[1],
                    to: metas[2],
                    system_program: metas[3],
                });
            }
            RouterInstruction::EnableSwapTrade { accounts, .. } => {
                need(2)?;
                *accounts = Some(EnableSwapTradeAccounts {
                    mpc: metas[0],
                    router_account: metas[1],
                });
            }
        }
        Ok(())
    }

    /// The ordered account list for message compilation.
    pub fn account_metas(&self) -> Vec<AccountMeta> {
        match self {
            RouterInstruction::Initialize { accounts }
            | RouterInstruction::SwapoutBurn { accounts, .. }
            | RouterInstruction::SwapoutTransfer { accounts, .. }
            | RouterInstruction::SwapoutNative { accounts, .. }
            | RouterInstruction::SkimLamports { accounts, .. } => accounts.clone(),
            RouterInstruction::CreateAssociatedToken { accounts } => accounts
                .as_ref()
                .map(|a| {
                    vec![
                        a.payer,
                        a.authority,
                        a.mint,
                        a.associated_token,
                        a.rent,
                        a.system_program,
                        a.token_program,
                        a.associated_token_program,
                    ]
                })
                .unwrap_or_default(),
            RouterInstruction::ChangeMpc { accounts, .. }
            | RouterInstruction::ApplyMpc { accounts, .. } => accounts
                .as_ref()
                .map(|a| vec![a.mpc, a.router_account, a.new_mpc])
                .unwrap_or_default(),
            RouterInstruction::SwapinMint { accounts, .. } => accounts
                .as_ref()
                .map(|a| vec![a.mpc, a.router_account, a.to, a.token_mint, a.token_program])
                .unwrap_or_default(),
            RouterInstruction::SwapinTransfer { accounts, .. } => accounts
                .as_ref()
                .map(|a| {
                    vec![
                        a.mpc,
                        a.router_account,
                        a.from,
                        a.to,
                        a.token_mint,
                        a.token_program,
                    ]
                })
                .unwrap_or_default(),
            RouterInstruction::SwapinNative { accounts, .. } => accounts
                .as_ref()
                .map(|a| vec![a.mpc, a.router_account, a.to, a.system_program])
                .unwrap_or_default(),
            RouterInstruction::EnableSwapTrade { accounts, .. } => accounts
                .as_ref()
                .map(|a| vec![a.mpc, a.router_account])
                .unwrap_or_default(),
        }
    }
}

/// `SwapinMint` with the canonical flags: MPC writable+signer, recipient
/// and mint writable.
pub fn new_swapin_mint(
    tx: &str,
    amount: u64,
    from_chain_id: u64,
    mpc: Pubkey,
    router_account: Pubkey,
    to: Pubkey,
    token_mint: Pubkey,
    token_program: Pubkey,
) -> RouterInstruction {
    RouterInstruction::SwapinMint {
        params: SwapinParams {
            tx: tx.to_string(),
            amount,
            from_chain_id,
        },
        accounts: Some(SwapinMintAccounts {
            mpc: AccountMeta::new(mpc, true),
            router_account: AccountMeta::new_readonly(router_account, false),
            to: AccountMeta::new(to, false),
            token_mint: AccountMeta::new(token_mint, false),
            token_program: AccountMeta::new_readonly(token_program, false),
        }),
    }
}

pub fn new_swapin_transfer(
    tx: &str,
    amount: u64,
    from_chain_id: u64,
    mpc: Pubkey,
    router_account: Pubkey,
    from: Pubkey,
    to: Pubkey,
    token_mint: Pubkey,
    token_program: Pubkey,
) -> RouterInstruction {
    RouterInstruction::SwapinTransfer {
        params: SwapinParams {
            tx: tx.to_string(),
            amount,
            from_chain_id,
        },
        accounts: Some(SwapinTransferAccounts {
            mpc: AccountMeta::new(mpc, true),
            router_account: AccountMeta::new_readonly(router_account, false),
            from: AccountMeta::new(from, false),
            to: AccountMeta::new(to, false),
            token_mint: AccountMeta::new(token_mint, false),
            token_program: AccountMeta::new_readonly(token_program, false),
        }),
    }
}

/// `SwapinNative` moves lamports out of the router account, so it is
/// writable here.
pub fn new_swapin_native(
    tx: &str,
    amount: u64,
    from_chain_id: u64,
    mpc: Pubkey,
    router_account: Pubkey,
    to: Pubkey,
    system_program: Pubkey,
) -> RouterInstruction {
    RouterInstruction::SwapinNative {
        params: SwapinParams {
            tx: tx.to_string(),
            amount,
            from_chain_id,
        },
        accounts: Some(SwapinNativeAccounts {
            mpc: AccountMeta::new(mpc, true),
            router_account: AccountMeta::new(router_account, false),
            to: AccountMeta::new(to, false),
            system_program: AccountMeta::new_readonly(system_program, false),
        }),
    }
}

pub fn new_change_mpc(
    mpc: Pubkey,
    router_account: Pubkey,
    new_mpc: Pubkey,
) -> RouterInstruction {
    RouterInstruction::ChangeMpc {
        params: ChangeMpcParams {
            new_mpc: new_mpc.to_bytes(),
        },
        accounts: Some(ChangeMpcAccounts {
            mpc: AccountMeta::new(mpc, true),
            router_account: AccountMeta::new(router_account, false),
            new_mpc: AccountMeta::new_readonly(new_mpc, false),
        }),
    }
}

pub fn new_enable_swap_trade(
    enable: bool,
    mpc: Pubkey,
    router_account: Pubkey,
) -> RouterInstruction {
    RouterInstruction::EnableSwapTrade {
        params: EnableSwapTradeParams { enable },
        accounts: Some(EnableSwapTradeAccounts {
            mpc: AccountMeta::new(mpc, true),
            router_account: AccountMeta::new_readonly(router_account, false),
        }),
    }
}

fn borsh_vec<T: BorshSerialize>(value: &T) -> Result<Vec<u8>, SwapError> {
    borsh::to_vec(value).map_err(|_| SwapError::ParseDataError)
}

fn borsh_from<T: BorshDeserialize>(payload: &[u8]) -> Result<T, SwapError> {
    T::try_from_slice(payload).map_err(|_| SwapError::ParseDataError)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sighash::calc_sighash;

    fn key(byte: u8) -> Pubkey {
        Pubkey::new_from_array([byte; 32])
    }

    #[test]
    fn discriminators_match_sighash_of_names() {
        let cases = [
            ("initialize", INITIALIZE_TYPE_ID),
            ("create_associated_token", CREATE_ASSOCIATED_TOKEN_TYPE_ID),
            ("change_mpc", CHANGE_MPC_TYPE_ID),
            ("apply_mpc", APPLY_MPC_TYPE_ID),
            ("swapin_mint", SWAPIN_MINT_TYPE_ID),
            ("swapin_transfer", SWAPIN_TRANSFER_TYPE_ID),
            ("swapin_native", SWAPIN_NATIVE_TYPE_ID),
            ("swapout_burn", SWAPOUT_BURN_TYPE_ID),
            ("swapout_transfer", SWAPOUT_TRANSFER_TYPE_ID),
            ("swapout_native", SWAPOUT_NATIVE_TYPE_ID),
            ("skim_lamports", SKIM_LAMPORTS_TYPE_ID),
            ("enable_swap_trade", ENABLE_SWAP_TRADE_TYPE_ID),
        ];
        for (name, expected) in cases {
            assert_eq!(calc_sighash(name), expected, "{name}");
        }
    }

    #[test]
    fn swapin_mint_roundtrip() {
        let instruction = new_swapin_mint(
            "6c9f50fa3d9e2b4f",
            1_000_000,
            56,
            key(1),
            key(2),
            key(3),
            key(4),
            key(5),
        );
        let data = instruction.encode().unwrap();
        assert_eq!(&data[..8], SWAPIN_MINT_TYPE_ID.as_bytes());

        let metas = instruction.account_metas();
        assert_eq!(metas.len(), 5);
        assert!(metas[0].is_signer && metas[0].is_writable);

        let decoded = RouterInstruction::decode(&metas, &data).unwrap();
        assert_eq!(decoded.type_id(), instruction.type_id());
        assert_eq!(decoded, instruction);
    }

    #[test]
    fn all_variants_roundtrip() {
        let swapin = SwapinParams {
            tx: "ab".into(),
            amount: 7,
            from_chain_id: 1,
        };
        let swapout = SwapoutParams {
            to: "0x1111111111111111111111111111111111111111".into(),
            amount: 9,
            to_chain_id: 56,
        };
        let metas3 = vec![
            AccountMeta::new(key(1), true),
            AccountMeta::new(key(2), false),
            AccountMeta::new_readonly(key(3), false),
        ];
        let metas8: Vec<AccountMeta> = (1..=8)
            .map(|i| AccountMeta::new(key(i), i == 1))
            .collect();
        let cases: Vec<(RouterInstruction, Vec<AccountMeta>)> = vec![
            (
                RouterInstruction::Initialize { accounts: vec![] },
                metas3.clone(),
            ),
            (
                RouterInstruction::CreateAssociatedToken { accounts: None },
                metas8.clone(),
            ),
            (
                RouterInstruction::ChangeMpc {
                    params: ChangeMpcParams {
                        new_mpc: [7u8; 32],
                    },
                    accounts: None,
                },
                metas3.clone(),
            ),
            (
                RouterInstruction::ApplyMpc {
                    params: ChangeMpcParams {
                        new_mpc: [8u8; 32],
                    },
                    accounts: None,
                },
                metas3.clone(),
            ),
            (
                RouterInstruction::SwapinMint {
                    params: swapin.clone(),
                    accounts: None,
                },
                metas8[..5].to_vec(),
            ),
            (
                RouterInstruction::SwapinTransfer {
                    params: swapin.clone(),
                    accounts: None,
                },
                metas8[..6].to_vec(),
            ),
            (
                RouterInstruction::SwapinNative {
                    params: swapin,
                    accounts: None,
                },
                metas8[..4].to_vec(),
            ),
            (
                RouterInstruction::SwapoutBurn {
                    params: swapout.clone(),
                    accounts: vec![],
                },
                metas3.clone(),
            ),
            (
                RouterInstruction::SwapoutTransfer {
                    params: swapout.clone(),
                    accounts: vec![],
                },
                metas3.clone(),
            ),
            (
                RouterInstruction::SwapoutNative {
                    params: swapout,
                    accounts: vec![],
                },
                metas3.clone(),
            ),
            (
                RouterInstruction::SkimLamports {
                    params: SkimLamportsParams { amount: 11 },
                    accounts: vec![],
                },
                metas3.clone(),
            ),
            (
                RouterInstruction::EnableSwapTrade {
                    params: EnableSwapTradeParams { enable: true },
                    accounts: None,
                },
                metas3.clone(),
            ),
        ];
        for (mut instruction, metas) in cases {
            instruction.set_accounts(&metas).unwrap();
            let data = instruction.encode().unwrap();
            let decoded = RouterInstruction::decode(&metas, &data).unwrap();
            assert_eq!(decoded.type_id(), instruction.type_id());
            assert_eq!(decoded, instruction);
        }
    }

    #[test]
    fn unknown_discriminator_rejected() {
        let data = [0u8; 16];
        assert_eq!(
            RouterInstruction::decode(&[], &data).unwrap_err(),
            SwapError::SwapoutLogNotFound
        );
    }

    #[test]
    fn short_account_list_rejected() {
        let instruction = RouterInstruction::SwapinMint {
            params: SwapinParams {
                tx: "aa".into(),
                amount: 1,
                from_chain_id: 1,
            },
            accounts: None,
        };
        let data = instruction.encode().unwrap();
        let metas = vec![AccountMeta::new(key(1), true)];
        assert_eq!(
            RouterInstruction::decode(&metas, &data).unwrap_err(),
            SwapError::ParseDataError
        );
    }
}
