//! Bonding-curve program instructions

use super::{instruction_discriminator, serde_pubkey, ArgWriter};
use crate::accounts::account_set;
use crate::constants::PUMP_PROGRAM_ID;
use once_cell::sync::Lazy;
use serde::Serialize;
use solana_sdk::instruction::{AccountMeta, Instruction};
use solana_sdk::pubkey::Pubkey;

static BUY: Lazy<[u8; 8]> = Lazy::new(|| instruction_discriminator("buy"));
static BUY_EXACT_SOL_IN: Lazy<[u8; 8]> = Lazy::new(|| instruction_discriminator("buy_exact_sol_in"));
static SELL: Lazy<[u8; 8]> = Lazy::new(|| instruction_discriminator("sell"));
static CREATE: Lazy<[u8; 8]> = Lazy::new(|| instruction_discriminator("create"));
static CREATE_V2: Lazy<[u8; 8]> = Lazy::new(|| instruction_discriminator("create_v2"));

account_set! {
    /// Accounts of `buy` and `buy_exact_sol_in`
    pub struct CurveBuyAccounts {
        global,
        fee_recipient,
        mint,
        bonding_curve,
        associated_bonding_curve,
        associated_user,
        user,
        system_program,
        token_program,
        creator_vault,
        event_authority,
        program,
        global_volume_accumulator,
        user_volume_accumulator,
        fee_config,
        fee_program,
    }
}

account_set! {
    /// Accounts of `sell`
    pub struct CurveSellAccounts {
        global,
        fee_recipient,
        mint,
        bonding_curve,
        associated_bonding_curve,
        associated_user,
        user,
        system_program,
        creator_vault,
        token_program,
        event_authority,
        program,
        fee_config,
        fee_program,
    }
}

account_set! {
    /// Accounts of `create`
    pub struct CurveCreateAccounts {
        mint,
        mint_authority,
        bonding_curve,
        associated_bonding_curve,
        global,
        mpl_token_metadata,
        metadata,
        user,
        system_program,
        token_program,
        associated_token_program,
        rent,
        event_authority,
        program,
    }
}

account_set! {
    /// Accounts of `create_v2`: a Token-2022 mint plus the mayhem accounts
    pub struct CurveCreateV2Accounts {
        mint,
        mint_authority,
        bonding_curve,
        associated_bonding_curve,
        global,
        user,
        system_program,
        token_program,
        associated_token_program,
        mayhem_program_id,
        global_params,
        sol_vault,
        mayhem_state,
        mayhem_token_vault,
        event_authority,
        program,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BuyArgs {
    pub amount: u64,
    pub max_sol_cost: u64,
    pub track_volume: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BuyExactSolInArgs {
    pub spendable_sol_in: u64,
    pub min_tokens_out: u64,
    pub track_volume: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SellArgs {
    pub amount: u64,
    pub min_sol_output: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreateArgs {
    pub name: String,
    pub symbol: String,
    pub uri: String,
    #[serde(serialize_with = "serde_pubkey::serialize")]
    pub creator: Pubkey,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreateV2Args {
    pub name: String,
    pub symbol: String,
    pub uri: String,
    #[serde(serialize_with = "serde_pubkey::serialize")]
    pub creator: Pubkey,
    pub is_mayhem_mode: bool,
}

fn buy_metas(a: &CurveBuyAccounts) -> Vec<AccountMeta> {
    vec![
        AccountMeta::new_readonly(a.global, false),
        AccountMeta::new(a.fee_recipient, false),
        AccountMeta::new_readonly(a.mint, false),
        AccountMeta::new(a.bonding_curve, false),
        AccountMeta::new(a.associated_bonding_curve, false),
        AccountMeta::new(a.associated_user, false),
        AccountMeta::new(a.user, true),
        AccountMeta::new_readonly(a.system_program, false),
        AccountMeta::new_readonly(a.token_program, false),
        AccountMeta::new(a.creator_vault, false),
        AccountMeta::new_readonly(a.event_authority, false),
        AccountMeta::new_readonly(a.program, false),
        AccountMeta::new_readonly(a.global_volume_accumulator, false),
        AccountMeta::new(a.user_volume_accumulator, false),
        AccountMeta::new_readonly(a.fee_config, false),
        AccountMeta::new_readonly(a.fee_program, false),
    ]
}

/// Buy an exact token amount, paying at most `max_sol_cost`
pub fn buy(accounts: &CurveBuyAccounts, args: &BuyArgs) -> Instruction {
    let data = ArgWriter::new(&BUY)
        .u64(args.amount)
        .u64(args.max_sol_cost)
        .option_bool(args.track_volume)
        .finish();
    Instruction {
        program_id: PUMP_PROGRAM_ID,
        accounts: buy_metas(accounts),
        data,
    }
}

/// Spend exactly `spendable_sol_in`, receiving at least `min_tokens_out`
pub fn buy_exact_sol_in(accounts: &CurveBuyAccounts, args: &BuyExactSolInArgs) -> Instruction {
    let data = ArgWriter::new(&BUY_EXACT_SOL_IN)
        .u64(args.spendable_sol_in)
        .u64(args.min_tokens_out)
        .option_bool(args.track_volume)
        .finish();
    Instruction {
        program_id: PUMP_PROGRAM_ID,
        accounts: buy_metas(accounts),
        data,
    }
}

pub fn sell(a: &CurveSellAccounts, args: &SellArgs) -> Instruction {
    let data = ArgWriter::new(&SELL)
        .u64(args.amount)
        .u64(args.min_sol_output)
        .finish();
    Instruction {
        program_id: PUMP_PROGRAM_ID,
        accounts: vec![
            AccountMeta::new_readonly(a.global, false),
            AccountMeta::new(a.fee_recipient, false),
            AccountMeta::new_readonly(a.mint, false),
            AccountMeta::new(a.bonding_curve, false),
            AccountMeta::new(a.associated_bonding_curve, false),
            AccountMeta::new(a.associated_user, false),
            AccountMeta::new(a.user, true),
            AccountMeta::new_readonly(a.system_program, false),
            AccountMeta::new(a.creator_vault, false),
            AccountMeta::new_readonly(a.token_program, false),
            AccountMeta::new_readonly(a.event_authority, false),
            AccountMeta::new_readonly(a.program, false),
            AccountMeta::new_readonly(a.fee_config, false),
            AccountMeta::new_readonly(a.fee_program, false),
        ],
        data,
    }
}

/// Create a new mint and its bonding curve; the mint must sign
pub fn create(a: &CurveCreateAccounts, args: &CreateArgs) -> Instruction {
    let data = ArgWriter::new(&CREATE)
        .string(&args.name)
        .string(&args.symbol)
        .string(&args.uri)
        .pubkey(&args.creator)
        .finish();
    Instruction {
        program_id: PUMP_PROGRAM_ID,
        accounts: vec![
            AccountMeta::new(a.mint, true),
            AccountMeta::new_readonly(a.mint_authority, false),
            AccountMeta::new(a.bonding_curve, false),
            AccountMeta::new(a.associated_bonding_curve, false),
            AccountMeta::new_readonly(a.global, false),
            AccountMeta::new_readonly(a.mpl_token_metadata, false),
            AccountMeta::new(a.metadata, false),
            AccountMeta::new(a.user, true),
            AccountMeta::new_readonly(a.system_program, false),
            AccountMeta::new_readonly(a.token_program, false),
            AccountMeta::new_readonly(a.associated_token_program, false),
            AccountMeta::new_readonly(a.rent, false),
            AccountMeta::new_readonly(a.event_authority, false),
            AccountMeta::new_readonly(a.program, false),
        ],
        data,
    }
}

/// Create a Token-2022 mint and its bonding curve; the mint must sign
pub fn create_v2(a: &CurveCreateV2Accounts, args: &CreateV2Args) -> Instruction {
    let data = ArgWriter::new(&CREATE_V2)
        .string(&args.name)
        .string(&args.symbol)
        .string(&args.uri)
        .pubkey(&args.creator)
        .bool(args.is_mayhem_mode)
        .finish();
    Instruction {
        program_id: PUMP_PROGRAM_ID,
        accounts: vec![
            AccountMeta::new(a.mint, true),
            AccountMeta::new_readonly(a.mint_authority, false),
            AccountMeta::new(a.bonding_curve, false),
            AccountMeta::new(a.associated_bonding_curve, false),
            AccountMeta::new_readonly(a.global, false),
            AccountMeta::new(a.user, true),
            AccountMeta::new_readonly(a.system_program, false),
            AccountMeta::new_readonly(a.token_program, false),
            AccountMeta::new_readonly(a.associated_token_program, false),
            AccountMeta::new(a.mayhem_program_id, false),
            AccountMeta::new_readonly(a.global_params, false),
            AccountMeta::new(a.sol_vault, false),
            AccountMeta::new(a.mayhem_state, false),
            AccountMeta::new(a.mayhem_token_vault, false),
            AccountMeta::new_readonly(a.event_authority, false),
            AccountMeta::new_readonly(a.program, false),
        ],
        data,
    }
}
