//! Constant-product pool program instructions

use super::{instruction_discriminator, ArgWriter};
use crate::accounts::account_set;
use crate::constants::PUMP_AMM_PROGRAM_ID;
use once_cell::sync::Lazy;
use serde::Serialize;
use solana_sdk::instruction::{AccountMeta, Instruction};

static BUY: Lazy<[u8; 8]> = Lazy::new(|| instruction_discriminator("buy"));
static BUY_EXACT_QUOTE_IN: Lazy<[u8; 8]> =
    Lazy::new(|| instruction_discriminator("buy_exact_quote_in"));
static SELL: Lazy<[u8; 8]> = Lazy::new(|| instruction_discriminator("sell"));

account_set! {
    /// Accounts of `buy` and `buy_exact_quote_in`
    pub struct AmmBuyAccounts {
        pool,
        user,
        global_config,
        base_mint,
        quote_mint,
        user_base_token_account,
        user_quote_token_account,
        pool_base_token_account,
        pool_quote_token_account,
        protocol_fee_recipient,
        protocol_fee_recipient_token_account,
        base_token_program,
        quote_token_program,
        system_program,
        associated_token_program,
        event_authority,
        program,
        coin_creator_vault_ata,
        coin_creator_vault_authority,
        global_volume_accumulator,
        user_volume_accumulator,
        fee_config,
        fee_program,
    }
}

account_set! {
    /// Accounts of `sell`
    pub struct AmmSellAccounts {
        pool,
        user,
        global_config,
        base_mint,
        quote_mint,
        user_base_token_account,
        user_quote_token_account,
        pool_base_token_account,
        pool_quote_token_account,
        protocol_fee_recipient,
        protocol_fee_recipient_token_account,
        base_token_program,
        quote_token_program,
        system_program,
        associated_token_program,
        event_authority,
        program,
        coin_creator_vault_ata,
        coin_creator_vault_authority,
        fee_config,
        fee_program,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AmmBuyArgs {
    pub base_amount_out: u64,
    pub max_quote_amount_in: u64,
    pub track_volume: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AmmBuyExactQuoteInArgs {
    pub spendable_quote_in: u64,
    pub min_base_amount_out: u64,
    pub track_volume: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AmmSellArgs {
    pub base_amount_in: u64,
    pub min_quote_amount_out: u64,
}

fn buy_metas(a: &AmmBuyAccounts) -> Vec<AccountMeta> {
    vec![
        AccountMeta::new(a.pool, false),
        AccountMeta::new(a.user, true),
        AccountMeta::new_readonly(a.global_config, false),
        AccountMeta::new_readonly(a.base_mint, false),
        AccountMeta::new_readonly(a.quote_mint, false),
        AccountMeta::new(a.user_base_token_account, false),
        AccountMeta::new(a.user_quote_token_account, false),
        AccountMeta::new(a.pool_base_token_account, false),
        AccountMeta::new(a.pool_quote_token_account, false),
        AccountMeta::new_readonly(a.protocol_fee_recipient, false),
        AccountMeta::new(a.protocol_fee_recipient_token_account, false),
        AccountMeta::new_readonly(a.base_token_program, false),
        AccountMeta::new_readonly(a.quote_token_program, false),
        AccountMeta::new_readonly(a.system_program, false),
        AccountMeta::new_readonly(a.associated_token_program, false),
        AccountMeta::new_readonly(a.event_authority, false),
        AccountMeta::new_readonly(a.program, false),
        AccountMeta::new(a.coin_creator_vault_ata, false),
        AccountMeta::new_readonly(a.coin_creator_vault_authority, false),
        AccountMeta::new_readonly(a.global_volume_accumulator, false),
        AccountMeta::new(a.user_volume_accumulator, false),
        AccountMeta::new_readonly(a.fee_config, false),
        AccountMeta::new_readonly(a.fee_program, false),
    ]
}

/// Buy an exact base amount, paying at most `max_quote_amount_in`
pub fn buy(accounts: &AmmBuyAccounts, args: &AmmBuyArgs) -> Instruction {
    let data = ArgWriter::new(&BUY)
        .u64(args.base_amount_out)
        .u64(args.max_quote_amount_in)
        .option_bool(args.track_volume)
        .finish();
    Instruction {
        program_id: PUMP_AMM_PROGRAM_ID,
        accounts: buy_metas(accounts),
        data,
    }
}

/// Spend exactly `spendable_quote_in` for at least `min_base_amount_out`
pub fn buy_exact_quote_in(accounts: &AmmBuyAccounts, args: &AmmBuyExactQuoteInArgs) -> Instruction {
    let data = ArgWriter::new(&BUY_EXACT_QUOTE_IN)
        .u64(args.spendable_quote_in)
        .u64(args.min_base_amount_out)
        .option_bool(args.track_volume)
        .finish();
    Instruction {
        program_id: PUMP_AMM_PROGRAM_ID,
        accounts: buy_metas(accounts),
        data,
    }
}

pub fn sell(a: &AmmSellAccounts, args: &AmmSellArgs) -> Instruction {
    let data = ArgWriter::new(&SELL)
        .u64(args.base_amount_in)
        .u64(args.min_quote_amount_out)
        .finish();
    Instruction {
        program_id: PUMP_AMM_PROGRAM_ID,
        accounts: vec![
            AccountMeta::new(a.pool, false),
            AccountMeta::new(a.user, true),
            AccountMeta::new_readonly(a.global_config, false),
            AccountMeta::new_readonly(a.base_mint, false),
            AccountMeta::new_readonly(a.quote_mint, false),
            AccountMeta::new(a.user_base_token_account, false),
            AccountMeta::new(a.user_quote_token_account, false),
            AccountMeta::new(a.pool_base_token_account, false),
            AccountMeta::new(a.pool_quote_token_account, false),
            AccountMeta::new_readonly(a.protocol_fee_recipient, false),
            AccountMeta::new(a.protocol_fee_recipient_token_account, false),
            AccountMeta::new_readonly(a.base_token_program, false),
            AccountMeta::new_readonly(a.quote_token_program, false),
            AccountMeta::new_readonly(a.system_program, false),
            AccountMeta::new_readonly(a.associated_token_program, false),
            AccountMeta::new_readonly(a.event_authority, false),
            AccountMeta::new_readonly(a.program, false),
            AccountMeta::new(a.coin_creator_vault_ata, false),
            AccountMeta::new_readonly(a.coin_creator_vault_authority, false),
            AccountMeta::new_readonly(a.fee_config, false),
            AccountMeta::new_readonly(a.fee_program, false),
        ],
        data,
    }
}

impl From<&AmmBuyAccounts> for AmmSellAccounts {
    fn from(b: &AmmBuyAccounts) -> Self {
        Self {
            pool: b.pool,
            user: b.user,
            global_config: b.global_config,
            base_mint: b.base_mint,
            quote_mint: b.quote_mint,
            user_base_token_account: b.user_base_token_account,
            user_quote_token_account: b.user_quote_token_account,
            pool_base_token_account: b.pool_base_token_account,
            pool_quote_token_account: b.pool_quote_token_account,
            protocol_fee_recipient: b.protocol_fee_recipient,
            protocol_fee_recipient_token_account: b.protocol_fee_recipient_token_account,
            base_token_program: b.base_token_program,
            quote_token_program: b.quote_token_program,
            system_program: b.system_program,
            associated_token_program: b.associated_token_program,
            event_authority: b.event_authority,
            program: b.program,
            coin_creator_vault_ata: b.coin_creator_vault_ata,
            coin_creator_vault_authority: b.coin_creator_vault_authority,
            fee_config: b.fee_config,
            fee_program: b.fee_program,
        }
    }
}
