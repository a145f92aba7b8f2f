use super::{decode, derive, token_program_of};
use crate::constants::{
    ASSOCIATED_TOKEN_PROGRAM_ID, MAYHEM_PROGRAM_ID, METADATA_PROGRAM_ID, PUMP_FEE_PROGRAM_ID,
    PUMP_PROGRAM_ID, RENT_SYSVAR_ID, SYSTEM_PROGRAM_ID, TOKEN_2022_PROGRAM_ID, TOKEN_PROGRAM_ID,
};
use crate::fetcher::fetch_many;
use crate::layouts::{BondingCurve, Global};
use crate::programs::pump::{
    CurveBuyAccounts, CurveCreateAccounts, CurveCreateV2Accounts, CurveSellAccounts,
};
use crate::rpc::ResilientClient;
use crate::tx_builder::errors::{TradeError, TradeResult};
use solana_sdk::pubkey::Pubkey;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

#[derive(Debug, Clone)]
pub struct CurveState {
    pub global: Global,
    pub bonding_curve: BondingCurve,
    pub token_program: Pubkey,
    pub fee_recipient: Pubkey,
    /// Trader's native balance, captured when requested in the same batch
    pub user_lamports: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct CurveResolution {
    pub accounts: CurveBuyAccounts,
    pub state: CurveState,
}

impl CurveResolution {
    /// Same roles re-ordered for `sell`
    pub fn sell_accounts(&self) -> CurveSellAccounts {
        let a = &self.accounts;
        CurveSellAccounts {
            global: a.global,
            fee_recipient: a.fee_recipient,
            mint: a.mint,
            bonding_curve: a.bonding_curve,
            associated_bonding_curve: a.associated_bonding_curve,
            associated_user: a.associated_user,
            user: a.user,
            system_program: a.system_program,
            creator_vault: a.creator_vault,
            token_program: a.token_program,
            event_authority: a.event_authority,
            program: a.program,
            fee_config: a.fee_config,
            fee_program: a.fee_program,
        }
    }
}

/// Resolve every bonding-curve trade account for `user`
///
/// One batch covers the global record, the mint and the curve, plus the
/// trader's system account when `with_user_balance` is set (sell quotes are a
/// lamport delta and need the pre balance).
#[instrument(skip(client, cancel), fields(mint = %mint, user = %user))]
pub async fn resolve_curve(
    client: &ResilientClient,
    cancel: &CancellationToken,
    user: &Pubkey,
    mint: &Pubkey,
    with_user_balance: bool,
) -> TradeResult<CurveResolution> {
    let global_address = derive::curve::global();
    let bonding_curve_address = derive::curve::bonding_curve(mint);

    let mut batch = vec![global_address, *mint, bonding_curve_address];
    if with_user_balance {
        batch.push(*user);
    }
    let records = fetch_many(client, cancel, &batch).await?;

    let token_program = token_program_of(&records, mint)?;
    let curve_snapshot = records
        .get(&bonding_curve_address)
        .ok_or_else(|| TradeError::venue_not_found("bonding curve", bonding_curve_address))?;
    let global_snapshot = records.get(&global_address).ok_or_else(|| {
        TradeError::ConfigurationIncomplete(format!("global {} not found", global_address))
    })?;

    let global = decode(global_snapshot, Global::decode)?;
    let bonding_curve = decode(curve_snapshot, BondingCurve::decode)?;
    let fee_recipient = global.effective_fee_recipient().ok_or_else(|| {
        TradeError::ConfigurationIncomplete("global has no non-zero fee recipient".to_string())
    })?;

    let user_lamports = with_user_balance
        .then(|| records.get(user).map(|s| s.lamports).unwrap_or(0));

    let accounts = CurveBuyAccounts {
        global: global_address,
        fee_recipient,
        mint: *mint,
        bonding_curve: bonding_curve_address,
        associated_bonding_curve: derive::associated_token_address(
            &bonding_curve_address,
            mint,
            &token_program,
        ),
        associated_user: derive::associated_token_address(user, mint, &token_program),
        user: *user,
        system_program: SYSTEM_PROGRAM_ID,
        token_program,
        creator_vault: derive::curve::creator_vault(&bonding_curve.creator),
        event_authority: derive::event_authority(&PUMP_PROGRAM_ID),
        program: PUMP_PROGRAM_ID,
        global_volume_accumulator: derive::global_volume_accumulator(&PUMP_PROGRAM_ID),
        user_volume_accumulator: derive::user_volume_accumulator(user, &PUMP_PROGRAM_ID),
        fee_config: derive::fee_config(&PUMP_PROGRAM_ID),
        fee_program: PUMP_FEE_PROGRAM_ID,
    };

    debug!(
        %token_program,
        complete = bonding_curve.complete,
        creator = %bonding_curve.creator,
        "Resolved bonding curve accounts"
    );

    Ok(CurveResolution {
        accounts,
        state: CurveState {
            global,
            bonding_curve,
            token_program,
            fee_recipient,
            user_lamports,
        },
    })
}

/// Accounts for creating `mint`; pure derivation, nothing exists on chain yet
pub fn curve_create_accounts(user: &Pubkey, mint: &Pubkey) -> CurveCreateAccounts {
    let bonding_curve = derive::curve::bonding_curve(mint);
    CurveCreateAccounts {
        mint: *mint,
        mint_authority: derive::curve::mint_authority(),
        bonding_curve,
        associated_bonding_curve: derive::associated_token_address(
            &bonding_curve,
            mint,
            &TOKEN_PROGRAM_ID,
        ),
        global: derive::curve::global(),
        mpl_token_metadata: METADATA_PROGRAM_ID,
        metadata: derive::curve::metadata(mint),
        user: *user,
        system_program: SYSTEM_PROGRAM_ID,
        token_program: TOKEN_PROGRAM_ID,
        associated_token_program: ASSOCIATED_TOKEN_PROGRAM_ID,
        rent: RENT_SYSVAR_ID,
        event_authority: derive::event_authority(&PUMP_PROGRAM_ID),
        program: PUMP_PROGRAM_ID,
    }
}

/// Accounts of a Token-2022 `create_v2`; derivation only
pub fn curve_create_v2_accounts(user: &Pubkey, mint: &Pubkey) -> CurveCreateV2Accounts {
    let bonding_curve = derive::curve::bonding_curve(mint);
    let sol_vault = derive::mayhem::sol_vault();
    CurveCreateV2Accounts {
        mint: *mint,
        mint_authority: derive::curve::mint_authority(),
        bonding_curve,
        associated_bonding_curve: derive::associated_token_address(
            &bonding_curve,
            mint,
            &TOKEN_2022_PROGRAM_ID,
        ),
        global: derive::curve::global(),
        user: *user,
        system_program: SYSTEM_PROGRAM_ID,
        token_program: TOKEN_2022_PROGRAM_ID,
        associated_token_program: ASSOCIATED_TOKEN_PROGRAM_ID,
        mayhem_program_id: MAYHEM_PROGRAM_ID,
        global_params: derive::mayhem::global_params(),
        sol_vault,
        mayhem_state: derive::mayhem::mayhem_state(mint),
        mayhem_token_vault: derive::associated_token_address(&sol_vault, mint, &TOKEN_2022_PROGRAM_ID),
        event_authority: derive::event_authority(&PUMP_PROGRAM_ID),
        program: PUMP_PROGRAM_ID,
    }
}
