use super::{decode, derive, token_program_of};
use crate::constants::{
    ASSOCIATED_TOKEN_PROGRAM_ID, PUMP_AMM_PROGRAM_ID, PUMP_FEE_PROGRAM_ID, SYSTEM_PROGRAM_ID,
};
use crate::fetcher::fetch_many;
use crate::layouts::{GlobalConfig, Pool};
use crate::programs::pump_amm::AmmBuyAccounts;
use crate::rpc::ResilientClient;
use crate::tx_builder::errors::{TradeError, TradeResult};
use solana_sdk::pubkey::Pubkey;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

/// Decoded pool state needed to size and assemble a trade
#[derive(Debug, Clone)]
pub struct AmmState {
    pub pool: Pool,
    pub global_config: GlobalConfig,
    pub base_token_program: Pubkey,
    pub quote_token_program: Pubkey,
}

impl AmmState {
    pub fn has_coin_creator(&self) -> bool {
        self.pool.coin_creator != Pubkey::default()
    }
}

#[derive(Debug, Clone)]
pub struct AmmResolution {
    /// Full buy-side role set; sell uses the same minus the volume accumulators
    pub accounts: AmmBuyAccounts,
    pub state: AmmState,
}

/// Resolve every pool-trade account for `user`
///
/// Two batched fetches: the pool with the global config, then both mints.
/// The mints are only known once the pool record is decoded.
#[instrument(skip(client, cancel), fields(pool = %pool, user = %user))]
pub async fn resolve_amm(
    client: &ResilientClient,
    cancel: &CancellationToken,
    user: &Pubkey,
    pool: &Pubkey,
) -> TradeResult<AmmResolution> {
    let global_config_address = derive::amm::global_config();

    let records = fetch_many(client, cancel, &[*pool, global_config_address]).await?;
    let pool_snapshot = records
        .get(pool)
        .ok_or_else(|| TradeError::venue_not_found("pool", pool))?;
    let config_snapshot = records.get(&global_config_address).ok_or_else(|| {
        TradeError::ConfigurationIncomplete(format!(
            "global config {} not found",
            global_config_address
        ))
    })?;

    let pool_state = decode(pool_snapshot, Pool::decode)?;
    let global_config = decode(config_snapshot, GlobalConfig::decode)?;
    let fee_recipient = global_config.fee_recipient().ok_or_else(|| {
        TradeError::ConfigurationIncomplete(
            "global config has no non-zero protocol fee recipient".to_string(),
        )
    })?;

    let mints = fetch_many(client, cancel, &[pool_state.base_mint, pool_state.quote_mint]).await?;
    let base_token_program = token_program_of(&mints, &pool_state.base_mint)?;
    let quote_token_program = token_program_of(&mints, &pool_state.quote_mint)?;

    let coin_creator_vault_authority =
        derive::amm::coin_creator_vault_authority(&pool_state.coin_creator);

    let accounts = AmmBuyAccounts {
        pool: *pool,
        user: *user,
        global_config: global_config_address,
        base_mint: pool_state.base_mint,
        quote_mint: pool_state.quote_mint,
        user_base_token_account: derive::associated_token_address(
            user,
            &pool_state.base_mint,
            &base_token_program,
        ),
        user_quote_token_account: derive::associated_token_address(
            user,
            &pool_state.quote_mint,
            &quote_token_program,
        ),
        pool_base_token_account: pool_state.pool_base_token_account,
        pool_quote_token_account: pool_state.pool_quote_token_account,
        protocol_fee_recipient: fee_recipient,
        protocol_fee_recipient_token_account: derive::associated_token_address(
            &fee_recipient,
            &pool_state.quote_mint,
            &quote_token_program,
        ),
        base_token_program,
        quote_token_program,
        system_program: SYSTEM_PROGRAM_ID,
        associated_token_program: ASSOCIATED_TOKEN_PROGRAM_ID,
        event_authority: derive::event_authority(&PUMP_AMM_PROGRAM_ID),
        program: PUMP_AMM_PROGRAM_ID,
        coin_creator_vault_ata: derive::associated_token_address(
            &coin_creator_vault_authority,
            &pool_state.quote_mint,
            &quote_token_program,
        ),
        coin_creator_vault_authority,
        global_volume_accumulator: derive::global_volume_accumulator(&PUMP_AMM_PROGRAM_ID),
        user_volume_accumulator: derive::user_volume_accumulator(user, &PUMP_AMM_PROGRAM_ID),
        fee_config: derive::fee_config(&PUMP_AMM_PROGRAM_ID),
        fee_program: PUMP_FEE_PROGRAM_ID,
    };

    debug!(
        base_mint = %pool_state.base_mint,
        quote_mint = %pool_state.quote_mint,
        %base_token_program,
        %quote_token_program,
        "Resolved pool accounts"
    );

    Ok(AmmResolution {
        accounts,
        state: AmmState {
            pool: pool_state,
            global_config,
            base_token_program,
            quote_token_program,
        },
    })
}
