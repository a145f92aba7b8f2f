//! Pool trades

use super::ata::{ensure_atas, AtaBatch, AtaRequest};
use super::errors::TradeResult;
use super::instructions::{close_account, wrap_sol, InstructionPlan, Stage};
use super::options::{validate_amount, validate_pubkey, validate_slippage, TradeOptions};
use super::sim_errors::Venue;
use super::simulate::{simulate_consumed, simulate_delta, Watched};
use super::{concat, emit_preview, finalize_accounts, push_tip, Quote, TradeBuild, TradeBuilder};
use crate::constants::{TOKEN_PROGRAM_ID, WSOL_MINT};
use crate::observability::CorrelationId;
use crate::programs::pump_amm::{
    self, AmmBuyAccounts, AmmBuyArgs, AmmBuyExactQuoteInArgs, AmmSellAccounts, AmmSellArgs,
};
use crate::quote::apply_slippage;
use crate::resolver::{resolve_amm, AmmResolution, AmmState};
use solana_sdk::instruction::Instruction;
use solana_sdk::pubkey::Pubkey;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

/// Quote side is wrapped SOL under the classic token program
fn quote_is_wsol(accounts: &AmmBuyAccounts) -> bool {
    accounts.quote_mint == WSOL_MINT && accounts.quote_token_program == TOKEN_PROGRAM_ID
}

/// Token accounts a pool buy touches
///
/// The creator vault account only exists for pools with a coin creator.
fn buy_ata_requests(accounts: &AmmBuyAccounts, state: &AmmState) -> Vec<AtaRequest> {
    let quote = |wallet: Pubkey| AtaRequest::new(wallet, accounts.quote_mint, accounts.quote_token_program);
    let mut requests = vec![
        AtaRequest::new(accounts.user, accounts.base_mint, accounts.base_token_program),
        quote(accounts.user),
        quote(accounts.protocol_fee_recipient),
    ];
    if state.has_coin_creator() {
        requests.push(quote(accounts.coin_creator_vault_authority));
    }
    requests
}

/// Transfer + sync for whatever `spend` the existing WSOL balance does not cover
fn quote_top_up(accounts: &AmmBuyAccounts, batch: &AtaBatch, spend: u64) -> Vec<Instruction> {
    if !quote_is_wsol(accounts) {
        return Vec::new();
    }
    let existing = batch.balance(&accounts.user_quote_token_account);
    wrap_sol(
        &accounts.user,
        &accounts.user_quote_token_account,
        &accounts.quote_token_program,
        spend.saturating_sub(existing),
    )
}

impl TradeBuilder {
    async fn resolve_pool_buy(
        &self,
        cancel: &CancellationToken,
        user: &Pubkey,
        pool: &Pubkey,
        opts: &TradeOptions,
    ) -> TradeResult<(AmmBuyAccounts, AtaBatch)> {
        let AmmResolution { mut accounts, state } = resolve_amm(&self.client, cancel, user, pool).await?;
        finalize_accounts(&mut accounts, opts)?;
        let batch = ensure_atas(
            &self.client,
            cancel,
            user,
            &buy_ata_requests(&accounts, &state),
            &opts.known_atas,
        )
        .await?;
        Ok((accounts, batch))
    }

    /// Spend exactly `quote_in`, with the minimum base out taken from a dry run
    /// or from `opts.expected_base_out`
    #[instrument(
        skip(self, cancel, opts),
        fields(correlation_id = %CorrelationId::new())
    )]
    pub async fn amm_buy_with_quote(
        &self,
        cancel: &CancellationToken,
        user: &Pubkey,
        pool: &Pubkey,
        quote_in: u64,
        slippage_bps: u64,
        opts: &TradeOptions,
    ) -> TradeResult<TradeBuild<AmmBuyAccounts, AmmBuyExactQuoteInArgs>> {
        validate_pubkey("user", user)?;
        validate_pubkey("pool", pool)?;
        validate_amount("quote_in", quote_in)?;
        validate_slippage(slippage_bps)?;

        let (accounts, batch) = self.resolve_pool_buy(cancel, user, pool, opts).await?;
        let top_up = quote_top_up(&accounts, &batch, quote_in);

        let (expected, units_consumed) = match opts.expected_base_out {
            Some(expected) => (expected, None),
            None => {
                let draft = pump_amm::buy_exact_quote_in(
                    &accounts,
                    &AmmBuyExactQuoteInArgs {
                        spendable_quote_in: quote_in,
                        min_base_amount_out: 1,
                        track_volume: opts.track_volume,
                    },
                );
                let watched = Watched::token(
                    accounts.user_base_token_account,
                    batch.balance(&accounts.user_base_token_account),
                );
                let simulated = simulate_delta(
                    &self.client,
                    cancel,
                    Venue::Pool,
                    user,
                    &concat(&[batch.create_instructions.as_slice(), top_up.as_slice()], draft),
                    watched,
                )
                .await?;
                (simulated.delta, simulated.units_consumed)
            }
        };

        let min_base_amount_out = apply_slippage(expected, slippage_bps);
        let args = AmmBuyExactQuoteInArgs {
            spendable_quote_in: quote_in,
            min_base_amount_out,
            track_volume: opts.track_volume,
        };
        debug!(expected, min_base_amount_out, "Derived minimum base out");

        let mut plan = InstructionPlan::new();
        plan.extend(Stage::CreateAta, batch.create_instructions)?;
        plan.extend(Stage::Wrap, top_up)?;
        plan.push(Stage::Swap, pump_amm::buy_exact_quote_in(&accounts, &args))?;
        if accounts.base_mint == WSOL_MINT {
            plan.push(
                Stage::Unwrap,
                close_account(
                    &accounts.user_base_token_account,
                    user,
                    user,
                    &accounts.base_token_program,
                ),
            )?;
        }
        push_tip(&mut plan, user, opts)?;

        let build = TradeBuild {
            accounts,
            args,
            instructions: plan.into_instructions()?,
            quote: Some(Quote {
                simulated_output: expected,
                bound: min_base_amount_out,
                units_consumed,
            }),
        };
        emit_preview("amm_buy_with_quote", &build, opts);
        Ok(build)
    }

    /// Receive exactly `base_out`, paying at most `max_quote_in`
    ///
    /// With a WSOL quote side the spend is dry-run first so only the quote
    /// actually consumed gets wrapped; leftover WSOL is unwrapped afterwards.
    #[instrument(
        skip(self, cancel, opts),
        fields(correlation_id = %CorrelationId::new())
    )]
    pub async fn amm_buy_exact_out(
        &self,
        cancel: &CancellationToken,
        user: &Pubkey,
        pool: &Pubkey,
        base_out: u64,
        max_quote_in: u64,
        opts: &TradeOptions,
    ) -> TradeResult<TradeBuild<AmmBuyAccounts, AmmBuyArgs>> {
        validate_pubkey("user", user)?;
        validate_pubkey("pool", pool)?;
        validate_amount("base_out", base_out)?;
        validate_amount("max_quote_in", max_quote_in)?;

        let (accounts, batch) = self.resolve_pool_buy(cancel, user, pool, opts).await?;
        let args = AmmBuyArgs {
            base_amount_out: base_out,
            max_quote_amount_in: max_quote_in,
            track_volume: opts.track_volume,
        };

        let mut quote = None;
        let mut top_up = Vec::new();
        if quote_is_wsol(&accounts) {
            let existing = batch.balance(&accounts.user_quote_token_account);
            let draft = concat(
                &[
                    batch.create_instructions.as_slice(),
                    quote_top_up(&accounts, &batch, max_quote_in).as_slice(),
                ],
                pump_amm::buy(&accounts, &args),
            );
            let spent = simulate_consumed(
                &self.client,
                cancel,
                Venue::Pool,
                user,
                &draft,
                Watched::token(accounts.user_quote_token_account, existing.max(max_quote_in)),
            )
            .await?;
            top_up = quote_top_up(&accounts, &batch, spent.delta);
            quote = Some(Quote {
                simulated_output: spent.delta,
                bound: max_quote_in,
                units_consumed: spent.units_consumed,
            });
        }

        let mut plan = InstructionPlan::new();
        plan.extend(Stage::CreateAta, batch.create_instructions)?;
        plan.extend(Stage::Wrap, top_up)?;
        plan.push(Stage::Swap, pump_amm::buy(&accounts, &args))?;
        if accounts.base_mint == WSOL_MINT {
            plan.push(
                Stage::Unwrap,
                close_account(
                    &accounts.user_base_token_account,
                    user,
                    user,
                    &accounts.base_token_program,
                ),
            )?;
        }
        if accounts.quote_mint == WSOL_MINT {
            plan.push(
                Stage::Unwrap,
                close_account(
                    &accounts.user_quote_token_account,
                    user,
                    user,
                    &accounts.quote_token_program,
                ),
            )?;
        }
        push_tip(&mut plan, user, opts)?;

        let build = TradeBuild {
            accounts,
            args,
            instructions: plan.into_instructions()?,
            quote,
        };
        emit_preview("amm_buy_exact_out", &build, opts);
        Ok(build)
    }

    /// Sell exactly `base_in`, with the minimum quote out from a dry run or
    /// from `opts.expected_quote_out`
    #[instrument(
        skip(self, cancel, opts),
        fields(correlation_id = %CorrelationId::new())
    )]
    pub async fn amm_sell(
        &self,
        cancel: &CancellationToken,
        user: &Pubkey,
        pool: &Pubkey,
        base_in: u64,
        slippage_bps: u64,
        opts: &TradeOptions,
    ) -> TradeResult<TradeBuild<AmmSellAccounts, AmmSellArgs>> {
        validate_pubkey("user", user)?;
        validate_pubkey("pool", pool)?;
        validate_amount("base_in", base_in)?;
        validate_slippage(slippage_bps)?;

        let AmmResolution { accounts, .. } = resolve_amm(&self.client, cancel, user, pool).await?;
        let mut accounts = AmmSellAccounts::from(&accounts);
        finalize_accounts(&mut accounts, opts)?;

        let mut requests = vec![
            AtaRequest::new(*user, accounts.quote_mint, accounts.quote_token_program),
            AtaRequest::new(*user, accounts.base_mint, accounts.base_token_program),
        ];
        // Without a dry run the known accounts need neither a create nor a balance
        if opts.expected_quote_out.is_some() {
            requests.retain(|r| !opts.known_atas.contains(&r.address()));
        }
        let batch = ensure_atas(&self.client, cancel, user, &requests, &opts.known_atas).await?;

        let (expected, units_consumed) = match opts.expected_quote_out {
            Some(expected) => (expected, None),
            None => {
                let draft = pump_amm::sell(
                    &accounts,
                    &AmmSellArgs {
                        base_amount_in: base_in,
                        min_quote_amount_out: 0,
                    },
                );
                let watched = Watched::token(
                    accounts.user_quote_token_account,
                    batch.balance(&accounts.user_quote_token_account),
                );
                let simulated = simulate_delta(
                    &self.client,
                    cancel,
                    Venue::Pool,
                    user,
                    &concat(&[batch.create_instructions.as_slice()], draft),
                    watched,
                )
                .await?;
                (simulated.delta, simulated.units_consumed)
            }
        };

        let args = AmmSellArgs {
            base_amount_in: base_in,
            min_quote_amount_out: apply_slippage(expected, slippage_bps),
        };

        let mut plan = InstructionPlan::new();
        plan.extend(Stage::CreateAta, batch.create_instructions)?;
        plan.push(Stage::Swap, pump_amm::sell(&accounts, &args))?;
        if opts.close_base_ata {
            plan.push(
                Stage::Unwrap,
                close_account(
                    &accounts.user_base_token_account,
                    user,
                    user,
                    &accounts.base_token_program,
                ),
            )?;
        }
        if accounts.quote_mint == WSOL_MINT || opts.close_quote_ata {
            plan.push(
                Stage::Unwrap,
                close_account(
                    &accounts.user_quote_token_account,
                    user,
                    user,
                    &accounts.quote_token_program,
                ),
            )?;
        }
        push_tip(&mut plan, user, opts)?;

        let build = TradeBuild {
            accounts,
            quote: Some(Quote {
                simulated_output: expected,
                bound: args.min_quote_amount_out,
                units_consumed,
            }),
            args,
            instructions: plan.into_instructions()?,
        };
        emit_preview("amm_sell", &build, opts);
        Ok(build)
    }
}
