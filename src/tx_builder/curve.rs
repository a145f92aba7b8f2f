//! Bonding-curve trades and token creation

use super::ata::{ensure_atas, AtaBatch, AtaRequest};
use super::errors::TradeResult;
use super::instructions::{close_account, InstructionPlan, Stage};
use super::options::{validate_amount, validate_pubkey, validate_slippage, validate_text, TradeOptions};
use super::sim_errors::Venue;
use super::simulate::{simulate_delta, Watched};
use super::{concat, emit_preview, finalize_accounts, push_tip, Quote, TradeBuild, TradeBuilder};
use crate::observability::CorrelationId;
use crate::programs::pump::{
    self, BuyArgs, BuyExactSolInArgs, CreateArgs, CreateV2Args, CurveBuyAccounts,
    CurveCreateAccounts, CurveCreateV2Accounts, CurveSellAccounts, SellArgs,
};
use crate::quote::apply_slippage;
use crate::resolver::{curve_create_accounts, curve_create_v2_accounts, resolve_curve};
use crate::vanity::{self, VanityOptions};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signer};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

/// Trader's token account and the curve's own token account
fn buy_ata_requests(accounts: &CurveBuyAccounts) -> Vec<AtaRequest> {
    vec![
        AtaRequest::new(accounts.user, accounts.mint, accounts.token_program),
        AtaRequest::new(accounts.bonding_curve, accounts.mint, accounts.token_program),
    ]
}

/// Fresh mint keypair, or a vanity one when `opts` asks for it
async fn mint_keypair(cancel: &CancellationToken, opts: &TradeOptions) -> TradeResult<Keypair> {
    if !opts.wants_vanity() {
        return Ok(Keypair::new());
    }
    let found = vanity::search(
        VanityOptions {
            prefix: opts.vanity_prefix.clone().unwrap_or_default(),
            suffix: opts.vanity_suffix.clone().unwrap_or_default(),
            timeout: Some(opts.vanity_timeout),
            ..Default::default()
        },
        cancel,
    )
    .await?;
    info!(
        mint = %found.keypair.pubkey(),
        attempts = found.attempts,
        elapsed_ms = found.elapsed.as_millis() as u64,
        "Vanity mint found"
    );
    Ok(found.keypair)
}

fn validate_metadata(user: &Pubkey, name: &str, symbol: &str, uri: &str) -> TradeResult<()> {
    validate_pubkey("user", user)?;
    validate_text("name", name)?;
    validate_text("symbol", symbol)?;
    validate_text("uri", uri)
}

impl TradeBuilder {
    async fn resolve_curve_buy(
        &self,
        cancel: &CancellationToken,
        user: &Pubkey,
        mint: &Pubkey,
        opts: &TradeOptions,
    ) -> TradeResult<(CurveBuyAccounts, AtaBatch)> {
        let mut accounts = resolve_curve(&self.client, cancel, user, mint, false)
            .await?
            .accounts;
        finalize_accounts(&mut accounts, opts)?;
        let batch = ensure_atas(
            &self.client,
            cancel,
            user,
            &buy_ata_requests(&accounts),
            &opts.known_atas,
        )
        .await?;
        Ok((accounts, batch))
    }

    /// Buy exactly `amount` tokens, paying at most `max_sol_cost` lamports
    #[instrument(
        skip(self, cancel, opts),
        fields(correlation_id = %CorrelationId::new())
    )]
    pub async fn curve_buy_exact(
        &self,
        cancel: &CancellationToken,
        user: &Pubkey,
        mint: &Pubkey,
        amount: u64,
        max_sol_cost: u64,
        opts: &TradeOptions,
    ) -> TradeResult<TradeBuild<CurveBuyAccounts, BuyArgs>> {
        validate_pubkey("user", user)?;
        validate_pubkey("mint", mint)?;
        validate_amount("amount", amount)?;
        validate_amount("max_sol_cost", max_sol_cost)?;

        let (accounts, batch) = self.resolve_curve_buy(cancel, user, mint, opts).await?;
        let args = BuyArgs {
            amount,
            max_sol_cost,
            track_volume: opts.track_volume,
        };

        let mut plan = InstructionPlan::new();
        plan.extend(Stage::CreateAta, batch.create_instructions)?;
        plan.push(Stage::Swap, pump::buy(&accounts, &args))?;
        push_tip(&mut plan, user, opts)?;

        let build = TradeBuild {
            accounts,
            args,
            instructions: plan.into_instructions()?,
            quote: None,
        };
        emit_preview("curve_buy_exact", &build, opts);
        Ok(build)
    }

    /// Spend exactly `sol_in` lamports, with the minimum tokens out from a dry run
    #[instrument(
        skip(self, cancel, opts),
        fields(correlation_id = %CorrelationId::new())
    )]
    pub async fn curve_buy_with_sol(
        &self,
        cancel: &CancellationToken,
        user: &Pubkey,
        mint: &Pubkey,
        sol_in: u64,
        slippage_bps: u64,
        opts: &TradeOptions,
    ) -> TradeResult<TradeBuild<CurveBuyAccounts, BuyExactSolInArgs>> {
        validate_pubkey("user", user)?;
        validate_pubkey("mint", mint)?;
        validate_amount("sol_in", sol_in)?;
        validate_slippage(slippage_bps)?;

        let (accounts, batch) = self.resolve_curve_buy(cancel, user, mint, opts).await?;

        let draft = pump::buy_exact_sol_in(
            &accounts,
            &BuyExactSolInArgs {
                spendable_sol_in: sol_in,
                min_tokens_out: 1,
                track_volume: opts.track_volume,
            },
        );
        let simulated = simulate_delta(
            &self.client,
            cancel,
            Venue::BondingCurve,
            user,
            &concat(&[batch.create_instructions.as_slice()], draft),
            Watched::token(
                accounts.associated_user,
                batch.balance(&accounts.associated_user),
            ),
        )
        .await?;

        let min_tokens_out = apply_slippage(simulated.delta, slippage_bps);
        debug!(simulated = simulated.delta, min_tokens_out, "Derived minimum tokens out");
        let args = BuyExactSolInArgs {
            spendable_sol_in: sol_in,
            min_tokens_out,
            track_volume: opts.track_volume,
        };

        let mut plan = InstructionPlan::new();
        plan.extend(Stage::CreateAta, batch.create_instructions)?;
        plan.push(Stage::Swap, pump::buy_exact_sol_in(&accounts, &args))?;
        push_tip(&mut plan, user, opts)?;

        let build = TradeBuild {
            accounts,
            args,
            instructions: plan.into_instructions()?,
            quote: Some(Quote {
                simulated_output: simulated.delta,
                bound: min_tokens_out,
                units_consumed: simulated.units_consumed,
            }),
        };
        emit_preview("curve_buy_with_sol", &build, opts);
        Ok(build)
    }

    /// Sell exactly `amount` tokens, with the minimum lamports out from a dry run
    /// or from `opts.expected_sol_out`
    ///
    /// The quote is the growth of the trader's native balance; its pre value
    /// comes from the resolution batch. The trader also pays the transaction
    /// fee and the rent of any token account created in the same list, so the
    /// quote is net of both. A sell whose proceeds do not cover them shrinks
    /// the balance and fails with `SimulationInvariantViolation`.
    #[instrument(
        skip(self, cancel, opts),
        fields(correlation_id = %CorrelationId::new())
    )]
    pub async fn curve_sell(
        &self,
        cancel: &CancellationToken,
        user: &Pubkey,
        mint: &Pubkey,
        amount: u64,
        slippage_bps: u64,
        opts: &TradeOptions,
    ) -> TradeResult<TradeBuild<CurveSellAccounts, SellArgs>> {
        validate_pubkey("user", user)?;
        validate_pubkey("mint", mint)?;
        validate_amount("amount", amount)?;
        validate_slippage(slippage_bps)?;

        let resolution = resolve_curve(&self.client, cancel, user, mint, true).await?;
        let mut accounts = resolution.sell_accounts();
        finalize_accounts(&mut accounts, opts)?;

        let batch = ensure_atas(
            &self.client,
            cancel,
            user,
            &[AtaRequest::new(accounts.user, accounts.mint, accounts.token_program)],
            &opts.known_atas,
        )
        .await?;

        let (expected, units_consumed) = match opts.expected_sol_out {
            Some(expected) => (expected, None),
            None => {
                let draft = pump::sell(
                    &accounts,
                    &SellArgs {
                        amount,
                        min_sol_output: 0,
                    },
                );
                let simulated = simulate_delta(
                    &self.client,
                    cancel,
                    Venue::BondingCurve,
                    user,
                    &concat(&[batch.create_instructions.as_slice()], draft),
                    Watched::lamports(*user, resolution.state.user_lamports.unwrap_or(0)),
                )
                .await?;
                (simulated.delta, simulated.units_consumed)
            }
        };

        let args = SellArgs {
            amount,
            min_sol_output: apply_slippage(expected, slippage_bps),
        };
        debug!(
            expected,
            min_sol_output = args.min_sol_output,
            "Derived minimum SOL out"
        );

        let mut plan = InstructionPlan::new();
        plan.extend(Stage::CreateAta, batch.create_instructions)?;
        plan.push(Stage::Swap, pump::sell(&accounts, &args))?;
        if opts.close_base_ata {
            plan.push(
                Stage::Unwrap,
                close_account(&accounts.associated_user, user, user, &accounts.token_program),
            )?;
        }
        push_tip(&mut plan, user, opts)?;

        let build = TradeBuild {
            accounts,
            quote: Some(Quote {
                simulated_output: expected,
                bound: args.min_sol_output,
                units_consumed,
            }),
            args,
            instructions: plan.into_instructions()?,
        };
        emit_preview("curve_sell", &build, opts);
        Ok(build)
    }

    /// Create a token on the curve with a fresh mint keypair
    ///
    /// With a vanity prefix or suffix in `opts` the mint address is searched
    /// for first, bounded by `opts.vanity_timeout`. The mint keypair must sign
    /// the transaction and is returned alongside the build.
    #[instrument(
        skip(self, cancel, opts),
        fields(correlation_id = %CorrelationId::new())
    )]
    pub async fn curve_create(
        &self,
        cancel: &CancellationToken,
        user: &Pubkey,
        name: &str,
        symbol: &str,
        uri: &str,
        opts: &TradeOptions,
    ) -> TradeResult<(TradeBuild<CurveCreateAccounts, CreateArgs>, Keypair)> {
        validate_metadata(user, name, symbol, uri)?;
        let mint = mint_keypair(cancel, opts).await?;

        let mut accounts = curve_create_accounts(user, &mint.pubkey());
        finalize_accounts(&mut accounts, opts)?;
        let args = CreateArgs {
            name: name.to_string(),
            symbol: symbol.to_string(),
            uri: uri.to_string(),
            creator: *user,
        };

        let mut plan = InstructionPlan::new();
        plan.push(Stage::Swap, pump::create(&accounts, &args))?;
        push_tip(&mut plan, user, opts)?;

        let build = TradeBuild {
            accounts,
            args,
            instructions: plan.into_instructions()?,
            quote: None,
        };
        emit_preview("curve_create", &build, opts);
        Ok((build, mint))
    }

    /// Token-2022 variant of [`TradeBuilder::curve_create`]
    ///
    /// `is_mayhem_mode` is passed through to the program unchanged.
    #[instrument(
        skip(self, cancel, opts),
        fields(correlation_id = %CorrelationId::new())
    )]
    pub async fn curve_create_v2(
        &self,
        cancel: &CancellationToken,
        user: &Pubkey,
        name: &str,
        symbol: &str,
        uri: &str,
        is_mayhem_mode: bool,
        opts: &TradeOptions,
    ) -> TradeResult<(TradeBuild<CurveCreateV2Accounts, CreateV2Args>, Keypair)> {
        validate_metadata(user, name, symbol, uri)?;
        let mint = mint_keypair(cancel, opts).await?;

        let mut accounts = curve_create_v2_accounts(user, &mint.pubkey());
        finalize_accounts(&mut accounts, opts)?;
        let args = CreateV2Args {
            name: name.to_string(),
            symbol: symbol.to_string(),
            uri: uri.to_string(),
            creator: *user,
            is_mayhem_mode,
        };

        let mut plan = InstructionPlan::new();
        plan.push(Stage::Swap, pump::create_v2(&accounts, &args))?;
        push_tip(&mut plan, user, opts)?;

        let build = TradeBuild {
            accounts,
            args,
            instructions: plan.into_instructions()?,
            quote: None,
        };
        emit_preview("curve_create_v2", &build, opts);
        Ok((build, mint))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::PUMP_PROGRAM_ID;
    use crate::rpc::{RpcConfig, ResilientClient};
    use crate::test_utils::MockTransport;
    use crate::tx_builder::TradeError;
    use std::sync::Arc;
    use std::time::Duration;

    fn builder(mock: &Arc<MockTransport>) -> TradeBuilder {
        let mut config = RpcConfig::from_url("http://mock");
        config.retry = crate::rpc::RetryConfig::disabled();
        TradeBuilder::new(ResilientClient::new(mock.clone(), config).unwrap())
    }

    #[test]
    fn test_buy_requests_cover_user_and_curve() {
        let accounts = CurveBuyAccounts {
            user: Pubkey::new_unique(),
            mint: Pubkey::new_unique(),
            bonding_curve: Pubkey::new_unique(),
            token_program: Pubkey::new_unique(),
            ..Default::default()
        };
        let requests = buy_ata_requests(&accounts);
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].wallet, accounts.user);
        assert_eq!(requests[1].wallet, accounts.bonding_curve);
        assert!(requests.iter().all(|r| r.token_program == accounts.token_program));
    }

    #[tokio::test]
    async fn test_create_without_vanity_makes_no_remote_calls() {
        let mock = Arc::new(MockTransport::default());
        let user = Pubkey::new_unique();
        let (build, mint) = builder(&mock)
            .curve_create(
                &CancellationToken::new(),
                &user,
                "Token",
                "TKN",
                "https://example.invalid/meta.json",
                &TradeOptions::default(),
            )
            .await
            .unwrap();

        assert_eq!(build.accounts.mint, mint.pubkey());
        assert_eq!(build.args.creator, user);
        assert_eq!(build.instructions.len(), 1);
        assert_eq!(build.instructions[0].program_id, PUMP_PROGRAM_ID);
        assert_eq!(mock.calls("getMultipleAccounts"), 0);
    }

    #[tokio::test]
    async fn test_create_v2_with_tip() {
        let mock = Arc::new(MockTransport::default());
        let user = Pubkey::new_unique();
        let tip_account = Pubkey::new_unique();
        let opts = TradeOptions {
            jito_tip_lamports: 5_000,
            jito_tip_account: Some(tip_account),
            ..Default::default()
        };
        let (build, mint) = builder(&mock)
            .curve_create_v2(&CancellationToken::new(), &user, "Token", "TKN", "uri", true, &opts)
            .await
            .unwrap();

        assert_eq!(build.accounts.mint, mint.pubkey());
        assert_eq!(build.accounts.token_program, crate::constants::TOKEN_2022_PROGRAM_ID);
        assert!(build.args.is_mayhem_mode);
        assert_eq!(build.instructions.len(), 2);
        assert_eq!(build.instructions[0].program_id, PUMP_PROGRAM_ID);
        assert_eq!(build.instructions[0].data.last(), Some(&1));
        assert_eq!(build.instructions[1].accounts[1].pubkey, tip_account);
        assert_eq!(mock.calls("getMultipleAccounts"), 0);

        let err = builder(&mock)
            .curve_create_v2(&CancellationToken::new(), &user, "Token", "", "uri", false, &opts)
            .await
            .unwrap_err();
        assert!(matches!(err, TradeError::Validation { ref field, .. } if field == "symbol"));
    }

    #[tokio::test]
    async fn test_create_with_vanity_suffix() {
        let mock = Arc::new(MockTransport::default());
        let opts = TradeOptions {
            vanity_suffix: Some("z".to_string()),
            vanity_timeout: Duration::from_secs(30),
            ..Default::default()
        };
        let (build, mint) = builder(&mock)
            .curve_create(
                &CancellationToken::new(),
                &Pubkey::new_unique(),
                "Token",
                "TKN",
                "uri",
                &opts,
            )
            .await
            .unwrap();
        assert!(mint.pubkey().to_string().ends_with('z'));
        assert_eq!(build.accounts.mint, mint.pubkey());
    }

    #[tokio::test]
    async fn test_validation_precedes_remote_calls() {
        let mock = Arc::new(MockTransport::default());
        let b = builder(&mock);
        let cancel = CancellationToken::new();
        let opts = TradeOptions::default();
        let user = Pubkey::new_unique();
        let mint = Pubkey::new_unique();

        let err = b.curve_sell(&cancel, &user, &mint, 0, 100, &opts).await.unwrap_err();
        assert!(matches!(err, TradeError::Validation { ref field, .. } if field == "amount"));

        let err = b
            .curve_buy_with_sol(&cancel, &user, &mint, 1_000, 10_001, &opts)
            .await
            .unwrap_err();
        assert!(matches!(err, TradeError::Validation { .. }));

        let err = b
            .curve_buy_exact(&cancel, &Pubkey::default(), &mint, 1, 1, &opts)
            .await
            .unwrap_err();
        assert!(matches!(err, TradeError::Validation { ref field, .. } if field == "user"));

        let err = b
            .curve_create(&cancel, &user, "", "TKN", "uri", &opts)
            .await
            .unwrap_err();
        assert!(matches!(err, TradeError::Validation { ref field, .. } if field == "name"));

        assert_eq!(mock.calls("getMultipleAccounts"), 0);
        assert_eq!(mock.calls("simulateTransaction"), 0);
    }
}
