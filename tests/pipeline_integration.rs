//! End-to-end trade builds against the scripted mock transport
//!
//! Covers:
//! - pool buy with a simulated quote, slippage bound and instruction order
//! - WSOL top-up for an existing wrapped balance
//! - pool trades and curve sells with a caller-supplied expected output (no dry run)
//! - curve sell quoted from the trader's lamport delta
//! - validation and simulation failures
//! - signing, sending and confirming the assembled list
//! - pool price reports from a dry run and the vault balances

use pump_pipeline::accounts::AccountSet;
use pump_pipeline::confirm::{ConfirmationLevel, TxSubmitter};
use pump_pipeline::constants::{
    ASSOCIATED_TOKEN_PROGRAM_ID, PUMP_AMM_PROGRAM_ID, PUMP_PROGRAM_ID, SYSTEM_PROGRAM_ID,
    TOKEN_PROGRAM_ID, WSOL_MINT,
};
use pump_pipeline::layouts::{BondingCurve, Global, GlobalConfig, Pool};
use pump_pipeline::quote::{self, apply_slippage, scaled_price};
use pump_pipeline::resolver::derive;
use pump_pipeline::rpc::{ResilientClient, RetryConfig, RpcConfig, SignatureStatus, SimulationOutcome};
use pump_pipeline::test_utils::{token_account, MockTransport};
use pump_pipeline::tx_builder::{
    Direction, Market, TradeAmount, TradeBuilder, TradeError, TradeIntent, TradeOptions,
};
use solana_sdk::instruction::{InstructionError, Instruction};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signer};
use solana_sdk::transaction::TransactionError;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn client(transport: &Arc<MockTransport>) -> ResilientClient {
    let mut config = RpcConfig::from_url("http://mock");
    config.rate_limit.rps = 0.0;
    config.retry = RetryConfig::disabled();
    ResilientClient::new(transport.clone(), config).unwrap()
}

fn transfer_lamports(ix: &Instruction) -> u64 {
    u64::from_le_bytes(ix.data[4..12].try_into().unwrap())
}

/// Dry run reporting `target` holding `post` tokens and every other requested
/// account as absent
fn simulate_token_credit(transport: &Arc<MockTransport>, target: Pubkey, mint: Pubkey, owner: Pubkey, post: u64) {
    transport.on_simulate(move |_tx, accounts| {
        Ok(SimulationOutcome {
            err: None,
            logs: vec!["Program log: Instruction: Buy".to_string()],
            accounts: accounts
                .iter()
                .map(|k| (*k == target).then(|| token_account(TOKEN_PROGRAM_ID, mint, owner, post)))
                .collect(),
            units_consumed: Some(61_000),
        })
    });
}

struct PoolFixture {
    transport: Arc<MockTransport>,
    builder: TradeBuilder,
    pool: Pubkey,
    state: Pool,
    fee_recipient: Pubkey,
    user: Pubkey,
}

impl PoolFixture {
    fn new() -> Self {
        Self::with_quote_mint(WSOL_MINT)
    }

    fn with_quote_mint(quote_mint: Pubkey) -> Self {
        let transport = Arc::new(MockTransport::new());
        let pool = Pubkey::new_unique();
        let state = Pool {
            pool_bump: 254,
            index: 0,
            creator: Pubkey::new_unique(),
            base_mint: Pubkey::new_unique(),
            quote_mint,
            lp_mint: Pubkey::new_unique(),
            pool_base_token_account: Pubkey::new_unique(),
            pool_quote_token_account: Pubkey::new_unique(),
            lp_supply: 1_000_000,
            coin_creator: Pubkey::default(),
        };
        let fee_recipient = Pubkey::new_unique();
        let mut recipients = [Pubkey::default(); 8];
        recipients[0] = fee_recipient;
        let config = GlobalConfig {
            admin: Pubkey::new_unique(),
            lp_fee_basis_points: 20,
            protocol_fee_basis_points: 5,
            disable_flags: 0,
            protocol_fee_recipients: recipients,
            coin_creator_fee_basis_points: 5,
        };

        transport.set_account(pool, PUMP_AMM_PROGRAM_ID, 1, state.encode());
        transport.set_account(derive::amm::global_config(), PUMP_AMM_PROGRAM_ID, 1, config.encode());
        transport.set_mint(state.base_mint, TOKEN_PROGRAM_ID);
        transport.set_mint(quote_mint, TOKEN_PROGRAM_ID);

        // The protocol fee recipient's quote account always exists on mainnet
        let fee_ata = derive::associated_token_address(&fee_recipient, &quote_mint, &TOKEN_PROGRAM_ID);
        transport.set_token_account(fee_ata, TOKEN_PROGRAM_ID, quote_mint, fee_recipient, 0);

        Self {
            builder: TradeBuilder::new(client(&transport)),
            transport,
            pool,
            state,
            fee_recipient,
            user: Pubkey::new_unique(),
        }
    }

    fn user_base_ata(&self) -> Pubkey {
        derive::associated_token_address(&self.user, &self.state.base_mint, &TOKEN_PROGRAM_ID)
    }

    fn user_wsol_ata(&self) -> Pubkey {
        derive::associated_token_address(&self.user, &WSOL_MINT, &TOKEN_PROGRAM_ID)
    }

    fn fund_vaults(&self, base: u64, quote: u64) {
        self.transport.set_token_account(
            self.state.pool_base_token_account,
            TOKEN_PROGRAM_ID,
            self.state.base_mint,
            self.pool,
            base,
        );
        self.transport.set_token_account(
            self.state.pool_quote_token_account,
            TOKEN_PROGRAM_ID,
            WSOL_MINT,
            self.pool,
            quote,
        );
    }
}

#[tokio::test]
async fn test_pool_buy_quote_bound_and_order() {
    let f = PoolFixture::new();
    simulate_token_credit(&f.transport, f.user_base_ata(), f.state.base_mint, f.user, 950_000);

    let tip_account = Pubkey::new_unique();
    let opts = TradeOptions {
        jito_tip_lamports: 10_000,
        jito_tip_account: Some(tip_account),
        ..Default::default()
    };
    let build = f
        .builder
        .amm_buy_with_quote(&CancellationToken::new(), &f.user, &f.pool, 10_000_000, 100, &opts)
        .await
        .unwrap();

    assert_eq!(build.args.min_base_amount_out, 940_500);
    assert_eq!(build.args.spendable_quote_in, 10_000_000);
    let quote = build.quote.unwrap();
    assert_eq!(quote.simulated_output, 950_000);
    assert_eq!(quote.bound, 940_500);
    assert_eq!(quote.units_consumed, Some(61_000));

    // [create base, create wsol, transfer, sync, swap, tip]
    let programs: Vec<Pubkey> = build.instructions.iter().map(|ix| ix.program_id).collect();
    assert_eq!(
        programs,
        vec![
            ASSOCIATED_TOKEN_PROGRAM_ID,
            ASSOCIATED_TOKEN_PROGRAM_ID,
            SYSTEM_PROGRAM_ID,
            TOKEN_PROGRAM_ID,
            PUMP_AMM_PROGRAM_ID,
            SYSTEM_PROGRAM_ID,
        ]
    );
    assert_eq!(transfer_lamports(&build.instructions[2]), 10_000_000);
    assert_eq!(transfer_lamports(&build.instructions[5]), 10_000);
    assert_eq!(build.instructions[5].accounts[1].pubkey, tip_account);
    assert_eq!(
        build
            .instructions
            .iter()
            .filter(|ix| ix.program_id == PUMP_AMM_PROGRAM_ID)
            .count(),
        1
    );

    assert_eq!(build.accounts.protocol_fee_recipient, f.fee_recipient);
    assert!(build.accounts.ensure_resolved().is_ok());

    // Resolution (2) plus the token account batch (1); one dry run
    assert_eq!(f.transport.calls("getMultipleAccounts"), 3);
    assert_eq!(f.transport.calls("simulateTransaction"), 1);
    let simulated = f.transport.simulated();
    assert_eq!(simulated[0].1, vec![f.user_base_ata()]);
}

#[tokio::test]
async fn test_pool_buy_tops_up_only_missing_wsol() {
    let f = PoolFixture::new();
    f.transport
        .set_token_account(f.user_wsol_ata(), TOKEN_PROGRAM_ID, WSOL_MINT, f.user, 4_000_000);
    f.transport.set_token_account(
        f.user_base_ata(),
        TOKEN_PROGRAM_ID,
        f.state.base_mint,
        f.user,
        1_000,
    );
    simulate_token_credit(&f.transport, f.user_base_ata(), f.state.base_mint, f.user, 501_000);

    let build = f
        .builder
        .amm_buy_with_quote(
            &CancellationToken::new(),
            &f.user,
            &f.pool,
            10_000_000,
            0,
            &TradeOptions::default(),
        )
        .await
        .unwrap();

    // Both user accounts exist: [transfer, sync, swap]
    assert_eq!(build.instructions.len(), 3);
    assert_eq!(build.instructions[0].program_id, SYSTEM_PROGRAM_ID);
    assert_eq!(transfer_lamports(&build.instructions[0]), 6_000_000);
    assert_eq!(build.instructions[1].program_id, TOKEN_PROGRAM_ID);
    // Delta from the balance captured in the batch
    assert_eq!(build.args.min_base_amount_out, 500_000);
}

#[tokio::test]
async fn test_pool_sell_with_expected_output_skips_dry_run() {
    let f = PoolFixture::new();
    let opts = TradeOptions {
        expected_quote_out: Some(2_000_000),
        known_atas: vec![f.user_base_ata(), f.user_wsol_ata()],
        ..Default::default()
    };

    let build = f
        .builder
        .amm_sell(&CancellationToken::new(), &f.user, &f.pool, 5_000, 250, &opts)
        .await
        .unwrap();

    assert_eq!(build.args.base_amount_in, 5_000);
    assert_eq!(build.args.min_quote_amount_out, 1_950_000);
    assert_eq!(f.transport.calls("simulateTransaction"), 0);
    // Known accounts are not even fetched
    assert_eq!(f.transport.calls("getMultipleAccounts"), 2);

    // [swap, close wsol]
    assert_eq!(build.instructions.len(), 2);
    assert_eq!(build.instructions[0].program_id, PUMP_AMM_PROGRAM_ID);
    assert_eq!(build.instructions[1].program_id, TOKEN_PROGRAM_ID);
    assert_eq!(build.instructions[1].accounts[0].pubkey, f.user_wsol_ata());
}

#[tokio::test]
async fn test_pool_buy_exact_quote_with_expected_output() {
    let f = PoolFixture::new();
    let opts = TradeOptions {
        expected_base_out: Some(800_000),
        ..Default::default()
    };

    let build = f
        .builder
        .amm_buy_with_quote(&CancellationToken::new(), &f.user, &f.pool, 10_000_000, 100, &opts)
        .await
        .unwrap();

    assert_eq!(build.args.spendable_quote_in, 10_000_000);
    assert_eq!(build.args.min_base_amount_out, 792_000);
    assert_eq!(build.quote.unwrap().units_consumed, None);
    assert_eq!(f.transport.calls("simulateTransaction"), 0);
    assert_eq!(
        build.instructions.last().unwrap().program_id,
        PUMP_AMM_PROGRAM_ID
    );
}

#[tokio::test]
async fn test_pool_sell_closes_non_wsol_quote_account_on_request() {
    let quote_mint = Pubkey::new_unique();
    let f = PoolFixture::with_quote_mint(quote_mint);
    let user_quote_ata = derive::associated_token_address(&f.user, &quote_mint, &TOKEN_PROGRAM_ID);
    let mut opts = TradeOptions {
        expected_quote_out: Some(2_000_000),
        known_atas: vec![f.user_base_ata(), user_quote_ata],
        ..Default::default()
    };

    let build = f
        .builder
        .amm_sell(&CancellationToken::new(), &f.user, &f.pool, 5_000, 0, &opts)
        .await
        .unwrap();
    // A non-WSOL quote account is kept by default: [swap]
    assert_eq!(build.instructions.len(), 1);

    opts.close_quote_ata = true;
    let build = f
        .builder
        .amm_sell(&CancellationToken::new(), &f.user, &f.pool, 5_000, 0, &opts)
        .await
        .unwrap();
    // [swap, close quote]
    assert_eq!(build.instructions.len(), 2);
    assert_eq!(build.instructions[1].program_id, TOKEN_PROGRAM_ID);
    assert_eq!(build.instructions[1].accounts[0].pubkey, user_quote_ata);
}

#[tokio::test]
async fn test_shrinking_balance_is_an_invariant_violation() {
    let f = PoolFixture::new();
    f.transport.set_token_account(
        f.user_base_ata(),
        TOKEN_PROGRAM_ID,
        f.state.base_mint,
        f.user,
        1_000,
    );
    simulate_token_credit(&f.transport, f.user_base_ata(), f.state.base_mint, f.user, 400);

    let err = f
        .builder
        .amm_buy_with_quote(
            &CancellationToken::new(),
            &f.user,
            &f.pool,
            1_000_000,
            100,
            &TradeOptions::default(),
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        TradeError::SimulationInvariantViolation { pre: 1_000, post: 400, .. }
    ));
}

#[tokio::test]
async fn test_program_error_is_decoded() {
    let f = PoolFixture::new();
    f.transport.on_simulate(|_tx, accounts| {
        Ok(SimulationOutcome {
            err: Some(TransactionError::InstructionError(
                2,
                InstructionError::Custom(6004),
            )),
            logs: vec!["Program log: AnchorError occurred.".to_string()],
            accounts: vec![None; accounts.len()],
            units_consumed: None,
        })
    });

    let err = f
        .builder
        .amm_buy_with_quote(
            &CancellationToken::new(),
            &f.user,
            &f.pool,
            1_000_000,
            100,
            &TradeOptions::default(),
        )
        .await
        .unwrap_err();
    match err {
        TradeError::ProgramError { program, code, .. } => {
            assert_eq!(program, "pump_amm");
            assert_eq!(code, 6004);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(f.transport.calls("simulateTransaction"), 1);
}

#[tokio::test]
async fn test_bad_input_never_reaches_the_node() {
    let f = PoolFixture::new();
    let cancel = CancellationToken::new();
    let opts = TradeOptions::default();

    let err = f
        .builder
        .amm_buy_with_quote(&cancel, &f.user, &f.pool, 1_000, 10_001, &opts)
        .await
        .unwrap_err();
    assert_eq!(err.category(), "validation");

    let err = f
        .builder
        .amm_sell(&cancel, &f.user, &Pubkey::default(), 1, 100, &opts)
        .await
        .unwrap_err();
    assert_eq!(err.category(), "validation");

    let err = f
        .builder
        .amm_buy_exact_out(&cancel, &f.user, &f.pool, 0, 1, &opts)
        .await
        .unwrap_err();
    assert_eq!(err.category(), "validation");

    assert_eq!(f.transport.calls("getMultipleAccounts"), 0);
}

#[tokio::test]
async fn test_intent_dispatch_to_pool_buy() {
    let f = PoolFixture::new();
    simulate_token_credit(&f.transport, f.user_base_ata(), f.state.base_mint, f.user, 950_000);

    let intent = TradeIntent {
        user: f.user,
        direction: Direction::Buy,
        market: Market::Pool { pool: f.pool },
        amount: TradeAmount::ExactIn(10_000_000),
        slippage_bps: 100,
    };
    let build = f
        .builder
        .build(&CancellationToken::new(), &intent, &TradeOptions::default())
        .await
        .unwrap();

    assert_eq!(build.accounts.get("pool"), Some(f.pool));
    assert_eq!(build.accounts.get("userBaseTokenAccount"), Some(f.user_base_ata()));
    assert_eq!(build.args["min_base_amount_out"], 940_500);
    assert_eq!(build.quote.map(|q| q.bound), Some(940_500));
}

struct CurveFixture {
    transport: Arc<MockTransport>,
    builder: TradeBuilder,
    mint: Pubkey,
    user: Pubkey,
}

impl CurveFixture {
    fn new(user_lamports: u64) -> Self {
        let transport = Arc::new(MockTransport::new());
        let mint = Pubkey::new_unique();
        let user = Pubkey::new_unique();

        let global = Global {
            initialized: true,
            authority: Pubkey::new_unique(),
            fee_recipient: Pubkey::new_unique(),
            initial_virtual_token_reserves: 1_073_000_000_000_000,
            initial_virtual_sol_reserves: 30_000_000_000,
            initial_real_token_reserves: 793_100_000_000_000,
            token_total_supply: 1_000_000_000_000_000,
            fee_basis_points: 95,
            withdraw_authority: Pubkey::new_unique(),
            enable_migrate: true,
            pool_migration_fee: 0,
            creator_fee_basis_points: 5,
            fee_recipients: [Pubkey::default(); 7],
        };
        let curve = BondingCurve {
            virtual_token_reserves: 1_000_000_000_000_000,
            virtual_sol_reserves: 32_000_000_000,
            real_token_reserves: 700_000_000_000_000,
            real_sol_reserves: 2_000_000_000,
            token_total_supply: 1_000_000_000_000_000,
            complete: false,
            creator: Pubkey::new_unique(),
        };

        transport.set_account(derive::curve::global(), PUMP_PROGRAM_ID, 1, global.encode());
        transport.set_account(derive::curve::bonding_curve(&mint), PUMP_PROGRAM_ID, 1, curve.encode());
        transport.set_mint(mint, TOKEN_PROGRAM_ID);
        transport.set_account(user, SYSTEM_PROGRAM_ID, user_lamports, vec![]);

        Self {
            builder: TradeBuilder::new(client(&transport)),
            transport,
            mint,
            user,
        }
    }

    fn user_ata(&self) -> Pubkey {
        derive::associated_token_address(&self.user, &self.mint, &TOKEN_PROGRAM_ID)
    }
}

#[tokio::test]
async fn test_curve_sell_quotes_lamport_delta() {
    let f = CurveFixture::new(5_000_000_000);
    f.transport
        .set_token_account(f.user_ata(), TOKEN_PROGRAM_ID, f.mint, f.user, 10_000_000);
    let user = f.user;
    f.transport.on_simulate(move |_tx, accounts| {
        Ok(SimulationOutcome {
            err: None,
            logs: vec![],
            accounts: accounts
                .iter()
                .map(|k| {
                    (*k == user).then(|| solana_sdk::account::Account {
                        lamports: 5_123_456_789,
                        data: vec![],
                        owner: SYSTEM_PROGRAM_ID,
                        executable: false,
                        rent_epoch: 0,
                    })
                })
                .collect(),
            units_consumed: Some(40_000),
        })
    });

    let opts = TradeOptions {
        close_base_ata: true,
        ..Default::default()
    };
    let build = f
        .builder
        .curve_sell(&CancellationToken::new(), &f.user, &f.mint, 10_000_000, 50, &opts)
        .await
        .unwrap();

    assert_eq!(build.quote.unwrap().simulated_output, 123_456_789);
    assert_eq!(
        build.args.min_sol_output,
        (123_456_789u128 * 9_950 / 10_000) as u64
    );
    // User balance came with the resolution batch: no extra fetch
    assert_eq!(f.transport.calls("getMultipleAccounts"), 2);
    assert_eq!(f.transport.simulated()[0].1, vec![f.user]);

    // [sell, close]
    assert_eq!(build.instructions.len(), 2);
    assert_eq!(build.instructions[0].program_id, PUMP_PROGRAM_ID);
    assert_eq!(build.instructions[1].program_id, TOKEN_PROGRAM_ID);
}

#[tokio::test]
async fn test_curve_dust_sell_below_fee_and_rent_is_rejected() {
    let f = CurveFixture::new(5_000_000_000);
    // No token account yet: the dry run also pays for its creation
    let user = f.user;
    f.transport.on_simulate(move |_tx, accounts| {
        Ok(SimulationOutcome {
            err: None,
            logs: vec![],
            accounts: accounts
                .iter()
                .map(|k| {
                    (*k == user).then(|| solana_sdk::account::Account {
                        // proceeds 1_000, fee 5_000, rent 2_039_280
                        lamports: 5_000_000_000 + 1_000 - 5_000 - 2_039_280,
                        data: vec![],
                        owner: SYSTEM_PROGRAM_ID,
                        executable: false,
                        rent_epoch: 0,
                    })
                })
                .collect(),
            units_consumed: Some(40_000),
        })
    });

    let err = f
        .builder
        .curve_sell(&CancellationToken::new(), &f.user, &f.mint, 10, 50, &TradeOptions::default())
        .await
        .unwrap_err();
    match err {
        TradeError::SimulationInvariantViolation { account, pre, post } => {
            assert_eq!(account, f.user.to_string());
            assert_eq!(pre, 5_000_000_000);
            assert!(post < pre);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_curve_sell_with_expected_output_skips_dry_run() {
    let f = CurveFixture::new(5_000_000_000);
    f.transport
        .set_token_account(f.user_ata(), TOKEN_PROGRAM_ID, f.mint, f.user, 10_000_000);
    let opts = TradeOptions {
        expected_sol_out: Some(1_000_000),
        ..Default::default()
    };

    let build = f
        .builder
        .curve_sell(&CancellationToken::new(), &f.user, &f.mint, 10_000_000, 0, &opts)
        .await
        .unwrap();

    assert_eq!(build.args.min_sol_output, 1_000_000);
    let quote = build.quote.unwrap();
    assert_eq!(quote.simulated_output, 1_000_000);
    assert_eq!(quote.units_consumed, None);
    assert_eq!(f.transport.calls("simulateTransaction"), 0);
}

#[tokio::test]
async fn test_curve_buy_with_sol_creates_missing_accounts() {
    let f = CurveFixture::new(1_000_000_000);
    simulate_token_credit(&f.transport, f.user_ata(), f.mint, f.user, 3_000_000);

    let build = f
        .builder
        .curve_buy_with_sol(
            &CancellationToken::new(),
            &f.user,
            &f.mint,
            100_000_000,
            1_000,
            &TradeOptions::default(),
        )
        .await
        .unwrap();

    assert_eq!(build.args.min_tokens_out, 2_700_000);
    assert_eq!(build.args.spendable_sol_in, 100_000_000);
    // Neither the user's nor the curve's token account exists yet
    let programs: Vec<Pubkey> = build.instructions.iter().map(|ix| ix.program_id).collect();
    assert_eq!(
        programs,
        vec![ASSOCIATED_TOKEN_PROGRAM_ID, ASSOCIATED_TOKEN_PROGRAM_ID, PUMP_PROGRAM_ID]
    );
}

#[tokio::test(start_paused = true)]
async fn test_sign_send_and_confirm() {
    let f = CurveFixture::new(1_000_000_000);
    let wallet = Keypair::new();
    let build = f
        .builder
        .curve_buy_exact(
            &CancellationToken::new(),
            &wallet.pubkey(),
            &f.mint,
            1_000,
            5_000_000,
            &TradeOptions::default(),
        )
        .await
        .unwrap();

    let submitter = TxSubmitter::new(f.builder.client().clone())
        .with_poll_interval(Duration::from_millis(10));
    let cancel = CancellationToken::new();
    let tx = submitter
        .sign(&cancel, &wallet.pubkey(), &[&wallet as &dyn Signer], &build.instructions)
        .await
        .unwrap();
    assert_eq!(tx.message.recent_blockhash, f.transport.blockhash());

    f.transport.push_statuses(Ok(vec![None]));
    f.transport.push_statuses(Ok(vec![Some(SignatureStatus {
        slot: 42,
        err: None,
        level: Some(ConfirmationLevel::Confirmed),
    })]));
    let signature = submitter
        .send_and_confirm(&cancel, &tx, ConfirmationLevel::Confirmed)
        .await
        .unwrap();

    assert_eq!(signature, tx.signatures[0]);
    assert_eq!(f.transport.sent().len(), 1);
    assert_eq!(f.transport.calls("getSignatureStatuses"), 2);
}

#[tokio::test]
async fn test_pool_spot_price_from_vaults() {
    let f = PoolFixture::new();
    let cancel = CancellationToken::new();

    let err = quote::pool_spot_price(f.builder.client(), &cancel, &f.pool)
        .await
        .unwrap_err();
    assert_eq!(err.category(), "validation");

    f.fund_vaults(1_000_000_000_000, 100_000_000_000);
    let price = quote::pool_spot_price(f.builder.client(), &cancel, &f.pool)
        .await
        .unwrap();
    assert_eq!(price, 100_000_000);
}

#[tokio::test]
async fn test_pool_buy_quote_reports_impact() {
    let f = PoolFixture::new();
    f.fund_vaults(1_000_000_000_000, 100_000_000_000);
    simulate_token_credit(&f.transport, f.user_base_ata(), f.state.base_mint, f.user, 950_000);

    let report = quote::amm_buy_quote(
        &f.builder,
        &CancellationToken::new(),
        &f.user,
        &f.pool,
        10_000_000,
        100,
    )
    .await
    .unwrap();

    assert_eq!(report.expected_out, 950_000);
    assert_eq!(report.min_out, 940_500);
    assert_eq!(report.spot_price, 100_000_000);
    assert_eq!(report.execution_price, scaled_price(10_000_000, 950_000));
    assert!(report.price_impact_bps > 0);
    assert_eq!(f.transport.calls("simulateTransaction"), 1);
}

#[tokio::test]
async fn test_pool_sell_quote_uses_quote_delta() {
    let f = PoolFixture::new();
    f.fund_vaults(1_000_000_000_000, 100_000_000_000);
    f.transport.set_token_account(
        f.user_base_ata(),
        TOKEN_PROGRAM_ID,
        f.state.base_mint,
        f.user,
        50_000,
    );
    simulate_token_credit(&f.transport, f.user_wsol_ata(), WSOL_MINT, f.user, 480);

    let report = quote::amm_sell_quote(
        &f.builder,
        &CancellationToken::new(),
        &f.user,
        &f.pool,
        5_000,
        250,
    )
    .await
    .unwrap();

    assert_eq!(report.expected_out, 480);
    assert_eq!(report.min_out, apply_slippage(480, 250));
    assert_eq!(report.execution_price, scaled_price(480, 5_000));
    // 0.096 per base unit against a spot of 0.1
    assert_eq!(report.price_impact_bps, 400);
}
