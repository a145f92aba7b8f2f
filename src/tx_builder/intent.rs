//! Venue-agnostic trade intents

use super::errors::{TradeError, TradeResult};
use super::options::TradeOptions;
use super::{Quote, TradeBuild, TradeBuilder};
use crate::accounts::{AccountSet, ResolvedAccountSet};
use crate::observability::TraceContext;
use serde::Serialize;
use serde_json::Value;
use solana_sdk::instruction::Instruction;
use solana_sdk::pubkey::Pubkey;
use tokio_util::sync::CancellationToken;
use tracing::{info, Instrument};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Buy,
    Sell,
}

/// Where the trade executes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Market {
    /// Bonding curve of a mint that has not migrated yet
    Curve { mint: Pubkey },
    /// Constant-product pool
    Pool { pool: Pubkey },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeAmount {
    /// Spend exactly this much; the bound on the output comes from a dry run
    ExactIn(u64),
    /// Receive exactly `amount`, paying at most `max_in`
    ExactOut { amount: u64, max_in: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TradeIntent {
    pub user: Pubkey,
    pub direction: Direction,
    pub market: Market,
    pub amount: TradeAmount,
    /// Ignored by exact-out intents
    pub slippage_bps: u64,
}

impl TradeIntent {
    /// Name of the entry point this intent dispatches to
    pub fn operation(&self) -> &'static str {
        match (self.market, self.direction, self.amount) {
            (Market::Curve { .. }, Direction::Buy, TradeAmount::ExactIn(_)) => "curve_buy_with_sol",
            (Market::Curve { .. }, Direction::Buy, TradeAmount::ExactOut { .. }) => "curve_buy_exact",
            (Market::Curve { .. }, Direction::Sell, _) => "curve_sell",
            (Market::Pool { .. }, Direction::Buy, TradeAmount::ExactIn(_)) => "amm_buy_with_quote",
            (Market::Pool { .. }, Direction::Buy, TradeAmount::ExactOut { .. }) => "amm_buy_exact_out",
            (Market::Pool { .. }, Direction::Sell, _) => "amm_sell",
        }
    }
}

/// Type-erased [`TradeBuild`]
#[derive(Debug, Clone)]
pub struct IntentBuild {
    pub accounts: ResolvedAccountSet,
    pub args: Value,
    pub instructions: Vec<Instruction>,
    pub quote: Option<Quote>,
}

impl<A: AccountSet, G: Serialize> TryFrom<TradeBuild<A, G>> for IntentBuild {
    type Error = TradeError;

    fn try_from(build: TradeBuild<A, G>) -> TradeResult<Self> {
        let args = serde_json::to_value(&build.args).map_err(|e| TradeError::Serialization {
            what: "instruction args",
            source: e,
        })?;
        Ok(Self {
            accounts: build.accounts.to_resolved(),
            args,
            instructions: build.instructions,
            quote: build.quote,
        })
    }
}

impl TradeBuilder {
    /// Dispatch `intent` to the matching entry point
    ///
    /// Sells only take an exact input amount.
    pub async fn build(
        &self,
        cancel: &CancellationToken,
        intent: &TradeIntent,
        opts: &TradeOptions,
    ) -> TradeResult<IntentBuild> {
        let ctx = TraceContext::new(intent.operation());
        let result = self
            .dispatch(cancel, intent, opts)
            .instrument(ctx.span())
            .await;
        if let Ok(build) = &result {
            info!(
                correlation_id = %ctx.correlation_id,
                stage = ctx.stage,
                instructions = build.instructions.len(),
                elapsed_ms = ctx.elapsed_ms(),
                "Trade built"
            );
        }
        result
    }

    async fn dispatch(
        &self,
        cancel: &CancellationToken,
        intent: &TradeIntent,
        opts: &TradeOptions,
    ) -> TradeResult<IntentBuild> {
        let user = &intent.user;
        let bps = intent.slippage_bps;
        let build: IntentBuild = match (intent.market, intent.direction, intent.amount) {
            (_, Direction::Sell, TradeAmount::ExactOut { .. }) => {
                return Err(TradeError::validation(
                    "amount",
                    "sells take an exact input amount",
                ));
            }
            (Market::Curve { mint }, Direction::Buy, TradeAmount::ExactIn(sol_in)) => self
                .curve_buy_with_sol(cancel, user, &mint, sol_in, bps, opts)
                .await?
                .try_into()?,
            (Market::Curve { mint }, Direction::Buy, TradeAmount::ExactOut { amount, max_in }) => self
                .curve_buy_exact(cancel, user, &mint, amount, max_in, opts)
                .await?
                .try_into()?,
            (Market::Curve { mint }, Direction::Sell, TradeAmount::ExactIn(amount)) => self
                .curve_sell(cancel, user, &mint, amount, bps, opts)
                .await?
                .try_into()?,
            (Market::Pool { pool }, Direction::Buy, TradeAmount::ExactIn(quote_in)) => self
                .amm_buy_with_quote(cancel, user, &pool, quote_in, bps, opts)
                .await?
                .try_into()?,
            (Market::Pool { pool }, Direction::Buy, TradeAmount::ExactOut { amount, max_in }) => self
                .amm_buy_exact_out(cancel, user, &pool, amount, max_in, opts)
                .await?
                .try_into()?,
            (Market::Pool { pool }, Direction::Sell, TradeAmount::ExactIn(base_in)) => self
                .amm_sell(cancel, user, &pool, base_in, bps, opts)
                .await?
                .try_into()?,
        };
        Ok(build)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::programs::pump::{BuyArgs, CurveBuyAccounts};
    use crate::rpc::{RpcConfig, ResilientClient};
    use crate::test_utils::MockTransport;
    use std::sync::Arc;

    fn intent(market: Market, direction: Direction, amount: TradeAmount) -> TradeIntent {
        TradeIntent {
            user: Pubkey::new_unique(),
            direction,
            market,
            amount,
            slippage_bps: 100,
        }
    }

    #[test]
    fn test_operation_names() {
        let curve = Market::Curve { mint: Pubkey::new_unique() };
        let pool = Market::Pool { pool: Pubkey::new_unique() };
        let exact_out = TradeAmount::ExactOut { amount: 1, max_in: 2 };

        assert_eq!(
            intent(curve, Direction::Buy, TradeAmount::ExactIn(1)).operation(),
            "curve_buy_with_sol"
        );
        assert_eq!(intent(curve, Direction::Buy, exact_out).operation(), "curve_buy_exact");
        assert_eq!(intent(pool, Direction::Buy, exact_out).operation(), "amm_buy_exact_out");
        assert_eq!(
            intent(pool, Direction::Sell, TradeAmount::ExactIn(1)).operation(),
            "amm_sell"
        );
    }

    #[test]
    fn test_erased_build_keeps_roles_and_args() {
        let accounts = CurveBuyAccounts {
            mint: Pubkey::new_unique(),
            ..Default::default()
        };
        let erased = IntentBuild::try_from(TradeBuild {
            accounts,
            args: BuyArgs {
                amount: 3,
                max_sol_cost: 4,
                track_volume: false,
            },
            instructions: vec![],
            quote: None,
        })
        .unwrap();
        assert_eq!(erased.accounts.get("mint"), Some(accounts.mint));
        assert_eq!(erased.args["max_sol_cost"], 4);
    }

    struct Unserializable;

    impl Serialize for Unserializable {
        fn serialize<S: serde::Serializer>(&self, _: S) -> Result<S::Ok, S::Error> {
            Err(serde::ser::Error::custom("args refuse to serialize"))
        }
    }

    #[test]
    fn test_args_serialization_failure_is_reported() {
        let err = IntentBuild::try_from(TradeBuild {
            accounts: CurveBuyAccounts::default(),
            args: Unserializable,
            instructions: vec![],
            quote: None,
        })
        .unwrap_err();
        assert!(matches!(err, TradeError::Serialization { what: "instruction args", .. }));
        assert_eq!(err.category(), "internal");
        assert!(err.to_string().contains("args refuse to serialize"));
    }

    #[tokio::test]
    async fn test_exact_out_sell_rejected_locally() {
        let mock = Arc::new(MockTransport::new());
        let mut config = RpcConfig::from_url("http://mock");
        config.rate_limit.rps = 0.0;
        let builder = TradeBuilder::new(ResilientClient::new(mock.clone(), config).unwrap());

        let sell = intent(
            Market::Pool { pool: Pubkey::new_unique() },
            Direction::Sell,
            TradeAmount::ExactOut { amount: 1, max_in: 1 },
        );
        let err = builder
            .build(&CancellationToken::new(), &sell, &TradeOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, TradeError::Validation { .. }));
        assert_eq!(mock.calls("getMultipleAccounts"), 0);
    }
}
