//! Quote math and price reports
//!
//! Closed-form estimates from reserves. These are reports next to a
//! simulated quote, never a replacement for it: reserves are a snapshot and
//! the programs charge fees the formulas below ignore. The pool quotes at the
//! bottom pair a dry-run output with the reserves for a price report.

use crate::constants::BPS_DENOMINATOR;
use crate::fetcher::fetch_many;
use crate::layouts::{token_account_amount, BondingCurve, Pool};
use crate::resolver::derive;
use crate::rpc::ResilientClient;
use crate::tx_builder::errors::{TradeError, TradeResult};
use crate::tx_builder::{TradeBuilder, TradeOptions};
use serde::Serialize;
use solana_sdk::pubkey::Pubkey;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

/// Fixed-point scale of prices (quote units per base unit)
pub const PRICE_SCALE: u128 = 1_000_000_000;

/// Bound derived from a quote: `amount * (10000 - bps) / 10000`, truncating
///
/// `slippage_bps >= 10000` yields 0.
pub fn apply_slippage(amount: u64, slippage_bps: u64) -> u64 {
    if slippage_bps >= BPS_DENOMINATOR {
        return 0;
    }
    let kept = (BPS_DENOMINATOR - slippage_bps) as u128;
    // Never exceeds `amount`, so the narrowing is lossless
    (amount as u128 * kept / BPS_DENOMINATOR as u128) as u64
}

/// Tokens received for `sol_in` against virtual reserves
pub fn curve_tokens_out(curve: &BondingCurve, sol_in: u64) -> u64 {
    constant_product_out(
        sol_in,
        curve.virtual_sol_reserves,
        curve.virtual_token_reserves,
    )
}

/// Lamports received for `tokens_in` against virtual reserves
pub fn curve_sol_out(curve: &BondingCurve, tokens_in: u64) -> u64 {
    constant_product_out(
        tokens_in,
        curve.virtual_token_reserves,
        curve.virtual_sol_reserves,
    )
}

/// `amount_in * reserve_out / (reserve_in + amount_in)`
fn constant_product_out(amount_in: u64, reserve_in: u64, reserve_out: u64) -> u64 {
    let denominator = reserve_in as u128 + amount_in as u128;
    if denominator == 0 {
        return 0;
    }
    let out = amount_in as u128 * reserve_out as u128 / denominator;
    out.min(u64::MAX as u128) as u64
}

/// `quote / base` scaled by [`PRICE_SCALE`]; 0 when `base` is 0
pub fn scaled_price(quote: u64, base: u64) -> u64 {
    if base == 0 {
        return 0;
    }
    let price = quote as u128 * PRICE_SCALE / base as u128;
    price.min(u64::MAX as u128) as u64
}

/// Trade direction for price impact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

/// Token balances of a pool's two vaults
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Reserves {
    pub base: u64,
    pub quote: u64,
}

impl From<&BondingCurve> for Reserves {
    fn from(curve: &BondingCurve) -> Self {
        Self {
            base: curve.virtual_token_reserves,
            quote: curve.virtual_sol_reserves,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QuoteResult {
    pub expected_out: u64,
    pub min_out: u64,
    pub price_impact_bps: u64,
    pub spot_price: u64,
    pub execution_price: u64,
}

impl QuoteResult {
    /// Price report for a fill of `quote_amount` against `base_amount`
    ///
    /// Impact counts only the adverse direction: paying above spot on a buy,
    /// receiving below spot on a sell.
    pub fn from_fill(
        reserves: Reserves,
        side: Side,
        quote_amount: u64,
        base_amount: u64,
        expected_out: u64,
        slippage_bps: u64,
    ) -> Self {
        let min_out = apply_slippage(expected_out, slippage_bps);
        if reserves.base == 0 || base_amount == 0 {
            return Self {
                expected_out,
                min_out,
                ..Default::default()
            };
        }

        let spot_price = scaled_price(reserves.quote, reserves.base);
        let execution_price = scaled_price(quote_amount, base_amount);
        let adverse = match side {
            Side::Buy => execution_price.saturating_sub(spot_price),
            Side::Sell => spot_price.saturating_sub(execution_price),
        };
        let price_impact_bps = if spot_price > 0 {
            (adverse as u128 * BPS_DENOMINATOR as u128 / spot_price as u128) as u64
        } else {
            0
        };

        Self {
            expected_out,
            min_out,
            price_impact_bps,
            spot_price,
            execution_price,
        }
    }
}

/// Curve buy estimate for `sol_in`
pub fn curve_buy_quote(curve: &BondingCurve, sol_in: u64, slippage_bps: u64) -> QuoteResult {
    let tokens = curve_tokens_out(curve, sol_in);
    QuoteResult::from_fill(curve.into(), Side::Buy, sol_in, tokens, tokens, slippage_bps)
}

/// Curve sell estimate for `tokens_in`
pub fn curve_sell_quote(curve: &BondingCurve, tokens_in: u64, slippage_bps: u64) -> QuoteResult {
    let sol = curve_sol_out(curve, tokens_in);
    QuoteResult::from_fill(curve.into(), Side::Sell, sol, tokens_in, sol, slippage_bps)
}

/// Fetch and decode the bonding curve of `mint`
#[instrument(skip(client, cancel))]
pub async fn fetch_bonding_curve(
    client: &ResilientClient,
    cancel: &CancellationToken,
    mint: &Pubkey,
) -> TradeResult<BondingCurve> {
    let address = derive::curve::bonding_curve(mint);
    let records = fetch_many(client, cancel, &[address]).await?;
    let snapshot = records
        .get(&address)
        .ok_or_else(|| TradeError::venue_not_found("bonding curve", address))?;
    BondingCurve::decode(&snapshot.data).map_err(|e| TradeError::malformed(address, e))
}

/// Vault balances of `pool`: the pool record, then both vaults
#[instrument(skip(client, cancel))]
pub async fn fetch_pool_reserves(
    client: &ResilientClient,
    cancel: &CancellationToken,
    pool: &Pubkey,
) -> TradeResult<Reserves> {
    let records = fetch_many(client, cancel, &[*pool]).await?;
    let snapshot = records
        .get(pool)
        .ok_or_else(|| TradeError::venue_not_found("pool", pool))?;
    let state = Pool::decode(&snapshot.data).map_err(|e| TradeError::malformed(pool, e))?;

    let vaults = [state.pool_base_token_account, state.pool_quote_token_account];
    let balances = fetch_many(client, cancel, &vaults).await?;
    let amount = |vault: &Pubkey| -> TradeResult<u64> {
        match balances.get(vault) {
            Some(s) => token_account_amount(&s.data).map_err(|e| TradeError::malformed(vault, e)),
            None => Ok(0),
        }
    };

    Ok(Reserves {
        base: amount(&vaults[0])?,
        quote: amount(&vaults[1])?,
    })
}

/// Spot price of `reserves`; zero base reserves have no price
fn checked_spot_price(reserves: &Reserves, what: &str) -> TradeResult<u64> {
    if reserves.base == 0 {
        return Err(TradeError::validation(what, "base reserves are zero"));
    }
    Ok(scaled_price(reserves.quote, reserves.base))
}

/// Curve spot price in lamports per token, scaled by [`PRICE_SCALE`]
pub async fn curve_spot_price(
    client: &ResilientClient,
    cancel: &CancellationToken,
    mint: &Pubkey,
) -> TradeResult<u64> {
    let curve = fetch_bonding_curve(client, cancel, mint).await?;
    checked_spot_price(&Reserves::from(&curve), "bonding_curve")
}

/// Pool spot price in quote units per base unit, scaled by [`PRICE_SCALE`]
pub async fn pool_spot_price(
    client: &ResilientClient,
    cancel: &CancellationToken,
    pool: &Pubkey,
) -> TradeResult<u64> {
    let reserves = fetch_pool_reserves(client, cancel, pool).await?;
    checked_spot_price(&reserves, "pool")
}

/// Price report for spending `quote_in` on `pool`
///
/// The output is the dry-run base delta of the matching build; the reserves
/// are read after it, so a busy pool can drift between the two.
#[instrument(skip(builder, cancel))]
pub async fn amm_buy_quote(
    builder: &TradeBuilder,
    cancel: &CancellationToken,
    user: &Pubkey,
    pool: &Pubkey,
    quote_in: u64,
    slippage_bps: u64,
) -> TradeResult<QuoteResult> {
    let build = builder
        .amm_buy_with_quote(cancel, user, pool, quote_in, slippage_bps, &TradeOptions::default())
        .await?;
    let base_out = build.quote.map(|q| q.simulated_output).unwrap_or(0);
    let reserves = fetch_pool_reserves(builder.client(), cancel, pool).await?;
    debug!(base_out, ?reserves, "Pool buy quoted");
    Ok(QuoteResult::from_fill(
        reserves,
        Side::Buy,
        quote_in,
        base_out,
        base_out,
        slippage_bps,
    ))
}

/// Price report for selling `base_in` on `pool`
#[instrument(skip(builder, cancel))]
pub async fn amm_sell_quote(
    builder: &TradeBuilder,
    cancel: &CancellationToken,
    user: &Pubkey,
    pool: &Pubkey,
    base_in: u64,
    slippage_bps: u64,
) -> TradeResult<QuoteResult> {
    let build = builder
        .amm_sell(cancel, user, pool, base_in, slippage_bps, &TradeOptions::default())
        .await?;
    let quote_out = build.quote.map(|q| q.simulated_output).unwrap_or(0);
    let reserves = fetch_pool_reserves(builder.client(), cancel, pool).await?;
    debug!(quote_out, ?reserves, "Pool sell quoted");
    Ok(QuoteResult::from_fill(
        reserves,
        Side::Sell,
        quote_out,
        base_in,
        quote_out,
        slippage_bps,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn curve() -> BondingCurve {
        BondingCurve {
            virtual_token_reserves: 1_073_000_000_000_000,
            virtual_sol_reserves: 30_000_000_000,
            real_token_reserves: 793_100_000_000_000,
            real_sol_reserves: 0,
            token_total_supply: 1_000_000_000_000_000,
            complete: false,
            creator: Pubkey::new_unique(),
        }
    }

    #[test]
    fn test_apply_slippage_examples() {
        assert_eq!(apply_slippage(950_000, 100), 940_500);
        assert_eq!(apply_slippage(950_000, 0), 950_000);
        assert_eq!(apply_slippage(950_000, 10_000), 0);
        assert_eq!(
            apply_slippage(u64::MAX, 1),
            (u64::MAX as u128 * 9_999 / 10_000) as u64
        );
        assert_eq!(apply_slippage(999, 1), 998);
    }

    #[test]
    fn test_curve_estimates() {
        let c = curve();
        let tokens = curve_tokens_out(&c, 1_000_000_000);
        assert_eq!(
            tokens,
            (1_000_000_000u128 * 1_073_000_000_000_000 / 31_000_000_000) as u64
        );
        let sol = curve_sol_out(&c, tokens);
        assert!(sol < 1_000_000_000);
        assert_eq!(curve_tokens_out(&c, 0), 0);
    }

    #[test]
    fn test_spot_price_and_impact() {
        let c = curve();
        let quote = curve_buy_quote(&c, 1_000_000_000, 100);
        assert_eq!(quote.spot_price, scaled_price(30_000_000_000, 1_073_000_000_000_000));
        assert!(quote.execution_price > quote.spot_price);
        assert!(quote.price_impact_bps > 0);
        assert_eq!(quote.min_out, apply_slippage(quote.expected_out, 100));

        let sell = curve_sell_quote(&c, 10_000_000_000, 0);
        assert!(sell.execution_price <= sell.spot_price);
    }

    #[test]
    fn test_degenerate_reserves() {
        let quote = QuoteResult::from_fill(Reserves::default(), Side::Buy, 10, 10, 10, 0);
        assert_eq!(quote.spot_price, 0);
        assert_eq!(quote.price_impact_bps, 0);
        assert_eq!(quote.expected_out, 10);
        assert_eq!(scaled_price(5, 0), 0);
    }

    #[test]
    fn test_checked_spot_price() {
        let reserves = Reserves {
            base: 2_000_000,
            quote: 1_000_000,
        };
        assert_eq!(checked_spot_price(&reserves, "pool").unwrap(), 500_000_000);

        let err = checked_spot_price(&Reserves::default(), "pool").unwrap_err();
        assert_eq!(err.category(), "validation");
        assert!(err.to_string().contains("base reserves are zero"));
    }

    proptest! {
        #[test]
        fn prop_slippage_matches_floor(amount in any::<u64>(), bps in 0u64..=10_000) {
            let expected = (amount as u128 * (10_000 - bps) as u128 / 10_000) as u64;
            prop_assert_eq!(apply_slippage(amount, bps), expected);
            prop_assert!(apply_slippage(amount, bps) <= amount);
        }

        #[test]
        fn prop_slippage_monotonic(amount in any::<u64>(), a in 0u64..=10_000, b in 0u64..=10_000) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(apply_slippage(amount, hi) <= apply_slippage(amount, lo));
        }

        #[test]
        fn prop_full_slippage_is_zero(amount in any::<u64>()) {
            prop_assert_eq!(apply_slippage(amount, 10_000), 0);
        }
    }
}
