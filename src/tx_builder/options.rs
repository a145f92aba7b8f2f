//! Per-trade options and intent-boundary validation

use super::errors::{TradeError, TradeResult};
use crate::constants::{BPS_DENOMINATOR, DEFAULT_VANITY_TIMEOUT_SECS};
use crate::jito;
use solana_sdk::pubkey::Pubkey;
use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;
use std::time::Duration;

/// Knobs shared by every trade entry point
///
/// Flags that only make sense for one flow are ignored by the others.
#[derive(Debug, Clone)]
pub struct TradeOptions {
    /// Role name to address, applied after resolution
    pub overrides: BTreeMap<String, Pubkey>,
    /// Emit a JSON preview of accounts and args
    pub preview: bool,
    pub track_volume: bool,
    pub vanity_prefix: Option<String>,
    pub vanity_suffix: Option<String>,
    pub vanity_timeout: Duration,
    /// Token accounts the caller knows exist, e.g. created by an earlier trade
    pub known_atas: Vec<Pubkey>,
    /// Pool sells: use this output instead of simulating
    pub expected_quote_out: Option<u64>,
    /// Pool buys with an exact quote spend: use this output instead of simulating
    pub expected_base_out: Option<u64>,
    /// Curve sells: use this output instead of simulating
    pub expected_sol_out: Option<u64>,
    pub close_base_ata: bool,
    /// Pool sells: also close the quote token account when it is not WSOL
    pub close_quote_ata: bool,
    /// Tip appended last; 0 disables
    pub jito_tip_lamports: u64,
    pub jito_tip_account: Option<Pubkey>,
}

impl Default for TradeOptions {
    fn default() -> Self {
        Self {
            overrides: BTreeMap::new(),
            preview: false,
            track_volume: true,
            vanity_prefix: None,
            vanity_suffix: None,
            vanity_timeout: Duration::from_secs(DEFAULT_VANITY_TIMEOUT_SECS),
            known_atas: Vec::new(),
            expected_quote_out: None,
            expected_base_out: None,
            expected_sol_out: None,
            close_base_ata: false,
            close_quote_ata: false,
            jito_tip_lamports: 0,
            jito_tip_account: None,
        }
    }
}

impl TradeOptions {
    /// Merge `{"role": "base58"}` into the overrides; later keys win
    pub fn merge_overrides_from_json(&mut self, json: &str) -> TradeResult<()> {
        let raw: HashMap<String, String> = serde_json::from_str(json)
            .map_err(|e| TradeError::validation("overrides", format!("invalid JSON: {}", e)))?;
        for (role, value) in raw {
            let address = Pubkey::from_str(value.trim()).map_err(|e| {
                TradeError::validation("overrides", format!("role '{}': {}", role, e))
            })?;
            self.overrides.insert(role, address);
        }
        Ok(())
    }

    /// Tip recipient, picking a mainnet relay account when none was set
    pub fn tip_account(&self) -> Pubkey {
        self.jito_tip_account
            .unwrap_or_else(jito::random_tip_account)
    }

    pub fn wants_vanity(&self) -> bool {
        self.vanity_prefix.as_deref().is_some_and(|p| !p.is_empty())
            || self.vanity_suffix.as_deref().is_some_and(|s| !s.is_empty())
    }
}

pub fn validate_amount(field: &str, amount: u64) -> TradeResult<()> {
    if amount == 0 {
        return Err(TradeError::validation(
            field,
            format!("{} must be greater than 0", field),
        ));
    }
    Ok(())
}

pub fn validate_slippage(slippage_bps: u64) -> TradeResult<()> {
    if slippage_bps > BPS_DENOMINATOR {
        return Err(TradeError::validation(
            "slippage_bps",
            format!("slippage_bps {} must be <= 10000 (100%)", slippage_bps),
        ));
    }
    Ok(())
}

pub fn validate_pubkey(field: &str, key: &Pubkey) -> TradeResult<()> {
    if *key == Pubkey::default() {
        return Err(TradeError::validation(field, format!("{} cannot be zero", field)));
    }
    Ok(())
}

pub fn validate_text(field: &str, value: &str) -> TradeResult<()> {
    if value.trim().is_empty() {
        return Err(TradeError::validation(field, format!("{} cannot be empty", field)));
    }
    Ok(())
}
