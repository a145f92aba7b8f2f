//! Trade construction
//!
//! Every entry point of [`TradeBuilder`] runs the same pipeline:
//!
//! 1. validate the intent (no remote call on bad input)
//! 2. resolve accounts with batched fetches, then apply overrides
//! 3. check the trader's token accounts and balances in one more batch
//! 4. dry-run the swap with a permissive bound and read the delta
//! 5. derive the binding bound with the slippage tolerance
//! 6. assemble creates, wrap, swap, unwrap and tip in that order
//!
//! Flows that need no quote (exact-out buys with a caller bound) skip 4 and 5.
//! The result is an unsigned instruction list; signing and submission live in
//! [`crate::confirm`].

pub mod amm;
pub mod ata;
pub mod curve;
pub mod errors;
pub mod instructions;
pub mod intent;
pub mod options;
pub mod sim_errors;
pub mod simulate;

pub use ata::{ensure_atas, AtaBatch, AtaRequest};
pub use errors::{TradeError, TradeResult};
pub use instructions::{sanity_check_ix_order, InstructionPlan, Stage};
pub use intent::{Direction, Market, TradeAmount, TradeIntent, IntentBuild};
pub use options::TradeOptions;
pub use sim_errors::Venue;
pub use simulate::{simulate_consumed, simulate_delta, Watched, SimulatedDelta};

use crate::accounts::{AccountSet, ResolvedAccountSet};
use crate::rpc::ResilientClient;
use serde::Serialize;
use serde_json::{json, Value};
use solana_sdk::instruction::Instruction;
use solana_sdk::pubkey::Pubkey;
use tracing::info;

/// Simulated output and the bound derived from it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Quote {
    pub simulated_output: u64,
    /// Minimum out for exact-in trades, maximum in for exact-out trades
    pub bound: u64,
    pub units_consumed: Option<u64>,
}

/// Everything one entry point produced
#[derive(Debug, Clone)]
pub struct TradeBuild<A, G> {
    pub accounts: A,
    pub args: G,
    pub instructions: Vec<Instruction>,
    pub quote: Option<Quote>,
}

impl<A: AccountSet, G: Serialize> TradeBuild<A, G> {
    /// Accounts, args, quote and instruction payloads as JSON
    pub fn preview(&self) -> Value {
        let instructions: Vec<Value> = self
            .instructions
            .iter()
            .map(|ix| {
                json!({
                    "program_id": ix.program_id.to_string(),
                    "accounts": ix.accounts.len(),
                    "data": hex::encode(&ix.data),
                })
            })
            .collect();
        json!({
            "accounts": self.accounts.to_resolved(),
            "args": self.args,
            "quote": self.quote,
            "instructions": instructions,
        })
    }

    pub fn resolved_accounts(&self) -> ResolvedAccountSet {
        self.accounts.to_resolved()
    }
}

/// Entry points for every venue and direction
///
/// Holds only the shared client; builds running concurrently on clones of one
/// builder share its rate limiter and nothing else.
#[derive(Debug, Clone)]
pub struct TradeBuilder {
    client: ResilientClient,
}

impl TradeBuilder {
    pub fn new(client: ResilientClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &ResilientClient {
        &self.client
    }
}

/// Apply overrides, then refuse any role still zero
pub(crate) fn finalize_accounts<A: AccountSet>(accounts: &mut A, opts: &TradeOptions) -> TradeResult<()> {
    accounts.apply_overrides(&opts.overrides)?;
    accounts.ensure_resolved()
}

/// Append the relay tip when one was requested
pub(crate) fn push_tip(plan: &mut InstructionPlan, payer: &Pubkey, opts: &TradeOptions) -> TradeResult<()> {
    if opts.jito_tip_lamports > 0 {
        let account = opts.tip_account();
        plan.push(
            Stage::Tip,
            instructions::tip(payer, &account, opts.jito_tip_lamports),
        )?;
    }
    Ok(())
}

/// Dry-run list: prefix groups, then the draft swap
pub(crate) fn concat(parts: &[&[Instruction]], last: Instruction) -> Vec<Instruction> {
    let mut out: Vec<Instruction> = parts.iter().flat_map(|p| p.iter().cloned()).collect();
    out.push(last);
    out
}

/// Log the preview when asked for
pub(crate) fn emit_preview<A: AccountSet, G: Serialize>(
    operation: &str,
    build: &TradeBuild<A, G>,
    opts: &TradeOptions,
) {
    if opts.preview {
        info!(operation, preview = %build.preview(), "Trade preview");
    }
}
