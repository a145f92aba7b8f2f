//! Simulation-based quoting
//!
//! The candidate instructions are dry-run against current chain state with a
//! permissive bound, and the node returns the post-execution state of one
//! watched account. The quote is the growth of that account relative to the
//! balance captured in the resolution batch, so no second fetch is needed.
//!
//! Simulation is never retried: a second run could observe different state.

use super::errors::{TradeError, TradeResult};
use super::sim_errors::{decode_simulation_error, Venue};
use crate::layouts::token_account_amount;
use crate::rpc::ResilientClient;
use solana_sdk::{
    instruction::Instruction, message::Message, pubkey::Pubkey, transaction::Transaction,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

/// Which balance of the watched account carries the output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Watch {
    /// Token amount of an SPL token account
    TokenAmount,
    /// Native lamports of a system account
    Lamports,
}

/// Account whose growth is the quote, with its balance from the resolution batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Watched {
    pub account: Pubkey,
    pub watch: Watch,
    pub pre: u64,
}

impl Watched {
    pub fn token(account: Pubkey, pre: u64) -> Self {
        Self {
            account,
            watch: Watch::TokenAmount,
            pre,
        }
    }

    pub fn lamports(account: Pubkey, pre: u64) -> Self {
        Self {
            account,
            watch: Watch::Lamports,
            pre,
        }
    }
}

/// Observed output of a dry run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulatedDelta {
    pub account: Pubkey,
    pub pre: u64,
    pub post: u64,
    pub delta: u64,
    pub units_consumed: Option<u64>,
}

/// Growth from `pre` to `post`; shrinkage is an invariant violation
pub fn observed_delta(account: &Pubkey, pre: u64, post: u64) -> TradeResult<u64> {
    post.checked_sub(pre)
        .ok_or_else(|| TradeError::SimulationInvariantViolation {
            account: account.to_string(),
            pre,
            post,
        })
}

/// Dry-run `instructions` paid by `payer` and measure the watched account
#[instrument(
    skip(client, cancel, instructions, watched),
    fields(venue = venue.program_name(), target = %watched.account, pre = watched.pre)
)]
pub async fn simulate_delta(
    client: &ResilientClient,
    cancel: &CancellationToken,
    venue: Venue,
    payer: &Pubkey,
    instructions: &[Instruction],
    watched: Watched,
) -> TradeResult<SimulatedDelta> {
    let (post, units_consumed) = run(client, cancel, venue, payer, instructions, &watched).await?;
    let delta = observed_delta(&watched.account, watched.pre, post)?;
    debug!(post, delta, units = units_consumed, "Simulation quote observed");

    Ok(SimulatedDelta {
        account: watched.account,
        pre: watched.pre,
        post,
        delta,
        units_consumed,
    })
}

/// Dry-run and measure how much of the watched balance was spent
///
/// `watched.pre` is the balance the account holds once any top-up in
/// `instructions` has landed. Growth counts as nothing spent.
#[instrument(
    skip(client, cancel, instructions, watched),
    fields(venue = venue.program_name(), source = %watched.account, pre = watched.pre)
)]
pub async fn simulate_consumed(
    client: &ResilientClient,
    cancel: &CancellationToken,
    venue: Venue,
    payer: &Pubkey,
    instructions: &[Instruction],
    watched: Watched,
) -> TradeResult<SimulatedDelta> {
    let (post, units_consumed) = run(client, cancel, venue, payer, instructions, &watched).await?;
    let delta = watched.pre.saturating_sub(post);
    debug!(post, consumed = delta, units = units_consumed, "Simulated spend observed");

    Ok(SimulatedDelta {
        account: watched.account,
        pre: watched.pre,
        post,
        delta,
        units_consumed,
    })
}

/// Single dry run; returns the watched balance after execution
async fn run(
    client: &ResilientClient,
    cancel: &CancellationToken,
    venue: Venue,
    payer: &Pubkey,
    instructions: &[Instruction],
    watched: &Watched,
) -> TradeResult<(u64, Option<u64>)> {
    let target = &watched.account;
    let transaction = Transaction::new_unsigned(Message::new(instructions, Some(payer)));

    let outcome = client
        .simulate_transaction(cancel, &transaction, std::slice::from_ref(target))
        .await?;

    if let Some(err) = &outcome.err {
        let decoded = decode_simulation_error(venue, err, &outcome.logs);
        debug!(error = %decoded, "Simulation failed");
        return Err(decoded);
    }

    let post = match outcome.accounts.first().and_then(Option::as_ref) {
        Some(account) => match watched.watch {
            Watch::TokenAmount => token_account_amount(&account.data)
                .map_err(|e| TradeError::malformed(target, e))?,
            Watch::Lamports => account.lamports,
        },
        None => 0,
    };
    Ok((post, outcome.units_consumed))
}
