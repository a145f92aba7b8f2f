//! Associated token account existence and balances in one batch

use crate::fetcher::fetch_many;
use crate::layouts::token_account_amount;
use crate::resolver::derive::associated_token_address;
use crate::rpc::ResilientClient;
use crate::tx_builder::errors::{TradeError, TradeResult};
use crate::tx_builder::instructions::create_ata;
use itertools::Itertools;
use solana_sdk::{instruction::Instruction, pubkey::Pubkey};
use std::collections::HashMap;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

/// One token account the trade needs to exist
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AtaRequest {
    pub wallet: Pubkey,
    pub mint: Pubkey,
    pub token_program: Pubkey,
}

impl AtaRequest {
    pub fn new(wallet: Pubkey, mint: Pubkey, token_program: Pubkey) -> Self {
        Self {
            wallet,
            mint,
            token_program,
        }
    }

    pub fn address(&self) -> Pubkey {
        associated_token_address(&self.wallet, &self.mint, &self.token_program)
    }
}

/// Creation instructions for missing accounts plus every balance
#[derive(Debug, Clone, Default)]
pub struct AtaBatch {
    pub create_instructions: Vec<Instruction>,
    /// Amount per account address; 0 for accounts that do not exist yet
    pub balances: HashMap<Pubkey, u64>,
    pub missing: Vec<Pubkey>,
}

impl AtaBatch {
    pub fn balance(&self, address: &Pubkey) -> u64 {
        self.balances.get(address).copied().unwrap_or(0)
    }

    pub fn exists(&self, address: &Pubkey) -> bool {
        !self.missing.contains(address)
    }
}

/// Check every requested account in a single fetch
///
/// An account exists only if present and owned by the requested token
/// program. Addresses in `known` never get a create instruction even when
/// the fetch has not seen them yet (freshly created in a previous trade).
#[instrument(skip_all, fields(requests = requests.len()))]
pub async fn ensure_atas(
    client: &ResilientClient,
    cancel: &CancellationToken,
    payer: &Pubkey,
    requests: &[AtaRequest],
    known: &[Pubkey],
) -> TradeResult<AtaBatch> {
    let requests: Vec<(Pubkey, AtaRequest)> = requests
        .iter()
        .map(|r| (r.address(), *r))
        .unique_by(|(address, _)| *address)
        .collect();
    let addresses: Vec<Pubkey> = requests.iter().map(|(a, _)| *a).collect();
    let snapshots = fetch_many(client, cancel, &addresses).await?;

    let mut batch = AtaBatch::default();
    for (address, request) in requests {
        match snapshots.get(&address) {
            Some(snapshot) if snapshot.owner == request.token_program => {
                let amount = token_account_amount(&snapshot.data)
                    .map_err(|e| TradeError::malformed(address, e))?;
                batch.balances.insert(address, amount);
            }
            _ => {
                batch.balances.insert(address, 0);
                if known.contains(&address) {
                    continue;
                }
                batch.missing.push(address);
                batch.create_instructions.push(create_ata(
                    payer,
                    &request.wallet,
                    &request.mint,
                    &request.token_program,
                ));
            }
        }
    }

    debug!(
        missing = batch.missing.len(),
        "Checked associated token accounts"
    );
    Ok(batch)
}
