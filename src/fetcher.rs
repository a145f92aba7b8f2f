//! Batched state fetcher
//!
//! One `getMultipleAccounts` round trip for any number of addresses.
//! Snapshots are point-in-time and never cached between builds.

use crate::rpc::{ResilientClient, RpcResult};
use itertools::Itertools;
use solana_sdk::{account::Account, pubkey::Pubkey};
use std::collections::HashMap;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

/// Raw account state captured in one batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountSnapshot {
    pub address: Pubkey,
    pub owner: Pubkey,
    pub lamports: u64,
    pub data: Vec<u8>,
}

impl AccountSnapshot {
    fn from_account(address: Pubkey, account: Account) -> Self {
        Self {
            address,
            owner: account.owner,
            lamports: account.lamports,
            data: account.data,
        }
    }

    /// Leading 8-byte Anchor header, if present
    pub fn discriminator(&self) -> Option<[u8; 8]> {
        self.data.get(..8).map(|head| {
            let mut out = [0u8; 8];
            out.copy_from_slice(head);
            out
        })
    }
}

/// Snapshots keyed by address; missing accounts are absent
pub type AccountMap = HashMap<Pubkey, AccountSnapshot>;

/// Fetch every address in a single remote call
///
/// Duplicates are collapsed before the request. An empty input returns an
/// empty map without touching the network.
#[instrument(skip(client, cancel, addresses), fields(count = addresses.len()))]
pub async fn fetch_many(
    client: &ResilientClient,
    cancel: &CancellationToken,
    addresses: &[Pubkey],
) -> RpcResult<AccountMap> {
    let unique: Vec<Pubkey> = addresses.iter().copied().unique().collect();
    if unique.is_empty() {
        return Ok(AccountMap::new());
    }

    let accounts = client.get_multiple_accounts(cancel, &unique).await?;

    let snapshots: AccountMap = unique
        .into_iter()
        .zip(accounts)
        .filter_map(|(address, account)| {
            account.map(|acc| (address, AccountSnapshot::from_account(address, acc)))
        })
        .collect();

    debug!(found = snapshots.len(), "Fetched account batch");
    Ok(snapshots)
}
