//! Account resolution
//!
//! Fills every role an instruction needs. Order of work:
//! 1. fixed program addresses and PDAs that need no chain data
//! 2. one batched fetch of the venue record, the global config and the mint(s)
//! 3. decode the venue and config records (creator, mints, fee recipient)
//! 4. derive token accounts with the token program learned from the mint owner
//! 5. derive whatever depends on 3 and 4 (creator vaults and their token accounts)

pub mod amm;
pub mod curve;
pub mod derive;

pub use amm::{resolve_amm, AmmResolution, AmmState};
pub use curve::{
    curve_create_accounts, curve_create_v2_accounts, resolve_curve, CurveResolution, CurveState,
};

use crate::constants::is_token_program;
use crate::fetcher::{AccountMap, AccountSnapshot};
use crate::layouts::DecodeError;
use crate::tx_builder::errors::{TradeError, TradeResult};
use solana_sdk::pubkey::Pubkey;

/// Token program governing `mint`, read from the mint account owner
pub(crate) fn token_program_of(mints: &AccountMap, mint: &Pubkey) -> TradeResult<Pubkey> {
    let snapshot = mints
        .get(mint)
        .ok_or_else(|| TradeError::asset_not_found(mint))?;
    if !is_token_program(&snapshot.owner) {
        return Err(TradeError::malformed(
            mint,
            DecodeError::UnexpectedOwner {
                record: "mint",
                owner: snapshot.owner,
            },
        ));
    }
    Ok(snapshot.owner)
}

/// Decode a fetched record, mapping failures to `MalformedAccountData`
pub(crate) fn decode<T>(
    snapshot: &AccountSnapshot,
    decoder: impl FnOnce(&[u8]) -> Result<T, DecodeError>,
) -> TradeResult<T> {
    decoder(&snapshot.data).map_err(|e| TradeError::malformed(snapshot.address, e))
}
