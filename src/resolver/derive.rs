//! Pure address derivation

use crate::constants::{
    seeds, MAYHEM_PROGRAM_ID, METADATA_PROGRAM_ID, PUMP_AMM_PROGRAM_ID, PUMP_FEE_PROGRAM_ID,
    PUMP_PROGRAM_ID,
};
use solana_sdk::pubkey::Pubkey;
use spl_associated_token_account::get_associated_token_address_with_program_id;

/// Program-derived address for `seeds` under `program`
pub fn pda(seeds: &[&[u8]], program: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(seeds, program).0
}

/// Associated token account of `owner` for `mint` under the given token program
pub fn associated_token_address(owner: &Pubkey, mint: &Pubkey, token_program: &Pubkey) -> Pubkey {
    get_associated_token_address_with_program_id(owner, mint, token_program)
}

pub fn event_authority(program: &Pubkey) -> Pubkey {
    pda(&[seeds::EVENT_AUTHORITY], program)
}

pub fn global_volume_accumulator(program: &Pubkey) -> Pubkey {
    pda(&[seeds::GLOBAL_VOLUME_ACCUMULATOR], program)
}

pub fn user_volume_accumulator(user: &Pubkey, program: &Pubkey) -> Pubkey {
    pda(&[seeds::USER_VOLUME_ACCUMULATOR, user.as_ref()], program)
}

/// Fee configuration of `program`, owned by the fee program
pub fn fee_config(program: &Pubkey) -> Pubkey {
    pda(&[seeds::FEE_CONFIG, program.as_ref()], &PUMP_FEE_PROGRAM_ID)
}

/// Bonding-curve program addresses
pub mod curve {
    use super::*;

    pub fn global() -> Pubkey {
        pda(&[seeds::GLOBAL], &PUMP_PROGRAM_ID)
    }

    pub fn bonding_curve(mint: &Pubkey) -> Pubkey {
        pda(&[seeds::BONDING_CURVE, mint.as_ref()], &PUMP_PROGRAM_ID)
    }

    pub fn creator_vault(creator: &Pubkey) -> Pubkey {
        pda(&[seeds::CREATOR_VAULT, creator.as_ref()], &PUMP_PROGRAM_ID)
    }

    pub fn mint_authority() -> Pubkey {
        pda(&[seeds::MINT_AUTHORITY], &PUMP_PROGRAM_ID)
    }

    /// Metaplex metadata account of `mint`
    pub fn metadata(mint: &Pubkey) -> Pubkey {
        pda(
            &[seeds::METADATA, METADATA_PROGRAM_ID.as_ref(), mint.as_ref()],
            &METADATA_PROGRAM_ID,
        )
    }
}

/// Mayhem program addresses used by `create_v2`
pub mod mayhem {
    use super::*;

    pub fn global_params() -> Pubkey {
        pda(&[seeds::GLOBAL_PARAMS], &MAYHEM_PROGRAM_ID)
    }

    pub fn sol_vault() -> Pubkey {
        pda(&[seeds::SOL_VAULT], &MAYHEM_PROGRAM_ID)
    }

    pub fn mayhem_state(mint: &Pubkey) -> Pubkey {
        pda(&[seeds::MAYHEM_STATE, mint.as_ref()], &MAYHEM_PROGRAM_ID)
    }
}

/// Pool program addresses
pub mod amm {
    use super::*;

    pub fn global_config() -> Pubkey {
        pda(&[seeds::GLOBAL_CONFIG], &PUMP_AMM_PROGRAM_ID)
    }

    pub fn coin_creator_vault_authority(coin_creator: &Pubkey) -> Pubkey {
        pda(&[seeds::COIN_CREATOR_VAULT, coin_creator.as_ref()], &PUMP_AMM_PROGRAM_ID)
    }
}
