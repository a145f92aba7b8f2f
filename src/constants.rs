//! Program ids, seeds and relay defaults

use solana_sdk::{pubkey, pubkey::Pubkey};

/// Bonding-curve program
pub const PUMP_PROGRAM_ID: Pubkey = pubkey!("6EF8rrecthR5Dkzon8Nwu78hRvfCKubJ14M5uBEwF6P");

/// Constant-product pool program
pub const PUMP_AMM_PROGRAM_ID: Pubkey = pubkey!("pAMMBay6oceH9fJKBRHGP5D4bD4sWpmSwMn52FMfXEA");

/// Fee configuration program shared by both venues
pub const PUMP_FEE_PROGRAM_ID: Pubkey = pubkey!("pfeeUxB6jkeY1Hxd7CsFCAjcbHA9rWtchMGdZ6VojVZ");

pub const TOKEN_PROGRAM_ID: Pubkey = spl_token::ID;

pub const TOKEN_2022_PROGRAM_ID: Pubkey = pubkey!("TokenzQdBNbLqP5VEhdkAS6EPFLC1PHnBqCXEpPxuEb");

pub const ASSOCIATED_TOKEN_PROGRAM_ID: Pubkey = spl_associated_token_account::ID;

/// Program holding the mayhem-mode state touched by `create_v2`
pub const MAYHEM_PROGRAM_ID: Pubkey = pubkey!("MAyhSmzXzV1pTf7LsNkrNwkWKTo4ougAJ1PPg47MD4e");

pub const METADATA_PROGRAM_ID: Pubkey = pubkey!("metaqbxxUerdq28cj1RbAWkYQm3ybzjb6a8bt518x1s");

pub const SYSTEM_PROGRAM_ID: Pubkey = solana_sdk::system_program::ID;

pub const RENT_SYSVAR_ID: Pubkey = solana_sdk::sysvar::rent::ID;

/// Wrapped SOL mint
pub const WSOL_MINT: Pubkey = spl_token::native_mint::ID;

pub mod seeds {
    pub const GLOBAL: &[u8] = b"global";
    pub const BONDING_CURVE: &[u8] = b"bonding-curve";
    pub const CREATOR_VAULT: &[u8] = b"creator-vault";
    pub const MINT_AUTHORITY: &[u8] = b"mint-authority";
    pub const EVENT_AUTHORITY: &[u8] = b"__event_authority";
    pub const GLOBAL_VOLUME_ACCUMULATOR: &[u8] = b"global_volume_accumulator";
    pub const USER_VOLUME_ACCUMULATOR: &[u8] = b"user_volume_accumulator";
    pub const FEE_CONFIG: &[u8] = b"fee_config";
    pub const METADATA: &[u8] = b"metadata";
    pub const GLOBAL_CONFIG: &[u8] = b"global_config";
    /// Pool-side creator vault authority (underscore, unlike the curve seed)
    pub const COIN_CREATOR_VAULT: &[u8] = b"creator_vault";
    pub const GLOBAL_PARAMS: &[u8] = b"global-params";
    pub const SOL_VAULT: &[u8] = b"sol-vault";
    pub const MAYHEM_STATE: &[u8] = b"mayhem-state";
}

/// Basis-point denominator
pub const BPS_DENOMINATOR: u64 = 10_000;

/// Default vanity search window for newly created mints
pub const DEFAULT_VANITY_TIMEOUT_SECS: u64 = 300;

/// Mainnet block-engine tip accounts
pub const JITO_TIP_ACCOUNTS: [Pubkey; 8] = [
    pubkey!("96gYZGLnJYVFmbjzopPSU6QiEV5fGqZNyN9nmNhvrZU5"),
    pubkey!("HFqU5x63VTqvQss8hp11i4wVV8bD44PvwucfZ2bU7gRe"),
    pubkey!("Cw8CFyM9FkoMi7K7Crf6HNQqf4uEMzpKw6QNghXLvLkY"),
    pubkey!("ADaUMid9yfUytqMBgopwjb2DTLSokTSzL1zt6iGPaS49"),
    pubkey!("DfXygSm4jCyNCybVYYK6DwvWqjKee8pbDmJGcLWNDXjh"),
    pubkey!("ADuUkR4vqLUMWXxW9gh6D6L8pMSawimctcNZ5pGwDcEt"),
    pubkey!("DttWaMuVvTiduZRnguLF7jNxTgiMBZ1hyAumKUiL2KRL"),
    pubkey!("3AVi9Tg9Uo68tJfuvoKvqKNWKkC5wPdSSdeBnizKZ6jT"),
];

/// Mainnet block-engine regions
pub const JITO_MAINNET_ENDPOINTS: [&str; 5] = [
    "https://mainnet.block-engine.jito.wtf/api/v1",
    "https://amsterdam.mainnet.block-engine.jito.wtf/api/v1",
    "https://frankfurt.mainnet.block-engine.jito.wtf/api/v1",
    "https://ny.mainnet.block-engine.jito.wtf/api/v1",
    "https://tokyo.mainnet.block-engine.jito.wtf/api/v1",
];

/// True for either SPL token program
pub fn is_token_program(program: &Pubkey) -> bool {
    *program == TOKEN_PROGRAM_ID || *program == TOKEN_2022_PROGRAM_ID
}
