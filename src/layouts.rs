//! On-chain record decoders
//!
//! All records are Anchor accounts: an 8-byte discriminator followed by
//! little-endian fields. Decoders check the discriminator and the length and
//! never guess; anything short or mis-tagged is a [`DecodeError`].

use crate::programs::account_discriminator;
use once_cell::sync::Lazy;
use solana_sdk::pubkey::Pubkey;
use thiserror::Error;

static POOL_DISCRIMINATOR: Lazy<[u8; 8]> = Lazy::new(|| account_discriminator("Pool"));
static GLOBAL_CONFIG_DISCRIMINATOR: Lazy<[u8; 8]> =
    Lazy::new(|| account_discriminator("GlobalConfig"));
static GLOBAL_DISCRIMINATOR: Lazy<[u8; 8]> = Lazy::new(|| account_discriminator("Global"));
static BONDING_CURVE_DISCRIMINATOR: Lazy<[u8; 8]> =
    Lazy::new(|| account_discriminator("BondingCurve"));

/// Offset of the amount field in an SPL token account (both token programs)
pub const TOKEN_ACCOUNT_AMOUNT_OFFSET: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("{record}: data too short ({len} bytes, need {needed})")]
    TooShort {
        record: &'static str,
        len: usize,
        needed: usize,
    },

    #[error("{record}: discriminator mismatch")]
    Discriminator { record: &'static str },

    #[error("{record}: unexpected owner {owner}")]
    UnexpectedOwner { record: &'static str, owner: Pubkey },

    #[error("unknown account discriminator {0:02x?}")]
    UnknownDiscriminator([u8; 8]),
}

/// Sequential little-endian reader
struct Reader<'a> {
    record: &'static str,
    data: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    fn new(record: &'static str, data: &'a [u8], discriminator: &[u8; 8]) -> Result<Self, DecodeError> {
        if data.len() < 8 {
            return Err(DecodeError::TooShort {
                record,
                len: data.len(),
                needed: 8,
            });
        }
        if &data[..8] != discriminator {
            return Err(DecodeError::Discriminator { record });
        }
        Ok(Self {
            record,
            data,
            offset: 8,
        })
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        let end = self.offset + n;
        if self.data.len() < end {
            return Err(DecodeError::TooShort {
                record: self.record,
                len: self.data.len(),
                needed: end,
            });
        }
        let slice = &self.data[self.offset..end];
        self.offset = end;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.take(1)?[0])
    }

    fn bool(&mut self) -> Result<bool, DecodeError> {
        Ok(self.u8()? != 0)
    }

    fn u16(&mut self) -> Result<u16, DecodeError> {
        let mut buf = [0u8; 2];
        buf.copy_from_slice(self.take(2)?);
        Ok(u16::from_le_bytes(buf))
    }

    fn u64(&mut self) -> Result<u64, DecodeError> {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(self.take(8)?);
        Ok(u64::from_le_bytes(buf))
    }

    fn pubkey(&mut self) -> Result<Pubkey, DecodeError> {
        let mut buf = [0u8; 32];
        buf.copy_from_slice(self.take(32)?);
        Ok(Pubkey::new_from_array(buf))
    }

    fn pubkeys<const N: usize>(&mut self) -> Result<[Pubkey; N], DecodeError> {
        let mut out = [Pubkey::default(); N];
        for slot in out.iter_mut() {
            *slot = self.pubkey()?;
        }
        Ok(out)
    }
}

/// Pool state of the constant-product program
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pool {
    pub pool_bump: u8,
    pub index: u16,
    pub creator: Pubkey,
    pub base_mint: Pubkey,
    pub quote_mint: Pubkey,
    pub lp_mint: Pubkey,
    pub pool_base_token_account: Pubkey,
    pub pool_quote_token_account: Pubkey,
    pub lp_supply: u64,
    pub coin_creator: Pubkey,
}

impl Pool {
    pub fn decode(data: &[u8]) -> Result<Self, DecodeError> {
        let mut r = Reader::new("pool", data, &POOL_DISCRIMINATOR)?;
        Ok(Self {
            pool_bump: r.u8()?,
            index: r.u16()?,
            creator: r.pubkey()?,
            base_mint: r.pubkey()?,
            quote_mint: r.pubkey()?,
            lp_mint: r.pubkey()?,
            pool_base_token_account: r.pubkey()?,
            pool_quote_token_account: r.pubkey()?,
            lp_supply: r.u64()?,
            coin_creator: r.pubkey()?,
        })
    }

    #[cfg(any(test, feature = "test_utils"))]
    pub fn encode(&self) -> Vec<u8> {
        let mut out = POOL_DISCRIMINATOR.to_vec();
        out.push(self.pool_bump);
        out.extend_from_slice(&self.index.to_le_bytes());
        for key in [
            &self.creator,
            &self.base_mint,
            &self.quote_mint,
            &self.lp_mint,
            &self.pool_base_token_account,
            &self.pool_quote_token_account,
        ] {
            out.extend_from_slice(key.as_ref());
        }
        out.extend_from_slice(&self.lp_supply.to_le_bytes());
        out.extend_from_slice(self.coin_creator.as_ref());
        out
    }
}

/// Global configuration of the constant-product program
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalConfig {
    pub admin: Pubkey,
    pub lp_fee_basis_points: u64,
    pub protocol_fee_basis_points: u64,
    pub disable_flags: u8,
    pub protocol_fee_recipients: [Pubkey; 8],
    pub coin_creator_fee_basis_points: u64,
}

impl GlobalConfig {
    pub fn decode(data: &[u8]) -> Result<Self, DecodeError> {
        let mut r = Reader::new("global_config", data, &GLOBAL_CONFIG_DISCRIMINATOR)?;
        Ok(Self {
            admin: r.pubkey()?,
            lp_fee_basis_points: r.u64()?,
            protocol_fee_basis_points: r.u64()?,
            disable_flags: r.u8()?,
            protocol_fee_recipients: r.pubkeys::<8>()?,
            coin_creator_fee_basis_points: r.u64()?,
        })
    }

    /// First non-zero protocol fee recipient
    pub fn fee_recipient(&self) -> Option<Pubkey> {
        self.protocol_fee_recipients
            .iter()
            .copied()
            .find(|k| *k != Pubkey::default())
    }

    #[cfg(any(test, feature = "test_utils"))]
    pub fn encode(&self) -> Vec<u8> {
        let mut out = GLOBAL_CONFIG_DISCRIMINATOR.to_vec();
        out.extend_from_slice(self.admin.as_ref());
        out.extend_from_slice(&self.lp_fee_basis_points.to_le_bytes());
        out.extend_from_slice(&self.protocol_fee_basis_points.to_le_bytes());
        out.push(self.disable_flags);
        for key in &self.protocol_fee_recipients {
            out.extend_from_slice(key.as_ref());
        }
        out.extend_from_slice(&self.coin_creator_fee_basis_points.to_le_bytes());
        out
    }
}

/// Global state of the bonding-curve program
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Global {
    pub initialized: bool,
    pub authority: Pubkey,
    pub fee_recipient: Pubkey,
    pub initial_virtual_token_reserves: u64,
    pub initial_virtual_sol_reserves: u64,
    pub initial_real_token_reserves: u64,
    pub token_total_supply: u64,
    pub fee_basis_points: u64,
    pub withdraw_authority: Pubkey,
    pub enable_migrate: bool,
    pub pool_migration_fee: u64,
    pub creator_fee_basis_points: u64,
    pub fee_recipients: [Pubkey; 7],
}

impl Global {
    pub fn decode(data: &[u8]) -> Result<Self, DecodeError> {
        let mut r = Reader::new("global", data, &GLOBAL_DISCRIMINATOR)?;
        Ok(Self {
            initialized: r.bool()?,
            authority: r.pubkey()?,
            fee_recipient: r.pubkey()?,
            initial_virtual_token_reserves: r.u64()?,
            initial_virtual_sol_reserves: r.u64()?,
            initial_real_token_reserves: r.u64()?,
            token_total_supply: r.u64()?,
            fee_basis_points: r.u64()?,
            withdraw_authority: r.pubkey()?,
            enable_migrate: r.bool()?,
            pool_migration_fee: r.u64()?,
            creator_fee_basis_points: r.u64()?,
            fee_recipients: r.pubkeys::<7>()?,
        })
    }

    /// First non-zero entry of `fee_recipients`, then the legacy `fee_recipient`
    pub fn effective_fee_recipient(&self) -> Option<Pubkey> {
        self.fee_recipients
            .iter()
            .chain(std::iter::once(&self.fee_recipient))
            .copied()
            .find(|k| *k != Pubkey::default())
    }

    #[cfg(any(test, feature = "test_utils"))]
    pub fn encode(&self) -> Vec<u8> {
        let mut out = GLOBAL_DISCRIMINATOR.to_vec();
        out.push(self.initialized as u8);
        out.extend_from_slice(self.authority.as_ref());
        out.extend_from_slice(self.fee_recipient.as_ref());
        for v in [
            self.initial_virtual_token_reserves,
            self.initial_virtual_sol_reserves,
            self.initial_real_token_reserves,
            self.token_total_supply,
            self.fee_basis_points,
        ] {
            out.extend_from_slice(&v.to_le_bytes());
        }
        out.extend_from_slice(self.withdraw_authority.as_ref());
        out.push(self.enable_migrate as u8);
        out.extend_from_slice(&self.pool_migration_fee.to_le_bytes());
        out.extend_from_slice(&self.creator_fee_basis_points.to_le_bytes());
        for key in &self.fee_recipients {
            out.extend_from_slice(key.as_ref());
        }
        out
    }
}

/// Per-mint bonding curve state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BondingCurve {
    pub virtual_token_reserves: u64,
    pub virtual_sol_reserves: u64,
    pub real_token_reserves: u64,
    pub real_sol_reserves: u64,
    pub token_total_supply: u64,
    pub complete: bool,
    pub creator: Pubkey,
}

impl BondingCurve {
    pub fn decode(data: &[u8]) -> Result<Self, DecodeError> {
        let mut r = Reader::new("bonding_curve", data, &BONDING_CURVE_DISCRIMINATOR)?;
        Ok(Self {
            virtual_token_reserves: r.u64()?,
            virtual_sol_reserves: r.u64()?,
            real_token_reserves: r.u64()?,
            real_sol_reserves: r.u64()?,
            token_total_supply: r.u64()?,
            complete: r.bool()?,
            creator: r.pubkey()?,
        })
    }

    #[cfg(any(test, feature = "test_utils"))]
    pub fn encode(&self) -> Vec<u8> {
        let mut out = BONDING_CURVE_DISCRIMINATOR.to_vec();
        for v in [
            self.virtual_token_reserves,
            self.virtual_sol_reserves,
            self.real_token_reserves,
            self.real_sol_reserves,
            self.token_total_supply,
        ] {
            out.extend_from_slice(&v.to_le_bytes());
        }
        out.push(self.complete as u8);
        out.extend_from_slice(self.creator.as_ref());
        out
    }
}

/// Any record of the two programs, picked by its discriminator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KnownAccount {
    Pool(Pool),
    GlobalConfig(GlobalConfig),
    Global(Global),
    BondingCurve(BondingCurve),
}

impl KnownAccount {
    pub fn decode(data: &[u8]) -> Result<Self, DecodeError> {
        if data.len() < 8 {
            return Err(DecodeError::TooShort {
                record: "account",
                len: data.len(),
                needed: 8,
            });
        }
        let tag = &data[..8];
        if tag == POOL_DISCRIMINATOR.as_slice() {
            Pool::decode(data).map(Self::Pool)
        } else if tag == GLOBAL_CONFIG_DISCRIMINATOR.as_slice() {
            GlobalConfig::decode(data).map(Self::GlobalConfig)
        } else if tag == GLOBAL_DISCRIMINATOR.as_slice() {
            Global::decode(data).map(Self::Global)
        } else if tag == BONDING_CURVE_DISCRIMINATOR.as_slice() {
            BondingCurve::decode(data).map(Self::BondingCurve)
        } else {
            let mut unknown = [0u8; 8];
            unknown.copy_from_slice(tag);
            Err(DecodeError::UnknownDiscriminator(unknown))
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Pool(_) => "Pool",
            Self::GlobalConfig(_) => "GlobalConfig",
            Self::Global(_) => "Global",
            Self::BondingCurve(_) => "BondingCurve",
        }
    }
}

/// Amount field of an SPL token account
pub fn token_account_amount(data: &[u8]) -> Result<u64, DecodeError> {
    let end = TOKEN_ACCOUNT_AMOUNT_OFFSET + 8;
    if data.len() < end {
        return Err(DecodeError::TooShort {
            record: "token_account",
            len: data.len(),
            needed: end,
        });
    }
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&data[TOKEN_ACCOUNT_AMOUNT_OFFSET..end]);
    Ok(u64::from_le_bytes(buf))
}
