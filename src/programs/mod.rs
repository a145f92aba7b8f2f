//! Instruction encoders for the bonding-curve and pool programs
//!
//! Anchor framing: `sha256("<namespace>:<name>")[..8]` followed by Borsh-style
//! little-endian arguments.

pub mod pump;
pub mod pump_amm;

use sha2::{Digest, Sha256};
use solana_sdk::pubkey::Pubkey;

/// Anchor discriminator for `namespace:name`
pub fn anchor_discriminator(namespace: &str, name: &str) -> [u8; 8] {
    let digest = Sha256::digest(format!("{}:{}", namespace, name).as_bytes());
    let mut out = [0u8; 8];
    out.copy_from_slice(&digest[..8]);
    out
}

/// Discriminator of an instruction handler
pub fn instruction_discriminator(name: &str) -> [u8; 8] {
    anchor_discriminator("global", name)
}

/// Discriminator of an account type
pub fn account_discriminator(name: &str) -> [u8; 8] {
    anchor_discriminator("account", name)
}

/// Argument buffer writer
pub(crate) struct ArgWriter {
    buf: Vec<u8>,
}

impl ArgWriter {
    pub(crate) fn new(discriminator: &[u8; 8]) -> Self {
        let mut buf = Vec::with_capacity(64);
        buf.extend_from_slice(discriminator);
        Self { buf }
    }

    pub(crate) fn u64(mut self, value: u64) -> Self {
        self.buf.extend_from_slice(&value.to_le_bytes());
        self
    }

    /// `OptionBool` is a one-byte newtype on chain
    pub(crate) fn option_bool(mut self, value: bool) -> Self {
        self.buf.push(value as u8);
        self
    }

    pub(crate) fn bool(mut self, value: bool) -> Self {
        self.buf.push(value as u8);
        self
    }

    pub(crate) fn string(mut self, value: &str) -> Self {
        self.buf
            .extend_from_slice(&(value.len() as u32).to_le_bytes());
        self.buf.extend_from_slice(value.as_bytes());
        self
    }

    pub(crate) fn pubkey(mut self, value: &Pubkey) -> Self {
        self.buf.extend_from_slice(value.as_ref());
        self
    }

    pub(crate) fn finish(self) -> Vec<u8> {
        self.buf
    }
}

/// Serialize a `Pubkey` as base58 in JSON previews
pub(crate) mod serde_pubkey {
    use serde::Serializer;
    use solana_sdk::pubkey::Pubkey;

    pub fn serialize<S: Serializer>(key: &Pubkey, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(key)
    }
}
