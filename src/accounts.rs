//! Named account roles
//!
//! Each instruction's account list is a plain struct of `Pubkey` fields. The
//! [`account_set!`] macro generates a role table for it so callers can read or
//! override any role by name without reflection.

use crate::tx_builder::errors::{TradeError, TradeResult};
use serde::ser::{Serialize, SerializeMap, Serializer};
use solana_sdk::pubkey::Pubkey;
use std::collections::BTreeMap;

/// Typed account list with a name-addressable role table
pub trait AccountSet {
    /// Type name used in error messages
    const NAME: &'static str;

    /// Every role in instruction order
    fn roles(&self) -> Vec<(&'static str, Pubkey)>;

    /// Set a role by any accepted spelling; false if no such role
    fn set_role(&mut self, role: &str, address: Pubkey) -> bool;

    /// Look up a role by any accepted spelling
    fn role(&self, role: &str) -> Option<Pubkey> {
        let wanted = normalize_role(role);
        self.roles()
            .into_iter()
            .find(|(name, _)| normalize_role(name) == wanted)
            .map(|(_, key)| key)
    }

    /// Apply user overrides; unknown names are rejected
    fn apply_overrides(&mut self, overrides: &BTreeMap<String, Pubkey>) -> TradeResult<()> {
        for (role, address) in overrides {
            if !self.set_role(role, *address) {
                return Err(TradeError::validation(
                    "overrides",
                    format!("unknown account role '{}' for {}", role, Self::NAME),
                ));
            }
        }
        Ok(())
    }

    /// Fail on the first zero-valued role
    fn ensure_resolved(&self) -> TradeResult<()> {
        match self
            .roles()
            .into_iter()
            .find(|(_, key)| *key == Pubkey::default())
        {
            Some((role, _)) => Err(TradeError::UnresolvedRole {
                set: Self::NAME,
                role,
            }),
            None => Ok(()),
        }
    }

    /// Ordered role to address view
    fn to_resolved(&self) -> ResolvedAccountSet {
        ResolvedAccountSet {
            entries: self.roles(),
        }
    }
}

/// `userBaseTokenAccount`, `user_base_token_account` and `UserBaseTokenAccount` are the same role
pub fn normalize_role(role: &str) -> String {
    role.chars()
        .filter(|c| *c != '_' && *c != '-')
        .flat_map(char::to_lowercase)
        .collect()
}

/// Ordered mapping from role name to address
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedAccountSet {
    entries: Vec<(&'static str, Pubkey)>,
}

impl ResolvedAccountSet {
    pub fn get(&self, role: &str) -> Option<Pubkey> {
        let wanted = normalize_role(role);
        self.entries
            .iter()
            .find(|(name, _)| normalize_role(name) == wanted)
            .map(|(_, key)| *key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &Pubkey)> + '_ {
        self.entries.iter().map(|(name, key)| (*name, key))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for ResolvedAccountSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, key) in &self.entries {
            map.serialize_entry(name, &key.to_string())?;
        }
        map.end()
    }
}

/// Declare an account struct and its role table
macro_rules! account_set {
    (
        $(#[$meta:meta])*
        pub struct $name:ident {
            $( $(#[$fmeta:meta])* $field:ident ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
        pub struct $name {
            $( $(#[$fmeta])* pub $field: ::solana_sdk::pubkey::Pubkey, )*
        }

        impl $crate::accounts::AccountSet for $name {
            const NAME: &'static str = stringify!($name);

            fn roles(&self) -> Vec<(&'static str, ::solana_sdk::pubkey::Pubkey)> {
                vec![ $( (stringify!($field), self.$field), )* ]
            }

            fn set_role(&mut self, role: &str, address: ::solana_sdk::pubkey::Pubkey) -> bool {
                let wanted = $crate::accounts::normalize_role(role);
                $(
                    if wanted == $crate::accounts::normalize_role(stringify!($field)) {
                        self.$field = address;
                        return true;
                    }
                )*
                false
            }
        }
    };
}

pub(crate) use account_set;
