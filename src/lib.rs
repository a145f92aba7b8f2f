//! Pump Pipeline - trade construction for the pump bonding curve and AMM pools
//!
//! Resolves accounts with batched fetches, quotes by simulation, derives the
//! slippage bound and assembles an ordered instruction list. Signing,
//! submission and confirmation polling are thin layers on top.

pub mod accounts;
pub mod config;
pub mod confirm;
pub mod constants;
pub mod fetcher;
pub mod jito;
pub mod layouts;
pub mod observability;
pub mod programs;
pub mod quote;
pub mod resolver;
pub mod rpc;
pub mod tx_builder;
pub mod vanity;
pub mod wallet;

#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;

// Re-export commonly used types
pub use config::AppConfig;
pub use confirm::{wait_for_confirmation, ConfirmationLevel, TxSubmitter};
pub use rpc::{ResilientClient, RpcConfig, RpcError, SolanaTransport};
pub use tx_builder::{TradeBuild, TradeBuilder, TradeError, TradeIntent, TradeOptions};
pub use solana_sdk::{pubkey::Pubkey, signature::Signature};
