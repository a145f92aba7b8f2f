//! Error types for trade construction
//!
//! The taxonomy follows the life of one build:
//! - Validation: rejected before any remote call, never retried
//! - Resolution: missing or undecodable on-chain state, fatal to the build
//! - Simulation: decoded program errors and invariant violations, never retried
//! - Transport: already retried by the resilient client before surfacing here
//! - Confirmation: on-chain failure versus caller cancellation

use crate::jito::RelayError;
use crate::layouts::DecodeError;
use crate::rpc::RpcError;
use crate::vanity::VanityError;
use solana_sdk::transaction::TransactionError;
use thiserror::Error;

/// Comprehensive error type for trade building and submission
#[derive(Error, Debug)]
pub enum TradeError {
    /// Malformed input caught at the intent boundary
    #[error("validation error: {field} - {message}")]
    Validation { field: String, message: String },

    /// The pool or bonding curve account does not exist
    #[error("{venue} account {address} not found")]
    VenueNotFound { venue: &'static str, address: String },

    /// The asset mint does not exist
    #[error("mint account {mint} not found")]
    AssetNotFound { mint: String },

    /// Protocol configuration lacks a required value (e.g. every fee recipient is zero)
    #[error("configuration incomplete: {0}")]
    ConfigurationIncomplete(String),

    /// A fetched record could not be decoded
    ///
    /// Distinct from a missing account: the data exists but is not what the
    /// program layout says it should be.
    #[error("malformed account data for {account}: {source}")]
    MalformedAccountData {
        account: String,
        #[source]
        source: DecodeError,
    },

    /// A required account role is still zero after resolution and overrides
    #[error("account {role} is unresolved in {set}")]
    UnresolvedRole { set: &'static str, role: &'static str },

    /// Custom program error decoded from a dry run
    #[error("program {program} error [{code}]: {message}")]
    ProgramError {
        program: &'static str,
        code: u32,
        message: String,
        logs: Vec<String>,
    },

    /// Dry run failed with a non-custom error
    #[error("simulation failed: {reason}")]
    Simulation { reason: String, logs: Vec<String> },

    /// Post balance below pre balance for the account we expect to grow
    #[error("simulation invariant violated for {account}: post {post} < pre {pre}")]
    SimulationInvariantViolation { account: String, pre: u64, post: u64 },

    /// Signing failed
    #[error("signing failed: {0}")]
    Signing(String),

    /// The transaction landed but failed on chain
    #[error("transaction {signature} failed on chain: {error}")]
    ExecutionFailed {
        signature: String,
        error: TransactionError,
    },

    /// Caller cancelled or the deadline expired while waiting
    #[error("operation cancelled: {0}")]
    Cancelled(String),

    /// Invalid instruction ordering (internal consistency check)
    #[error("invalid instruction order: {0}")]
    InvalidInstructionOrder(String),

    /// Instruction args could not be rendered as JSON
    #[error("failed to serialize {what}: {source}")]
    Serialization {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Rpc(#[from] RpcError),

    #[error(transparent)]
    Relay(#[from] RelayError),

    #[error(transparent)]
    Vanity(#[from] VanityError),
}

impl TradeError {
    /// Check if the build may succeed when repeated from scratch
    ///
    /// Only transport failures qualify; everything else reflects input or
    /// chain state that a repeat would observe again.
    pub fn is_retryable(&self) -> bool {
        match self {
            TradeError::Rpc(err) => !err.is_cancellation(),
            TradeError::Relay(err) => err.is_retryable(),
            _ => false,
        }
    }

    /// Get the error category for logs
    pub fn category(&self) -> &'static str {
        match self {
            TradeError::Validation { .. } => "validation",
            TradeError::VenueNotFound { .. }
            | TradeError::AssetNotFound { .. }
            | TradeError::ConfigurationIncomplete(_)
            | TradeError::MalformedAccountData { .. }
            | TradeError::UnresolvedRole { .. } => "resolution",
            TradeError::ProgramError { .. }
            | TradeError::Simulation { .. }
            | TradeError::SimulationInvariantViolation { .. } => "simulation",
            TradeError::Signing(_) => "signing",
            TradeError::ExecutionFailed { .. } | TradeError::Cancelled(_) => "confirmation",
            TradeError::InvalidInstructionOrder(_) | TradeError::Serialization { .. } => "internal",
            TradeError::Rpc(_) => "transport",
            TradeError::Relay(_) => "relay",
            TradeError::Vanity(_) => "vanity",
        }
    }

    /// Execution logs attached to simulation failures
    pub fn logs(&self) -> &[String] {
        match self {
            TradeError::ProgramError { logs, .. } | TradeError::Simulation { logs, .. } => logs,
            _ => &[],
        }
    }

    /// Create a validation error
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        TradeError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a decode error for a named account
    pub fn malformed(account: impl ToString, source: DecodeError) -> Self {
        TradeError::MalformedAccountData {
            account: account.to_string(),
            source,
        }
    }

    pub fn venue_not_found(venue: &'static str, address: impl ToString) -> Self {
        TradeError::VenueNotFound {
            venue,
            address: address.to_string(),
        }
    }

    pub fn asset_not_found(mint: impl ToString) -> Self {
        TradeError::AssetNotFound {
            mint: mint.to_string(),
        }
    }

    pub fn invalid_order(reason: impl Into<String>) -> Self {
        TradeError::InvalidInstructionOrder(reason.into())
    }
}

/// Result alias for trade operations
pub type TradeResult<T> = Result<T, TradeError>;
