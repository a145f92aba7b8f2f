use solana_client::client_error::{ClientError, ClientErrorKind};
use solana_rpc_client_api::request::RpcError as ClientRpcError;
use thiserror::Error;

/// Result alias for every remote call made through the pipeline
pub type RpcResult<T> = Result<T, RpcError>;

/// Errors surfaced by the wire transport and the resilient client wrapped around it
#[derive(Debug, Clone, Error)]
pub enum RpcError {
    /// Transport-level errors (network, connection, HTTP)
    #[error("Transport error: {message} (endpoint: {endpoint})")]
    Transport { endpoint: String, message: String },

    /// Error object returned by the remote node
    #[error("RPC response error: {message} (endpoint: {endpoint}, code: {code:?})")]
    RpcResponse {
        endpoint: String,
        message: String,
        code: Option<i64>,
    },

    /// The remote side throttled us
    #[error("Rate limit exceeded (endpoint: {endpoint})")]
    RateLimitExceeded { endpoint: String },

    /// The per-call deadline elapsed
    #[error("Deadline of {timeout_ms}ms exceeded")]
    DeadlineExceeded { timeout_ms: u64 },

    /// The caller cancelled the operation
    #[error("Operation cancelled")]
    Cancelled,

    /// The node answered but the payload could not be interpreted
    #[error("Malformed RPC response: {0}")]
    MalformedResponse(String),

    /// Every retry attempt failed
    #[error("{operation} failed after {attempts} attempts: {source}")]
    Exhausted {
        operation: String,
        attempts: u32,
        #[source]
        source: Box<RpcError>,
    },

    /// Invalid client setup
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl RpcError {
    /// Retry classification used by the resilient client.
    ///
    /// Only cancellation-type errors are final. Everything else is retried,
    /// including errors that stem from permanent chain state; call sites
    /// apply their own fatal/non-fatal classification above this layer.
    pub fn is_retryable(&self) -> bool {
        match self {
            RpcError::Cancelled | RpcError::DeadlineExceeded { .. } => false,
            RpcError::Exhausted { .. } => false,
            RpcError::Configuration(_) => false,
            RpcError::Transport { .. }
            | RpcError::RpcResponse { .. }
            | RpcError::RateLimitExceeded { .. }
            | RpcError::MalformedResponse(_) => true,
        }
    }

    /// True for caller cancellation or deadline expiry, looking through retry wrappers
    pub fn is_cancellation(&self) -> bool {
        match self {
            RpcError::Cancelled | RpcError::DeadlineExceeded { .. } => true,
            RpcError::Exhausted { source, .. } => source.is_cancellation(),
            _ => false,
        }
    }

    /// True when the remote side asked us to slow down
    pub fn is_rate_limited(&self) -> bool {
        match self {
            RpcError::RateLimitExceeded { .. } => true,
            RpcError::Exhausted { source, .. } => source.is_rate_limited(),
            RpcError::Transport { message, .. } | RpcError::RpcResponse { message, .. } => {
                is_rate_limit_message(message)
            }
            _ => false,
        }
    }

    /// Get the error category for logs
    pub fn category(&self) -> &'static str {
        match self {
            RpcError::Transport { .. } => "transport",
            RpcError::RpcResponse { .. } => "rpc",
            RpcError::RateLimitExceeded { .. } => "rate_limit",
            RpcError::DeadlineExceeded { .. } => "deadline",
            RpcError::Cancelled => "cancelled",
            RpcError::MalformedResponse(_) => "decode",
            RpcError::Exhausted { .. } => "exhausted",
            RpcError::Configuration(_) => "config",
        }
    }

    /// Get the endpoint associated with this error, if any
    pub fn endpoint(&self) -> Option<&str> {
        match self {
            RpcError::Transport { endpoint, .. }
            | RpcError::RpcResponse { endpoint, .. }
            | RpcError::RateLimitExceeded { endpoint } => Some(endpoint),
            RpcError::Exhausted { source, .. } => source.endpoint(),
            _ => None,
        }
    }

    /// Create a transport error
    pub fn transport(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        RpcError::Transport {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }

    /// Create a malformed-response error
    pub fn malformed(reason: impl Into<String>) -> Self {
        RpcError::MalformedResponse(reason.into())
    }

    /// Classify a solana client error
    pub fn from_client_error(err: ClientError, endpoint: &str) -> Self {
        if let ClientErrorKind::RpcError(ClientRpcError::RpcResponseError { code, message, .. }) =
            err.kind()
        {
            return RpcError::RpcResponse {
                endpoint: endpoint.to_string(),
                message: message.clone(),
                code: Some(*code),
            };
        }

        let message = err.to_string();
        if is_rate_limit_message(&message) {
            RpcError::RateLimitExceeded {
                endpoint: endpoint.to_string(),
            }
        } else if matches!(err.kind(), ClientErrorKind::SerdeJson(_)) {
            RpcError::MalformedResponse(message)
        } else {
            RpcError::Transport {
                endpoint: endpoint.to_string(),
                message,
            }
        }
    }
}

/// Substring classification shared with the relay client
pub(crate) fn is_rate_limit_message(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("rate limit")
        || lower.contains("too many requests")
        || lower.contains("congested")
        || lower.contains("429")
}
