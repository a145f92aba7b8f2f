//! Correlation of the remote calls made for one trade

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info_span, Span};
use uuid::Uuid;

/// Shared by every span of one trade, from resolution to confirmation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct CorrelationId(Uuid);

impl CorrelationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One stage of a trade (a build, a send, a confirmation) and the stage it runs under
#[derive(Debug, Clone, Serialize)]
pub struct TraceContext {
    pub correlation_id: CorrelationId,
    /// Entry point or pipeline stage, e.g. `amm_buy_with_quote` or `confirm`
    pub stage: &'static str,
    pub parent: Option<&'static str>,
    pub started_at: DateTime<Utc>,
}

impl TraceContext {
    pub fn new(stage: &'static str) -> Self {
        Self {
            correlation_id: CorrelationId::new(),
            stage,
            parent: None,
            started_at: Utc::now(),
        }
    }

    /// Nested stage under the same correlation id
    pub fn child(&self, stage: &'static str) -> Self {
        Self {
            correlation_id: self.correlation_id,
            stage,
            parent: Some(self.stage),
            started_at: Utc::now(),
        }
    }

    /// Span carrying the correlation id; instrument the stage's future with it
    pub fn span(&self) -> Span {
        info_span!(
            "trade",
            correlation_id = %self.correlation_id,
            stage = self.stage,
            parent = self.parent.unwrap_or("-"),
        )
    }

    pub fn elapsed_ms(&self) -> i64 {
        (Utc::now() - self.started_at).num_milliseconds()
    }
}
