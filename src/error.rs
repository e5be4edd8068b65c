use thiserror::Error;

/// Error taxonomy for the engine. Every fallible operation that crosses a
/// component boundary returns one of these kinds rather than an ad-hoc
/// string, so callers (the HTTP API, the background workers, the outbound
/// chat formatter) can dispatch on *kind* instead of parsing messages.
#[derive(Debug, Error)]
pub enum EngineError {
    /// RPC timeout, HTTP 5xx, GraphQL network error. Retried with jittered
    /// backoff before reaching this variant; seeing one means retries were
    /// exhausted.
    #[error("upstream temporarily unavailable: {0}")]
    TransientUpstream(String),

    /// RPC returned malformed data, GraphQL schema mismatch. Never retried.
    #[error("upstream returned an unexpected response: {0}")]
    PermanentUpstream(String),

    /// Malformed user input: unknown query type, a tx hash that doesn't
    /// match sender/recipient/amount, an unparsable wallet address.
    #[error("{0}")]
    Validation(String),

    /// The operation has already happened (job already advanced, duplicate
    /// deposit). Callers should usually treat this as a no-op success.
    #[error("already processed: {0}")]
    Conflict(String),

    /// Ledger debit requested more than the available balance.
    #[error("insufficient balance: have {have}, need {need}")]
    Insufficient {
        have: rust_decimal::Decimal,
        need: rust_decimal::Decimal,
    },

    /// A premium operation needs fresher data than is currently cached
    /// (e.g. pool cache older than 24h). Never surfaced directly to a
    /// user — the cache-ready queue absorbs it.
    #[error("data is stale: {0}")]
    Stale(String),

    /// Invariant violation / unreachable branch. Logged with full context;
    /// the user sees only a generic failure message.
    #[error("internal error: {0}")]
    Internal(String),
}

impl EngineError {
    /// A short machine-readable tag for this error kind, used in API
    /// responses and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::TransientUpstream(_) => "transient_upstream",
            EngineError::PermanentUpstream(_) => "permanent_upstream",
            EngineError::Validation(_) => "validation",
            EngineError::Conflict(_) => "conflict",
            EngineError::Insufficient { .. } => "insufficient",
            EngineError::Stale(_) => "stale",
            EngineError::Internal(_) => "internal",
        }
    }

    /// A message safe to show directly to an end user (no internal
    /// context, no stack-trace-shaped text).
    pub fn user_message(&self) -> String {
        match self {
            EngineError::TransientUpstream(_) => {
                "The chain data source is temporarily unavailable. Please try again shortly."
                    .to_string()
            }
            EngineError::Internal(_) => {
                "Something went wrong on our end. The team has been notified.".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl From<rusqlite::Error> for EngineError {
    fn from(err: rusqlite::Error) -> Self {
        EngineError::Internal(format!("storage error: {err}"))
    }
}

impl From<anyhow::Error> for EngineError {
    fn from(err: anyhow::Error) -> Self {
        EngineError::Internal(format!("{err:#}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_tags_are_stable() {
        assert_eq!(EngineError::Validation("x".into()).kind(), "validation");
        assert_eq!(
            EngineError::Insufficient {
                have: rust_decimal::Decimal::ZERO,
                need: rust_decimal::Decimal::ONE
            }
            .kind(),
            "insufficient"
        );
    }

    #[test]
    fn internal_errors_hide_detail_from_users() {
        let err = EngineError::Internal("leaked table name: payment_jobs".into());
        assert!(!err.user_message().contains("payment_jobs"));
    }
}
