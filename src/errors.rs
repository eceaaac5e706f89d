//! Typed error hierarchy for the tether engine.
//!
//! Three enums cover the three layers:
//! - `GatewayError` — remote platform call failures, classified for retry
//! - `CorrelatorError` — dispatch correlation failures
//! - `ValidationError` — data-model parse and roadmap validation failures

use thiserror::Error;

use crate::token::CorrelationToken;

/// Errors from the remote execution gateway.
///
/// The classification drives the retry policy: `is_transient` errors are
/// retried under bounded backoff, everything else propagates immediately.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Transient network error: {0}")]
    TransientNetwork(String),

    #[error("Resource not yet indexed by the remote platform: {0}")]
    EventualConsistency(String),

    #[error("Remote platform rejected the request: {0}")]
    PermanentValidation(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Operation cancelled")]
    Cancelled,
}

impl GatewayError {
    /// Whether the retry policy may re-attempt the failed call.
    ///
    /// Eventual-consistency misses count as transient: the resource exists
    /// and will appear in the remote index within a short window.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            GatewayError::TransientNetwork(_) | GatewayError::EventualConsistency(_)
        )
    }
}

/// Errors from dispatch correlation.
#[derive(Debug, Error)]
pub enum CorrelatorError {
    /// No run carrying the token appeared within the polling budget.
    /// Distinct from a run failure: the run may exist and simply never
    /// have been observed.
    #[error("No run matching token '{token}' appeared within {budget_secs}s")]
    Timeout {
        token: CorrelationToken,
        budget_secs: u64,
    },

    #[error("Dispatch inputs already contain reserved key '{key}'")]
    ReservedInputKey { key: String },

    #[error("Correlation cancelled")]
    Cancelled,

    #[error(transparent)]
    Gateway(GatewayError),
}

impl From<GatewayError> for CorrelatorError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Cancelled => CorrelatorError::Cancelled,
            other => CorrelatorError::Gateway(other),
        }
    }
}

/// Errors from data-model validation (roadmap parsing and ordering).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Unknown status value '{value}'")]
    UnknownStatus { value: String },

    #[error(
        "Roadmap phase order violation: item '{item}' has phase '{phase}' after phase '{previous}'"
    )]
    PhaseOrder {
        item: String,
        phase: String,
        previous: String,
    },

    #[error("Duplicate work item id '{id}'")]
    DuplicateItem { id: String },
}
