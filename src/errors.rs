//! Fetch-loop error taxonomy.
//!
//! Transient failures are absorbed inside the harvest loop; only the
//! variants below reach the orchestrator, which maps them to campaign
//! stop reasons.

use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// Provider pushback detected after a request (checkpoint/authwall URL
    /// or a pushback phrase in the rendered page).
    #[error("provider rate limit detected")]
    RateLimited,

    /// The session resolved to a login wall; re-authentication required.
    #[error("session unauthenticated")]
    Unauthenticated,

    /// The pacing governor refused admission outright (extended backoff).
    #[error("host admission blocked ({reason}), retry after {retry_after:?}")]
    Blocked {
        reason: String,
        retry_after: Duration,
    },

    /// The campaign's cancellation signal fired at a suspension point.
    #[error("cancelled")]
    Cancelled,

    /// Store unreachable or misconfiguration; terminates the campaign.
    #[error("fatal: {0}")]
    Fatal(String),

    /// Navigation timeout, DOM read failure, proxy transport error. Callers
    /// record it and continue with the next card or URL.
    #[error(transparent)]
    Transient(#[from] anyhow::Error),
}
