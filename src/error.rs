//! Error taxonomy for the inventory workflow.
//!
//! Only `Config` is fatal to a run. Everything else is handled at the
//! enumeration boundary: transient and parse failures go through the retry
//! invoker, not-found outcomes become non-matches, and exhausted units are
//! logged and skipped.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum InventoryError {
    /// Bad or missing input file. Aborts the whole run.
    #[error("config error: {0}")]
    Config(String),

    /// A failed external call (non-zero exit, spawn failure, I/O error).
    #[error("transient call failure: {0}")]
    Transient(String),

    /// A referenced resource does not exist. Treated as a non-match.
    #[error("not found: {0}")]
    NotFound(String),

    /// Malformed response body. Counts as transient for retry purposes.
    #[error("parse error: {0}")]
    Parse(String),
}

impl InventoryError {
    /// Transient and parse failures are retried; config and not-found are not.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_) | Self::Parse(_))
    }
}
