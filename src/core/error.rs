//! Errors raised while acquiring rate tables

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RateError {
    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Failed to fetch currency rates (HTTP {status})")]
    Http { status: u16 },

    #[error("Failed to parse rate response for {base}: {reason}")]
    Parse { base: String, reason: String },

    #[error("Currency data missing for base {base}")]
    MissingBaseData { base: String },

    #[error("Request cancelled")]
    Cancelled,
}

impl RateError {
    /// Cancellation is a normal outcome of a superseded fetch, not a failure to report.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, RateError::Cancelled)
    }
}
