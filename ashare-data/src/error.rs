use ashare_instrument::symbol::{Symbol, SymbolError};
use thiserror::Error;

/// All possible errors produced by the data layer.
///
/// The variants mirror the failure kinds the orchestration layer reacts to: validation errors
/// reject at entry, `NotFound` is a clean miss, `Source` is one provider failing (the chain
/// continues), `AllSourcesFailed` is chain exhaustion, and `Transient` is retryable.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("validation: {0}")]
    Validation(String),

    #[error("symbol: {0}")]
    Symbol(#[from] SymbolError),

    #[error("no data found for {symbol}")]
    NotFound { symbol: Symbol },

    #[error("source {name} failed: {reason}")]
    Source { name: String, reason: String },

    #[error("all data sources failed for {symbol}")]
    AllSourcesFailed { symbol: Symbol },

    #[error("transient: {0}")]
    Transient(String),
}

impl DataError {
    /// True when retrying the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DataError::Transient(_) | DataError::Source { .. })
    }
}
