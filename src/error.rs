//! Error types for the transaction guard

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Boxed failure returned by a guarded operation
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Why the validator refused a transaction intent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RejectionReason {
    GasPriceExceeded,
    SlippageExceeded,
    TradeSizeExceeded,
    TestLimitReached,
    UnauthorizedCounterparty,
}

impl RejectionReason {
    pub fn code(&self) -> &'static str {
        match self {
            RejectionReason::GasPriceExceeded => "GAS_PRICE_EXCEEDED",
            RejectionReason::SlippageExceeded => "SLIPPAGE_EXCEEDED",
            RejectionReason::TradeSizeExceeded => "TRADE_SIZE_EXCEEDED",
            RejectionReason::TestLimitReached => "TEST_LIMIT_REACHED",
            RejectionReason::UnauthorizedCounterparty => "UNAUTHORIZED_COUNTERPARTY",
        }
    }
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Transaction rejected: {reason}")]
    ValidationRejected { reason: RejectionReason },

    #[error("Circuit breaker open, refused guarded call '{label}'")]
    CircuitOpen { label: String },

    #[error("Guarded call '{label}' failed: {source}")]
    OperationFailed {
        label: String,
        /// True when this failure is the one that tripped the breaker
        breaker_tripped: bool,
        #[source]
        source: BoxError,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether the caller should halt its outer loop pending operator review
    pub fn is_fatal(&self) -> bool {
        match self {
            Error::ValidationRejected { .. } | Error::CircuitOpen { .. } => true,
            Error::OperationFailed {
                breaker_tripped, ..
            } => *breaker_tripped,
            Error::Config(_) | Error::Json(_) | Error::Io(_) => false,
        }
    }

    /// Rejection reason, if this is a validation rejection
    pub fn rejection_reason(&self) -> Option<RejectionReason> {
        match self {
            Error::ValidationRejected { reason } => Some(*reason),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
