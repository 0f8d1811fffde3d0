//! Circuit breaker state machine
//!
//! `READY -> TRIPPED` on reaching the consecutive-failure threshold, on any
//! validation rejection, or on a manual arm. `TRIPPED -> READY` only through
//! `reset`, which clears the flag and the failure count together. There is no
//! cooldown or automatic recovery.

use crate::error::RejectionReason;
use serde::Serialize;
use tracing::{error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BreakerState {
    Ready,
    Tripped,
}

/// What moved the breaker to `TRIPPED`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TripCause {
    FailureThreshold { consecutive_failures: u32 },
    ValidationRejected { reason: RejectionReason },
    Manual { reason: String },
}

impl std::fmt::Display for TripCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TripCause::FailureThreshold {
                consecutive_failures,
            } => write!(f, "{} consecutive failures", consecutive_failures),
            TripCause::ValidationRejected { reason } => write!(f, "validation rejected: {}", reason),
            TripCause::Manual { reason } => write!(f, "manual arm: {}", reason),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    consecutive_failures: u32,
    failure_threshold: u32,
    tripped: bool,
    trip_cause: Option<TripCause>,
}

impl CircuitBreaker {
    /// `failure_threshold` must be greater than zero (enforced by config validation)
    pub fn new(failure_threshold: u32) -> Self {
        Self {
            consecutive_failures: 0,
            failure_threshold: failure_threshold.max(1),
            tripped: false,
            trip_cause: None,
        }
    }

    pub fn state(&self) -> BreakerState {
        if self.tripped {
            BreakerState::Tripped
        } else {
            BreakerState::Ready
        }
    }

    pub fn is_tripped(&self) -> bool {
        self.tripped
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn failure_threshold(&self) -> u32 {
        self.failure_threshold
    }

    pub fn trip_cause(&self) -> Option<&TripCause> {
        self.trip_cause.as_ref()
    }

    pub fn record_success(&mut self) {
        self.consecutive_failures = 0;
    }

    /// Count a failure and re-evaluate the threshold.
    ///
    /// Returns true if this failure tripped the breaker.
    pub fn record_failure(&mut self) -> bool {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        if self.consecutive_failures >= self.failure_threshold {
            self.trip(TripCause::FailureThreshold {
                consecutive_failures: self.consecutive_failures,
            })
        } else {
            false
        }
    }

    /// Returns true on the `READY -> TRIPPED` transition, false if already tripped.
    /// The first cause is kept.
    pub fn trip(&mut self, cause: TripCause) -> bool {
        if self.tripped {
            return false;
        }
        error!(
            cause = %cause,
            consecutive_failures = self.consecutive_failures,
            threshold = self.failure_threshold,
            "Circuit breaker tripped"
        );
        self.tripped = true;
        self.trip_cause = Some(cause);
        true
    }

    /// Operator reset: clears the trip and the failure count in one step
    pub fn reset(&mut self) {
        let was_tripped = self.tripped;
        self.tripped = false;
        self.trip_cause = None;
        self.consecutive_failures = 0;
        info!(was_tripped = was_tripped, "Circuit breaker reset");
    }
}
