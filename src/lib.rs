//! Transaction guard
//!
//! Operational safety envelope for an automated on-chain trading process:
//! - Validates every outbound transaction against configured limits
//! - Wraps submissions with success/failure accounting
//! - Trips a circuit breaker that halts all further submissions
//! - Reports a snapshot of the current risk posture
//!
//! # Safety Model
//!
//! - Any validation rejection trips the breaker, not just the call
//! - A tripped breaker only clears through an explicit operator `disarm`
//! - Failures are always recorded and passed back to the caller, never swallowed
//! - The caller decides whether an error halts its loop (`Error::is_fatal`)

pub mod config;
pub mod guard;
pub mod hooks;
pub mod runner;

mod error;

// Re-export commonly used types
pub use config::Config;
pub use error::{BoxError, Error, RejectionReason, Result};
pub use guard::{BreakerState, GuardedCore, StatusSnapshot, TransactionIntent, TripCause};
pub use hooks::{AuditLogHook, GuardHook};
pub use runner::{GuardedRunner, PlannedTrade, RunSummary, TradeSource};
