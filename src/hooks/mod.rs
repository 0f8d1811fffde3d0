//! Observer hooks
//!
//! Hooks see every rejection, guarded execution, and breaker trip after the
//! guard's bookkeeping is done and its lock released. They cannot block or
//! change an outcome; alerting integrations plug in here.

mod audit_log;

pub use audit_log::AuditLogHook;

use crate::error::RejectionReason;
use crate::guard::{StatusSnapshot, TransactionIntent, TripCause};
use async_trait::async_trait;
use serde::Serialize;
use uuid::Uuid;

/// How a guarded execution ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExecutionOutcome {
    Succeeded,
    Failed { error: String },
    /// Refused because the breaker was open; the operation never ran
    Blocked,
    /// The caller dropped the call (or the operation panicked) before it finished;
    /// counted as a failure
    Cancelled,
}

/// One guarded execution, as reported to hooks
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionRecord {
    pub execution_id: Uuid,
    pub label: String,
    pub outcome: ExecutionOutcome,
    pub duration_ms: u64,
    pub consecutive_failures: u32,
    pub tripped: bool,
    pub completed_trades: u32,
}

#[async_trait]
pub trait GuardHook: Send + Sync {
    async fn on_rejected(&self, _intent: &TransactionIntent, _reason: RejectionReason) {}

    async fn on_execution_complete(&self, _record: &ExecutionRecord) {}

    async fn on_trip(&self, _cause: &TripCause, _snapshot: &StatusSnapshot) {}
}
