//! Audit log hook
//!
//! Appends one JSON line per rejection, guarded execution, and breaker trip.

use super::{ExecutionOutcome, ExecutionRecord, GuardHook};
use crate::error::RejectionReason;
use crate::guard::{StatusSnapshot, TransactionIntent, TripCause};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Entry in the audit log
#[derive(Debug, Serialize)]
struct AuditEntry {
    timestamp: DateTime<Utc>,
    event: &'static str,
    execution_id: Option<Uuid>,
    label: Option<String>,
    status: &'static str,
    reason: Option<String>,
    error: Option<String>,
    details: Value,
    duration_ms: u64,
    consecutive_failures: Option<u32>,
    tripped: bool,
}

/// Append-only JSONL sink.
///
/// The file is opened lazily and the handle kept between entries. A failed
/// write drops the handle so the next entry reopens the path.
struct JsonlSink {
    path: PathBuf,
    file: Option<File>,
}

impl JsonlSink {
    fn new(path: PathBuf) -> Self {
        Self { path, file: None }
    }

    fn append(&mut self, entry: &AuditEntry) -> std::io::Result<()> {
        let mut line = serde_json::to_vec(entry)?;
        line.push(b'\n');

        let mut file = match self.file.take() {
            Some(file) => file,
            None => OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)?,
        };
        // One write per entry keeps lines whole when several writers share the file
        file.write_all(&line)?;
        file.flush()?;
        self.file = Some(file);
        Ok(())
    }
}

/// Hook that records guard activity to a JSONL file
pub struct AuditLogHook {
    sink: Arc<Mutex<JsonlSink>>,
}

impl AuditLogHook {
    /// # Arguments
    /// * `log_path` - Path to the audit log file (JSONL format)
    pub fn new(log_path: impl Into<PathBuf>) -> Self {
        Self {
            sink: Arc::new(Mutex::new(JsonlSink::new(log_path.into()))),
        }
    }

    async fn append(&self, entry: AuditEntry) {
        let mut sink = self.sink.lock().await;
        if let Err(e) = sink.append(&entry) {
            tracing::warn!(error = %e, "Failed to write audit log entry");
        }
    }
}

#[async_trait]
impl GuardHook for AuditLogHook {
    async fn on_rejected(&self, intent: &TransactionIntent, reason: RejectionReason) {
        self.append(AuditEntry {
            timestamp: Utc::now(),
            event: "validation_rejected",
            execution_id: None,
            label: None,
            status: "rejected",
            reason: Some(reason.to_string()),
            error: None,
            details: serde_json::to_value(intent).unwrap_or(Value::Null),
            duration_ms: 0,
            consecutive_failures: None,
            tripped: true,
        })
        .await;
    }

    async fn on_execution_complete(&self, record: &ExecutionRecord) {
        let (status, error) = match &record.outcome {
            ExecutionOutcome::Succeeded => ("success", None),
            ExecutionOutcome::Failed { error } => ("error", Some(error.clone())),
            ExecutionOutcome::Blocked => ("blocked", None),
            ExecutionOutcome::Cancelled => ("cancelled", None),
        };

        self.append(AuditEntry {
            timestamp: Utc::now(),
            event: "guarded_execution",
            execution_id: Some(record.execution_id),
            label: Some(record.label.clone()),
            status,
            reason: None,
            error,
            details: serde_json::json!({ "completed_trades": record.completed_trades }),
            duration_ms: record.duration_ms,
            consecutive_failures: Some(record.consecutive_failures),
            tripped: record.tripped,
        })
        .await;
    }

    async fn on_trip(&self, cause: &TripCause, snapshot: &StatusSnapshot) {
        self.append(AuditEntry {
            timestamp: Utc::now(),
            event: "breaker_tripped",
            execution_id: None,
            label: None,
            status: "tripped",
            reason: Some(cause.to_string()),
            error: None,
            details: serde_json::to_value(snapshot).unwrap_or(Value::Null),
            duration_ms: 0,
            consecutive_failures: Some(snapshot.circuit_breaker.consecutive_failures),
            tripped: true,
        })
        .await;
    }
}
