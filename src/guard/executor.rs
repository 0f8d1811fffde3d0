//! Guarded execution core
//!
//! Owns the limit registry and the circuit breaker behind one lock, so every
//! read-modify-write (validate-and-trip, outcome bookkeeping, arm, disarm) is
//! linearizable. The lock is synchronous and never held across an await, which
//! also lets a dropped in-flight execution settle its bookkeeping from `Drop`.

use super::breaker::{CircuitBreaker, TripCause};
use super::limits::LimitRegistry;
use super::snapshot::StatusSnapshot;
use super::validator::{self, TransactionIntent};
use crate::config::{self, Config, LimitsConfig};
use crate::error::{BoxError, Error, Result};
use crate::hooks::{ExecutionOutcome, ExecutionRecord, GuardHook};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

type Hooks = Vec<Arc<dyn GuardHook>>;

struct CoreState {
    limits: LimitRegistry,
    breaker: CircuitBreaker,
}

impl CoreState {
    fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot::capture(&self.limits, &self.breaker)
    }
}

/// Safety governor shared by every component that validates or submits transactions
pub struct GuardedCore {
    state: Mutex<CoreState>,
    hooks: Hooks,
}

impl GuardedCore {
    /// Build a core from validated configuration
    pub fn new(config: &Config) -> Self {
        Self {
            state: Mutex::new(CoreState {
                limits: LimitRegistry::from_config(config),
                breaker: CircuitBreaker::new(config.breaker.failure_threshold),
            }),
            hooks: Vec::new(),
        }
    }

    /// Register an observer hook
    pub fn with_hook(mut self, hook: impl GuardHook + 'static) -> Self {
        self.hooks.push(Arc::new(hook));
        self
    }

    // Every mutation is a plain field write, so a poisoned lock still holds consistent state
    fn lock_state(&self) -> MutexGuard<'_, CoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Check an intent against the current limits.
    ///
    /// Any rejection trips the breaker before the error is returned.
    pub async fn validate(&self, intent: &TransactionIntent) -> Result<()> {
        let (reason, tripped) = {
            let mut state = self.lock_state();
            let reason = match validator::validate(&state.limits, intent) {
                Ok(()) => {
                    debug!(intent = ?intent, "Transaction intent passed validation");
                    return Ok(());
                }
                Err(reason) => reason,
            };
            let newly_tripped = state
                .breaker
                .trip(TripCause::ValidationRejected { reason });
            (reason, newly_tripped.then(|| state.snapshot()))
        };

        warn!(
            reason = %reason,
            intent = ?intent,
            "Transaction intent rejected"
        );

        for hook in &self.hooks {
            hook.on_rejected(intent, reason).await;
        }
        if let Some(snapshot) = tripped {
            notify_trip(&self.hooks, &snapshot).await;
        }

        Err(Error::ValidationRejected { reason })
    }

    /// Run `operation` under the breaker.
    ///
    /// Refuses with `CircuitOpen` without calling `operation` when tripped.
    /// Otherwise records the outcome exactly once and returns it; failures are
    /// passed through as `OperationFailed` after bookkeeping. If the returned
    /// future is dropped before the operation finishes (timeout, `select!`,
    /// panic), the execution is recorded as a failure.
    pub async fn execute_guarded<T, E, F, Fut>(&self, label: &str, operation: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: Into<BoxError>,
    {
        let execution_id = Uuid::new_v4();

        let blocked = {
            let state = self.lock_state();
            state.breaker.is_tripped().then(|| ExecutionRecord {
                execution_id,
                label: label.to_string(),
                outcome: ExecutionOutcome::Blocked,
                duration_ms: 0,
                consecutive_failures: state.breaker.consecutive_failures(),
                tripped: true,
                completed_trades: state.limits.test_mode.completed_trades,
            })
        };
        if let Some(record) = blocked {
            warn!(label = label, "Circuit breaker open, guarded call refused");
            notify_execution(&self.hooks, &record).await;
            return Err(Error::CircuitOpen {
                label: label.to_string(),
            });
        }

        debug!(label = label, %execution_id, "Starting guarded execution");
        let mut in_flight = InFlight {
            core: self,
            execution_id,
            label,
            started: Instant::now(),
            settled: false,
        };
        let outcome = operation().await;
        in_flight.settled = true;
        let duration_ms = in_flight.elapsed_ms();

        match outcome {
            Ok(value) => {
                let record = self.settle_success(execution_id, label, duration_ms);
                info!(
                    label = label,
                    duration_ms = duration_ms,
                    completed_trades = record.completed_trades,
                    "Guarded execution succeeded"
                );
                notify_execution(&self.hooks, &record).await;
                Ok(value)
            }
            Err(e) => {
                let source: BoxError = e.into();
                let (record, trip_snapshot) = self.settle_failure(
                    execution_id,
                    label,
                    duration_ms,
                    ExecutionOutcome::Failed {
                        error: source.to_string(),
                    },
                );
                warn!(
                    label = label,
                    error = %source,
                    consecutive_failures = record.consecutive_failures,
                    duration_ms = duration_ms,
                    "Guarded execution failed"
                );
                let breaker_tripped = trip_snapshot.is_some();
                notify_execution(&self.hooks, &record).await;
                if let Some(snapshot) = trip_snapshot {
                    notify_trip(&self.hooks, &snapshot).await;
                }

                Err(Error::OperationFailed {
                    label: label.to_string(),
                    breaker_tripped,
                    source,
                })
            }
        }
    }

    fn settle_success(&self, execution_id: Uuid, label: &str, duration_ms: u64) -> ExecutionRecord {
        let mut state = self.lock_state();
        state.breaker.record_success();
        if state.limits.test_mode.enabled {
            state.limits.test_mode.completed_trades =
                state.limits.test_mode.completed_trades.saturating_add(1);
        }
        ExecutionRecord {
            execution_id,
            label: label.to_string(),
            outcome: ExecutionOutcome::Succeeded,
            duration_ms,
            consecutive_failures: 0,
            tripped: state.breaker.is_tripped(),
            completed_trades: state.limits.test_mode.completed_trades,
        }
    }

    /// Returns the record and, if this failure tripped the breaker, the snapshot taken at the trip
    fn settle_failure(
        &self,
        execution_id: Uuid,
        label: &str,
        duration_ms: u64,
        outcome: ExecutionOutcome,
    ) -> (ExecutionRecord, Option<StatusSnapshot>) {
        let mut state = self.lock_state();
        let newly_tripped = state.breaker.record_failure();
        let record = ExecutionRecord {
            execution_id,
            label: label.to_string(),
            outcome,
            duration_ms,
            consecutive_failures: state.breaker.consecutive_failures(),
            tripped: state.breaker.is_tripped(),
            completed_trades: state.limits.test_mode.completed_trades,
        };
        (record, newly_tripped.then(|| state.snapshot()))
    }

    /// Copy of the current risk posture
    pub async fn snapshot(&self) -> StatusSnapshot {
        self.lock_state().snapshot()
    }

    /// Operator halt: trip the breaker by hand
    pub async fn arm(&self, reason: &str) {
        let tripped = {
            let mut state = self.lock_state();
            let newly_tripped = state.breaker.trip(TripCause::Manual {
                reason: reason.to_string(),
            });
            newly_tripped.then(|| state.snapshot())
        };
        if let Some(snapshot) = tripped {
            notify_trip(&self.hooks, &snapshot).await;
        }
    }

    /// Operator reset: back to `READY` with a zero failure count
    pub async fn disarm(&self) {
        self.lock_state().breaker.reset();
    }

    /// Switch between the test profile and production limits
    pub async fn set_test_mode(&self, enabled: bool) {
        let mut state = self.lock_state();
        let was_enabled = state.limits.test_mode.enabled;
        state.limits.test_mode.enabled = enabled;

        match (was_enabled, enabled) {
            (true, false) => warn!(
                completed_trades = state.limits.test_mode.completed_trades,
                production_trade_ceiling = %state.limits.production_trade_ceiling,
                "Test mode disabled, production limits now in force"
            ),
            (false, true) => info!(
                trade_ceiling = %state.limits.test_mode.trade_ceiling,
                max_trades = state.limits.test_mode.max_trades,
                "Test mode enabled"
            ),
            _ => debug!(enabled = enabled, "Test mode unchanged"),
        }
    }

    /// Add an address to the allow-list, stored exactly as given
    pub async fn authorize_counterparty(&self, counterparty: &str) -> Result<()> {
        config::check_address(counterparty)?;
        let mut state = self.lock_state();
        if state
            .limits
            .authorized_counterparties
            .insert(counterparty.to_string())
        {
            info!(counterparty = counterparty, "Counterparty authorized");
        }
        Ok(())
    }

    /// Remove an address from the allow-list; returns whether it was present
    pub async fn revoke_counterparty(&self, counterparty: &str) -> bool {
        let mut state = self.lock_state();
        let removed = state.limits.authorized_counterparties.remove(counterparty);
        if removed {
            info!(counterparty = counterparty, "Counterparty revoked");
        }
        removed
    }

    /// Replace slippage, gas, production-ceiling limits and the allow-list.
    /// The test-mode profile and its counter are left alone.
    pub async fn set_limits(&self, limits: LimitsConfig) -> Result<()> {
        limits.validate()?;

        let mut state = self.lock_state();
        state.limits.max_slippage_bps = limits.max_slippage_bps;
        state.limits.max_gas_price_units = limits.max_gas_price_units;
        state.limits.production_trade_ceiling = limits.production_trade_ceiling;
        state.limits.authorized_counterparties =
            limits.authorized_counterparties.into_iter().collect();
        info!(
            max_slippage_bps = state.limits.max_slippage_bps,
            max_gas_price_units = %state.limits.max_gas_price_units,
            production_trade_ceiling = %state.limits.production_trade_ceiling,
            counterparties = state.limits.authorized_counterparties.len(),
            "Limits updated"
        );
        Ok(())
    }
}

/// An execution whose operation has started but not yet returned.
///
/// Dropped unsettled means the caller abandoned the future (or the operation
/// panicked); the execution then counts as a failure.
struct InFlight<'a> {
    core: &'a GuardedCore,
    execution_id: Uuid,
    label: &'a str,
    started: Instant,
    settled: bool,
}

impl InFlight<'_> {
    fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let (record, trip_snapshot) = self.core.settle_failure(
            self.execution_id,
            self.label,
            self.elapsed_ms(),
            ExecutionOutcome::Cancelled,
        );
        warn!(
            label = self.label,
            consecutive_failures = record.consecutive_failures,
            duration_ms = record.duration_ms,
            "Guarded execution abandoned before completion"
        );

        if self.core.hooks.is_empty() {
            return;
        }
        // Hooks are async; hand them to the runtime since Drop cannot await
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let hooks = self.core.hooks.clone();
                handle.spawn(async move {
                    notify_execution(&hooks, &record).await;
                    if let Some(snapshot) = trip_snapshot {
                        notify_trip(&hooks, &snapshot).await;
                    }
                });
            }
            Err(_) => debug!(
                label = self.label,
                "No runtime available, hooks not notified of abandoned execution"
            ),
        }
    }
}

async fn notify_execution(hooks: &[Arc<dyn GuardHook>], record: &ExecutionRecord) {
    for hook in hooks {
        hook.on_execution_complete(record).await;
    }
}

async fn notify_trip(hooks: &[Arc<dyn GuardHook>], snapshot: &StatusSnapshot) {
    let Some(cause) = snapshot.circuit_breaker.trip_cause.as_ref() else {
        return;
    };
    for hook in hooks {
        hook.on_trip(cause, snapshot).await;
    }
}
