//! Guarded trading loop
//!
//! Pulls planned trades from a strategy, validates each one, and submits it
//! through the guard. Non-fatal failures are logged and the loop carries on;
//! a fatal error (rejection, open circuit, threshold trip) halts it.

use crate::config::Config;
use crate::error::BoxError;
use crate::guard::{GuardedCore, TransactionIntent};
use crate::{Error, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// A trade the strategy wants submitted
#[derive(Debug, Clone)]
pub struct PlannedTrade {
    /// Human-readable name used in logs and the audit trail
    pub label: String,
    pub intent: TransactionIntent,
}

/// The trading strategy, seen from the guard's side
#[async_trait]
pub trait TradeSource: Send + Sync {
    /// Next trade to attempt, or `None` when there is nothing to do this round
    async fn next_trade(&self) -> Result<Option<PlannedTrade>>;

    /// Submit the trade on-chain and return a transaction reference
    async fn submit(&self, trade: &PlannedTrade) -> std::result::Result<String, BoxError>;
}

/// What a run did before it stopped
#[derive(Debug, Default)]
pub struct RunSummary {
    pub iterations: u64,
    pub submitted: u64,
    pub failed: u64,
    pub idle: u64,
    /// The fatal error that halted the loop, if any
    pub halted_by: Option<Error>,
}

impl RunSummary {
    pub fn halted(&self) -> bool {
        self.halted_by.is_some()
    }
}

/// Runner that drives a `TradeSource` through a shared `GuardedCore`
pub struct GuardedRunner {
    core: Arc<GuardedCore>,
    interval: Duration,
    max_iterations: Option<u64>,
}

impl GuardedRunner {
    pub fn new(core: Arc<GuardedCore>, interval: Duration) -> Self {
        Self {
            core,
            interval,
            max_iterations: None,
        }
    }

    /// Runner pacing itself by `loop_interval_ms` from the configuration
    pub fn from_config(core: Arc<GuardedCore>, config: &Config) -> Self {
        Self::new(core, Duration::from_millis(config.loop_interval_ms))
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Stop after `max` iterations instead of running until halted
    pub fn with_max_iterations(mut self, max: u64) -> Self {
        self.max_iterations = Some(max);
        self
    }

    /// Run until a fatal error or the iteration limit.
    ///
    /// Errors from `next_trade` are returned as-is; guard errors end up in the summary.
    pub async fn run<S: TradeSource>(&self, source: &S) -> Result<RunSummary> {
        let mut summary = RunSummary::default();

        info!(
            interval_ms = self.interval.as_millis() as u64,
            max_iterations = ?self.max_iterations,
            "Starting guarded trading loop"
        );

        loop {
            if let Some(max) = self.max_iterations {
                if summary.iterations >= max {
                    break;
                }
            }
            if summary.iterations > 0 && !self.interval.is_zero() {
                tokio::time::sleep(self.interval).await;
            }
            summary.iterations += 1;

            let Some(trade) = source.next_trade().await? else {
                summary.idle += 1;
                continue;
            };

            if let Err(e) = self.core.validate(&trade.intent).await {
                error!(label = %trade.label, error = %e, "Trade rejected, halting loop");
                summary.halted_by = Some(e);
                break;
            }

            match self
                .core
                .execute_guarded(&trade.label, || source.submit(&trade))
                .await
            {
                Ok(tx_ref) => {
                    summary.submitted += 1;
                    info!(label = %trade.label, tx = %tx_ref, "Trade submitted");
                }
                Err(e) if e.is_fatal() => {
                    error!(label = %trade.label, error = %e, "Guard halted trading loop");
                    summary.halted_by = Some(e);
                    break;
                }
                Err(e) => {
                    summary.failed += 1;
                    warn!(label = %trade.label, error = %e, "Trade failed, continuing");
                }
            }
        }

        info!(
            iterations = summary.iterations,
            submitted = summary.submitted,
            failed = summary.failed,
            halted = summary.halted(),
            "Guarded trading loop stopped"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RejectionReason;
    use rust_decimal_macros::dec;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Scripted strategy: a queue of trades and a queue of submit results
    struct ScriptedSource {
        trades: Mutex<VecDeque<Option<PlannedTrade>>>,
        results: Mutex<VecDeque<std::result::Result<String, String>>>,
        submits: Mutex<u32>,
    }

    impl ScriptedSource {
        fn new(
            trades: Vec<Option<PlannedTrade>>,
            results: Vec<std::result::Result<String, String>>,
        ) -> Self {
            Self {
                trades: Mutex::new(trades.into()),
                results: Mutex::new(results.into()),
                submits: Mutex::new(0),
            }
        }

        fn submits(&self) -> u32 {
            *self.submits.lock().unwrap()
        }
    }

    #[async_trait]
    impl TradeSource for ScriptedSource {
        async fn next_trade(&self) -> Result<Option<PlannedTrade>> {
            Ok(self.trades.lock().unwrap().pop_front().flatten())
        }

        async fn submit(&self, _trade: &PlannedTrade) -> std::result::Result<String, BoxError> {
            *self.submits.lock().unwrap() += 1;
            let next = self
                .results
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok("0xdefault".to_string()));
            next.map_err(Into::into)
        }
    }

    fn trade(amount: rust_decimal::Decimal) -> Option<PlannedTrade> {
        Some(PlannedTrade {
            label: "arb_usdc_weth".to_string(),
            intent: TransactionIntent::new()
                .with_amount_usd(amount)
                .with_gas_price(10),
        })
    }

    fn runner(config: &Config) -> (Arc<GuardedCore>, GuardedRunner) {
        let core = Arc::new(GuardedCore::new(config));
        let runner = GuardedRunner::new(Arc::clone(&core), Duration::ZERO);
        (core, runner)
    }

    #[tokio::test]
    async fn test_runs_until_iteration_limit() {
        let (core, runner) = runner(&Config::default());
        let source = ScriptedSource::new(
            vec![trade(dec!(10)), None, trade(dec!(20))],
            vec![Ok("0x01".to_string()), Ok("0x02".to_string())],
        );

        let summary = runner.with_max_iterations(3).run(&source).await.unwrap();
        assert_eq!(summary.iterations, 3);
        assert_eq!(summary.submitted, 2);
        assert_eq!(summary.idle, 1);
        assert!(!summary.halted());
        assert_eq!(core.snapshot().await.test_mode.completed_trades, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleeps_configured_interval_between_iterations() {
        let mut config = Config::default();
        config.loop_interval_ms = 250;
        let core = Arc::new(GuardedCore::new(&config));
        let runner = GuardedRunner::from_config(core, &config);
        assert_eq!(runner.interval(), Duration::from_millis(250));

        let source = ScriptedSource::new(vec![None, None, None], vec![]);
        let started = tokio::time::Instant::now();
        let summary = runner.with_max_iterations(3).run(&source).await.unwrap();

        assert_eq!(summary.idle, 3);
        // No sleep before the first iteration
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(500), "slept {:?}", elapsed);
        assert!(elapsed < Duration::from_millis(750), "slept {:?}", elapsed);
    }

    #[tokio::test]
    async fn test_rejection_halts_before_submit() {
        let (core, runner) = runner(&Config::default());
        let source = ScriptedSource::new(vec![trade(dec!(5000))], vec![]);

        let summary = runner.with_max_iterations(10).run(&source).await.unwrap();
        assert_eq!(source.submits(), 0);
        assert_eq!(
            summary.halted_by.as_ref().and_then(Error::rejection_reason),
            Some(RejectionReason::TradeSizeExceeded)
        );
        assert!(core.snapshot().await.is_tripped());
    }

    #[tokio::test]
    async fn test_failures_continue_until_threshold() {
        let (core, runner) = runner(&Config::default());
        let source = ScriptedSource::new(
            vec![trade(dec!(1)); 5],
            vec![
                Err("reverted".to_string()),
                Err("reverted".to_string()),
                Err("reverted".to_string()),
            ],
        );

        let summary = runner.with_max_iterations(5).run(&source).await.unwrap();
        assert_eq!(summary.failed, 2);
        assert_eq!(summary.iterations, 3);
        assert!(matches!(
            summary.halted_by,
            Some(Error::OperationFailed {
                breaker_tripped: true,
                ..
            })
        ));
        assert_eq!(source.submits(), 3);
        assert!(core.snapshot().await.is_tripped());
    }

    #[tokio::test]
    async fn test_armed_core_halts_immediately() {
        let (core, runner) = runner(&Config::default());
        core.arm("operator review").await;
        let source = ScriptedSource::new(vec![trade(dec!(1))], vec![]);

        let summary = runner.run(&source).await.unwrap();
        assert!(matches!(summary.halted_by, Some(Error::CircuitOpen { .. })));
        assert_eq!(source.submits(), 0);
    }
}
