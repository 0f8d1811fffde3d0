//! End-to-end scenarios against the public guard API

use async_trait::async_trait;
use rust_decimal_macros::dec;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tempfile::NamedTempFile;
use tx_guard::hooks::ExecutionRecord;
use tx_guard::{
    AuditLogHook, BoxError, BreakerState, Config, Error, GuardHook, GuardedCore, RejectionReason,
    StatusSnapshot, TransactionIntent, TripCause,
};

const ROUTER: &str = "0xE592427A0AEce92De3Edee1F18E0157C05861564";

fn scenario_config() -> Config {
    let mut config = Config::default();
    config.limits.max_gas_price_units = 1000;
    config.limits.authorized_counterparties = vec![ROUTER.to_string()];
    config.test_mode.enabled = true;
    config.test_mode.trade_ceiling = dec!(500);
    config.test_mode.max_trades = 5;
    config.breaker.failure_threshold = 3;
    config
}

#[derive(Default)]
struct Counts {
    rejections: AtomicU32,
    executions: AtomicU32,
    trips: AtomicU32,
}

struct CountingHook(Arc<Counts>);

#[async_trait]
impl GuardHook for CountingHook {
    async fn on_rejected(&self, _intent: &TransactionIntent, _reason: RejectionReason) {
        self.0.rejections.fetch_add(1, Ordering::SeqCst);
    }

    async fn on_execution_complete(&self, _record: &ExecutionRecord) {
        self.0.executions.fetch_add(1, Ordering::SeqCst);
    }

    async fn on_trip(&self, _cause: &TripCause, snapshot: &StatusSnapshot) {
        assert!(snapshot.is_tripped());
        self.0.trips.fetch_add(1, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn valid_intent_keeps_breaker_ready() {
    let core = GuardedCore::new(&scenario_config());
    let intent = TransactionIntent::new()
        .with_counterparty(ROUTER)
        .with_amount_usd(dec!(100))
        .with_gas_price(500)
        .with_slippage_bps(10);

    core.validate(&intent).await.unwrap();
    assert_eq!(
        core.snapshot().await.circuit_breaker.state,
        BreakerState::Ready
    );
}

#[tokio::test]
async fn every_single_violation_trips_breaker() {
    let cases = [
        (
            TransactionIntent::new().with_gas_price(1001),
            RejectionReason::GasPriceExceeded,
        ),
        (
            TransactionIntent::new().with_amount_usd(dec!(1000)),
            RejectionReason::TradeSizeExceeded,
        ),
        (
            TransactionIntent::new().with_counterparty("0x0000000000000000000000000000000000000001"),
            RejectionReason::UnauthorizedCounterparty,
        ),
        (
            TransactionIntent::new().with_slippage_bps(5000),
            RejectionReason::SlippageExceeded,
        ),
    ];

    for (intent, expected) in cases {
        let core = GuardedCore::new(&scenario_config());
        let err = core.validate(&intent).await.unwrap_err();
        assert_eq!(err.rejection_reason(), Some(expected));
        assert_eq!(
            core.snapshot().await.circuit_breaker.state,
            BreakerState::Tripped
        );
    }
}

#[tokio::test]
async fn test_budget_exhaustion_then_rejection() {
    let core = GuardedCore::new(&scenario_config());
    for _ in 0..5 {
        core.execute_guarded("swap", || async { Ok::<_, BoxError>(()) })
            .await
            .unwrap();
    }
    assert_eq!(core.snapshot().await.test_mode.completed_trades, 5);

    let err = core
        .validate(&TransactionIntent::new().with_amount_usd(dec!(1)))
        .await
        .unwrap_err();
    assert_eq!(err.rejection_reason(), Some(RejectionReason::TestLimitReached));

    let snapshot = core.snapshot().await;
    assert!(snapshot.is_tripped());
    assert_eq!(
        snapshot.circuit_breaker.trip_cause,
        Some(TripCause::ValidationRejected {
            reason: RejectionReason::TestLimitReached
        })
    );
}

#[tokio::test]
async fn timed_out_submissions_trip_breaker() {
    let core = GuardedCore::new(&scenario_config());

    for _ in 0..3 {
        let timed_out = tokio::time::timeout(
            std::time::Duration::from_millis(10),
            core.execute_guarded("swap", || {
                std::future::pending::<Result<String, BoxError>>()
            }),
        )
        .await;
        assert!(timed_out.is_err());
    }

    let snapshot = core.snapshot().await;
    assert!(snapshot.is_tripped());
    assert_eq!(snapshot.circuit_breaker.consecutive_failures, 3);
}

#[tokio::test]
async fn disarm_unblocks_previously_refused_call() {
    let core = GuardedCore::new(&scenario_config());
    core.arm("incident").await;

    let refused = core
        .execute_guarded("swap", || async { Ok::<_, BoxError>(1) })
        .await;
    assert!(matches!(refused, Err(Error::CircuitOpen { .. })));

    core.disarm().await;
    let snapshot = core.snapshot().await;
    assert_eq!(snapshot.circuit_breaker.consecutive_failures, 0);
    assert!(!snapshot.circuit_breaker.tripped);

    let value = core
        .execute_guarded("swap", || async { Ok::<_, BoxError>(1) })
        .await
        .unwrap();
    assert_eq!(value, 1);
}

#[tokio::test]
async fn hooks_observe_rejections_executions_and_trips() {
    let counts = Arc::new(Counts::default());
    let core = GuardedCore::new(&scenario_config()).with_hook(CountingHook(Arc::clone(&counts)));

    core.execute_guarded("swap", || async { Ok::<_, BoxError>(()) })
        .await
        .unwrap();
    core.validate(&TransactionIntent::new().with_gas_price(10_000))
        .await
        .unwrap_err();
    // Second rejection while already tripped does not report a new trip
    core.validate(&TransactionIntent::new().with_gas_price(10_000))
        .await
        .unwrap_err();
    core.execute_guarded("swap", || async { Ok::<_, BoxError>(()) })
        .await
        .unwrap_err();

    assert_eq!(counts.rejections.load(Ordering::SeqCst), 2);
    assert_eq!(counts.executions.load(Ordering::SeqCst), 2);
    assert_eq!(counts.trips.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn audit_log_records_threshold_trip() {
    let temp_file = NamedTempFile::new().unwrap();
    let core = GuardedCore::new(&scenario_config()).with_hook(AuditLogHook::new(temp_file.path()));

    for _ in 0..3 {
        core.execute_guarded("swap", || async { Err::<(), _>("execution reverted") })
            .await
            .unwrap_err();
    }

    let content = std::fs::read_to_string(temp_file.path()).unwrap();
    let entries: Vec<serde_json::Value> = content
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(entries.len(), 4);
    assert!(entries[..3].iter().all(|e| e["event"] == "guarded_execution"));
    assert_eq!(entries[3]["event"], "breaker_tripped");
    assert_eq!(entries[3]["consecutive_failures"], 3);
}

#[tokio::test]
async fn snapshot_serializes_for_reporting() {
    let core = GuardedCore::new(&scenario_config());
    let text = serde_json::to_string(&core.snapshot().await).unwrap();
    let json: serde_json::Value = serde_json::from_str(&text).unwrap();

    assert_eq!(json["circuit_breaker"]["state"], "READY");
    assert_eq!(json["test_mode"]["trades_remaining"], 5);
    assert_eq!(json["limits"]["authorized_counterparties"][0], ROUTER);
}
