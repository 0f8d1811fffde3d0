//! Read-only status view for reporting tools

use super::breaker::{BreakerState, CircuitBreaker, TripCause};
use super::limits::LimitRegistry;
use rust_decimal::Decimal;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LimitsView {
    pub max_slippage_bps: u32,
    pub max_gas_price_units: u128,
    pub production_trade_ceiling: Decimal,
    /// Ceiling in force right now (test or production)
    pub applicable_trade_ceiling: Decimal,
    pub authorized_counterparties: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BreakerView {
    pub state: BreakerState,
    pub tripped: bool,
    pub consecutive_failures: u32,
    pub failure_threshold: u32,
    pub trip_cause: Option<TripCause>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestModeView {
    pub enabled: bool,
    pub trade_ceiling: Decimal,
    pub max_trades: u32,
    pub completed_trades: u32,
    pub trades_remaining: Option<u32>,
}

/// Owned copy of the guard's risk posture at one instant
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusSnapshot {
    pub limits: LimitsView,
    pub circuit_breaker: BreakerView,
    pub test_mode: TestModeView,
}

impl StatusSnapshot {
    pub(crate) fn capture(limits: &LimitRegistry, breaker: &CircuitBreaker) -> Self {
        Self {
            limits: LimitsView {
                max_slippage_bps: limits.max_slippage_bps,
                max_gas_price_units: limits.max_gas_price_units,
                production_trade_ceiling: limits.production_trade_ceiling,
                applicable_trade_ceiling: limits.applicable_trade_ceiling(),
                authorized_counterparties: limits.authorized_counterparties.iter().cloned().collect(),
            },
            circuit_breaker: BreakerView {
                state: breaker.state(),
                tripped: breaker.is_tripped(),
                consecutive_failures: breaker.consecutive_failures(),
                failure_threshold: breaker.failure_threshold(),
                trip_cause: breaker.trip_cause().cloned(),
            },
            test_mode: TestModeView {
                enabled: limits.test_mode.enabled,
                trade_ceiling: limits.test_mode.trade_ceiling,
                max_trades: limits.test_mode.max_trades,
                completed_trades: limits.test_mode.completed_trades,
                trades_remaining: limits.test_mode.trades_remaining(),
            },
        }
    }

    pub fn is_tripped(&self) -> bool {
        self.circuit_breaker.tripped
    }
}
