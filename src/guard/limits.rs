//! Limit registry
//!
//! Numeric thresholds, the counterparty allow-list, and the test-mode profile.
//! Pure data; mutation happens only through `GuardedCore`'s administrative calls.

use crate::config::Config;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeSet;

/// Staged-rollout profile with its own trade ceiling and trade budget
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestModeProfile {
    pub enabled: bool,
    pub trade_ceiling: Decimal,
    pub max_trades: u32,
    /// Successful guarded executions while enabled. Never decremented.
    pub completed_trades: u32,
}

impl TestModeProfile {
    /// True when test mode is on and its trade budget is spent
    pub fn limit_reached(&self) -> bool {
        self.enabled && self.completed_trades >= self.max_trades
    }

    pub fn trades_remaining(&self) -> Option<u32> {
        self.enabled
            .then(|| self.max_trades.saturating_sub(self.completed_trades))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LimitRegistry {
    pub max_slippage_bps: u32,
    pub max_gas_price_units: u128,
    pub production_trade_ceiling: Decimal,
    pub authorized_counterparties: BTreeSet<String>,
    pub test_mode: TestModeProfile,
}

impl LimitRegistry {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_slippage_bps: config.limits.max_slippage_bps,
            max_gas_price_units: config.limits.max_gas_price_units,
            production_trade_ceiling: config.limits.production_trade_ceiling,
            authorized_counterparties: config
                .limits
                .authorized_counterparties
                .iter()
                .cloned()
                .collect(),
            test_mode: TestModeProfile {
                enabled: config.test_mode.enabled,
                trade_ceiling: config.test_mode.trade_ceiling,
                max_trades: config.test_mode.max_trades,
                completed_trades: 0,
            },
        }
    }

    /// Ceiling for a single trade under the current operating profile
    pub fn applicable_trade_ceiling(&self) -> Decimal {
        if self.test_mode.enabled {
            self.test_mode.trade_ceiling
        } else {
            self.production_trade_ceiling
        }
    }

    /// Exact, case-sensitive allow-list lookup
    pub fn is_authorized(&self, counterparty: &str) -> bool {
        self.authorized_counterparties.contains(counterparty)
    }
}
