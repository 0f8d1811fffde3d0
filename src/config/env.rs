//! Environment overrides
//!
//! Every limit can be overridden from the environment (or a `.env` file loaded by
//! the binary). Unset variables leave the file/default value in place.
//!
//! ```bash
//! export TX_GUARD_TEST_MODE=false
//! export TX_GUARD_TRADE_CEILING_USD=2500
//! export TX_GUARD_COUNTERPARTIES="0xE592427A0AEce92De3Edee1F18E0157C05861564,0x1111111254EEB25477B68fb85Ed929f73A960582"
//! ```

use super::Config;
use crate::{Error, Result};
use std::str::FromStr;

/// Environment variable names
pub mod env_vars {
    pub const TEST_MODE: &str = "TX_GUARD_TEST_MODE";
    pub const TEST_TRADE_CEILING_USD: &str = "TX_GUARD_TEST_TRADE_CEILING_USD";
    pub const TEST_MAX_TRADES: &str = "TX_GUARD_TEST_MAX_TRADES";
    pub const TRADE_CEILING_USD: &str = "TX_GUARD_TRADE_CEILING_USD";
    pub const MAX_GAS_PRICE: &str = "TX_GUARD_MAX_GAS_PRICE";
    pub const MAX_SLIPPAGE_BPS: &str = "TX_GUARD_MAX_SLIPPAGE_BPS";
    pub const FAILURE_THRESHOLD: &str = "TX_GUARD_FAILURE_THRESHOLD";
    pub const COUNTERPARTIES: &str = "TX_GUARD_COUNTERPARTIES";
    pub const AUDIT_LOG: &str = "TX_GUARD_AUDIT_LOG";
    pub const LOOP_INTERVAL_MS: &str = "TX_GUARD_LOOP_INTERVAL_MS";
}

impl Config {
    /// Overlay values from the process environment
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Overlay values from an arbitrary key lookup
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        use env_vars::*;

        if let Some(value) = lookup(TEST_MODE) {
            self.test_mode.enabled = parse_bool(TEST_MODE, &value)?;
        }
        if let Some(value) = lookup(TEST_TRADE_CEILING_USD) {
            self.test_mode.trade_ceiling = parse(TEST_TRADE_CEILING_USD, &value)?;
        }
        if let Some(value) = lookup(TEST_MAX_TRADES) {
            self.test_mode.max_trades = parse(TEST_MAX_TRADES, &value)?;
        }
        if let Some(value) = lookup(TRADE_CEILING_USD) {
            self.limits.production_trade_ceiling = parse(TRADE_CEILING_USD, &value)?;
        }
        if let Some(value) = lookup(MAX_GAS_PRICE) {
            self.limits.max_gas_price_units = parse(MAX_GAS_PRICE, &value)?;
        }
        if let Some(value) = lookup(MAX_SLIPPAGE_BPS) {
            self.limits.max_slippage_bps = parse(MAX_SLIPPAGE_BPS, &value)?;
        }
        if let Some(value) = lookup(FAILURE_THRESHOLD) {
            self.breaker.failure_threshold = parse(FAILURE_THRESHOLD, &value)?;
        }
        if let Some(value) = lookup(LOOP_INTERVAL_MS) {
            self.loop_interval_ms = parse(LOOP_INTERVAL_MS, &value)?;
        }
        if let Some(value) = lookup(COUNTERPARTIES) {
            self.limits.authorized_counterparties = value
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
            tracing::debug!(
                count = self.limits.authorized_counterparties.len(),
                "Using {} for counterparty allow-list",
                COUNTERPARTIES
            );
        }
        if let Some(value) = lookup(AUDIT_LOG) {
            self.audit_log_path = if value.is_empty() { None } else { Some(value) };
        }

        Ok(())
    }
}

fn parse<T>(key: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| Error::Config(format!("{}={:?}: {}", key, value, e)))
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(Error::Config(format!(
            "{}={:?}: expected a boolean",
            key, value
        ))),
    }
}
