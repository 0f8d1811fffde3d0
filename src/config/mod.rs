//! Configuration for the transaction guard

pub mod env;

use crate::{Error, Result};
use alloy::primitives::Address;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

/// Transaction limit settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Maximum accepted output shortfall in basis points (0-10000)
    pub max_slippage_bps: u32,
    /// Gas price ceiling in the network's smallest pricing unit (wei)
    pub max_gas_price_units: u128,
    /// Per-trade ceiling (USD) when test mode is disabled
    pub production_trade_ceiling: Decimal,
    /// Counterparty addresses allowed to receive transactions (exact match)
    #[serde(default)]
    pub authorized_counterparties: Vec<String>,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_slippage_bps: 50,                     // 0.5%
            max_gas_price_units: 100_000_000_000,     // 100 gwei
            production_trade_ceiling: dec!(1000),     // Conservative default
            authorized_counterparties: Vec::new(),
        }
    }
}

impl LimitsConfig {
    /// Check value ranges and counterparty address format
    pub fn validate(&self) -> Result<()> {
        if self.max_slippage_bps > 10_000 {
            return Err(Error::Config(format!(
                "max_slippage_bps must be within 0-10000, got {}",
                self.max_slippage_bps
            )));
        }
        if self.production_trade_ceiling.is_sign_negative() {
            return Err(Error::Config(
                "production_trade_ceiling must not be negative".to_string(),
            ));
        }
        for counterparty in &self.authorized_counterparties {
            check_address(counterparty)?;
        }
        Ok(())
    }
}

/// Staged-rollout profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestModeConfig {
    pub enabled: bool,
    /// Per-trade ceiling (USD) while test mode is enabled
    pub trade_ceiling: Decimal,
    /// Number of trades permitted before test mode refuses more
    pub max_trades: u32,
}

impl Default for TestModeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            trade_ceiling: dec!(100),
            max_trades: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakerConfig {
    /// Consecutive failures that trip the breaker
    pub failure_threshold: u32,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
        }
    }
}

/// Main configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub test_mode: TestModeConfig,
    #[serde(default)]
    pub breaker: BreakerConfig,
    /// Pause between iterations of the guarded trading loop (milliseconds)
    #[serde(default = "default_loop_interval_ms")]
    pub loop_interval_ms: u64,
    /// Path to audit log file
    #[serde(default)]
    pub audit_log_path: Option<String>,
}

fn default_loop_interval_ms() -> u64 {
    30_000
}

impl Default for Config {
    fn default() -> Self {
        Self {
            limits: LimitsConfig::default(),
            test_mode: TestModeConfig::default(),
            breaker: BreakerConfig::default(),
            loop_interval_ms: default_loop_interval_ms(),
            audit_log_path: Some("guard-audit.jsonl".to_string()),
        }
    }
}

impl Config {
    /// Load configuration
    ///
    /// Starts from the JSON file at `path` (or defaults), overlays `TX_GUARD_*`
    /// environment variables, then validates the result.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let content = std::fs::read_to_string(path).map_err(|e| {
                    Error::Config(format!("Failed to read {}: {}", path.display(), e))
                })?;
                serde_json::from_str(&content)
                    .map_err(|e| Error::Config(format!("Invalid config file: {}", e)))?
            }
            None => Config::default(),
        };

        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.limits.validate()?;
        if self.breaker.failure_threshold == 0 {
            return Err(Error::Config(
                "failure_threshold must be greater than zero".to_string(),
            ));
        }
        if self.test_mode.trade_ceiling.is_sign_negative() {
            return Err(Error::Config(
                "test_mode.trade_ceiling must not be negative".to_string(),
            ));
        }
        Ok(())
    }
}

/// Reject strings that are not a 20-byte hex address.
///
/// Only the format is checked; the string itself is stored untouched because
/// allow-list membership is an exact, case-sensitive comparison.
pub fn check_address(value: &str) -> Result<()> {
    Address::from_str(value)
        .map(|_| ())
        .map_err(|e| Error::Config(format!("Invalid counterparty address {}: {}", value, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const ROUTER: &str = "0xE592427A0AEce92De3Edee1F18E0157C05861564";

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert!(config.test_mode.enabled);
        assert_eq!(config.breaker.failure_threshold, 3);
    }

    #[test]
    fn partial_file_falls_back_to_defaults() {
        let value = serde_json::json!({
            "limits": {
                "max_slippage_bps": 30,
                "max_gas_price_units": 1000,
                "production_trade_ceiling": "2500",
                "authorized_counterparties": [ROUTER]
            }
        });
        let parsed: Config = serde_json::from_str(&value.to_string()).expect("parse config");
        assert_eq!(parsed.limits.max_slippage_bps, 30);
        assert_eq!(parsed.limits.production_trade_ceiling, dec!(2500));
        assert_eq!(parsed.test_mode, TestModeConfig::default());
        assert_eq!(parsed.loop_interval_ms, 30_000);
        assert!(parsed.validate().is_ok());
    }

    #[test]
    fn rejects_out_of_range_values() {
        let mut config = Config::default();
        config.limits.max_slippage_bps = 10_001;
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let mut config = Config::default();
        config.breaker.failure_threshold = 0;
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let mut config = Config::default();
        config.test_mode.trade_ceiling = dec!(-1);
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn rejects_malformed_counterparty() {
        let mut config = Config::default();
        config.limits.authorized_counterparties = vec!["0x1234".to_string()];
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn keeps_counterparty_case_as_given() {
        let lower = ROUTER.to_lowercase();
        assert!(check_address(&lower).is_ok());

        let mut config = Config::default();
        config.limits.authorized_counterparties = vec![lower.clone()];
        assert!(config.validate().is_ok());
        assert_eq!(config.limits.authorized_counterparties[0], lower);
    }

    #[test]
    fn loads_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"test_mode": {{"enabled": false, "trade_ceiling": "50", "max_trades": 2}}}}"#
        )
        .unwrap();

        let config = Config::load(Some(file.path())).expect("load config");
        assert!(!config.test_mode.enabled);
        assert_eq!(config.test_mode.max_trades, 2);
    }

    #[test]
    fn missing_file_is_config_error() {
        let result = Config::load(Some(Path::new("/nonexistent/tx-guard.json")));
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
