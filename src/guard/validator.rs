//! Transaction validator
//!
//! Pure predicates over a `TransactionIntent` and the `LimitRegistry`. Only the
//! fields an intent carries are checked; the first violation wins.

use super::limits::LimitRegistry;
use crate::error::RejectionReason;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Attributes of a proposed transaction, all independently optional
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionIntent {
    /// Address the transaction interacts with
    pub counterparty: Option<String>,
    /// Trade value (USD)
    pub amount_usd: Option<Decimal>,
    /// Gas price in the network's smallest pricing unit
    pub gas_price: Option<u128>,
    /// Accepted output shortfall in basis points
    pub slippage_bps: Option<u32>,
}

impl TransactionIntent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_counterparty(mut self, counterparty: impl Into<String>) -> Self {
        self.counterparty = Some(counterparty.into());
        self
    }

    pub fn with_amount_usd(mut self, amount: Decimal) -> Self {
        self.amount_usd = Some(amount);
        self
    }

    pub fn with_gas_price(mut self, gas_price: u128) -> Self {
        self.gas_price = Some(gas_price);
        self
    }

    pub fn with_slippage_bps(mut self, slippage_bps: u32) -> Self {
        self.slippage_bps = Some(slippage_bps);
        self
    }
}

type Check = std::result::Result<(), RejectionReason>;

pub fn check_gas_price(limits: &LimitRegistry, intent: &TransactionIntent) -> Check {
    match intent.gas_price {
        Some(gas_price) if gas_price > limits.max_gas_price_units => {
            Err(RejectionReason::GasPriceExceeded)
        }
        _ => Ok(()),
    }
}

pub fn check_slippage(limits: &LimitRegistry, intent: &TransactionIntent) -> Check {
    match intent.slippage_bps {
        Some(bps) if bps > limits.max_slippage_bps => Err(RejectionReason::SlippageExceeded),
        _ => Ok(()),
    }
}

pub fn check_trade_size(limits: &LimitRegistry, intent: &TransactionIntent) -> Check {
    match intent.amount_usd {
        Some(amount) if amount > limits.applicable_trade_ceiling() => {
            Err(RejectionReason::TradeSizeExceeded)
        }
        _ => Ok(()),
    }
}

/// Independent of the amount: a spent test budget refuses every intent
pub fn check_test_budget(limits: &LimitRegistry, _intent: &TransactionIntent) -> Check {
    if limits.test_mode.limit_reached() {
        Err(RejectionReason::TestLimitReached)
    } else {
        Ok(())
    }
}

pub fn check_counterparty(limits: &LimitRegistry, intent: &TransactionIntent) -> Check {
    match &intent.counterparty {
        Some(counterparty) if !limits.is_authorized(counterparty) => {
            Err(RejectionReason::UnauthorizedCounterparty)
        }
        _ => Ok(()),
    }
}

/// Run every check in order, stopping at the first violation
pub fn validate(limits: &LimitRegistry, intent: &TransactionIntent) -> Check {
    check_gas_price(limits, intent)?;
    check_slippage(limits, intent)?;
    check_trade_size(limits, intent)?;
    check_test_budget(limits, intent)?;
    check_counterparty(limits, intent)
}
