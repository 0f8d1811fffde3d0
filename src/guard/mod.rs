//! Guarded execution core
//!
//! Everything that submits a transaction goes through here:
//! - `validate` checks an intent against the limit registry
//! - `execute_guarded` wraps the submission with breaker checks and outcome accounting
//! - `snapshot` reports the current risk posture
//! - `arm` / `disarm` / `set_test_mode` are the operator controls

mod breaker;
mod executor;
mod limits;
mod snapshot;
pub mod validator;

pub use breaker::{BreakerState, CircuitBreaker, TripCause};
pub use executor::GuardedCore;
pub use limits::{LimitRegistry, TestModeProfile};
pub use snapshot::{BreakerView, LimitsView, StatusSnapshot, TestModeView};
pub use validator::TransactionIntent;
