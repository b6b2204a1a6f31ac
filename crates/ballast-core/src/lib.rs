//! Ballast core: the collateral-ratio-driven fee and settlement
//! accounting engine.
//!
//! Everything here is deterministic and synchronous. Token mechanics,
//! position bookkeeping and oracle plumbing live behind the traits in
//! [`ledger`] and [`oracle`]; the engine computes exact, order-independent,
//! overflow-safe distributions and leaves the moving of value to those
//! collaborators.

pub mod accrual;
pub mod auth;
pub mod curve;
pub mod error;
pub mod events;
pub mod fees;
pub mod invariants;
pub mod ledger;
pub mod math;
pub mod oracle;
pub mod settlement;
pub mod types;

pub use error::{ProtocolError, Result};
