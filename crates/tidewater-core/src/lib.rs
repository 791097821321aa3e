//! Tidewater Core
//!
//! Shared money and identifier types, per-agreement recovery state, and the
//! pure waterfall distribution calculator. All monetary values are exact
//! fixed-point (`Drops`, the ledger's minor unit) — no floating point touches
//! the settlement math.

pub mod error;
pub mod types;
pub mod waterfall;

pub use error::CoreError;
pub use types::{
    AccountId, AgreementConfig, AgreementId, DistributionPlan, Drops, RecoveryState,
    SettlementRequest, SettlementResult, SettlementStatus, TxRef,
};
