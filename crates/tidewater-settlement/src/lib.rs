//! Tidewater Settlement Engine
//!
//! `RecoveryLedger` is the authoritative record of senior recovery per
//! financing agreement; `SettlementOrchestrator` drives each payment through
//! submission, asynchronous confirmation, and reconciliation of predicted
//! against observed transfers.

pub mod error;
pub mod ledger;
pub mod orchestrator;
pub mod store;

pub use error::SettlementError;
pub use ledger::RecoveryLedger;
pub use orchestrator::{SettlementOrchestrator, SettlementPolicy};
pub use store::{InMemoryStore, PersistedAgreement, StateStore};
