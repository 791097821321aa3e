//! Gateway adapters for concrete ledger backends.

pub mod jsonrpc;
pub mod mock;

pub use jsonrpc::JsonRpcGateway;
pub use mock::{DistributionHook, MockLedger};
