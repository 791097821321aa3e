//! Tidewater Ledger Boundary
//!
//! The `LedgerGateway` trait is the engine's only I/O surface to the external
//! ledger: balance reads, transaction submission, and status lookups. The
//! `ConfirmationPoller` waits for asynchronous finality with bounded retries.
//! Adapters bridge the trait to a real JSON-RPC ledger node and to an
//! in-memory mock with a programmable distribution point.

pub mod adapters;
pub mod error;
pub mod poller;
pub mod traits;
pub mod types;

pub use error::{GatewayError, PollError};
pub use poller::{await_finality, await_terminal, PollPolicy};
pub use traits::LedgerGateway;
pub use types::{PaymentTx, TxStatus};
