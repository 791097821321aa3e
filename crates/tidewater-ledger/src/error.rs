use std::time::Duration;

use crate::types::TxStatus;

/// Errors surfaced by the ledger gateway.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// The account does not exist on the ledger (unfunded).
    #[error("account not found: {0}")]
    AccountNotFound(String),

    /// The ledger rejected the transaction at submission.
    #[error("transaction rejected by ledger: {0}")]
    Submit(String),

    #[error("ledger rpc error: {0}")]
    Rpc(String),

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("malformed ledger response: {0}")]
    InvalidResponse(String),
}

/// Errors surfaced by the confirmation poller.
#[derive(Debug, thiserror::Error)]
pub enum PollError {
    /// The deadline passed without a terminal status. The transaction's fate
    /// is unknown: callers must treat it as pending, never as failed.
    #[error("confirmation not observed within {timeout:?} (last status: {last})")]
    Timeout { timeout: Duration, last: TxStatus },

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}
