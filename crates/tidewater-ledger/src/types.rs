use serde::{Deserialize, Serialize};
use std::fmt;

use tidewater_core::{AccountId, Drops};

/// A payment to be submitted to the ledger.
///
/// Signing is an external concern: adapters that talk to a real ledger
/// require `signed_blob` (produced by the caller's wallet); the in-memory
/// adapter settles directly from the fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentTx {
    pub source: AccountId,
    pub destination: AccountId,
    pub amount: Drops,
    pub signed_blob: Option<String>,
    pub memo: Option<String>,
}

impl PaymentTx {
    pub fn new(source: AccountId, destination: AccountId, amount: Drops) -> Self {
        Self {
            source,
            destination,
            amount,
            signed_blob: None,
            memo: None,
        }
    }

    pub fn with_memo(mut self, memo: impl Into<String>) -> Self {
        self.memo = Some(memo.into());
        self
    }

    pub fn with_signed_blob(mut self, blob: impl Into<String>) -> Self {
        self.signed_blob = Some(blob.into());
        self
    }
}

/// Status of a submitted transaction as reported by the ledger.
///
/// `NotFound` is not a failure: the ledger may simply not have seen the
/// transaction yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxStatus {
    NotFound,
    Pending,
    /// Validated with a success engine-result code.
    Success { code: String },
    /// Validated with a definitive failure code.
    Failed { code: String },
}

impl TxStatus {
    /// Whether the ledger's verdict is final.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success { .. } | Self::Failed { .. })
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

impl fmt::Display for TxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "NotFound"),
            Self::Pending => write!(f, "Pending"),
            Self::Success { code } => write!(f, "Success({})", code),
            Self::Failed { code } => write!(f, "Failed({})", code),
        }
    }
}
