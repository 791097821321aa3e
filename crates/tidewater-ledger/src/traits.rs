use async_trait::async_trait;

use tidewater_core::{AccountId, Drops, TxRef};

use crate::error::GatewayError;
use crate::types::{PaymentTx, TxStatus};

/// Read/write boundary to the external ledger.
///
/// Pure I/O — no business logic lives behind this trait. `submit` returning
/// `Ok` means the ledger accepted the transaction for processing; the engine
/// never assumes synchronous finality and always confirms through
/// `tx_status`.
#[async_trait]
pub trait LedgerGateway: Send + Sync {
    /// Balance of an account in drops, from the last validated ledger.
    ///
    /// An unfunded account is reported as `GatewayError::AccountNotFound`,
    /// distinguished from transport failures.
    async fn balance(&self, account: &AccountId) -> Result<Drops, GatewayError>;

    /// Submit a payment, returning its transaction reference.
    async fn submit(&self, tx: &PaymentTx) -> Result<TxRef, GatewayError>;

    /// Look up the status of a previously submitted transaction.
    async fn tx_status(&self, tx_ref: &TxRef) -> Result<TxStatus, GatewayError>;
}
