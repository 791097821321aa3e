use tidewater_core::{AgreementId, CoreError, Drops};
use tidewater_ledger::GatewayError;

/// Settlement-layer errors.
#[derive(Debug, thiserror::Error)]
pub enum SettlementError {
    #[error("unknown agreement: {0}")]
    UnknownAgreement(AgreementId),

    #[error("agreement already registered: {0}")]
    AlreadyExists(AgreementId),

    /// The plan was computed against recovery state that has since moved;
    /// the caller must re-preview.
    #[error("stale recovery state: plan computed at {planned}, ledger now at {current}")]
    StaleState { planned: Drops, current: Drops },

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("state store error: {0}")]
    Store(String),
}
