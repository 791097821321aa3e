/// Core engine errors.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("invalid financing terms: {0}")]
    InvalidTerms(String),

    #[error("invalid account address: {0}")]
    InvalidAccount(String),

    #[error("amount overflow: {0}")]
    Overflow(String),
}
