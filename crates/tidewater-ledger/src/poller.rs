//! Bounded-retry confirmation polling.
//!
//! Ledger writes reach finality asynchronously; this module waits for a
//! decisive status with a fixed poll interval and an overall deadline.

use std::time::Duration;

use tidewater_core::TxRef;

use crate::error::PollError;
use crate::traits::LedgerGateway;
use crate::types::TxStatus;

/// Fixed-interval polling policy with an overall deadline.
#[derive(Debug, Clone, Copy)]
pub struct PollPolicy {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Poll `tx_ref` until `is_terminal` reports a decisive status or the policy
/// deadline passes.
///
/// `NotFound` is transient — the ledger may not have seen the transaction
/// yet — and is retried up to the deadline. On timeout the transaction's
/// fate is formally unknown: callers must treat the settlement as pending,
/// never as failed. The returned future is cancel-safe; dropping it stops
/// further polling without affecting the already-submitted transaction.
pub async fn await_terminal<F>(
    gateway: &dyn LedgerGateway,
    tx_ref: &TxRef,
    is_terminal: F,
    policy: PollPolicy,
) -> Result<TxStatus, PollError>
where
    F: Fn(&TxStatus) -> bool,
{
    let deadline = tokio::time::Instant::now() + policy.timeout;
    let mut last = TxStatus::NotFound;

    loop {
        let status = gateway.tx_status(tx_ref).await?;
        match &status {
            TxStatus::NotFound => {
                tracing::trace!(tx_ref = %tx_ref, "transaction not yet visible, retrying");
            }
            s if is_terminal(s) => {
                tracing::debug!(tx_ref = %tx_ref, status = %status, "terminal status observed");
                return Ok(status);
            }
            _ => {}
        }
        last = status;

        if tokio::time::Instant::now() + policy.interval > deadline {
            tracing::warn!(
                tx_ref = %tx_ref,
                timeout_ms = policy.timeout.as_millis() as u64,
                last = %last,
                "confirmation polling timed out"
            );
            return Err(PollError::Timeout {
                timeout: policy.timeout,
                last,
            });
        }
        tokio::time::sleep(policy.interval).await;
    }
}

/// Await ledger finality: validated success or a definitive failure code.
pub async fn await_finality(
    gateway: &dyn LedgerGateway,
    tx_ref: &TxRef,
    policy: PollPolicy,
) -> Result<TxStatus, PollError> {
    await_terminal(gateway, tx_ref, TxStatus::is_terminal, policy).await
}
