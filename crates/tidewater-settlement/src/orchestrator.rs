//! Settlement orchestration: submission, confirmation, reconciliation.
//!
//! The plan drives transaction construction, but observed balances are
//! always the source of durable state. That ordering protects the recovery
//! ledger against partial execution, double counting, and interference with
//! the distribution point.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use tidewater_core::{
    AgreementConfig, AgreementId, CoreError, DistributionPlan, Drops, RecoveryState,
    SettlementRequest, SettlementResult, SettlementStatus, TxRef,
};
use tidewater_ledger::{
    await_finality, GatewayError, LedgerGateway, PaymentTx, PollError, PollPolicy,
};

use crate::error::SettlementError;
use crate::ledger::RecoveryLedger;

/// Confirmation and reconciliation policy.
///
/// The distribution point's onward transfers are not addressable by hash up
/// front, so reconciliation watches claimant balances inside a bounded,
/// configurable window. Best-effort within the window.
#[derive(Debug, Clone, Copy)]
pub struct SettlementPolicy {
    /// Source-transaction confirmation polling.
    pub poll: PollPolicy,
    /// Bounded wait for the distribution point's onward transfers.
    pub distribution_wait: Duration,
    /// Balance probe cadence inside the wait window.
    pub probe_interval: Duration,
    /// Absolute tolerance when matching observed deltas against the plan.
    pub tolerance: Drops,
}

impl Default for SettlementPolicy {
    fn default() -> Self {
        Self {
            poll: PollPolicy::default(),
            distribution_wait: Duration::from_secs(10),
            probe_interval: Duration::from_millis(500),
            tolerance: Drops(10_000),
        }
    }
}

/// A submitted settlement that has not reached a terminal outcome.
///
/// Baselines and the plan are pinned at first submission so a retried
/// request reconciles against the balances captured before that submission.
#[derive(Clone)]
struct Inflight {
    source_tx: TxRef,
    plan: DistributionPlan,
    senior_before: Drops,
    junior_before: Drops,
}

/// Drives one payment through the full settlement lifecycle.
///
/// Settlements for different agreements proceed fully in parallel;
/// settlements for the same agreement queue on a per-agreement lock so
/// commits never interleave. Retry bookkeeping (`inflight`, `completed`) is
/// process-lifetime; replay protection for committed settlements is also
/// persisted by the recovery ledger.
pub struct SettlementOrchestrator {
    gateway: Arc<dyn LedgerGateway>,
    ledger: Arc<RecoveryLedger>,
    policy: SettlementPolicy,
    locks: DashMap<AgreementId, Arc<Mutex<()>>>,
    inflight: DashMap<Uuid, Inflight>,
    completed: DashMap<Uuid, SettlementResult>,
}

impl SettlementOrchestrator {
    pub fn new(
        gateway: Arc<dyn LedgerGateway>,
        ledger: Arc<RecoveryLedger>,
        policy: SettlementPolicy,
    ) -> Self {
        Self {
            gateway,
            ledger,
            policy,
            locks: DashMap::new(),
            inflight: DashMap::new(),
            completed: DashMap::new(),
        }
    }

    pub async fn register_agreement(
        &self,
        config: AgreementConfig,
    ) -> Result<RecoveryState, SettlementError> {
        self.ledger.register(config).await
    }

    pub fn recovery_state(&self, id: &AgreementId) -> Result<RecoveryState, SettlementError> {
        self.ledger.get(id)
    }

    pub fn agreement_config(&self, id: &AgreementId) -> Result<AgreementConfig, SettlementError> {
        self.ledger.config(id)
    }

    /// Dry-run the waterfall for an agreement; never mutates.
    pub fn preview(
        &self,
        id: &AgreementId,
        amount: Drops,
    ) -> Result<DistributionPlan, SettlementError> {
        self.ledger.preview(id, amount)
    }

    /// Settle one incoming gross payment.
    ///
    /// Idempotent under retry: replaying a completed request returns the
    /// recorded result, and replaying a pending one resumes confirmation of
    /// the already-submitted transaction instead of resubmitting.
    pub async fn settle(
        &self,
        agreement_id: AgreementId,
        request: SettlementRequest,
    ) -> Result<SettlementResult, SettlementError> {
        let lock = {
            let entry = self.locks.entry(agreement_id).or_default();
            entry.value().clone()
        };
        let _guard = lock.lock().await;

        if let Some(result) = self.completed.get(&request.request_id) {
            tracing::info!(
                agreement_id = %agreement_id,
                request_id = %request.request_id,
                "replayed settlement request; returning recorded result"
            );
            return Ok(result.value().clone());
        }

        if request.amount.is_zero() {
            return Err(CoreError::InvalidAmount("payment amount must be positive".into()).into());
        }
        let config = self.ledger.config(&agreement_id)?;

        let inflight = match self.inflight.get(&request.request_id) {
            Some(entry) => {
                let inflight = entry.value().clone();
                drop(entry);
                tracing::info!(
                    agreement_id = %agreement_id,
                    request_id = %request.request_id,
                    source_tx = %inflight.source_tx,
                    "resuming confirmation of previously submitted transaction"
                );
                inflight
            }
            None => {
                let plan = self.ledger.preview(&agreement_id, request.amount)?;
                tracing::info!(
                    agreement_id = %agreement_id,
                    request_id = %request.request_id,
                    amount = %request.amount,
                    to_senior = %plan.to_senior,
                    to_junior = %plan.to_junior,
                    "settlement planned"
                );

                // Baselines for the post-confirmation delta comparison.
                let senior_before = self.balance_or_zero(&config.senior_account).await?;
                let junior_before = self.balance_or_zero(&config.junior_account).await?;

                let tx = PaymentTx::new(
                    request.source.clone(),
                    request.sink.clone(),
                    request.amount,
                )
                .with_memo(format!("voyage payment {}", request.request_id));

                let source_tx = match self.gateway.submit(&tx).await {
                    Ok(tx_ref) => tx_ref,
                    Err(err) => {
                        tracing::error!(
                            agreement_id = %agreement_id,
                            request_id = %request.request_id,
                            error = %err,
                            "submission rejected; no state mutated"
                        );
                        return Ok(build_result(
                            &request,
                            agreement_id,
                            plan,
                            None,
                            SettlementStatus::Failed,
                            None,
                            None,
                            Drops::ZERO,
                        ));
                    }
                };

                let inflight = Inflight {
                    source_tx,
                    plan,
                    senior_before,
                    junior_before,
                };
                self.inflight.insert(request.request_id, inflight.clone());
                inflight
            }
        };

        let result = self
            .confirm_and_reconcile(agreement_id, &config, &request, &inflight)
            .await?;

        if result.status != SettlementStatus::Pending {
            self.inflight.remove(&request.request_id);
            self.completed.insert(request.request_id, result.clone());
        }
        Ok(result)
    }

    /// Await source-transaction finality, then reconcile the distribution
    /// point's onward transfers against the plan.
    async fn confirm_and_reconcile(
        &self,
        agreement_id: AgreementId,
        config: &AgreementConfig,
        request: &SettlementRequest,
        inflight: &Inflight,
    ) -> Result<SettlementResult, SettlementError> {
        match await_finality(&*self.gateway, &inflight.source_tx, self.policy.poll).await {
            Ok(status) if status.is_success() => {}
            Ok(status) => {
                tracing::error!(
                    agreement_id = %agreement_id,
                    source_tx = %inflight.source_tx,
                    status = %status,
                    "source transaction failed on-ledger; no state mutated"
                );
                return Ok(build_result(
                    request,
                    agreement_id,
                    inflight.plan,
                    Some(inflight.source_tx.clone()),
                    SettlementStatus::Failed,
                    None,
                    None,
                    Drops::ZERO,
                ));
            }
            Err(PollError::Timeout { .. }) => {
                tracing::warn!(
                    agreement_id = %agreement_id,
                    source_tx = %inflight.source_tx,
                    "confirmation timed out; settlement left pending for retry"
                );
                return Ok(build_result(
                    request,
                    agreement_id,
                    inflight.plan,
                    Some(inflight.source_tx.clone()),
                    SettlementStatus::Pending,
                    None,
                    None,
                    Drops::ZERO,
                ));
            }
            Err(PollError::Gateway(err)) => return Err(err.into()),
        }

        let (actual_senior, actual_junior, matched) =
            self.watch_distribution(config, inflight).await?;
        let discrepancy = actual_senior
            .abs_diff(inflight.plan.to_senior)
            .checked_add(actual_junior.abs_diff(inflight.plan.to_junior))?;

        if matched {
            self.commit_with_retry(
                &agreement_id,
                inflight.plan,
                &inflight.source_tx,
                inflight.plan.to_senior,
            )
            .await?;
            tracing::info!(
                agreement_id = %agreement_id,
                request_id = %request.request_id,
                source_tx = %inflight.source_tx,
                to_senior = %actual_senior,
                to_junior = %actual_junior,
                "settlement confirmed"
            );
            return Ok(build_result(
                request,
                agreement_id,
                inflight.plan,
                Some(inflight.source_tx.clone()),
                SettlementStatus::Confirmed,
                Some(actual_senior),
                Some(actual_junior),
                discrepancy,
            ));
        }

        // Observed transfers diverge from the plan: commit on-ledger reality,
        // not the prediction, and surface the discrepancy for alerting.
        tracing::warn!(
            agreement_id = %agreement_id,
            request_id = %request.request_id,
            source_tx = %inflight.source_tx,
            expected_senior = %inflight.plan.to_senior,
            actual_senior = %actual_senior,
            expected_junior = %inflight.plan.to_junior,
            actual_junior = %actual_junior,
            discrepancy = %discrepancy,
            "distribution mismatch; committing observed amounts"
        );
        let state = self.ledger.get(&agreement_id)?;
        let observed = DistributionPlan {
            to_senior: actual_senior,
            to_junior: actual_junior,
            recovered_before: inflight.plan.recovered_before,
            new_recovered: inflight
                .plan
                .recovered_before
                .checked_add(actual_senior)?
                .min(state.target),
        };
        self.commit_with_retry(&agreement_id, observed, &inflight.source_tx, actual_senior)
            .await?;

        Ok(build_result(
            request,
            agreement_id,
            inflight.plan,
            Some(inflight.source_tx.clone()),
            SettlementStatus::Mismatched,
            Some(actual_senior),
            Some(actual_junior),
            discrepancy,
        ))
    }

    /// Probe claimant balances until both deltas match the plan within
    /// tolerance or the bounded wait window elapses.
    async fn watch_distribution(
        &self,
        config: &AgreementConfig,
        inflight: &Inflight,
    ) -> Result<(Drops, Drops, bool), SettlementError> {
        let deadline = tokio::time::Instant::now() + self.policy.distribution_wait;
        loop {
            let senior_after = self.balance_or_zero(&config.senior_account).await?;
            let junior_after = self.balance_or_zero(&config.junior_account).await?;
            let actual_senior = senior_after.saturating_sub(inflight.senior_before);
            let actual_junior = junior_after.saturating_sub(inflight.junior_before);

            let matched = actual_senior.abs_diff(inflight.plan.to_senior)
                <= self.policy.tolerance
                && actual_junior.abs_diff(inflight.plan.to_junior) <= self.policy.tolerance;
            if matched {
                return Ok((actual_senior, actual_junior, true));
            }
            if tokio::time::Instant::now() + self.policy.probe_interval > deadline {
                return Ok((actual_senior, actual_junior, false));
            }
            tokio::time::sleep(self.policy.probe_interval).await;
        }
    }

    /// Commit, retrying once with a rebuilt plan if the state moved since
    /// the preview. The rebuilt plan adds this settlement's observed senior
    /// amount onto the fresh recovery value, clamped at the target.
    async fn commit_with_retry(
        &self,
        id: &AgreementId,
        plan: DistributionPlan,
        source_tx: &TxRef,
        senior_delta: Drops,
    ) -> Result<RecoveryState, SettlementError> {
        match self.ledger.commit(id, &plan, source_tx).await {
            Err(SettlementError::StaleState { current, .. }) => {
                tracing::debug!(
                    agreement_id = %id,
                    current = %current,
                    "plan went stale; re-previewing before commit"
                );
                let fresh = self.ledger.get(id)?;
                let rebuilt = DistributionPlan {
                    to_senior: plan.to_senior,
                    to_junior: plan.to_junior,
                    recovered_before: fresh.recovered,
                    new_recovered: fresh
                        .recovered
                        .checked_add(senior_delta)?
                        .min(fresh.target),
                };
                self.ledger.commit(id, &rebuilt, source_tx).await
            }
            other => other,
        }
    }

    /// Balance read that treats an unfunded account as zero.
    async fn balance_or_zero(&self, account: &tidewater_core::AccountId) -> Result<Drops, SettlementError> {
        match self.gateway.balance(account).await {
            Ok(balance) => Ok(balance),
            Err(GatewayError::AccountNotFound(_)) => Ok(Drops::ZERO),
            Err(err) => Err(err.into()),
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn build_result(
    request: &SettlementRequest,
    agreement_id: AgreementId,
    plan: DistributionPlan,
    source_tx: Option<TxRef>,
    status: SettlementStatus,
    actual_to_senior: Option<Drops>,
    actual_to_junior: Option<Drops>,
    discrepancy: Drops,
) -> SettlementResult {
    let confirmed = matches!(
        status,
        SettlementStatus::Confirmed | SettlementStatus::Mismatched
    );
    SettlementResult {
        request_id: request.request_id,
        agreement_id,
        plan,
        source_tx,
        status,
        actual_to_senior,
        actual_to_junior,
        discrepancy,
        confirmed_at: confirmed.then(Utc::now),
    }
}
