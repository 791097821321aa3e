//! Authoritative per-agreement recovery state.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use tidewater_core::{
    waterfall, AgreementConfig, AgreementId, DistributionPlan, Drops, RecoveryState, TxRef,
};

use crate::error::SettlementError;
use crate::store::{PersistedAgreement, StateStore};

struct AgreementEntry {
    config: AgreementConfig,
    state: RecoveryState,
    committed_txs: HashSet<TxRef>,
}

impl AgreementEntry {
    fn to_record(&self) -> PersistedAgreement {
        PersistedAgreement {
            config: self.config.clone(),
            state: self.state.clone(),
            committed_txs: self.committed_txs.iter().cloned().collect(),
        }
    }
}

/// Holds one `RecoveryState` per financing agreement, write-through to a
/// durable `StateStore`.
///
/// Commits are guarded two ways: an optimistic concurrency check against the
/// `recovered` value the plan was computed from, and a replay guard on the
/// source transaction reference. Callers serialize commits per agreement
/// (the orchestrator's per-agreement lock); different agreements are fully
/// independent.
pub struct RecoveryLedger {
    entries: DashMap<AgreementId, AgreementEntry>,
    store: Arc<dyn StateStore>,
}

impl RecoveryLedger {
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self {
            entries: DashMap::new(),
            store,
        }
    }

    /// Rehydrate from the durable store at startup.
    pub async fn load(store: Arc<dyn StateStore>) -> Result<Self, SettlementError> {
        let ledger = Self::new(store.clone());
        for record in store.load_all().await? {
            let id = record.config.agreement_id;
            ledger.entries.insert(
                id,
                AgreementEntry {
                    config: record.config,
                    state: record.state,
                    committed_txs: record.committed_txs.into_iter().collect(),
                },
            );
        }
        tracing::info!(agreements = ledger.entries.len(), "recovery ledger loaded");
        Ok(ledger)
    }

    /// Register a new agreement, deriving its initial recovery state from
    /// the financing terms.
    pub async fn register(
        &self,
        config: AgreementConfig,
    ) -> Result<RecoveryState, SettlementError> {
        let id = config.agreement_id;
        let state = RecoveryState::new(id, config.principal, config.interest_rate_bps)?;

        let record = match self.entries.entry(id) {
            Entry::Occupied(_) => return Err(SettlementError::AlreadyExists(id)),
            Entry::Vacant(vacant) => {
                let entry = AgreementEntry {
                    config,
                    state: state.clone(),
                    committed_txs: HashSet::new(),
                };
                let record = entry.to_record();
                vacant.insert(entry);
                record
            }
        };

        self.store.persist(&record).await?;
        tracing::info!(
            agreement_id = %id,
            principal = %state.principal,
            target = %state.target,
            "agreement registered"
        );
        Ok(state)
    }

    pub fn get(&self, id: &AgreementId) -> Result<RecoveryState, SettlementError> {
        self.entries
            .get(id)
            .map(|e| e.state.clone())
            .ok_or(SettlementError::UnknownAgreement(*id))
    }

    pub fn config(&self, id: &AgreementId) -> Result<AgreementConfig, SettlementError> {
        self.entries
            .get(id)
            .map(|e| e.config.clone())
            .ok_or(SettlementError::UnknownAgreement(*id))
    }

    /// Dry-run the waterfall against current state; never mutates.
    pub fn preview(
        &self,
        id: &AgreementId,
        amount: Drops,
    ) -> Result<DistributionPlan, SettlementError> {
        let state = self.get(id)?;
        Ok(waterfall::plan(amount, state.recovered, state.target)?)
    }

    /// Whether a commit was already recorded against this source transaction.
    pub fn is_committed(&self, id: &AgreementId, tx_ref: &TxRef) -> Result<bool, SettlementError> {
        self.entries
            .get(id)
            .map(|e| e.committed_txs.contains(tx_ref))
            .ok_or(SettlementError::UnknownAgreement(*id))
    }

    /// Apply a plan to the recovery state.
    ///
    /// Rejects with `StaleState` if `recovered` has moved since the plan was
    /// computed. A replayed commit for an already-recorded `source_tx` is an
    /// idempotent no-op returning the current state. The new recovered value
    /// is clamped at the target so the ledger invariant holds even for plans
    /// rebuilt from observed reality.
    pub async fn commit(
        &self,
        id: &AgreementId,
        plan: &DistributionPlan,
        source_tx: &TxRef,
    ) -> Result<RecoveryState, SettlementError> {
        let (state, record) = {
            let mut entry = self
                .entries
                .get_mut(id)
                .ok_or(SettlementError::UnknownAgreement(*id))?;

            if entry.committed_txs.contains(source_tx) {
                tracing::debug!(
                    agreement_id = %id,
                    source_tx = %source_tx,
                    "replayed commit ignored"
                );
                return Ok(entry.state.clone());
            }
            if entry.state.recovered != plan.recovered_before {
                return Err(SettlementError::StaleState {
                    planned: plan.recovered_before,
                    current: entry.state.recovered,
                });
            }

            entry.state.recovered = plan.new_recovered.min(entry.state.target);
            if entry.state.fully_recovered() && entry.state.recovered_at.is_none() {
                entry.state.recovered_at = Some(Utc::now());
                tracing::info!(agreement_id = %id, "senior claim fully recovered");
            }
            entry.committed_txs.insert(source_tx.clone());
            (entry.state.clone(), entry.to_record())
        };

        self.store.persist(&record).await?;
        tracing::info!(
            agreement_id = %id,
            recovered = %state.recovered,
            source_tx = %source_tx,
            "recovery state committed"
        );
        Ok(state)
    }
}
