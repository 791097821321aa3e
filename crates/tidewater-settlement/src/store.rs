//! Durable persistence seam for recovery state.

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use tidewater_core::{AgreementConfig, AgreementId, RecoveryState, TxRef};

use crate::error::SettlementError;

/// Everything that must survive a restart for one agreement.
///
/// The committed transaction references travel with the state so replay
/// protection holds across process restarts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedAgreement {
    pub config: AgreementConfig,
    pub state: RecoveryState,
    pub committed_txs: Vec<TxRef>,
}

/// Write-through store for agreement records.
///
/// `recovered` is the financially authoritative value; implementations make
/// `persist` durable before returning.
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn persist(&self, record: &PersistedAgreement) -> Result<(), SettlementError>;
    async fn load_all(&self) -> Result<Vec<PersistedAgreement>, SettlementError>;
}

/// Volatile store for tests and ephemeral demo runs.
#[derive(Default)]
pub struct InMemoryStore {
    records: DashMap<AgreementId, PersistedAgreement>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateStore for InMemoryStore {
    async fn persist(&self, record: &PersistedAgreement) -> Result<(), SettlementError> {
        self.records
            .insert(record.config.agreement_id, record.clone());
        Ok(())
    }

    async fn load_all(&self) -> Result<Vec<PersistedAgreement>, SettlementError> {
        Ok(self.records.iter().map(|r| r.value().clone()).collect())
    }
}
