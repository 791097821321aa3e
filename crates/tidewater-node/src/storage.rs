//! RocksDB-backed durable store for agreement records.

use std::path::Path;

use anyhow::Result;
use async_trait::async_trait;
use rocksdb::{ColumnFamilyDescriptor, IteratorMode, Options, DB};

use tidewater_settlement::{PersistedAgreement, SettlementError, StateStore};

const CF_AGREEMENTS: &str = "agreements";

/// RocksDB persistence for recovery state.
///
/// One JSON document per agreement, keyed by agreement id. `recovered` is
/// the financially authoritative value, so every commit is written through
/// before the settlement result is returned.
pub struct RocksStore {
    db: DB,
}

impl RocksStore {
    /// Open or create the database at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        std::fs::create_dir_all(path)?;

        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors = vec![ColumnFamilyDescriptor::new(
            CF_AGREEMENTS,
            Options::default(),
        )];
        let db = DB::open_cf_descriptors(&opts, path, cf_descriptors)?;
        Ok(Self { db })
    }

    fn cf(&self) -> Result<&rocksdb::ColumnFamily, SettlementError> {
        self.db
            .cf_handle(CF_AGREEMENTS)
            .ok_or_else(|| SettlementError::Store("column family 'agreements' not found".into()))
    }
}

#[async_trait]
impl StateStore for RocksStore {
    async fn persist(&self, record: &PersistedAgreement) -> Result<(), SettlementError> {
        let key = record.config.agreement_id.to_string();
        let value = serde_json::to_vec(record)
            .map_err(|e| SettlementError::Store(e.to_string()))?;
        self.db
            .put_cf(self.cf()?, key.as_bytes(), value)
            .map_err(|e| SettlementError::Store(e.to_string()))
    }

    async fn load_all(&self) -> Result<Vec<PersistedAgreement>, SettlementError> {
        let mut records = Vec::new();
        for item in self.db.iterator_cf(self.cf()?, IteratorMode::Start) {
            let (_, value) = item.map_err(|e| SettlementError::Store(e.to_string()))?;
            let record: PersistedAgreement = serde_json::from_slice(&value)
                .map_err(|e| SettlementError::Store(e.to_string()))?;
            records.push(record);
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tidewater_core::{AccountId, AgreementConfig, AgreementId, Drops, RecoveryState, TxRef};

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("tidewater-test-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn record(id: AgreementId) -> PersistedAgreement {
        let config = AgreementConfig {
            agreement_id: id,
            principal: Drops::from_xrp(400),
            interest_rate_bps: 2_500,
            senior_account: AccountId::new("rKm3UyP7TfeGHsNwqKauKb1DAQ7Yitd3vw").unwrap(),
            junior_account: AccountId::new("rw2UaYq5Z7bK3pL9mN4vD8sF6jR1eT2cX5").unwrap(),
            distribution_account: AccountId::new("rBVEchNr4DzKAwZcaAs3N6MWrLCp5FHBZZ").unwrap(),
        };
        let state = RecoveryState::new(id, config.principal, config.interest_rate_bps).unwrap();
        PersistedAgreement {
            config,
            state,
            committed_txs: vec![TxRef::new("TX1")],
        }
    }

    #[tokio::test]
    async fn test_open_storage() {
        let dir = temp_dir();
        assert!(RocksStore::open(&dir).is_ok());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_persist_and_load() {
        let dir = temp_dir();
        let store = RocksStore::open(&dir).unwrap();

        let id = AgreementId::new();
        store.persist(&record(id)).await.unwrap();

        let records = store.load_all().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].config.agreement_id, id);
        assert_eq!(records[0].state.target, Drops::from_xrp(500));
        assert_eq!(records[0].committed_txs, vec![TxRef::new("TX1")]);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_persist_overwrites() {
        let dir = temp_dir();
        let store = RocksStore::open(&dir).unwrap();

        let id = AgreementId::new();
        let mut rec = record(id);
        store.persist(&rec).await.unwrap();

        rec.state.recovered = Drops::from_xrp(250);
        rec.committed_txs.push(TxRef::new("TX2"));
        store.persist(&rec).await.unwrap();

        let records = store.load_all().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].state.recovered, Drops::from_xrp(250));
        assert_eq!(records[0].committed_txs.len(), 2);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_load_empty() {
        let dir = temp_dir();
        let store = RocksStore::open(&dir).unwrap();
        assert!(store.load_all().await.unwrap().is_empty());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_survives_reopen() {
        let dir = temp_dir();
        let id = AgreementId::new();
        {
            let store = RocksStore::open(&dir).unwrap();
            store.persist(&record(id)).await.unwrap();
        }
        let store = RocksStore::open(&dir).unwrap();
        let records = store.load_all().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].config.agreement_id, id);
        std::fs::remove_dir_all(&dir).ok();
    }
}
