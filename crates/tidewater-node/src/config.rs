//! Node configuration: TOML file with sensible defaults.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use tidewater_core::Drops;
use tidewater_ledger::PollPolicy;
use tidewater_settlement::SettlementPolicy;

/// Configuration for a Tidewater settlement node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Listen address for the HTTP API.
    pub api_listen: String,
    /// Path to the data directory.
    pub data_dir: String,
    /// JSON-RPC endpoint of the ledger node.
    pub ledger_endpoint: String,
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
    /// Confirmation and reconciliation tuning.
    #[serde(default)]
    pub settlement: SettlementConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementConfig {
    pub poll_interval_ms: u64,
    pub poll_timeout_ms: u64,
    /// Bounded wait for the distribution point's onward transfers.
    pub distribution_wait_ms: u64,
    pub probe_interval_ms: u64,
    /// Absolute match tolerance in drops.
    pub tolerance_drops: u64,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            api_listen: "127.0.0.1:8080".into(),
            data_dir: "./data".into(),
            ledger_endpoint: "https://xahau-test.net".into(),
            log_level: "info".into(),
            settlement: SettlementConfig::default(),
        }
    }
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1_000,
            poll_timeout_ms: 60_000,
            distribution_wait_ms: 10_000,
            probe_interval_ms: 500,
            tolerance_drops: 10_000,
        }
    }
}

impl NodeConfig {
    /// Load from a TOML file, or fall back to defaults when no path is
    /// given.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path)?;
                Ok(toml::from_str(&raw)?)
            }
            None => Ok(Self::default()),
        }
    }

    pub fn settlement_policy(&self) -> SettlementPolicy {
        SettlementPolicy {
            poll: PollPolicy {
                interval: Duration::from_millis(self.settlement.poll_interval_ms),
                timeout: Duration::from_millis(self.settlement.poll_timeout_ms),
            },
            distribution_wait: Duration::from_millis(self.settlement.distribution_wait_ms),
            probe_interval: Duration::from_millis(self.settlement.probe_interval_ms),
            tolerance: Drops(self.settlement.tolerance_drops),
        }
    }
}
