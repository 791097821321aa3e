//! In-memory ledger with a programmable distribution point.
//!
//! Close enough to the production rail to drive the settlement engine end to
//! end: submitted transactions become visible and reach finality only across
//! successive status polls, and a payment landing on a distribution account
//! is relayed onward (senior first) by the ledger itself, exactly like the
//! on-ledger hook. Fault injection covers the failure paths the orchestrator
//! must survive: rejected submissions, frozen confirmations, and a skimmed
//! distribution.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;

use tidewater_core::{AccountId, Drops, TxRef};

use crate::error::GatewayError;
use crate::traits::LedgerGateway;
use crate::types::{PaymentTx, TxStatus};

/// Waterfall parameters installed on a distribution account.
///
/// State mirrors the on-ledger hook: the hook tracks its own recovered
/// counter independently of the engine's recovery ledger.
#[derive(Debug, Clone)]
pub struct DistributionHook {
    pub senior: AccountId,
    pub junior: AccountId,
    pub target: Drops,
    pub recovered: Drops,
    /// Fault injection: drops diverted from senior to junior on each relay.
    pub skim: Drops,
}

impl DistributionHook {
    pub fn new(senior: AccountId, junior: AccountId, target: Drops) -> Self {
        Self {
            senior,
            junior,
            target,
            recovered: Drops::ZERO,
            skim: Drops::ZERO,
        }
    }

    pub fn with_skim(mut self, skim: Drops) -> Self {
        self.skim = skim;
        self
    }
}

struct MockTx {
    tx: PaymentTx,
    /// Status lookups still reporting `NotFound` (propagation delay).
    not_found_polls: u32,
    /// Status lookups reporting `Pending` before finality.
    pending_polls: u32,
    applied: bool,
}

/// In-memory `LedgerGateway` for tests and local demo runs.
pub struct MockLedger {
    balances: DashMap<AccountId, u64>,
    txs: DashMap<TxRef, MockTx>,
    hooks: DashMap<AccountId, DistributionHook>,
    not_found_polls: u32,
    pending_polls: u32,
    frozen: AtomicBool,
    fail_submits: AtomicBool,
    seq: AtomicU64,
}

impl MockLedger {
    pub fn new() -> Self {
        Self {
            balances: DashMap::new(),
            txs: DashMap::new(),
            hooks: DashMap::new(),
            not_found_polls: 1,
            pending_polls: 1,
            frozen: AtomicBool::new(false),
            fail_submits: AtomicBool::new(false),
            seq: AtomicU64::new(0),
        }
    }

    /// Override how many status polls a transaction spends invisible and
    /// then pending before finalizing.
    pub fn with_confirmation_delay(mut self, not_found_polls: u32, pending_polls: u32) -> Self {
        self.not_found_polls = not_found_polls;
        self.pending_polls = pending_polls;
        self
    }

    /// Fund an account (creates it if absent).
    pub fn credit(&self, account: &AccountId, amount: Drops) {
        *self.balances.entry(account.clone()).or_insert(0) += amount.0;
    }

    /// Install waterfall relay behavior on an account.
    pub fn install_hook(&self, account: &AccountId, hook: DistributionHook) {
        self.hooks.insert(account.clone(), hook);
    }

    /// While frozen, every submitted transaction polls as `Pending` forever.
    pub fn freeze_confirmations(&self, frozen: bool) {
        self.frozen.store(frozen, Ordering::SeqCst);
    }

    /// While set, every submission is rejected.
    pub fn reject_submissions(&self, reject: bool) {
        self.fail_submits.store(reject, Ordering::SeqCst);
    }

    /// The hook's own recovered counter, if a hook is installed.
    pub fn hook_recovered(&self, account: &AccountId) -> Option<Drops> {
        self.hooks.get(account).map(|h| h.recovered)
    }

    fn next_ref(&self) -> TxRef {
        let n = self.seq.fetch_add(1, Ordering::SeqCst);
        TxRef::new(format!("MOCK{:016X}", n))
    }

    /// Move value for a finalized transaction, then run the destination's
    /// hook if one is installed.
    fn apply(&self, tx: &PaymentTx) {
        if let Some(mut balance) = self.balances.get_mut(&tx.source) {
            *balance = balance.saturating_sub(tx.amount.0);
        }
        self.credit(&tx.destination, tx.amount);
        self.relay(&tx.destination, tx.amount);
    }

    /// Waterfall relay: senior first up to the hook's remaining target,
    /// junior gets the rest. The skim diverts value from senior to junior to
    /// model an interfered distribution point.
    fn relay(&self, account: &AccountId, amount: Drops) {
        let Some(mut hook) = self.hooks.get_mut(account) else {
            return;
        };

        let remaining = hook.target.saturating_sub(hook.recovered);
        let mut to_senior = remaining.min(amount);
        let mut to_junior = Drops(amount.0 - to_senior.0);

        let diverted = hook.skim.min(to_senior);
        to_senior = to_senior.saturating_sub(diverted);
        to_junior = Drops(to_junior.0 + diverted.0);

        hook.recovered = Drops(hook.recovered.0 + to_senior.0);
        let (senior, junior) = (hook.senior.clone(), hook.junior.clone());
        drop(hook);

        if let Some(mut balance) = self.balances.get_mut(account) {
            *balance = balance.saturating_sub(amount.0);
        }
        if !to_senior.is_zero() {
            self.credit(&senior, to_senior);
        }
        if !to_junior.is_zero() {
            self.credit(&junior, to_junior);
        }
        tracing::debug!(
            account = %account,
            to_senior = %to_senior,
            to_junior = %to_junior,
            "mock distribution relay"
        );
    }
}

impl Default for MockLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LedgerGateway for MockLedger {
    async fn balance(&self, account: &AccountId) -> Result<Drops, GatewayError> {
        self.balances
            .get(account)
            .map(|b| Drops(*b))
            .ok_or_else(|| GatewayError::AccountNotFound(account.to_string()))
    }

    async fn submit(&self, tx: &PaymentTx) -> Result<TxRef, GatewayError> {
        if self.fail_submits.load(Ordering::SeqCst) {
            return Err(GatewayError::Submit("telINSUF_FEE_P".into()));
        }
        let funded = self.balances.get(&tx.source).map(|b| *b).unwrap_or(0);
        if funded < tx.amount.0 {
            return Err(GatewayError::Submit("tecUNFUNDED_PAYMENT".into()));
        }

        let tx_ref = self.next_ref();
        self.txs.insert(
            tx_ref.clone(),
            MockTx {
                tx: tx.clone(),
                not_found_polls: self.not_found_polls,
                pending_polls: self.pending_polls,
                applied: false,
            },
        );
        tracing::debug!(tx_ref = %tx_ref, amount = %tx.amount, "mock transaction accepted");
        Ok(tx_ref)
    }

    async fn tx_status(&self, tx_ref: &TxRef) -> Result<TxStatus, GatewayError> {
        let Some(mut entry) = self.txs.get_mut(tx_ref) else {
            return Ok(TxStatus::NotFound);
        };

        if self.frozen.load(Ordering::SeqCst) {
            return Ok(TxStatus::Pending);
        }
        if entry.applied {
            return Ok(TxStatus::Success {
                code: "tesSUCCESS".into(),
            });
        }
        if entry.not_found_polls > 0 {
            entry.not_found_polls -= 1;
            return Ok(TxStatus::NotFound);
        }
        if entry.pending_polls > 0 {
            entry.pending_polls -= 1;
            return Ok(TxStatus::Pending);
        }

        entry.applied = true;
        let tx = entry.tx.clone();
        drop(entry);
        self.apply(&tx);
        Ok(TxStatus::Success {
            code: "tesSUCCESS".into(),
        })
    }
}
