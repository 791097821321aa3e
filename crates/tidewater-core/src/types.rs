use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::CoreError;
use crate::waterfall;

/// Drops per whole XRP — the ledger's fixed minor-unit divisor.
pub const DROPS_PER_XRP: u64 = 1_000_000;

/// Value in drops, the ledger's minor unit.
///
/// All settlement arithmetic is integer arithmetic on this type; fractional
/// XRP never appears anywhere in the engine.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Drops(pub u64);

impl Drops {
    pub const ZERO: Drops = Drops(0);

    /// Convert a whole-XRP value to drops.
    pub fn from_xrp(xrp: u64) -> Self {
        Self(xrp.saturating_mul(DROPS_PER_XRP))
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checked addition; errors instead of wrapping.
    pub fn checked_add(self, other: Self) -> Result<Self, CoreError> {
        self.0
            .checked_add(other.0)
            .map(Drops)
            .ok_or_else(|| CoreError::Overflow(format!("{} + {}", self.0, other.0)))
    }

    /// Subtraction clamped at zero.
    pub fn saturating_sub(self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0))
    }

    /// Absolute difference.
    pub fn abs_diff(self, other: Self) -> Self {
        Self(self.0.abs_diff(other.0))
    }
}

impl fmt::Display for Drops {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{:06} XRP",
            self.0 / DROPS_PER_XRP,
            self.0 % DROPS_PER_XRP
        )
    }
}

/// Classic ledger account address (r-address).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(String);

impl AccountId {
    /// Validate and wrap an account address.
    pub fn new(address: impl Into<String>) -> Result<Self, CoreError> {
        let address = address.into();
        if !Self::is_valid(&address) {
            return Err(CoreError::InvalidAccount(address));
        }
        Ok(Self(address))
    }

    /// Addresses start with 'r', are 25-35 characters, base58 alphabet.
    fn is_valid(address: &str) -> bool {
        if !address.starts_with('r') || !(25..=35).contains(&address.len()) {
            return false;
        }
        address[1..]
            .chars()
            .all(|c| c.is_ascii_alphanumeric() && !matches!(c, '0' | 'O' | 'I' | 'l'))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a financing agreement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AgreementId(pub Uuid);

impl AgreementId {
    /// Create a new random agreement ID (UUID v7 — time-ordered).
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for AgreementId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AgreementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Reference to a submitted ledger transaction (transaction hash).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxRef(String);

impl TxRef {
    pub fn new(hash: impl Into<String>) -> Self {
        Self(hash.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TxRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Per-agreement configuration supplied at registration.
///
/// Everything the orchestrator needs to settle payments for one financing
/// agreement — there is no process-wide wallet configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgreementConfig {
    pub agreement_id: AgreementId,
    /// Senior principal advanced to the borrower.
    pub principal: Drops,
    /// Interest in basis points (250 = 2.5%).
    pub interest_rate_bps: u32,
    /// Senior claimant (investor) account — paid first.
    pub senior_account: AccountId,
    /// Junior claimant (shipowner) account — paid the residual.
    pub junior_account: AccountId,
    /// Distribution point: receives gross payments and relays the split.
    pub distribution_account: AccountId,
}

/// Senior-claimant recovery progress for one financing agreement.
///
/// `recovered` is the financially authoritative value: it advances only after
/// a settlement's on-ledger effect has been observed, never speculatively,
/// and never past `target`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryState {
    pub agreement_id: AgreementId,
    pub principal: Drops,
    pub interest_rate_bps: u32,
    /// principal + interest; fixed for the agreement's lifetime.
    pub target: Drops,
    /// Cumulative amount recovered by the senior claimant.
    pub recovered: Drops,
    /// Stamped once, on the transition into full recovery.
    pub recovered_at: Option<DateTime<Utc>>,
}

impl RecoveryState {
    /// Create the initial state for an agreement, deriving `target` from the
    /// financing terms.
    pub fn new(
        agreement_id: AgreementId,
        principal: Drops,
        interest_rate_bps: u32,
    ) -> Result<Self, CoreError> {
        waterfall::validate_terms(principal, interest_rate_bps)?;
        let interest = (principal.0 as u128 * interest_rate_bps as u128 / 10_000) as u64;
        let target = principal.checked_add(Drops(interest))?;
        Ok(Self {
            agreement_id,
            principal,
            interest_rate_bps,
            target,
            recovered: Drops::ZERO,
            recovered_at: None,
        })
    }

    /// Outstanding senior claim.
    pub fn remaining(&self) -> Drops {
        self.target.saturating_sub(self.recovered)
    }

    pub fn fully_recovered(&self) -> bool {
        self.recovered >= self.target
    }

    /// Recovery progress in basis points (10_000 = fully recovered).
    pub fn progress_bps(&self) -> u32 {
        if self.target.is_zero() {
            return 10_000;
        }
        (self.recovered.0 as u128 * 10_000 / self.target.0 as u128).min(10_000) as u32
    }
}

/// One incoming gross payment to be distributed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementRequest {
    /// Idempotency key: retries of the same request never resubmit.
    pub request_id: Uuid,
    pub amount: Drops,
    /// Paying account (the charterer).
    pub source: AccountId,
    /// Distribution point the gross payment lands on.
    pub sink: AccountId,
    pub created_at: DateTime<Utc>,
}

impl SettlementRequest {
    pub fn new(amount: Drops, source: AccountId, sink: AccountId) -> Self {
        Self {
            request_id: Uuid::now_v7(),
            amount,
            source,
            sink,
            created_at: Utc::now(),
        }
    }
}

/// Output of the waterfall calculator for one payment.
///
/// For a calculator-produced plan `to_senior + to_junior` equals the payment
/// amount and `new_recovered` never exceeds the target. `recovered_before`
/// records the state the plan was computed against, for the optimistic
/// concurrency check at commit time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributionPlan {
    pub to_senior: Drops,
    pub to_junior: Drops,
    pub recovered_before: Drops,
    pub new_recovered: Drops,
}

impl DistributionPlan {
    /// Total value distributed by this plan.
    pub fn amount(&self) -> Drops {
        Drops(self.to_senior.0 + self.to_junior.0)
    }
}

/// Terminal disposition of one orchestrated settlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SettlementStatus {
    /// Confirmation was not observed in time; the transaction's fate is
    /// unknown and the settlement is safe to retry.
    Pending,
    /// Observed transfers match the plan; recovery state committed.
    Confirmed,
    /// Observed transfers diverge from the plan; recovery state was
    /// corrected to on-ledger reality.
    Mismatched,
    /// Submission was rejected or the transaction failed on-ledger; no state
    /// was mutated.
    Failed,
}

impl fmt::Display for SettlementStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "Pending"),
            Self::Confirmed => write!(f, "Confirmed"),
            Self::Mismatched => write!(f, "Mismatched"),
            Self::Failed => write!(f, "Failed"),
        }
    }
}

/// Outcome of one orchestrated settlement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementResult {
    pub request_id: Uuid,
    pub agreement_id: AgreementId,
    /// The predicted distribution the transaction was constructed from.
    pub plan: DistributionPlan,
    pub source_tx: Option<TxRef>,
    pub status: SettlementStatus,
    /// Observed senior balance delta; populated only once confirmed.
    pub actual_to_senior: Option<Drops>,
    /// Observed junior balance delta; populated only once confirmed.
    pub actual_to_junior: Option<Drops>,
    /// |actual_to_senior − plan.to_senior| + |actual_to_junior − plan.to_junior|.
    pub discrepancy: Drops,
    pub confirmed_at: Option<DateTime<Utc>>,
}
