//! Waterfall distribution calculator.
//!
//! Strict priority: the senior claimant is paid first, up to the outstanding
//! recovery target, and the junior claimant receives only the residual. Pure
//! and side-effect free — safe to re-run for previews; state moves only when
//! the recovery ledger commits a confirmed settlement.

use crate::error::CoreError;
use crate::types::{DistributionPlan, Drops};

/// Compute the priority split of one incoming payment.
///
/// `recovered` and `target` describe the senior claim at plan time; the plan
/// carries `recovered` forward as `recovered_before` so a commit can detect
/// that the state has moved underneath it.
pub fn plan(amount: Drops, recovered: Drops, target: Drops) -> Result<DistributionPlan, CoreError> {
    if amount.is_zero() {
        return Err(CoreError::InvalidAmount(
            "payment amount must be positive".into(),
        ));
    }
    if recovered > target {
        return Err(CoreError::InvalidTerms(format!(
            "recovered {} exceeds target {}",
            recovered, target
        )));
    }

    let remaining_senior_claim = target.saturating_sub(recovered);

    let (to_senior, to_junior) = if remaining_senior_claim.is_zero() {
        // Senior already satisfied: everything flows to the junior claimant.
        (Drops::ZERO, amount)
    } else if amount >= remaining_senior_claim {
        // Cap at the outstanding claim; the senior is never overpaid.
        (
            remaining_senior_claim,
            Drops(amount.0 - remaining_senior_claim.0),
        )
    } else {
        (amount, Drops::ZERO)
    };

    let new_recovered = recovered.checked_add(to_senior)?;

    Ok(DistributionPlan {
        to_senior,
        to_junior,
        recovered_before: recovered,
        new_recovered,
    })
}

/// Validate financing terms before an agreement is registered.
pub fn validate_terms(principal: Drops, interest_rate_bps: u32) -> Result<(), CoreError> {
    if principal.is_zero() {
        return Err(CoreError::InvalidTerms(
            "principal must be greater than zero".into(),
        ));
    }
    if interest_rate_bps > 10_000 {
        return Err(CoreError::InvalidTerms(format!(
            "interest rate {} bps exceeds 100%",
            interest_rate_bps
        )));
    }
    Ok(())
}
