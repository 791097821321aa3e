//! End-to-end settlement scenarios against the mock ledger.

use std::sync::Arc;
use std::time::Duration;

use tidewater_core::{
    AccountId, AgreementConfig, AgreementId, Drops, SettlementRequest, SettlementStatus,
};
use tidewater_ledger::adapters::mock::{DistributionHook, MockLedger};
use tidewater_ledger::{LedgerGateway, PollPolicy};
use tidewater_settlement::{
    InMemoryStore, RecoveryLedger, SettlementOrchestrator, SettlementPolicy,
};

fn xrp(value: u64) -> Drops {
    Drops::from_xrp(value)
}

fn account(address: &str) -> AccountId {
    AccountId::new(address).unwrap()
}

fn charterer() -> AccountId {
    account("rPt7MnE3zK9wL2xC4vB6yD8aF1sG5hJqN")
}

fn platform() -> AccountId {
    account("rBVEchNr4DzKAwZcaAs3N6MWrLCp5FHBZZ")
}

fn investor() -> AccountId {
    account("rKm3UyP7TfeGHsNwqKauKb1DAQ7Yitd3vw")
}

fn shipowner() -> AccountId {
    account("rw2UaYq5Z7bK3pL9mN4vD8sF6jR1eT2cX5")
}

fn fast_policy() -> SettlementPolicy {
    SettlementPolicy {
        poll: PollPolicy {
            interval: Duration::from_millis(5),
            timeout: Duration::from_millis(250),
        },
        distribution_wait: Duration::from_millis(250),
        probe_interval: Duration::from_millis(5),
        tolerance: Drops(10_000),
    }
}

/// Mock ledger with a funded charterer and a hooked distribution account,
/// plus an orchestrator with one registered agreement (400 XRP principal at
/// 25% — a 500 XRP senior target).
async fn engine(skim: Drops) -> (Arc<MockLedger>, Arc<SettlementOrchestrator>, AgreementId) {
    let mock = Arc::new(MockLedger::new());
    mock.credit(&charterer(), xrp(10_000));
    mock.install_hook(
        &platform(),
        DistributionHook::new(investor(), shipowner(), xrp(500)).with_skim(skim),
    );

    let ledger = Arc::new(RecoveryLedger::new(Arc::new(InMemoryStore::new())));
    let orchestrator = Arc::new(SettlementOrchestrator::new(
        mock.clone(),
        ledger,
        fast_policy(),
    ));

    let agreement_id = AgreementId::new();
    orchestrator
        .register_agreement(AgreementConfig {
            agreement_id,
            principal: xrp(400),
            interest_rate_bps: 2_500,
            senior_account: investor(),
            junior_account: shipowner(),
            distribution_account: platform(),
        })
        .await
        .unwrap();
    (mock, orchestrator, agreement_id)
}

fn request(amount: Drops) -> SettlementRequest {
    SettlementRequest::new(amount, charterer(), platform())
}

#[tokio::test]
async fn test_full_waterfall_sequence() {
    let (mock, orchestrator, id) = engine(Drops::ZERO).await;

    // Payment 1: 250 XRP — partial senior recovery.
    let first = orchestrator.settle(id, request(xrp(250))).await.unwrap();
    assert_eq!(first.status, SettlementStatus::Confirmed);
    assert_eq!(first.actual_to_senior, Some(xrp(250)));
    assert_eq!(first.actual_to_junior, Some(Drops::ZERO));
    assert_eq!(orchestrator.recovery_state(&id).unwrap().recovered, xrp(250));

    // Payment 2: 300 XRP — completes recovery, junior takes the surplus.
    let second = orchestrator.settle(id, request(xrp(300))).await.unwrap();
    assert_eq!(second.status, SettlementStatus::Confirmed);
    assert_eq!(second.actual_to_senior, Some(xrp(250)));
    assert_eq!(second.actual_to_junior, Some(xrp(50)));
    let state = orchestrator.recovery_state(&id).unwrap();
    assert_eq!(state.recovered, xrp(500));
    assert!(state.fully_recovered());
    assert!(state.recovered_at.is_some());

    // Payment 3: 200 XRP — senior saturated, everything to the junior.
    let third = orchestrator.settle(id, request(xrp(200))).await.unwrap();
    assert_eq!(third.status, SettlementStatus::Confirmed);
    assert_eq!(third.actual_to_senior, Some(Drops::ZERO));
    assert_eq!(third.actual_to_junior, Some(xrp(200)));
    assert_eq!(orchestrator.recovery_state(&id).unwrap().recovered, xrp(500));

    // On-ledger balances line up with the committed recovery state.
    assert_eq!(mock.balance(&investor()).await.unwrap(), xrp(500));
    assert_eq!(mock.balance(&shipowner()).await.unwrap(), xrp(250));
    assert_eq!(mock.balance(&charterer()).await.unwrap(), xrp(9_250));
    assert_eq!(mock.hook_recovered(&platform()), Some(xrp(500)));
}

#[tokio::test]
async fn test_mismatched_distribution_self_heals() {
    // The distribution point diverts 10 XRP from senior to junior.
    let (mock, orchestrator, id) = engine(xrp(10)).await;

    let result = orchestrator.settle(id, request(xrp(250))).await.unwrap();
    assert_eq!(result.status, SettlementStatus::Mismatched);
    assert_eq!(result.plan.to_senior, xrp(250));
    assert_eq!(result.actual_to_senior, Some(xrp(240)));
    assert_eq!(result.actual_to_junior, Some(xrp(10)));
    assert_eq!(result.discrepancy, xrp(20));

    // Committed state reflects on-ledger reality, not the prediction.
    assert_eq!(orchestrator.recovery_state(&id).unwrap().recovered, xrp(240));
    assert_eq!(mock.balance(&investor()).await.unwrap(), xrp(240));

    // The next preview starts from the corrected value.
    let plan = orchestrator.preview(&id, xrp(300)).unwrap();
    assert_eq!(plan.to_senior, xrp(260));
    assert_eq!(plan.to_junior, xrp(40));
}

#[tokio::test]
async fn test_pending_settlement_retries_exactly_once() {
    let (mock, orchestrator, id) = engine(Drops::ZERO).await;
    mock.freeze_confirmations(true);

    let req = request(xrp(250));
    let pending = orchestrator.settle(id, req.clone()).await.unwrap();
    assert_eq!(pending.status, SettlementStatus::Pending);
    assert!(pending.actual_to_senior.is_none());
    assert_eq!(orchestrator.recovery_state(&id).unwrap().recovered, Drops::ZERO);

    mock.freeze_confirmations(false);
    let confirmed = orchestrator.settle(id, req.clone()).await.unwrap();
    assert_eq!(confirmed.status, SettlementStatus::Confirmed);
    assert_eq!(confirmed.source_tx, pending.source_tx);

    // Replays after confirmation never double-count.
    for _ in 0..3 {
        let replay = orchestrator.settle(id, req.clone()).await.unwrap();
        assert_eq!(replay.status, SettlementStatus::Confirmed);
    }
    assert_eq!(orchestrator.recovery_state(&id).unwrap().recovered, xrp(250));
    assert_eq!(mock.balance(&investor()).await.unwrap(), xrp(250));
}

#[tokio::test]
async fn test_failed_submission_leaves_no_trace() {
    let (mock, orchestrator, id) = engine(Drops::ZERO).await;
    mock.reject_submissions(true);

    let result = orchestrator.settle(id, request(xrp(250))).await.unwrap();
    assert_eq!(result.status, SettlementStatus::Failed);
    assert!(result.source_tx.is_none());
    assert_eq!(orchestrator.recovery_state(&id).unwrap().recovered, Drops::ZERO);
    assert!(mock.balance(&investor()).await.is_err());
}

#[tokio::test]
async fn test_result_serializes_for_api_consumers() {
    let (_, orchestrator, id) = engine(Drops::ZERO).await;
    let result = orchestrator.settle(id, request(xrp(250))).await.unwrap();

    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["status"], "Confirmed");
    assert_eq!(json["plan"]["to_senior"], 250_000_000u64);
    assert_eq!(json["plan"]["to_junior"], 0u64);
    assert_eq!(json["actual_to_senior"], 250_000_000u64);
    assert!(json["source_tx"].is_string());
}

#[tokio::test]
async fn test_same_agreement_settlements_serialize() {
    let (_, orchestrator, id) = engine(Drops::ZERO).await;

    // Two payments race on one agreement; the per-agreement lock forces
    // them through preview-commit in sequence, so recovery never
    // under-counts.
    let a = tokio::spawn({
        let orchestrator = orchestrator.clone();
        async move { orchestrator.settle(id, request(xrp(250))).await.unwrap() }
    });
    let b = tokio::spawn({
        let orchestrator = orchestrator.clone();
        async move { orchestrator.settle(id, request(xrp(300))).await.unwrap() }
    });
    let (a, b) = (a.await.unwrap(), b.await.unwrap());

    assert_eq!(a.status, SettlementStatus::Confirmed);
    assert_eq!(b.status, SettlementStatus::Confirmed);
    let senior_total = a.actual_to_senior.unwrap().0 + b.actual_to_senior.unwrap().0;
    let junior_total = a.actual_to_junior.unwrap().0 + b.actual_to_junior.unwrap().0;
    assert_eq!(senior_total, xrp(500).0);
    assert_eq!(junior_total, xrp(50).0);

    let state = orchestrator.recovery_state(&id).unwrap();
    assert_eq!(state.recovered, xrp(500));
    assert!(state.fully_recovered());
}

#[tokio::test]
async fn test_independent_agreements_settle_in_parallel() {
    let (mock, orchestrator, first_id) = engine(Drops::ZERO).await;

    // Second agreement with its own accounts and distribution point.
    let charterer2 = account("rCharter2DDDDDDDDDDDDDDDDD");
    let platform2 = account("rHook2CCCCCCCCCCCCCCCCCCCC");
    let investor2 = account("rSenior2AAAAAAAAAAAAAAAAAA");
    let shipowner2 = account("rJunior2BBBBBBBBBBBBBBBBBB");
    mock.credit(&charterer2, xrp(10_000));
    mock.install_hook(
        &platform2,
        DistributionHook::new(investor2.clone(), shipowner2.clone(), xrp(200)),
    );
    let second_id = AgreementId::new();
    orchestrator
        .register_agreement(AgreementConfig {
            agreement_id: second_id,
            principal: xrp(200),
            interest_rate_bps: 0,
            senior_account: investor2.clone(),
            junior_account: shipowner2,
            distribution_account: platform2.clone(),
        })
        .await
        .unwrap();

    let a = tokio::spawn({
        let orchestrator = orchestrator.clone();
        async move { orchestrator.settle(first_id, request(xrp(250))).await.unwrap() }
    });
    let b = tokio::spawn({
        let orchestrator = orchestrator.clone();
        let req = SettlementRequest::new(xrp(300), charterer2, platform2);
        async move { orchestrator.settle(second_id, req).await.unwrap() }
    });
    let (a, b) = (a.await.unwrap(), b.await.unwrap());

    assert_eq!(a.status, SettlementStatus::Confirmed);
    assert_eq!(b.status, SettlementStatus::Confirmed);

    // Each agreement's state advanced independently.
    assert_eq!(
        orchestrator.recovery_state(&first_id).unwrap().recovered,
        xrp(250)
    );
    let second_state = orchestrator.recovery_state(&second_id).unwrap();
    assert_eq!(second_state.recovered, xrp(200));
    assert!(second_state.fully_recovered());
    assert_eq!(mock.balance(&investor2).await.unwrap(), xrp(200));
}
