//! HTTP API for the settlement engine.
//!
//! Thin request/response plumbing over the orchestrator; all settlement
//! decisions live below this layer.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use uuid::Uuid;

use tidewater_core::{
    AccountId, AgreementConfig, AgreementId, CoreError, DistributionPlan, Drops, RecoveryState,
    SettlementRequest, SettlementResult,
};
use tidewater_settlement::{SettlementError, SettlementOrchestrator};

// --- Request / response types ---

#[derive(Deserialize)]
pub struct RegisterAgreementRequest {
    /// Generated when omitted.
    pub agreement_id: Option<Uuid>,
    pub principal_drops: u64,
    pub interest_rate_bps: u32,
    pub senior_account: String,
    pub junior_account: String,
    pub distribution_account: String,
}

#[derive(Deserialize)]
pub struct SettleBody {
    /// Idempotency key; generated when omitted.
    pub request_id: Option<Uuid>,
    pub amount_drops: u64,
    pub source: String,
}

#[derive(Deserialize)]
pub struct PreviewQuery {
    pub amount_drops: u64,
}

#[derive(Serialize)]
pub struct StatusResponse {
    pub version: String,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn error_response(status: StatusCode, error: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
        }),
    )
}

fn map_error(err: SettlementError) -> ApiError {
    let status = match &err {
        SettlementError::UnknownAgreement(_) => StatusCode::NOT_FOUND,
        SettlementError::AlreadyExists(_) => StatusCode::CONFLICT,
        SettlementError::Core(_) => StatusCode::BAD_REQUEST,
        SettlementError::StaleState { .. } => StatusCode::CONFLICT,
        SettlementError::Gateway(_) => StatusCode::BAD_GATEWAY,
        SettlementError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error_response(status, err.to_string())
}

fn parse_account(address: &str) -> Result<AccountId, ApiError> {
    AccountId::new(address).map_err(|e: CoreError| error_response(StatusCode::BAD_REQUEST, e.to_string()))
}

// --- Handlers ---

async fn handle_status() -> Json<StatusResponse> {
    Json(StatusResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn handle_register(
    State(orchestrator): State<Arc<SettlementOrchestrator>>,
    Json(req): Json<RegisterAgreementRequest>,
) -> Result<Json<RecoveryState>, ApiError> {
    let config = AgreementConfig {
        agreement_id: req
            .agreement_id
            .map(AgreementId::from_uuid)
            .unwrap_or_default(),
        principal: Drops(req.principal_drops),
        interest_rate_bps: req.interest_rate_bps,
        senior_account: parse_account(&req.senior_account)?,
        junior_account: parse_account(&req.junior_account)?,
        distribution_account: parse_account(&req.distribution_account)?,
    };
    let state = orchestrator
        .register_agreement(config)
        .await
        .map_err(map_error)?;
    Ok(Json(state))
}

async fn handle_settle(
    State(orchestrator): State<Arc<SettlementOrchestrator>>,
    Path(id): Path<Uuid>,
    Json(body): Json<SettleBody>,
) -> Result<Json<SettlementResult>, ApiError> {
    let agreement_id = AgreementId::from_uuid(id);
    let config = orchestrator
        .agreement_config(&agreement_id)
        .map_err(map_error)?;

    let mut request = SettlementRequest::new(
        Drops(body.amount_drops),
        parse_account(&body.source)?,
        config.distribution_account,
    );
    if let Some(request_id) = body.request_id {
        request.request_id = request_id;
    }

    let result = orchestrator
        .settle(agreement_id, request)
        .await
        .map_err(map_error)?;
    Ok(Json(result))
}

async fn handle_recovery(
    State(orchestrator): State<Arc<SettlementOrchestrator>>,
    Path(id): Path<Uuid>,
) -> Result<Json<RecoveryState>, ApiError> {
    let state = orchestrator
        .recovery_state(&AgreementId::from_uuid(id))
        .map_err(map_error)?;
    Ok(Json(state))
}

async fn handle_preview(
    State(orchestrator): State<Arc<SettlementOrchestrator>>,
    Path(id): Path<Uuid>,
    Query(query): Query<PreviewQuery>,
) -> Result<Json<DistributionPlan>, ApiError> {
    let plan = orchestrator
        .preview(&AgreementId::from_uuid(id), Drops(query.amount_drops))
        .map_err(map_error)?;
    Ok(Json(plan))
}

// --- Server ---

pub fn build_router(orchestrator: Arc<SettlementOrchestrator>) -> Router {
    Router::new()
        .route("/api/v1/status", get(handle_status))
        .route("/api/v1/agreements", post(handle_register))
        .route("/api/v1/agreements/{id}/settle", post(handle_settle))
        .route("/api/v1/agreements/{id}/recovery", get(handle_recovery))
        .route("/api/v1/agreements/{id}/preview", get(handle_preview))
        .with_state(orchestrator)
}

pub async fn start_api_server(
    listen_addr: SocketAddr,
    orchestrator: Arc<SettlementOrchestrator>,
) -> anyhow::Result<()> {
    let app = build_router(orchestrator);
    let listener = tokio::net::TcpListener::bind(listen_addr).await?;
    tracing::info!(%listen_addr, "HTTP API server started");
    axum::serve(listener, app).await?;
    Ok(())
}
