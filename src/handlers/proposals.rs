use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::{
    middleware::error_handling::Result,
    models::{AcceptProposalRequest, ProposalStatusResponse, RawSnapshot, VersionResponse},
    services::{erp::SyncOutcome, PreflightReport, ResolveContext, ResolveOutcome},
    AppState,
};

/// Dry run: resolves without persisting, blocking issues included.
pub async fn resolve_snapshot(
    State(state): State<AppState>,
    Json(raw): Json<RawSnapshot>,
) -> Result<Json<ResolveOutcome>> {
    let outcome = state
        .resolver
        .resolve(&raw, &ResolveContext::default())
        .await?;
    Ok(Json(outcome))
}

pub async fn create_version(
    State(state): State<AppState>,
    Path(proposal_id): Path<Uuid>,
    Json(raw): Json<RawSnapshot>,
) -> Result<(StatusCode, Json<VersionResponse>)> {
    let version = state.proposals.create_version(proposal_id, &raw).await?;
    Ok((StatusCode::CREATED, Json(version)))
}

pub async fn get_preflight(
    State(state): State<AppState>,
    Path(version_id): Path<Uuid>,
) -> Result<Json<PreflightReport>> {
    let report = state.preflight.check_version(version_id).await?;
    Ok(Json(report))
}

pub async fn accept_proposal(
    State(state): State<AppState>,
    Path(proposal_id): Path<Uuid>,
    Json(request): Json<AcceptProposalRequest>,
) -> Result<Json<ProposalStatusResponse>> {
    let response = state
        .proposals
        .accept(proposal_id, request.version_id)
        .await?;
    Ok(Json(response))
}

pub async fn queue_proposal(
    State(state): State<AppState>,
    Path(proposal_id): Path<Uuid>,
) -> Result<Json<ProposalStatusResponse>> {
    let response = state.proposals.queue_for_sync(proposal_id).await?;
    Ok(Json(response))
}

pub async fn sync_proposal(
    State(state): State<AppState>,
    Path(proposal_id): Path<Uuid>,
) -> Result<Json<SyncOutcome>> {
    let outcome = state.sync.sync_proposal(proposal_id).await?;
    Ok(Json(outcome))
}

pub async fn retry_sync_proposal(
    State(state): State<AppState>,
    Path(proposal_id): Path<Uuid>,
) -> Result<Json<SyncOutcome>> {
    let outcome = state.sync.retry_sync_proposal(proposal_id).await?;
    Ok(Json(outcome))
}
