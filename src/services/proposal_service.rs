/// Proposal Service
///
/// Version creation and the lifecycle transitions that precede
/// synchronization:
/// - `create_version` freezes a resolved snapshot as an immutable version
/// - `accept` records the version the customer accepted
/// - `queue_for_sync` gates the accepted version through preflight

use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use crate::middleware::error_handling::{AppError, Result};
use crate::models::{
    Proposal, ProposalStatus, ProposalStatusResponse, ProposalVersion, RawSnapshot,
    ResolvedItem, VersionItem, VersionResponse,
};
use crate::repositories::ProposalStore;
use crate::services::preflight_service::PreflightService;
use crate::services::snapshot_resolver::{ResolveContext, SnapshotResolver};

pub struct ProposalService {
    proposals: Arc<dyn ProposalStore>,
    resolver: Arc<SnapshotResolver>,
    preflight: Arc<PreflightService>,
}

impl ProposalService {
    pub fn new(
        proposals: Arc<dyn ProposalStore>,
        resolver: Arc<SnapshotResolver>,
        preflight: Arc<PreflightService>,
    ) -> Self {
        Self {
            proposals,
            resolver,
            preflight,
        }
    }

    async fn get_proposal(&self, proposal_id: Uuid) -> Result<Proposal> {
        self.proposals
            .find_proposal(proposal_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Proposal {} not found", proposal_id)))
    }

    pub async fn create_version(
        &self,
        proposal_id: Uuid,
        raw: &RawSnapshot,
    ) -> Result<VersionResponse> {
        let proposal = self.get_proposal(proposal_id).await?;

        if !proposal.status.accepts_new_versions() {
            return Err(AppError::Conflict(format!(
                "Proposal in status {} does not accept new versions",
                proposal.status
            )));
        }

        let version_number = self.proposals.next_version_number(proposal_id).await?;
        let outcome = self
            .resolver
            .resolve(
                raw,
                &ResolveContext {
                    proposal_id: Some(proposal_id),
                    version_number: Some(version_number),
                },
            )
            .await?;

        if outcome.is_blocked() {
            return Err(AppError::Unprocessable {
                message: "Snapshot has blocking issues".to_string(),
                errors: outcome.errors,
            });
        }

        let snapshot = outcome.snapshot;
        let version_id = Uuid::new_v4();
        let version = ProposalVersion {
            id: version_id,
            proposal_id,
            version_number,
            snapshot: serde_json::to_value(&snapshot)?,
            total_sell: snapshot.totals.sell,
            total_cost: snapshot.totals.cost,
            preflight_ok: snapshot.preflight.ok,
            public_token: Uuid::new_v4().simple().to_string(),
            created_at: Utc::now(),
        };

        let items: Vec<VersionItem> = snapshot
            .items
            .iter()
            .enumerate()
            .map(|(position, item)| version_item(version_id, position, item, proposal.pax))
            .collect();

        self.proposals.insert_version(&version, &items).await?;

        tracing::info!(
            proposal_id = %proposal_id,
            version_id = %version_id,
            version_number,
            items = items.len(),
            "Proposal version created"
        );

        Ok(VersionResponse {
            id: version.id,
            proposal_id,
            version_number,
            public_token: version.public_token,
            total_sell: version.total_sell,
            total_cost: version.total_cost,
            preflight: snapshot.preflight,
        })
    }

    pub async fn accept(&self, proposal_id: Uuid, version_id: Uuid) -> Result<ProposalStatusResponse> {
        let proposal = self.get_proposal(proposal_id).await?;

        if !proposal.status.accepts_new_versions() {
            return Err(AppError::Conflict(format!(
                "Proposal in status {} cannot be accepted",
                proposal.status
            )));
        }

        let version = self
            .proposals
            .find_version(version_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Version {} not found", version_id)))?;

        if version.proposal_id != proposal_id {
            return Err(AppError::BadRequest(
                "Version does not belong to this proposal".to_string(),
            ));
        }

        self.proposals
            .set_accepted_version(proposal_id, version_id)
            .await?;

        tracing::info!(proposal_id = %proposal_id, version_id = %version_id, "Proposal accepted");

        Ok(ProposalStatusResponse {
            status: ProposalStatus::Accepted,
            accepted_version_id: Some(version_id),
            ..ProposalStatusResponse::from(&proposal)
        })
    }

    pub async fn queue_for_sync(&self, proposal_id: Uuid) -> Result<ProposalStatusResponse> {
        let proposal = self.get_proposal(proposal_id).await?;

        if !matches!(proposal.status, ProposalStatus::Accepted | ProposalStatus::Error) {
            return Err(AppError::Conflict(format!(
                "Proposal in status {} cannot be queued",
                proposal.status
            )));
        }

        let version_id = proposal
            .accepted_version_id
            .ok_or_else(|| AppError::Conflict("Proposal has no accepted version".to_string()))?;

        let report = self.preflight.check_version(version_id).await?;
        if !report.ok {
            return Err(AppError::Unprocessable {
                message: format!("Version {} has blocking preflight issues", version_id),
                errors: report.blocking,
            });
        }

        self.proposals
            .update_status(proposal_id, ProposalStatus::Queued)
            .await?;

        tracing::info!(proposal_id = %proposal_id, version_id = %version_id, "Proposal queued for sync");

        Ok(ProposalStatusResponse {
            status: ProposalStatus::Queued,
            ..ProposalStatusResponse::from(&proposal)
        })
    }
}

fn version_item(version_id: Uuid, position: usize, item: &ResolvedItem, default_pax: i32) -> VersionItem {
    let line = &item.line;

    VersionItem {
        id: Uuid::new_v4(),
        version_id,
        position: i32::try_from(position).unwrap_or(i32::MAX),
        service_type: line.service_type,
        display_name: item.display_name.clone().unwrap_or_default(),
        description: line.description.clone(),
        object_type: line.catalog_key().map(|(object_type, _)| object_type),
        object_id: line.object_id,
        erp_supplier_id: item.erp_supplier_id,
        erp_supplier_name: item.erp_supplier_name.clone(),
        supplier_source: item.supplier_source,
        start_date: line.start_date,
        end_date: line.end_date,
        pax: line
            .pax
            .and_then(|pax| i32::try_from(pax).ok())
            .unwrap_or(default_pax),
        line_cost: line.line_cost,
        total_sell: line.total_sell,
        pricing: line.pricing.clone(),
    }
}
