// ERP Sync Service
// Drives an accepted proposal into the remote ERP: customer, case, package
// container, then one reservation per line nested under the container.
// Every obtained identifier is persisted as soon as it exists, so a retried
// run resumes at the first step that has not completed.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::config::SyncConfig;
use crate::middleware::error_handling::AppError;
use crate::models::{
    ErpSyncStatus, ExternalIds, Proposal, ProposalStatus, ProposalVersion, ReservationKind,
    ServiceType, SyncRecord, VersionItem,
};
use crate::repositories::{ProposalStore, SyncRecordStore};
use crate::services::erp::client::{
    CallTrace, CasePayload, CustomerPayload, ErpClient, ErpError, ReservationPayload,
};
use crate::services::erp::destination::DestinationZone;
use crate::services::notification_service::{NotificationSink, SyncErrorNotice};
use crate::services::preflight_service::{PreflightReport, PreflightService};

// ============================================================================
// Error Types
// ============================================================================

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Proposal {0} not found")]
    NotFound(Uuid),

    #[error("{0}")]
    Guard(String),

    #[error("Preflight failed for version {}", .0.version_id)]
    PreflightRejected(PreflightReport),

    #[error(transparent)]
    Remote(#[from] ErpError),

    #[error(transparent)]
    Store(#[from] AppError),
}

impl SyncError {
    pub fn trace(&self) -> Option<&CallTrace> {
        match self {
            SyncError::Remote(e) => e.trace(),
            _ => None,
        }
    }
}

impl From<SyncError> for AppError {
    fn from(err: SyncError) -> Self {
        match err {
            SyncError::NotFound(id) => AppError::NotFound(format!("Proposal {} not found", id)),
            SyncError::Guard(message) => AppError::Conflict(message),
            SyncError::PreflightRejected(report) => AppError::Unprocessable {
                message: format!("Version {} has blocking preflight issues", report.version_id),
                errors: report.blocking,
            },
            SyncError::Remote(e) => AppError::Upstream(e.to_string()),
            SyncError::Store(e) => e,
        }
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;

// ============================================================================
// Data Models
// ============================================================================

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SyncOutcome {
    pub proposal_id: Uuid,
    /// `ok` when everything is in the ERP, `pending` when another run owns
    /// the proposal.
    pub status: ErpSyncStatus,
    pub external_ids: ExternalIds,
    pub reservations_created: u32,
    pub reservations_skipped: u32,
}

impl SyncOutcome {
    fn without_work(proposal: &Proposal, status: ErpSyncStatus) -> Self {
        Self {
            proposal_id: proposal.id,
            status,
            external_ids: proposal.external_ids(),
            reservations_created: 0,
            reservations_skipped: 0,
        }
    }
}

// ============================================================================
// ERP Sync Service
// ============================================================================

pub struct ErpSyncService {
    proposals: Arc<dyn ProposalStore>,
    sync_records: Arc<dyn SyncRecordStore>,
    client: Arc<dyn ErpClient>,
    notifier: Arc<dyn NotificationSink>,
    preflight: Arc<PreflightService>,
    config: SyncConfig,
}

impl ErpSyncService {
    pub fn new(
        proposals: Arc<dyn ProposalStore>,
        sync_records: Arc<dyn SyncRecordStore>,
        client: Arc<dyn ErpClient>,
        notifier: Arc<dyn NotificationSink>,
        preflight: Arc<PreflightService>,
        config: SyncConfig,
    ) -> Self {
        Self {
            proposals,
            sync_records,
            client,
            notifier,
            preflight,
            config,
        }
    }

    // ========================================================================
    // Main Sync Operations
    // ========================================================================

    pub async fn sync_proposal(&self, proposal_id: Uuid) -> Result<SyncOutcome> {
        // 1. Guard
        let proposal = self
            .proposals
            .find_proposal(proposal_id)
            .await?
            .ok_or(SyncError::NotFound(proposal_id))?;

        if proposal.is_synced() {
            tracing::info!(proposal_id = %proposal_id, "Proposal already synchronized");
            return Ok(SyncOutcome::without_work(&proposal, ErpSyncStatus::Ok));
        }

        let now = Utc::now();
        let stale_before = now - self.pending_window()?;

        if proposal.erp_sync_status == ErpSyncStatus::Pending
            && !is_stale(proposal.erp_sync_updated_at, stale_before)
        {
            tracing::info!(proposal_id = %proposal_id, "Sync already in progress");
            return Ok(SyncOutcome::without_work(&proposal, ErpSyncStatus::Pending));
        }

        if !proposal.status.can_sync() {
            return Err(SyncError::Guard(format!(
                "Proposal in status {} cannot be synchronized",
                proposal.status
            )));
        }

        let version_id = proposal
            .accepted_version_id
            .ok_or_else(|| SyncError::Guard("Proposal has no accepted version".to_string()))?;

        let report = self.preflight.check_version(version_id).await?;
        if !report.ok {
            return Err(SyncError::PreflightRejected(report));
        }

        // 2. Take the pending mark; losing the race means another run owns it
        if !self
            .proposals
            .try_mark_sync_pending(proposal_id, now, stale_before)
            .await?
        {
            tracing::info!(proposal_id = %proposal_id, "Sync claimed by a concurrent run");
            return Ok(SyncOutcome::without_work(&proposal, ErpSyncStatus::Pending));
        }

        tracing::info!(proposal_id = %proposal_id, version_id = %version_id, "ERP sync started");

        match self.run(&proposal, version_id).await {
            Ok(outcome) => {
                self.proposals
                    .update_external_ids(proposal_id, &outcome.external_ids)
                    .await?;
                self.proposals
                    .update_sync_status(proposal_id, ErpSyncStatus::Ok, None)
                    .await?;
                self.proposals
                    .update_status(proposal_id, ProposalStatus::Synced)
                    .await?;

                tracing::info!(
                    proposal_id = %proposal_id,
                    case_id = ?outcome.external_ids.case_id,
                    created = outcome.reservations_created,
                    skipped = outcome.reservations_skipped,
                    "ERP sync completed"
                );
                Ok(outcome)
            }
            Err(e) => Err(self.fail(proposal_id, e).await),
        }
    }

    /// Operator-triggered retry. Completed steps are skipped.
    pub async fn retry_sync_proposal(&self, proposal_id: Uuid) -> Result<SyncOutcome> {
        tracing::info!(proposal_id = %proposal_id, "Retrying ERP sync");
        self.sync_proposal(proposal_id).await
    }

    async fn run(&self, proposal: &Proposal, version_id: Uuid) -> Result<SyncOutcome> {
        let mut ids = proposal.external_ids();

        // 3. Customer
        let client_id = match ids.client_id.filter(|id| *id > 0) {
            Some(id) => id,
            None => {
                let id = self.resolve_customer(proposal).await?;
                self.persist(proposal.id, ExternalIds { client_id: Some(id), ..Default::default() })
                    .await?;
                ids.client_id = Some(id);
                id
            }
        };

        // 4. Case
        let case_id = match ids.case_id.filter(|id| *id > 0) {
            Some(id) => id,
            None => {
                let id = self.create_case(proposal, client_id).await?;
                self.persist(proposal.id, ExternalIds { case_id: Some(id), ..Default::default() })
                    .await?;
                ids.case_id = Some(id);
                id
            }
        };

        let version = self
            .proposals
            .find_version(version_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Version {} not found", version_id)))?;
        let items = self.proposals.list_version_items(version_id).await?;

        // 5. Package container
        let container_id = if self.config.package_container {
            Some(self.ensure_container(proposal, &version, case_id, &mut ids).await?)
        } else {
            None
        };

        // 6. Line reservations
        let mut created = 0;
        let mut skipped = 0;
        for item in &items {
            if self
                .sync_records
                .get_by_item(proposal.id, version_id, Some(item.id))
                .await?
                .is_some()
            {
                skipped += 1;
                continue;
            }

            self.sync_item(proposal.id, version_id, item, case_id, container_id)
                .await?;
            created += 1;
        }

        Ok(SyncOutcome {
            proposal_id: proposal.id,
            status: ErpSyncStatus::Ok,
            external_ids: ids,
            reservations_created: created,
            reservations_skipped: skipped,
        })
    }

    // ========================================================================
    // Steps
    // ========================================================================

    /// Searches by identity document before creating, and once more after a
    /// failed create in case a concurrent writer registered the customer.
    async fn resolve_customer(&self, proposal: &Proposal) -> Result<i64> {
        let document = proposal
            .customer_document
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty());

        if let Some(document) = document {
            tracing::debug!(proposal_id = %proposal.id, "Searching ERP customer by document");
            if let Some(id) = self.client.search_customer_by_document(document).await? {
                tracing::info!(proposal_id = %proposal.id, client_id = id, "Reusing ERP customer");
                return Ok(id);
            }
        }

        let payload = CustomerPayload {
            name: proposal.customer_name.clone(),
            email: proposal.customer_email.clone(),
            phone: proposal.customer_phone.clone(),
            document: document.map(str::to_string),
        };

        tracing::debug!(proposal_id = %proposal.id, "Creating ERP customer");
        match self.client.create_customer(&payload).await {
            Ok(id) => {
                tracing::info!(proposal_id = %proposal.id, client_id = id, "ERP customer created");
                Ok(id)
            }
            Err(create_err) => {
                if let Some(document) = document {
                    if let Ok(Some(id)) = self.client.search_customer_by_document(document).await {
                        tracing::info!(
                            proposal_id = %proposal.id,
                            client_id = id,
                            "ERP customer found after failed create"
                        );
                        return Ok(id);
                    }
                }
                Err(create_err.into())
            }
        }
    }

    async fn create_case(&self, proposal: &Proposal, client_id: i64) -> Result<i64> {
        let payload = CasePayload {
            title: proposal.title.clone(),
            opening_date: Utc::now().date_naive(),
            start_date: proposal.start_date,
            end_date: proposal.end_date,
            destination: DestinationZone::classify(
                proposal.destination_country.as_deref(),
                &self.config.home_country,
            ),
            customer_id: client_id,
            pax: proposal.pax,
        };

        tracing::debug!(proposal_id = %proposal.id, "Creating ERP case");
        let id = self.client.create_case(&payload).await?;
        tracing::info!(proposal_id = %proposal.id, case_id = id, "ERP case created");
        Ok(id)
    }

    async fn ensure_container(
        &self,
        proposal: &Proposal,
        version: &ProposalVersion,
        case_id: i64,
        ids: &mut ExternalIds,
    ) -> Result<i64> {
        if let Some(id) = ids.package_reservation_id.filter(|id| *id > 0) {
            // An earlier run may have stored the id but failed before the ledger write
            if self
                .sync_records
                .get_by_item(proposal.id, version.id, None)
                .await?
                .is_none()
            {
                tracing::info!(
                    proposal_id = %proposal.id,
                    reservation_id = id,
                    "Recording package container in ledger"
                );
                self.record_container(proposal.id, version.id, id).await?;
            }
            return Ok(id);
        }

        let payload = ReservationPayload {
            case_id,
            kind: ReservationKind::Package,
            supplier_id: Some(self.config.default_supplier.id),
            description: proposal.title.clone(),
            start_date: proposal.start_date,
            end_date: proposal.end_date,
            pax: u32::try_from(proposal.pax).unwrap_or(0),
            rooms: None,
            units: None,
            cost: version.total_cost,
            sell: version.total_sell,
            planned_margin_pct: Some(self.config.package_margin_pct),
        };

        tracing::debug!(proposal_id = %proposal.id, "Creating ERP package container");
        let id = self.client.create_reservation(&payload).await?;
        tracing::info!(proposal_id = %proposal.id, reservation_id = id, "ERP package container created");

        self.persist(
            proposal.id,
            ExternalIds { package_reservation_id: Some(id), ..Default::default() },
        )
        .await?;
        ids.package_reservation_id = Some(id);

        self.record_container(proposal.id, version.id, id).await?;
        Ok(id)
    }

    async fn record_container(&self, proposal_id: Uuid, version_id: Uuid, id: i64) -> Result<()> {
        self.sync_records
            .create(&SyncRecord {
                proposal_id,
                version_id,
                item_id: None,
                external_reservation_id: id,
                reservation_kind: ReservationKind::Package,
                supplier_id: Some(self.config.default_supplier.id),
                created_at: Utc::now(),
            })
            .await?;
        self.heartbeat(proposal_id).await
    }

    /// The record is written only once the reservation is nested.
    async fn sync_item(
        &self,
        proposal_id: Uuid,
        version_id: Uuid,
        item: &VersionItem,
        case_id: i64,
        container_id: Option<i64>,
    ) -> Result<()> {
        let payload = reservation_for_item(item, case_id, container_id.is_some())?;

        tracing::debug!(proposal_id = %proposal_id, item_id = %item.id, "Creating ERP reservation");
        let reservation_id = self.client.create_reservation(&payload).await?;

        if let Some(container_id) = container_id {
            self.client
                .nest_reservation(container_id, reservation_id)
                .await?;
        }

        self.sync_records
            .create(&SyncRecord {
                proposal_id,
                version_id,
                item_id: Some(item.id),
                external_reservation_id: reservation_id,
                reservation_kind: payload.kind,
                supplier_id: payload.supplier_id,
                created_at: Utc::now(),
            })
            .await?;
        self.heartbeat(proposal_id).await?;

        tracing::info!(
            proposal_id = %proposal_id,
            item_id = %item.id,
            reservation_id,
            "ERP reservation synchronized"
        );
        Ok(())
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    async fn persist(&self, proposal_id: Uuid, ids: ExternalIds) -> Result<()> {
        self.proposals.update_external_ids(proposal_id, &ids).await?;
        self.heartbeat(proposal_id).await
    }

    /// Keeps the pending mark fresh so a long run is not taken over as stale.
    async fn heartbeat(&self, proposal_id: Uuid) -> Result<()> {
        self.proposals
            .touch_sync_pending(proposal_id, Utc::now())
            .await?;
        Ok(())
    }

    /// Records the failure and notifies. Store errors while recording are
    /// logged; the original error is what the caller gets.
    async fn fail(&self, proposal_id: Uuid, err: SyncError) -> SyncError {
        let message = err.to_string();
        tracing::error!(proposal_id = %proposal_id, "ERP sync failed: {}", message);

        if let Err(e) = self
            .proposals
            .update_sync_status(proposal_id, ErpSyncStatus::Error, Some(&message))
            .await
        {
            tracing::error!(proposal_id = %proposal_id, "Failed to record sync error: {}", e);
        }
        if let Err(e) = self
            .proposals
            .update_status(proposal_id, ProposalStatus::Error)
            .await
        {
            tracing::error!(proposal_id = %proposal_id, "Failed to update proposal status: {}", e);
        }

        self.notifier
            .notify_sync_error(&SyncErrorNotice {
                proposal_id,
                error: message,
                trace: err.trace().cloned(),
            })
            .await;

        err
    }

    fn pending_window(&self) -> Result<chrono::Duration> {
        chrono::Duration::from_std(self.config.pending_timeout)
            .map_err(|e| SyncError::Store(AppError::Internal(e.into())))
    }
}

fn is_stale(updated_at: Option<DateTime<Utc>>, stale_before: DateTime<Utc>) -> bool {
    updated_at.map_or(true, |at| at < stale_before)
}

/// Lines nested under a package container carry cost only; the container
/// holds the client-facing price.
fn reservation_for_item(
    item: &VersionItem,
    case_id: i64,
    nested: bool,
) -> Result<ReservationPayload> {
    let (pax, rooms, units) = occupancy(item).ok_or_else(|| {
        SyncError::Guard(format!(
            "Line {} has room or player counts too large to book",
            item.id
        ))
    })?;

    Ok(ReservationPayload {
        case_id,
        kind: ReservationKind::from(item.service_type),
        supplier_id: item.erp_supplier_id,
        description: item.display_name.clone(),
        start_date: item.start_date,
        end_date: item.end_date,
        pax,
        rooms,
        units,
        cost: item.line_cost,
        sell: if nested { Decimal::ZERO } else { item.total_sell },
        planned_margin_pct: None,
    })
}

/// (pax, rooms, units) from the pricing breakdown, falling back to the
/// line's pax. `None` when the counts overflow.
fn occupancy(item: &VersionItem) -> Option<(u32, Option<u32>, Option<u32>)> {
    let fallback = u32::try_from(item.pax).unwrap_or(0);

    let counts = match item.service_type {
        ServiceType::Hotel => match &item.pricing.hotel {
            Some(hotel) => match hotel.enabled_rooms()? {
                0 => (fallback, None, None),
                rooms => (hotel.occupancy()?, Some(rooms), None),
            },
            None => (fallback, None, None),
        },
        ServiceType::Golf => match &item.pricing.golf {
            Some(golf) if golf.players > 0 => (
                golf.players,
                None,
                Some(golf.players.checked_mul(golf.green_fees_per_person)?),
            ),
            _ => (fallback, None, None),
        },
        _ => (fallback, None, None),
    };

    Some(counts)
}
