/// Proposal, Version and Item Models
///
/// A proposal is the sales header; each saved pricing snapshot becomes an
/// immutable version with its own item rows. The proposal also carries the
/// identifiers obtained from the remote ERP once synchronization starts.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use crate::models::mapping::ObjectType;
use crate::models::snapshot::{ItemPricing, ServiceType, SupplierSource};

// ============================================================================
// ENUMS
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProposalStatus {
    Draft,
    Sent,
    Accepted,
    Queued,
    Synced,
    Error,
    Revoked,
    Lost,
}

impl ProposalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProposalStatus::Draft => "draft",
            ProposalStatus::Sent => "sent",
            ProposalStatus::Accepted => "accepted",
            ProposalStatus::Queued => "queued",
            ProposalStatus::Synced => "synced",
            ProposalStatus::Error => "error",
            ProposalStatus::Revoked => "revoked",
            ProposalStatus::Lost => "lost",
        }
    }

    /// New versions can only be added while the proposal is still being sold.
    pub fn accepts_new_versions(&self) -> bool {
        matches!(self, ProposalStatus::Draft | ProposalStatus::Sent)
    }

    /// States from which a synchronization run may start.
    pub fn can_sync(&self) -> bool {
        matches!(
            self,
            ProposalStatus::Accepted | ProposalStatus::Queued | ProposalStatus::Error
        )
    }
}

impl FromStr for ProposalStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(ProposalStatus::Draft),
            "sent" => Ok(ProposalStatus::Sent),
            "accepted" => Ok(ProposalStatus::Accepted),
            "queued" => Ok(ProposalStatus::Queued),
            "synced" => Ok(ProposalStatus::Synced),
            "error" => Ok(ProposalStatus::Error),
            "revoked" => Ok(ProposalStatus::Revoked),
            "lost" => Ok(ProposalStatus::Lost),
            other => Err(format!("unknown proposal status '{}'", other)),
        }
    }
}

impl std::fmt::Display for ProposalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ErpSyncStatus {
    #[default]
    None,
    Pending,
    Ok,
    Error,
}

impl ErpSyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErpSyncStatus::None => "none",
            ErpSyncStatus::Pending => "pending",
            ErpSyncStatus::Ok => "ok",
            ErpSyncStatus::Error => "error",
        }
    }
}

impl FromStr for ErpSyncStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(ErpSyncStatus::None),
            "pending" => Ok(ErpSyncStatus::Pending),
            "ok" => Ok(ErpSyncStatus::Ok),
            "error" => Ok(ErpSyncStatus::Error),
            other => Err(format!("unknown ERP sync status '{}'", other)),
        }
    }
}

impl std::fmt::Display for ErpSyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// DATABASE MODELS
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Proposal {
    pub id: Uuid,
    pub title: String,
    pub customer_name: String,
    pub customer_email: Option<String>,
    pub customer_phone: Option<String>,
    pub customer_document: Option<String>,
    pub destination_country: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub pax: i32,
    pub currency: String,
    pub status: ProposalStatus,
    pub current_version_id: Option<Uuid>,
    pub accepted_version_id: Option<Uuid>,
    pub erp_client_id: Option<i64>,
    pub erp_case_id: Option<i64>,
    pub erp_package_reservation_id: Option<i64>,
    pub erp_sync_status: ErpSyncStatus,
    pub erp_sync_error: Option<String>,
    pub erp_sync_updated_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Proposal {
    pub fn external_ids(&self) -> ExternalIds {
        ExternalIds {
            client_id: self.erp_client_id,
            case_id: self.erp_case_id,
            package_reservation_id: self.erp_package_reservation_id,
        }
    }

    /// Fully synchronized: nothing left to push.
    pub fn is_synced(&self) -> bool {
        self.erp_sync_status == ErpSyncStatus::Ok && self.erp_case_id.map_or(false, |id| id > 0)
    }
}

/// Identifiers obtained from the remote ERP. `None` fields are left untouched
/// when persisted.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExternalIds {
    pub client_id: Option<i64>,
    pub case_id: Option<i64>,
    pub package_reservation_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProposalVersion {
    pub id: Uuid,
    pub proposal_id: Uuid,
    pub version_number: i32,
    /// Snapshot exactly as persisted. Versions created before the resolver
    /// existed carry no per-item preflight markers.
    pub snapshot: serde_json::Value,
    pub total_sell: Decimal,
    pub total_cost: Decimal,
    pub preflight_ok: bool,
    pub public_token: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionItem {
    pub id: Uuid,
    pub version_id: Uuid,
    pub position: i32,
    pub service_type: ServiceType,
    pub display_name: String,
    pub description: Option<String>,
    pub object_type: Option<ObjectType>,
    pub object_id: Option<i64>,
    pub erp_supplier_id: Option<i64>,
    pub erp_supplier_name: Option<String>,
    pub supplier_source: Option<SupplierSource>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub pax: i32,
    pub line_cost: Decimal,
    pub total_sell: Decimal,
    pub pricing: ItemPricing,
}

impl VersionItem {
    pub fn catalog_key(&self) -> Option<(ObjectType, i64)> {
        let object_id = self.object_id?;
        let object_type = self
            .object_type
            .or_else(|| self.service_type.catalog_object_type())?;
        Some((object_type, object_id))
    }
}

// ============================================================================
// REQUEST / RESPONSE MODELS
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct AcceptProposalRequest {
    pub version_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct VersionResponse {
    pub id: Uuid,
    pub proposal_id: Uuid,
    pub version_number: i32,
    pub public_token: String,
    pub total_sell: Decimal,
    pub total_cost: Decimal,
    pub preflight: crate::models::snapshot::Preflight,
}

#[derive(Debug, Serialize)]
pub struct ProposalStatusResponse {
    pub id: Uuid,
    pub status: ProposalStatus,
    pub accepted_version_id: Option<Uuid>,
    pub erp_sync_status: ErpSyncStatus,
}

impl From<&Proposal> for ProposalStatusResponse {
    fn from(proposal: &Proposal) -> Self {
        Self {
            id: proposal.id,
            status: proposal.status,
            accepted_version_id: proposal.accepted_version_id,
            erp_sync_status: proposal.erp_sync_status,
        }
    }
}
