//! Storage ports used by the resolver, preflight validator and sync
//! orchestrator, with their PostgreSQL implementations.

pub mod catalog_repo;
pub mod mapping_repo;
pub mod proposal_repo;
pub mod sync_record_repo;

pub use catalog_repo::*;
pub use mapping_repo::*;
pub use proposal_repo::*;
pub use sync_record_repo::*;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::middleware::error_handling::Result;
use crate::models::{
    ErpSyncStatus, ExternalIds, ObjectType, Proposal, ProposalStatus, ProposalVersion,
    SupplierMapping, SyncRecord, VersionItem,
};

/// Catalog object → ERP supplier lookup.
#[async_trait]
pub trait MappingStore: Send + Sync {
    /// Only `active` mappings are returned.
    async fn get_active_mapping(
        &self,
        object_type: ObjectType,
        object_id: i64,
    ) -> Result<Option<SupplierMapping>>;

    async fn upsert(&self, mapping: &SupplierMapping) -> Result<SupplierMapping>;

    /// Maps every object to the same supplier; returns the number of rows written.
    async fn batch_upsert(
        &self,
        supplier_id: i64,
        supplier_name: Option<&str>,
        object_type: ObjectType,
        object_ids: &[i64],
    ) -> Result<u64>;
}

/// Idempotency ledger of remote reservations.
#[async_trait]
pub trait SyncRecordStore: Send + Sync {
    async fn get_by_item(
        &self,
        proposal_id: Uuid,
        version_id: Uuid,
        item_id: Option<Uuid>,
    ) -> Result<Option<SyncRecord>>;

    async fn create(&self, record: &SyncRecord) -> Result<()>;
}

#[async_trait]
pub trait ProposalStore: Send + Sync {
    async fn find_proposal(&self, id: Uuid) -> Result<Option<Proposal>>;

    async fn find_version(&self, id: Uuid) -> Result<Option<ProposalVersion>>;

    /// Items ordered by position.
    async fn list_version_items(&self, version_id: Uuid) -> Result<Vec<VersionItem>>;

    async fn next_version_number(&self, proposal_id: Uuid) -> Result<i32>;

    /// Stores the version with its items and makes it the proposal's current version.
    async fn insert_version(&self, version: &ProposalVersion, items: &[VersionItem]) -> Result<()>;

    async fn update_status(&self, id: Uuid, status: ProposalStatus) -> Result<()>;

    async fn set_accepted_version(&self, id: Uuid, version_id: Uuid) -> Result<()>;

    /// Conditionally moves the proposal to `pending`: succeeds only when it is
    /// not already pending, or when the existing pending mark is older than
    /// `stale_before`. Returns whether the mark was taken.
    async fn try_mark_sync_pending(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
        stale_before: DateTime<Utc>,
    ) -> Result<bool>;

    /// Refreshes the pending mark of a run that is still making progress.
    /// No-op when the proposal is no longer pending.
    async fn touch_sync_pending(&self, id: Uuid, now: DateTime<Utc>) -> Result<()>;

    async fn update_sync_status(
        &self,
        id: Uuid,
        status: ErpSyncStatus,
        error_message: Option<&str>,
    ) -> Result<()>;

    /// Writes the `Some` fields only.
    async fn update_external_ids(&self, id: Uuid, ids: &ExternalIds) -> Result<()>;
}

/// Non-authoritative catalog metadata used to decorate resolved items.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogMetadata {
    pub image_url: Option<String>,
    pub cancellation_terms: Option<String>,
}

#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn get_metadata(
        &self,
        object_type: ObjectType,
        object_id: i64,
    ) -> Result<Option<CatalogMetadata>>;
}

pub(crate) fn parse_column<T>(column: &str, raw: &str) -> Result<T>
where
    T: std::str::FromStr<Err = String>,
{
    raw.parse::<T>()
        .map_err(|e| crate::middleware::error_handling::AppError::corrupt_column(column, e))
}
