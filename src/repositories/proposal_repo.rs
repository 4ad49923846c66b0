use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgRow, query, PgPool, Row};
use uuid::Uuid;

use super::{parse_column, ProposalStore};
use crate::middleware::error_handling::{AppError, Result};
use crate::models::{
    ErpSyncStatus, ExternalIds, ItemPricing, Proposal, ProposalStatus, ProposalVersion,
    VersionItem,
};

const PROPOSAL_COLUMNS: &str = "id, title, customer_name, customer_email, customer_phone, \
    customer_document, destination_country, start_date, end_date, pax, currency, status, \
    current_version_id, accepted_version_id, erp_client_id, erp_case_id, \
    erp_package_reservation_id, erp_sync_status, erp_sync_error, erp_sync_updated_at, \
    created_at, updated_at";

const ITEM_COLUMNS: &str = "id, version_id, position, service_type, display_name, description, \
    object_type, object_id, erp_supplier_id, erp_supplier_name, supplier_source, start_date, \
    end_date, pax, line_cost, total_sell, pricing";

pub struct ProposalRepository {
    pool: PgPool,
}

impl ProposalRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn proposal_from_row(row: &PgRow) -> Result<Proposal> {
        let status: String = row.try_get("status")?;
        let sync_status: String = row.try_get("erp_sync_status")?;

        Ok(Proposal {
            id: row.try_get("id")?,
            title: row.try_get("title")?,
            customer_name: row.try_get("customer_name")?,
            customer_email: row.try_get("customer_email")?,
            customer_phone: row.try_get("customer_phone")?,
            customer_document: row.try_get("customer_document")?,
            destination_country: row.try_get("destination_country")?,
            start_date: row.try_get("start_date")?,
            end_date: row.try_get("end_date")?,
            pax: row.try_get("pax")?,
            currency: row.try_get("currency")?,
            status: parse_column("status", &status)?,
            current_version_id: row.try_get("current_version_id")?,
            accepted_version_id: row.try_get("accepted_version_id")?,
            erp_client_id: row.try_get("erp_client_id")?,
            erp_case_id: row.try_get("erp_case_id")?,
            erp_package_reservation_id: row.try_get("erp_package_reservation_id")?,
            erp_sync_status: parse_column("erp_sync_status", &sync_status)?,
            erp_sync_error: row.try_get("erp_sync_error")?,
            erp_sync_updated_at: row.try_get("erp_sync_updated_at")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn item_from_row(row: &PgRow) -> Result<VersionItem> {
        let service_type: String = row.try_get("service_type")?;
        let object_type: Option<String> = row.try_get("object_type")?;
        let supplier_source: Option<String> = row.try_get("supplier_source")?;
        let pricing: Option<serde_json::Value> = row.try_get("pricing")?;

        Ok(VersionItem {
            id: row.try_get("id")?,
            version_id: row.try_get("version_id")?,
            position: row.try_get("position")?,
            service_type: parse_column("service_type", &service_type)?,
            display_name: row.try_get("display_name")?,
            description: row.try_get("description")?,
            object_type: object_type
                .as_deref()
                .map(|raw| parse_column("object_type", raw))
                .transpose()?,
            object_id: row.try_get("object_id")?,
            erp_supplier_id: row.try_get("erp_supplier_id")?,
            erp_supplier_name: row.try_get("erp_supplier_name")?,
            supplier_source: supplier_source
                .as_deref()
                .map(|raw| parse_column("supplier_source", raw))
                .transpose()?,
            start_date: row.try_get("start_date")?,
            end_date: row.try_get("end_date")?,
            pax: row.try_get("pax")?,
            line_cost: row.try_get("line_cost")?,
            total_sell: row.try_get("total_sell")?,
            pricing: match pricing {
                Some(value) => serde_json::from_value::<ItemPricing>(value)?,
                None => ItemPricing::default(),
            },
        })
    }
}

#[async_trait]
impl ProposalStore for ProposalRepository {
    async fn find_proposal(&self, id: Uuid) -> Result<Option<Proposal>> {
        let row = query(&format!("SELECT {} FROM proposals WHERE id = $1", PROPOSAL_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::proposal_from_row).transpose()
    }

    async fn find_version(&self, id: Uuid) -> Result<Option<ProposalVersion>> {
        let row = query(
            r#"
            SELECT id, proposal_id, version_number, snapshot, total_sell, total_cost,
                   preflight_ok, public_token, created_at
            FROM proposal_versions
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(ProposalVersion {
                id: row.try_get("id")?,
                proposal_id: row.try_get("proposal_id")?,
                version_number: row.try_get("version_number")?,
                snapshot: row.try_get("snapshot")?,
                total_sell: row.try_get("total_sell")?,
                total_cost: row.try_get("total_cost")?,
                preflight_ok: row.try_get("preflight_ok")?,
                public_token: row.try_get("public_token")?,
                created_at: row.try_get("created_at")?,
            })),
            None => Ok(None),
        }
    }

    async fn list_version_items(&self, version_id: Uuid) -> Result<Vec<VersionItem>> {
        let rows = query(&format!(
            "SELECT {} FROM proposal_items WHERE version_id = $1 ORDER BY position ASC",
            ITEM_COLUMNS
        ))
        .bind(version_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::item_from_row).collect()
    }

    async fn next_version_number(&self, proposal_id: Uuid) -> Result<i32> {
        let row = query(
            "SELECT COALESCE(MAX(version_number), 0) + 1 AS next FROM proposal_versions WHERE proposal_id = $1",
        )
        .bind(proposal_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.try_get::<i32, _>("next")?)
    }

    async fn insert_version(&self, version: &ProposalVersion, items: &[VersionItem]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        query(
            r#"
            INSERT INTO proposal_versions (
                id, proposal_id, version_number, snapshot, total_sell, total_cost,
                preflight_ok, public_token, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(version.id)
        .bind(version.proposal_id)
        .bind(version.version_number)
        .bind(&version.snapshot)
        .bind(version.total_sell)
        .bind(version.total_cost)
        .bind(version.preflight_ok)
        .bind(&version.public_token)
        .bind(version.created_at)
        .execute(&mut *tx)
        .await?;

        for item in items {
            query(&format!(
                "INSERT INTO proposal_items ({}) VALUES \
                 ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)",
                ITEM_COLUMNS
            ))
            .bind(item.id)
            .bind(item.version_id)
            .bind(item.position)
            .bind(item.service_type.as_str())
            .bind(&item.display_name)
            .bind(&item.description)
            .bind(item.object_type.map(|t| t.as_str()))
            .bind(item.object_id)
            .bind(item.erp_supplier_id)
            .bind(&item.erp_supplier_name)
            .bind(item.supplier_source.map(|s| s.as_str()))
            .bind(item.start_date)
            .bind(item.end_date)
            .bind(item.pax)
            .bind(item.line_cost)
            .bind(item.total_sell)
            .bind(serde_json::to_value(&item.pricing)?)
            .execute(&mut *tx)
            .await?;
        }

        let updated = query(
            "UPDATE proposals SET current_version_id = $1, updated_at = NOW() WHERE id = $2",
        )
        .bind(version.id)
        .bind(version.proposal_id)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(AppError::NotFound("Proposal not found".to_string()));
        }

        tx.commit().await?;
        Ok(())
    }

    async fn update_status(&self, id: Uuid, status: ProposalStatus) -> Result<()> {
        query("UPDATE proposals SET status = $1, updated_at = NOW() WHERE id = $2")
            .bind(status.as_str())
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn set_accepted_version(&self, id: Uuid, version_id: Uuid) -> Result<()> {
        query(
            r#"
            UPDATE proposals
            SET accepted_version_id = $1, status = 'accepted', updated_at = NOW()
            WHERE id = $2
            "#,
        )
        .bind(version_id)
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn try_mark_sync_pending(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
        stale_before: DateTime<Utc>,
    ) -> Result<bool> {
        let result = query(
            r#"
            UPDATE proposals
            SET erp_sync_status = 'pending', erp_sync_error = NULL,
                erp_sync_updated_at = $1, updated_at = NOW()
            WHERE id = $2
              AND (erp_sync_status <> 'pending'
                   OR erp_sync_updated_at IS NULL
                   OR erp_sync_updated_at < $3)
            "#,
        )
        .bind(now)
        .bind(id)
        .bind(stale_before)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn touch_sync_pending(&self, id: Uuid, now: DateTime<Utc>) -> Result<()> {
        query(
            r#"
            UPDATE proposals
            SET erp_sync_updated_at = $1
            WHERE id = $2 AND erp_sync_status = 'pending'
            "#,
        )
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update_sync_status(
        &self,
        id: Uuid,
        status: ErpSyncStatus,
        error_message: Option<&str>,
    ) -> Result<()> {
        query(
            r#"
            UPDATE proposals
            SET erp_sync_status = $1, erp_sync_error = $2,
                erp_sync_updated_at = NOW(), updated_at = NOW()
            WHERE id = $3
            "#,
        )
        .bind(status.as_str())
        .bind(error_message)
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update_external_ids(&self, id: Uuid, ids: &ExternalIds) -> Result<()> {
        query(
            r#"
            UPDATE proposals
            SET erp_client_id = COALESCE($1, erp_client_id),
                erp_case_id = COALESCE($2, erp_case_id),
                erp_package_reservation_id = COALESCE($3, erp_package_reservation_id),
                updated_at = NOW()
            WHERE id = $4
            "#,
        )
        .bind(ids.client_id)
        .bind(ids.case_id)
        .bind(ids.package_reservation_id)
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
