use async_trait::async_trait;
use sqlx::{query, PgPool, Row};
use uuid::Uuid;

use super::{parse_column, SyncRecordStore};
use crate::middleware::error_handling::Result;
use crate::models::SyncRecord;

pub struct SyncRecordRepository {
    pool: PgPool,
}

impl SyncRecordRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SyncRecordStore for SyncRecordRepository {
    async fn get_by_item(
        &self,
        proposal_id: Uuid,
        version_id: Uuid,
        item_id: Option<Uuid>,
    ) -> Result<Option<SyncRecord>> {
        // IS NOT DISTINCT FROM so the package container row (NULL item) matches.
        let row = query(
            r#"
            SELECT proposal_id, version_id, item_id, external_reservation_id,
                   reservation_kind, supplier_id, created_at
            FROM erp_sync_records
            WHERE proposal_id = $1 AND version_id = $2 AND item_id IS NOT DISTINCT FROM $3
            "#,
        )
        .bind(proposal_id)
        .bind(version_id)
        .bind(item_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let kind: String = row.try_get("reservation_kind")?;
                Ok(Some(SyncRecord {
                    proposal_id: row.try_get("proposal_id")?,
                    version_id: row.try_get("version_id")?,
                    item_id: row.try_get("item_id")?,
                    external_reservation_id: row.try_get("external_reservation_id")?,
                    reservation_kind: parse_column("reservation_kind", &kind)?,
                    supplier_id: row.try_get("supplier_id")?,
                    created_at: row.try_get("created_at")?,
                }))
            }
            None => Ok(None),
        }
    }

    async fn create(&self, record: &SyncRecord) -> Result<()> {
        query(
            r#"
            INSERT INTO erp_sync_records (
                proposal_id, version_id, item_id, external_reservation_id,
                reservation_kind, supplier_id, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(record.proposal_id)
        .bind(record.version_id)
        .bind(record.item_id)
        .bind(record.external_reservation_id)
        .bind(record.reservation_kind.as_str())
        .bind(record.supplier_id)
        .bind(record.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
