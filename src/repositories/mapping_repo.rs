use async_trait::async_trait;
use sqlx::{postgres::PgRow, query, PgPool, Row};

use super::{parse_column, MappingStore};
use crate::middleware::error_handling::Result;
use crate::models::{ErpEntityType, MappingStatus, MatchType, ObjectType, SupplierMapping};

pub struct MappingRepository {
    pool: PgPool,
}

impl MappingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn from_row(row: &PgRow) -> Result<SupplierMapping> {
        let object_type: String = row.try_get("object_type")?;
        let entity_type: String = row.try_get("erp_entity_type")?;
        let status: String = row.try_get("status")?;
        let match_type: String = row.try_get("match_type")?;

        Ok(SupplierMapping {
            object_type: parse_column("object_type", &object_type)?,
            object_id: row.try_get("object_id")?,
            erp_entity_type: parse_column("erp_entity_type", &entity_type)?,
            erp_entity_id: row.try_get("erp_entity_id")?,
            erp_supplier_id: row.try_get("erp_supplier_id")?,
            erp_supplier_name: row.try_get("erp_supplier_name")?,
            status: parse_column("status", &status)?,
            match_type: parse_column("match_type", &match_type)?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[async_trait]
impl MappingStore for MappingRepository {
    async fn get_active_mapping(
        &self,
        object_type: ObjectType,
        object_id: i64,
    ) -> Result<Option<SupplierMapping>> {
        let row = query(
            r#"
            SELECT object_type, object_id, erp_entity_type, erp_entity_id, erp_supplier_id,
                   erp_supplier_name, status, match_type, updated_at
            FROM supplier_mappings
            WHERE object_type = $1 AND object_id = $2 AND status = 'active'
            "#,
        )
        .bind(object_type.as_str())
        .bind(object_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::from_row).transpose()
    }

    async fn upsert(&self, mapping: &SupplierMapping) -> Result<SupplierMapping> {
        let row = query(
            r#"
            INSERT INTO supplier_mappings (
                object_type, object_id, erp_entity_type, erp_entity_id, erp_supplier_id,
                erp_supplier_name, status, match_type, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NOW())
            ON CONFLICT (object_type, object_id) DO UPDATE SET
                erp_entity_type = EXCLUDED.erp_entity_type,
                erp_entity_id = EXCLUDED.erp_entity_id,
                erp_supplier_id = EXCLUDED.erp_supplier_id,
                erp_supplier_name = EXCLUDED.erp_supplier_name,
                status = EXCLUDED.status,
                match_type = EXCLUDED.match_type,
                updated_at = NOW()
            RETURNING object_type, object_id, erp_entity_type, erp_entity_id, erp_supplier_id,
                      erp_supplier_name, status, match_type, updated_at
            "#,
        )
        .bind(mapping.object_type.as_str())
        .bind(mapping.object_id)
        .bind(mapping.erp_entity_type.as_str())
        .bind(mapping.erp_entity_id)
        .bind(mapping.erp_supplier_id)
        .bind(&mapping.erp_supplier_name)
        .bind(mapping.status.as_str())
        .bind(mapping.match_type.as_str())
        .fetch_one(&self.pool)
        .await?;

        Self::from_row(&row)
    }

    async fn batch_upsert(
        &self,
        supplier_id: i64,
        supplier_name: Option<&str>,
        object_type: ObjectType,
        object_ids: &[i64],
    ) -> Result<u64> {
        let result = query(
            r#"
            INSERT INTO supplier_mappings (
                object_type, object_id, erp_entity_type, erp_entity_id, erp_supplier_id,
                erp_supplier_name, status, match_type, updated_at
            )
            SELECT $1, ids.object_id, $2, $3, $3, $4, $5, $6, NOW()
            FROM UNNEST($7::BIGINT[]) AS ids(object_id)
            ON CONFLICT (object_type, object_id) DO UPDATE SET
                erp_entity_type = EXCLUDED.erp_entity_type,
                erp_entity_id = EXCLUDED.erp_entity_id,
                erp_supplier_id = EXCLUDED.erp_supplier_id,
                erp_supplier_name = EXCLUDED.erp_supplier_name,
                status = EXCLUDED.status,
                match_type = EXCLUDED.match_type,
                updated_at = NOW()
            "#,
        )
        .bind(object_type.as_str())
        .bind(ErpEntityType::Provider.as_str())
        .bind(supplier_id)
        .bind(supplier_name)
        .bind(MappingStatus::Active.as_str())
        .bind(MatchType::Batch.as_str())
        .bind(object_ids)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
