use async_trait::async_trait;
use sqlx::{query, PgPool, Row};

use super::{CatalogMetadata, CatalogStore};
use crate::middleware::error_handling::Result;
use crate::models::ObjectType;

pub struct CatalogRepository {
    pool: PgPool,
}

impl CatalogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CatalogStore for CatalogRepository {
    async fn get_metadata(
        &self,
        object_type: ObjectType,
        object_id: i64,
    ) -> Result<Option<CatalogMetadata>> {
        let row = query(
            "SELECT image_url, cancellation_terms FROM catalog_objects WHERE object_type = $1 AND id = $2",
        )
        .bind(object_type.as_str())
        .bind(object_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(CatalogMetadata {
                image_url: row.try_get("image_url")?,
                cancellation_terms: row.try_get("cancellation_terms")?,
            })),
            None => Ok(None),
        }
    }
}
