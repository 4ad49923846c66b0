/// Mapping Service
///
/// Admin maintenance of catalog → ERP supplier mappings, plus the ERP
/// directory lookups the admin screens use to pick a supplier.

use chrono::Utc;
use std::collections::BTreeSet;
use std::sync::Arc;
use validator::Validate;

use crate::middleware::error_handling::{AppError, Result};
use crate::models::{
    BatchMappingRequest, BatchMappingResponse, ObjectType, SupplierMapping, UpsertMappingRequest,
};
use crate::repositories::MappingStore;
use crate::services::erp::{Agent, ErpClient, Provider};

pub struct MappingService {
    mappings: Arc<dyn MappingStore>,
    client: Arc<dyn ErpClient>,
}

impl MappingService {
    pub fn new(mappings: Arc<dyn MappingStore>, client: Arc<dyn ErpClient>) -> Self {
        Self { mappings, client }
    }

    pub async fn upsert(&self, request: UpsertMappingRequest) -> Result<SupplierMapping> {
        request.validate()?;

        let supplier_name = self
            .supplier_name(request.erp_supplier_id, request.erp_supplier_name.as_deref())
            .await;

        let mapping = SupplierMapping {
            object_type: request.object_type,
            object_id: request.object_id,
            erp_entity_type: request.erp_entity_type,
            erp_entity_id: request.erp_entity_id.unwrap_or(request.erp_supplier_id),
            erp_supplier_id: request.erp_supplier_id,
            erp_supplier_name: supplier_name,
            status: request.status,
            match_type: request.match_type,
            updated_at: Utc::now(),
        };

        let saved = self.mappings.upsert(&mapping).await?;

        tracing::info!(
            object_type = %saved.object_type,
            object_id = saved.object_id,
            supplier_id = saved.erp_supplier_id,
            "Supplier mapping saved"
        );

        Ok(saved)
    }

    pub async fn batch_upsert(&self, request: BatchMappingRequest) -> Result<BatchMappingResponse> {
        request.validate()?;

        if request.object_ids.iter().any(|id| *id <= 0) {
            return Err(AppError::BadRequest("Object ids must be positive".to_string()));
        }

        let object_ids: Vec<i64> = request
            .object_ids
            .iter()
            .copied()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let supplier_name = self
            .supplier_name(request.erp_supplier_id, request.erp_supplier_name.as_deref())
            .await;

        let upserted = self
            .mappings
            .batch_upsert(
                request.erp_supplier_id,
                supplier_name.as_deref(),
                request.object_type,
                &object_ids,
            )
            .await?;

        tracing::info!(
            object_type = %request.object_type,
            supplier_id = request.erp_supplier_id,
            upserted,
            "Supplier mappings batch saved"
        );

        Ok(BatchMappingResponse { upserted })
    }

    pub async fn get_active(&self, object_type: ObjectType, object_id: i64) -> Result<SupplierMapping> {
        self.mappings
            .get_active_mapping(object_type, object_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("No active mapping for {} {}", object_type, object_id))
            })
    }

    pub async fn search_providers(&self, query: &str) -> Result<Vec<Provider>> {
        self.client
            .search_providers(query.trim())
            .await
            .map_err(|e| AppError::Upstream(e.to_string()))
    }

    pub async fn search_agents(&self, query: &str) -> Result<Vec<Agent>> {
        self.client
            .search_agents(query.trim())
            .await
            .map_err(|e| AppError::Upstream(e.to_string()))
    }

    /// Uses the given name, else asks the ERP. Lookup failures leave the name empty.
    async fn supplier_name(&self, supplier_id: i64, given: Option<&str>) -> Option<String> {
        if let Some(name) = given.map(str::trim).filter(|n| !n.is_empty()) {
            return Some(name.to_string());
        }

        match self.client.get_provider(supplier_id).await {
            Ok(provider) => provider.map(|p| p.name),
            Err(e) => {
                tracing::warn!(supplier_id, "Provider name lookup failed: {}", e);
                None
            }
        }
    }
}
