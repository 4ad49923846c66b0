use axum::{
    extract::{Path, State},
    Json,
};

use crate::{
    middleware::error_handling::Result,
    models::{
        BatchMappingRequest, BatchMappingResponse, ObjectType, SupplierMapping,
        UpsertMappingRequest,
    },
    AppState,
};

pub async fn upsert_mapping(
    State(state): State<AppState>,
    Json(request): Json<UpsertMappingRequest>,
) -> Result<Json<SupplierMapping>> {
    let mapping = state.mappings.upsert(request).await?;
    Ok(Json(mapping))
}

pub async fn batch_upsert_mappings(
    State(state): State<AppState>,
    Json(request): Json<BatchMappingRequest>,
) -> Result<Json<BatchMappingResponse>> {
    let response = state.mappings.batch_upsert(request).await?;
    Ok(Json(response))
}

pub async fn get_mapping(
    State(state): State<AppState>,
    Path((object_type, object_id)): Path<(ObjectType, i64)>,
) -> Result<Json<SupplierMapping>> {
    let mapping = state.mappings.get_active(object_type, object_id).await?;
    Ok(Json(mapping))
}
