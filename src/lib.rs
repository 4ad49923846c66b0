pub mod config;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod repositories;
pub mod services;

use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, post, put},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use config::SyncConfig;
use repositories::{CatalogStore, MappingStore, ProposalStore, SyncRecordStore};
use services::{
    erp::{ErpClient, ErpSyncService},
    MappingService, NotificationSink, PreflightService, ProposalService, SnapshotResolver,
};

/// Services shared by all handlers.
#[derive(Clone)]
pub struct AppState {
    pub resolver: Arc<SnapshotResolver>,
    pub preflight: Arc<PreflightService>,
    pub proposals: Arc<ProposalService>,
    pub sync: Arc<ErpSyncService>,
    pub mappings: Arc<MappingService>,
}

/// Storage and remote collaborators the services are built from.
pub struct Collaborators {
    pub proposals: Arc<dyn ProposalStore>,
    pub mappings: Arc<dyn MappingStore>,
    pub sync_records: Arc<dyn SyncRecordStore>,
    pub catalog: Option<Arc<dyn CatalogStore>>,
    pub erp: Arc<dyn ErpClient>,
    pub notifier: Arc<dyn NotificationSink>,
}

impl AppState {
    pub fn new(collaborators: Collaborators, sync_config: SyncConfig) -> Self {
        let Collaborators {
            proposals,
            mappings,
            sync_records,
            catalog,
            erp,
            notifier,
        } = collaborators;

        let mut resolver =
            SnapshotResolver::new(mappings.clone(), sync_config.default_supplier.clone());
        if let Some(catalog) = catalog {
            resolver = resolver.with_catalog(catalog);
        }
        let resolver = Arc::new(resolver);

        let preflight = Arc::new(PreflightService::new(
            proposals.clone(),
            mappings.clone(),
            sync_config.default_supplier.clone(),
        ));

        let proposal_service = Arc::new(ProposalService::new(
            proposals.clone(),
            resolver.clone(),
            preflight.clone(),
        ));

        let sync = Arc::new(ErpSyncService::new(
            proposals,
            sync_records,
            erp.clone(),
            notifier,
            preflight.clone(),
            sync_config,
        ));

        Self {
            resolver,
            preflight,
            proposals: proposal_service,
            sync,
            mappings: Arc::new(MappingService::new(mappings, erp)),
        }
    }
}

pub fn create_router(state: AppState, cors_origins: &[String]) -> Router {
    use crate::handlers::{erp_directory, mappings, proposals};

    let origins: Vec<HeaderValue> = cors_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::error!("Invalid CORS origin '{}': {}", origin, e);
                None
            }
        })
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT]);

    Router::new()
        .route("/health", get(|| async { Json(json!({ "status": "ok" })) }))
        .nest(
            "/api",
            Router::new()
                .route("/snapshots/resolve", post(proposals::resolve_snapshot))
                .route("/proposals/:id/versions", post(proposals::create_version))
                .route("/proposals/:id/accept", post(proposals::accept_proposal))
                .route("/proposals/:id/queue", post(proposals::queue_proposal))
                .route("/proposals/:id/sync", post(proposals::sync_proposal))
                .route("/proposals/:id/sync/retry", post(proposals::retry_sync_proposal))
                .route("/versions/:id/preflight", get(proposals::get_preflight))
                .route("/mappings", put(mappings::upsert_mapping))
                .route("/mappings/batch", post(mappings::batch_upsert_mappings))
                .route(
                    "/mappings/:object_type/:object_id",
                    get(mappings::get_mapping),
                )
                .route("/erp/providers", get(erp_directory::search_providers))
                .route("/erp/agents", get(erp_directory::search_agents)),
        )
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn(
            crate::middleware::request_id::request_id_middleware,
        ))
}
