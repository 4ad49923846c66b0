use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tripdesk::config::AppConfig;
use tripdesk::repositories::{
    CatalogRepository, MappingRepository, ProposalRepository, SyncRecordRepository,
};
use tripdesk::services::{
    erp::RpcErpClient, LogNotificationSink, NotificationSink, WebhookNotificationSink,
};
use tripdesk::{create_router, AppState, Collaborators};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Default to INFO; override with RUST_LOG
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "tripdesk=info,tower_http=info,sqlx=warn".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;

    let pool = config.database.create_pool().await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("Database migrations applied");

    let erp = Arc::new(RpcErpClient::new(config.erp.clone())?);

    let notifier: Arc<dyn NotificationSink> = match &config.sync_error_webhook_url {
        Some(url) => {
            tracing::info!("Sync errors will be posted to the configured webhook");
            Arc::new(WebhookNotificationSink::new(url.clone()))
        }
        None => Arc::new(LogNotificationSink),
    };

    let state = AppState::new(
        Collaborators {
            proposals: Arc::new(ProposalRepository::new(pool.clone())),
            mappings: Arc::new(MappingRepository::new(pool.clone())),
            sync_records: Arc::new(SyncRecordRepository::new(pool.clone())),
            catalog: Some(Arc::new(CatalogRepository::new(pool.clone()))),
            erp,
            notifier,
        },
        config.sync.clone(),
    );

    let app = create_router(state, &config.cors_origins);

    let addr = config.server_address();
    tracing::info!("Starting tripdesk on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
