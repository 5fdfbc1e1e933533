use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use academy_billing::{
    api,
    config::Settings,
    connect_database,
    payments::AsaasGateway,
    service::ServiceContext,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "academy_billing=debug,tower_http=debug,axum=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration; a broken config must not start with defaults
    let settings = Settings::new().map_err(|e| {
        tracing::error!("Failed to load config: {}", e);
        e
    })?;

    tracing::info!(
        "Starting academy billing on {}:{} ({:?})",
        settings.server.host,
        settings.server.port,
        settings.server.environment
    );

    if settings.gateway.api_key.is_empty() {
        tracing::warn!("Gateway API key not configured; charge creation will fail");
    }
    if settings.gateway.webhook_token.is_none() {
        if settings.server.environment.is_production() {
            tracing::warn!("No webhook token configured; all gateway webhooks will be rejected");
        } else {
            tracing::warn!("No webhook token configured; webhooks are accepted unauthenticated");
        }
    }

    // Initialize database
    let db_pool = connect_database(&settings.database.url, settings.database.max_connections).await?;

    let gateway = Arc::new(AsaasGateway::new(&settings.gateway)?);

    let service_context = Arc::new(ServiceContext::new(
        db_pool,
        gateway,
        settings.billing.clone(),
    ));

    let app = api::create_app(service_context, Arc::new(settings.clone()));

    let listener = tokio::net::TcpListener::bind(
        format!("{}:{}", settings.server.host, settings.server.port)
    ).await?;

    tracing::info!("Server listening on http://{}:{}", settings.server.host, settings.server.port);

    axum::serve(listener, app).await?;

    Ok(())
}
