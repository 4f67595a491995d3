use identity_service::{
    build_router,
    config::IdentityConfig,
    services::email::{LogSender, NotificationSender, SmtpSender},
    services::external::{GoogleProvider, ProviderRegistry},
    store::{CredentialStore, InMemoryStore, PgStore},
    AppState,
};
use platform_core::observability::logging::init_logging;
use platform_core::AppError;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();

    // Fail fast on invalid configuration
    let config = IdentityConfig::from_env()?;
    init_logging(&config.service_name, &config.log_level);

    tracing::info!(
        service = %config.service_name,
        environment = ?config.environment,
        "Starting identity service"
    );

    let store: Arc<dyn CredentialStore> = match &config.database_url {
        Some(url) => {
            let pg = PgStore::connect(url)
                .await
                .map_err(|e| AppError::Config(anyhow::anyhow!("database connect failed: {e}")))?;
            pg.init_schema()
                .await
                .map_err(|e| AppError::Config(anyhow::anyhow!("schema init failed: {e}")))?;
            tracing::info!("Postgres store initialized");
            Arc::new(pg)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using the in-memory store");
            Arc::new(InMemoryStore::new())
        }
    };

    let sender: Arc<dyn NotificationSender> = match &config.smtp {
        Some(smtp) => Arc::new(SmtpSender::new(smtp).map_err(|e| {
            AppError::Config(anyhow::anyhow!("SMTP init failed: {e}"))
        })?),
        None => {
            tracing::warn!("SMTP not configured, using the log-only sender");
            Arc::new(LogSender)
        }
    };

    let mut providers = ProviderRegistry::new();
    if let Some(google) = &config.google {
        providers.register(Arc::new(GoogleProvider::new(google)));
        tracing::info!("Google login provider registered");
    }

    let port = config.common.port;
    let state = AppState::new(config, store, sender, providers);
    let app = build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!(address = %addr, "Listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Service shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}
