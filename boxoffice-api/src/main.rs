use anyhow::Context;
use boxoffice_api::{app, metrics::Metrics, AppState};
use boxoffice_core::{AllocationEngine, TicketStore};
use boxoffice_store::app_config::{Config, StorageBackend};
use boxoffice_store::{DbClient, InMemoryTicketStore, PostgresTicketStore, RedisClient};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "boxoffice_api=debug,boxoffice_core=info,boxoffice_store=info,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    info!("Starting BoxOffice API on port {}", config.server.port);

    let store: Arc<dyn TicketStore> = match config.database.backend {
        StorageBackend::Postgres => {
            let url = config
                .database
                .url
                .as_deref()
                .context("database.url is required for the postgres backend")?;
            let db = DbClient::new(url, &config.database)
                .await
                .context("Failed to connect to Postgres")?;
            db.migrate().await.context("Failed to run migrations")?;
            Arc::new(PostgresTicketStore::new(db.pool, config.database.lock_timeout_ms))
        }
        StorageBackend::Memory => {
            warn!("Using the in-memory ticket store; nothing survives a restart");
            Arc::new(
                InMemoryTicketStore::new()
                    .with_lock_timeout(Duration::from_millis(config.database.lock_timeout_ms)),
            )
        }
    };

    let redis = match &config.redis {
        Some(redis_config) => {
            let client = RedisClient::new(&redis_config.url).context("Invalid Redis URL")?;
            info!(
                "Rate limiting {} requests per {}s per client",
                config.rate_limit.max_requests, config.rate_limit.window_seconds
            );
            Some(Arc::new(client))
        }
        None => {
            warn!("No Redis configured, rate limiting disabled");
            None
        }
    };

    let app_state = AppState {
        engine: AllocationEngine::new(store),
        redis,
        rate_limit: config.rate_limit,
        metrics: Arc::new(Metrics::new().context("Failed to register metrics")?),
    };

    let app = app(app_state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received, draining connections");
}
