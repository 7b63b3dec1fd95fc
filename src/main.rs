use rusty_library_lending::{
    adapters::memory::LedgerStore as MemoryLedgerStore,
    adapters::mock::CatalogReader as MockCatalogReader,
    adapters::postgres::{PostgresCatalogReader, PostgresLedgerStore},
    api::{handlers::AppState, router::create_router},
    application::lending::ServiceDependencies,
    config::{AppConfig, LedgerBackend},
    ports::{CatalogReader, LedgerStore},
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rusty_library_lending=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;

    tracing::info!(
        backend = ?config.backend,
        ledger = %config.ledger_key,
        max_attempts = config.retry_policy.max_attempts,
        "Starting lending service"
    );

    // Initialize adapters
    let (ledger_store, catalog_reader): (Arc<dyn LedgerStore>, Arc<dyn CatalogReader>) =
        match (config.backend, config.database_url.as_deref()) {
            (LedgerBackend::Postgres, Some(database_url)) => {
                let pool = sqlx::postgres::PgPoolOptions::new()
                    .max_connections(5)
                    .connect(database_url)
                    .await?;

                sqlx::migrate!("./migrations").run(&pool).await?;
                tracing::info!("Database migrations applied");

                let ledger_store: Arc<dyn LedgerStore> =
                    Arc::new(PostgresLedgerStore::new(pool.clone()));
                let catalog_reader: Arc<dyn CatalogReader> =
                    Arc::new(PostgresCatalogReader::new(pool));
                (ledger_store, catalog_reader)
            }
            _ => {
                tracing::warn!("Using in-memory ledger store; state is lost on restart");
                let catalog = match &config.catalog_fixture {
                    Some(path) => {
                        let json = std::fs::read_to_string(path)?;
                        let catalog = MockCatalogReader::from_json(&json)?;
                        tracing::info!(path = %path.display(), "Catalog seeded from fixture");
                        catalog
                    }
                    None => {
                        tracing::warn!("CATALOG_FIXTURE not set; catalog is empty");
                        MockCatalogReader::new()
                    }
                };
                let ledger_store: Arc<dyn LedgerStore> = Arc::new(MemoryLedgerStore::new());
                let catalog_reader: Arc<dyn CatalogReader> = Arc::new(catalog);
                (ledger_store, catalog_reader)
            }
        };

    // Create service dependencies
    let service_deps = ServiceDependencies {
        ledger_store,
        catalog_reader,
        ledger_key: config.ledger_key.clone(),
        retry_policy: config.retry_policy.clone(),
    };

    // Create application state
    let app_state = Arc::new(AppState {
        service_deps,
        operation_timeout: config.operation_timeout,
    });

    // Create router
    let app = create_router(app_state);

    // Server configuration
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on {}", addr);

    // Start server
    axum::serve(listener, app).await?;

    Ok(())
}
