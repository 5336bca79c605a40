use chrono::Utc;
use dotenvy::dotenv;
use order_ledger::{
    api::{self, AppState},
    config::{
        database::{self, DEFAULT_DATABASE_URL},
        load_app_configuration,
    },
    core::installment,
    errors::Result,
    gateway::{DisabledGateway, HttpGateway, LogNotifier, PaymentGateway},
};
use sea_orm::DatabaseConnection;
use std::{sync::Arc, time::Duration};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Periodically flags PENDING installments past their due date as OVERDUE.
fn spawn_overdue_sweep(db: DatabaseConnection, every: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            if let Err(e) = installment::refresh_overdue(&db, Utc::now().date_naive()).await {
                error!("Overdue sweep failed: {}", e);
            }
        }
    });
}

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file, non-fatal since env vars can be set externally
    dotenv().ok();

    // 3. Load the main application configuration
    let app_config = load_app_configuration()?;

    // 4. Connect and make sure the schema exists
    let database_url = database::get_database_url(app_config.database.url.as_deref());
    if database_url == DEFAULT_DATABASE_URL {
        std::fs::create_dir_all("data")?;
    }
    let db = database::create_connection(&database_url)
        .await
        .inspect_err(|e| error!("Failed to connect to database: {}", e))?;
    database::create_tables(&db)
        .await
        .inspect(|()| info!("Database initialized successfully."))
        .inspect_err(|e| error!("Failed to initialize database: {}", e))?;

    // 5. Outbound collaborators
    let gateway: Arc<dyn PaymentGateway> = match HttpGateway::from_config(&app_config.gateway)? {
        Some(http) => Arc::new(http),
        None => {
            warn!("No payment gateway configured; boletos will be created without payment codes");
            Arc::new(DisabledGateway)
        }
    };

    if app_config.server.overdue_sweep_secs > 0 {
        spawn_overdue_sweep(
            db.clone(),
            Duration::from_secs(app_config.server.overdue_sweep_secs),
        );
    }

    // 6. Serve
    let address = format!("{}:{}", app_config.server.host, app_config.server.port);
    let state = AppState {
        db,
        config: Arc::new(app_config),
        gateway,
        notifier: Arc::new(LogNotifier),
    };

    let listener = tokio::net::TcpListener::bind(&address).await?;
    info!(%address, "Listening");
    axum::serve(listener, api::router(state)).await?;

    Ok(())
}
