use fellowship_ledger::{
    api::{self, AppState},
    config::{database, settings},
    core::seed,
    errors::{Error, Result},
};
use dotenvy::dotenv;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file; env vars can also be set externally
    dotenv().ok();

    // 3. Load the application configuration
    let app_config = settings::load_default_config()
        .inspect_err(|e| error!("Failed to load configuration: {}", e))?;

    // 4. Connect and make sure the schema exists
    let db = database::create_connection()
        .await
        .inspect_err(|e| error!("Failed to connect to database: {}", e))?;
    database::create_tables(&db)
        .await
        .inspect(|_| info!("Database initialized successfully."))?;

    // 5. Seed sites and activity types listed in config.toml
    let seeded = seed::seed_reference_data(&db, &app_config)
        .await
        .inspect_err(|e| error!("Failed to seed reference data: {}", e))?;
    info!(
        sites = seeded.sites_created,
        activity_types = seeded.activity_types_created,
        "Reference data seeded."
    );

    // 6. Serve the API
    let bind_address = app_config.server.bind_address.clone();
    let app = api::router(AppState::new(Arc::new(db), app_config));
    let listener = tokio::net::TcpListener::bind(bind_address.as_str())
        .await
        .inspect_err(|e| error!("Failed to bind {}: {}", bind_address, e))?;
    info!("Listening on {}", bind_address);

    axum::serve(listener, app).await.map_err(Error::from)
}
