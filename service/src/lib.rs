use config::Config;
use log::info;
use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};
use tokio::time::Duration;

pub mod config;
pub mod logging;

/// All platform tables live in this PostgreSQL schema.
const DEFAULT_SCHEMA: &str = "copilot_platform";

/// Builds the SeaORM connection pool from the pool settings in `Config` and
/// pins the search path to the platform schema.
pub async fn init_database(config: &Config) -> Result<DatabaseConnection, DbErr> {
    let mut options = ConnectOptions::new(config.database_url().to_owned());
    options
        .max_connections(config.db_max_connections)
        .min_connections(config.db_min_connections)
        .connect_timeout(Duration::from_secs(config.db_connect_timeout_secs))
        .acquire_timeout(Duration::from_secs(config.db_acquire_timeout_secs))
        .idle_timeout(Duration::from_secs(config.db_idle_timeout_secs))
        .max_lifetime(Duration::from_secs(config.db_max_lifetime_secs))
        .sqlx_logging(true)
        .sqlx_logging_level(log::LevelFilter::Info)
        .set_schema_search_path(DEFAULT_SCHEMA);

    info!(
        "Connecting to database (pool: {}-{} connections, connect timeout {}s, acquire timeout {}s)",
        config.db_min_connections,
        config.db_max_connections,
        config.db_connect_timeout_secs,
        config.db_acquire_timeout_secs,
    );

    let db = Database::connect(options).await?;
    info!("Database connection pool established");

    Ok(db)
}
