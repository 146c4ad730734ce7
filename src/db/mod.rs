pub mod certificates;
pub mod events;
pub mod migrations;
pub mod progress;
pub mod schema;
pub mod sessions;
pub mod stats;
pub mod users;

pub use certificates::*;
pub use events::*;
pub use migrations::{Migrator, SchemaDiff, normalize_sql};
pub use progress::*;
pub use schema::CURRENT_SCHEMA;
pub use sessions::*;
pub use stats::*;
pub use users::*;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::str::FromStr;
use tracing::info;

use crate::error::AppError;

/// Opens the pool (creating the file if needed) and brings the schema up to
/// date.
pub async fn connect_and_migrate(database_url: &str) -> Result<Pool<Sqlite>, AppError> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new().connect_with(options).await?;

    info!("Running declarative schema migration");
    Migrator::from_env(pool.clone(), CURRENT_SCHEMA)
        .migrate()
        .await?;

    Ok(pool)
}
