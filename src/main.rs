#[macro_use]
extern crate rocket;

use pykids::config::AppConfig;
use pykids::content::Catalog;
use pykids::db::{clean_expired_sessions, connect_and_migrate, ensure_bootstrap_admin};
use pykids::env::load_environment;
use pykids::executor::CodeRunner;
use pykids::telemetry::init_tracing;
use pykids::tutor::Tutor;
use pykids::{AppState, init_rocket};
use rocket::tokio;
use sqlx::SqlitePool;
use tracing::{error, info, warn};

#[launch]
async fn rocket() -> _ {
    if let Err(e) = load_environment() {
        eprintln!("Failed to load environment files: {}", e);
    }
    init_tracing();

    let config = match AppConfig::from_figment(&rocket::Config::figment()) {
        Ok(config) => config,
        Err(e) => panic!("Configuration error: {}", e),
    };

    let pool = match connect_and_migrate(&config.database_url).await {
        Ok(pool) => pool,
        Err(e) => {
            error!("Failed to prepare database: {}", e);
            panic!("Database setup failed: {}", e);
        }
    };

    if let (Some(username), Some(password)) = (
        &config.bootstrap_admin_username,
        &config.bootstrap_admin_password,
    ) {
        match ensure_bootstrap_admin(&pool, username, password).await {
            Ok(true) => info!(username = %username, "Bootstrap admin created"),
            Ok(false) => {}
            Err(e) => warn!("Could not create bootstrap admin: {}", e),
        }
    }

    spawn_session_cleanup(pool.clone());

    let catalog = match Catalog::load(config.catalog_path.as_deref()) {
        Ok(catalog) => catalog,
        Err(e) => panic!("Failed to load lesson catalog: {}", e),
    };

    let runner = CodeRunner::from_config(&config);
    let tutor = Tutor::from_config(&config);

    init_rocket(AppState {
        pool,
        config,
        catalog,
        runner,
        tutor,
    })
}

fn spawn_session_cleanup(pool: SqlitePool) {
    tokio::spawn(async move {
        tokio::time::sleep(tokio::time::Duration::from_secs(5)).await;

        loop {
            match clean_expired_sessions(&pool).await {
                Ok(count) => {
                    if count > 0 {
                        info!("Cleaned up {} expired sessions", count);
                    }
                }
                Err(e) => {
                    error!("Failed to clean expired sessions: {}", e);
                }
            }

            tokio::time::sleep(tokio::time::Duration::from_secs(3600)).await;
        }
    });
}
