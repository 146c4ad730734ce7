#[macro_use]
extern crate rocket;

pub mod api;
pub mod auth;
pub mod config;
pub mod content;
pub mod db;
pub mod env;
pub mod error;
pub mod executor;
pub mod models;
pub mod rewards;
pub mod telemetry;
pub mod tutor;
pub mod validation;
#[cfg(test)]
mod test;

use rocket::{Build, Rocket};
use sqlx::SqlitePool;
use tracing::info;

use api::*;
use auth::{forbidden_api, not_found_api, unauthorized_api};
use config::AppConfig;
use content::Catalog;
use executor::CodeRunner;
use telemetry::TelemetryFairing;
use tutor::{ChatContexts, Tutor};

/// Everything the routes need, built once at startup.
pub struct AppState {
    pub pool: SqlitePool,
    pub config: AppConfig,
    pub catalog: Catalog,
    pub runner: CodeRunner,
    pub tutor: Tutor,
}

pub fn init_rocket(state: AppState) -> Rocket<Build> {
    info!(
        tutorials = state.catalog.tutorials.len(),
        challenges = state.catalog.challenges.len(),
        ai_tutor = state.tutor.is_ai_enabled(),
        "Starting PyKids"
    );

    rocket::build()
        .manage(state.pool)
        .manage(state.config)
        .manage(state.catalog)
        .manage(state.runner)
        .manage(state.tutor)
        .manage(ChatContexts::default())
        .mount(
            "/api",
            routes![
                health,
                api_signup,
                api_login,
                api_logout,
                api_me,
                api_update_profile,
                api_change_password,
                api_list_tutorials,
                api_get_tutorial,
                api_complete_tutorial,
                api_list_challenges,
                api_get_challenge,
                api_submit_challenge,
                api_run_code,
                api_get_progress,
                api_list_certificates,
                api_issue_certificate,
                api_verify_certificate,
                api_ask_tutor,
                api_get_tutor_history,
                api_clear_tutor_history,
                api_admin_list_users,
                api_admin_get_user,
                api_admin_update_user,
                api_admin_progress,
                api_admin_stats,
            ],
        )
        .register(
            "/api",
            catchers![unauthorized_api, forbidden_api, not_found_api],
        )
        .attach(TelemetryFairing)
}
