use sqlx::{Pool, Sqlite};
use tracing::instrument;

use super::get_recent_events;
use crate::error::AppError;
use crate::models::SystemStats;

async fn scalar(pool: &Pool<Sqlite>, sql: &str) -> Result<i64, AppError> {
    let (value,): (Option<i64>,) = sqlx::query_as(sql).fetch_one(pool).await?;
    Ok(value.unwrap_or_default())
}

#[instrument(skip(pool))]
pub async fn get_system_stats(pool: &Pool<Sqlite>) -> Result<SystemStats, AppError> {
    Ok(SystemStats {
        total_users: scalar(pool, "SELECT COUNT(*) FROM users").await?,
        active_users_7d: scalar(
            pool,
            "SELECT COUNT(*) FROM users WHERE last_login > datetime('now', '-7 day')",
        )
        .await?,
        total_certificates: scalar(pool, "SELECT COUNT(*) FROM certificates").await?,
        total_points: scalar(pool, "SELECT SUM(points) FROM user_progress").await?,
        total_events: scalar(pool, "SELECT COUNT(*) FROM user_events").await?,
        recent_events: get_recent_events(pool, 20).await?,
    })
}
