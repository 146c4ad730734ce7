use sqlx::{Pool, Sqlite};
use tracing::instrument;

use crate::error::AppError;
use crate::models::{DbEvent, Event};

#[instrument(skip(pool, details))]
pub async fn log_event(
    pool: &Pool<Sqlite>,
    user_id: i64,
    event_type: &str,
    details: &str,
) -> Result<i64, AppError> {
    let res = sqlx::query(
        "INSERT INTO user_events (user_id, event_type, event_details) VALUES (?, ?, ?)",
    )
    .bind(user_id)
    .bind(event_type)
    .bind(details)
    .execute(pool)
    .await?;

    Ok(res.last_insert_rowid())
}

/// Audit logging must never fail the request that triggered it.
pub async fn log_event_quietly(pool: &Pool<Sqlite>, user_id: i64, event_type: &str, details: &str) {
    if let Err(err) = log_event(pool, user_id, event_type, details).await {
        err.log_and_record("Recording user event");
    }
}

#[instrument(skip(pool))]
pub async fn get_user_events(
    pool: &Pool<Sqlite>,
    user_id: i64,
    limit: i64,
) -> Result<Vec<Event>, AppError> {
    let rows = sqlx::query_as::<_, DbEvent>(
        "SELECT e.id, e.user_id, u.username, e.event_type, e.event_details, e.timestamp
         FROM user_events e
         JOIN users u ON e.user_id = u.id
         WHERE e.user_id = ?
         ORDER BY e.timestamp DESC, e.id DESC
         LIMIT ?",
    )
    .bind(user_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(Event::from).collect())
}

#[instrument(skip(pool))]
pub async fn get_recent_events(pool: &Pool<Sqlite>, limit: i64) -> Result<Vec<Event>, AppError> {
    let rows = sqlx::query_as::<_, DbEvent>(
        "SELECT e.id, e.user_id, u.username, e.event_type, e.event_details, e.timestamp
         FROM user_events e
         JOIN users u ON e.user_id = u.id
         ORDER BY e.timestamp DESC, e.id DESC
         LIMIT ?",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(Event::from).collect())
}
