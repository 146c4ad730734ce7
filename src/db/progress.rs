use sqlx::{Pool, Sqlite};
use tracing::{info, instrument};

use crate::error::AppError;
use crate::models::{DbProgress, Progress, ProgressSummary};

/// Which completed-id set an award goes into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionKind {
    Tutorial,
    Challenge,
}

impl CompletionKind {
    pub fn event_type(&self) -> &'static str {
        match self {
            CompletionKind::Tutorial => "tutorial_completed",
            CompletionKind::Challenge => "challenge_completed",
        }
    }

    // Appends the id and adds the points in one statement, and only when the
    // id is not already in the set.
    fn award_sql(&self) -> &'static str {
        match self {
            CompletionKind::Tutorial => {
                "UPDATE user_progress
                 SET points = points + ?,
                     completed_tutorials = json_insert(completed_tutorials, '$[#]', ?),
                     updated_at = CURRENT_TIMESTAMP
                 WHERE user_id = ?
                   AND NOT EXISTS (
                       SELECT 1 FROM json_each(user_progress.completed_tutorials) WHERE value = ?
                   )"
            }
            CompletionKind::Challenge => {
                "UPDATE user_progress
                 SET points = points + ?,
                     completed_challenges = json_insert(completed_challenges, '$[#]', ?),
                     updated_at = CURRENT_TIMESTAMP
                 WHERE user_id = ?
                   AND NOT EXISTS (
                       SELECT 1 FROM json_each(user_progress.completed_challenges) WHERE value = ?
                   )"
            }
        }
    }
}

async fn ensure_progress_row(pool: &Pool<Sqlite>, user_id: i64) -> Result<(), AppError> {
    sqlx::query("INSERT OR IGNORE INTO user_progress (user_id) VALUES (?)")
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(())
}

#[instrument(skip(pool))]
pub async fn get_progress(pool: &Pool<Sqlite>, user_id: i64) -> Result<Progress, AppError> {
    ensure_progress_row(pool, user_id).await?;

    let row = sqlx::query_as::<_, DbProgress>(
        "SELECT user_id, points, completed_tutorials, completed_challenges, emoji_collection
         FROM user_progress WHERE user_id = ?",
    )
    .bind(user_id)
    .fetch_one(pool)
    .await?;

    Ok(Progress::try_from(row)?)
}

/// Records a completion and awards `points` the first time only. Returns
/// whether this call did the awarding.
#[instrument(skip(pool))]
pub async fn award_completion(
    pool: &Pool<Sqlite>,
    user_id: i64,
    kind: CompletionKind,
    item_id: usize,
    points: i64,
) -> Result<bool, AppError> {
    ensure_progress_row(pool, user_id).await?;

    let item_id = item_id as i64;
    let res = sqlx::query(kind.award_sql())
        .bind(points)
        .bind(item_id)
        .bind(user_id)
        .bind(item_id)
        .execute(pool)
        .await?;

    let awarded = res.rows_affected() == 1;
    if awarded {
        info!(points, "Completion awarded");
    }
    Ok(awarded)
}

/// Adds a badge unless it is already collected. Returns whether it was new.
#[instrument(skip(pool))]
pub async fn add_badge(pool: &Pool<Sqlite>, user_id: i64, badge: &str) -> Result<bool, AppError> {
    ensure_progress_row(pool, user_id).await?;

    let res = sqlx::query(
        "UPDATE user_progress
         SET emoji_collection = json_insert(emoji_collection, '$[#]', ?),
             updated_at = CURRENT_TIMESTAMP
         WHERE user_id = ?
           AND NOT EXISTS (
               SELECT 1 FROM json_each(user_progress.emoji_collection) WHERE value = ?
           )",
    )
    .bind(badge)
    .bind(user_id)
    .bind(badge)
    .execute(pool)
    .await?;

    Ok(res.rows_affected() == 1)
}

#[instrument(skip(pool))]
pub async fn get_progress_summaries(pool: &Pool<Sqlite>) -> Result<Vec<ProgressSummary>, AppError> {
    let rows: Vec<(i64, String, Option<i64>, Option<i64>, Option<i64>, Option<i64>)> =
        sqlx::query_as(
            "SELECT u.id, u.username, p.points,
                    json_array_length(p.completed_tutorials),
                    json_array_length(p.completed_challenges),
                    json_array_length(p.emoji_collection)
             FROM users u
             LEFT JOIN user_progress p ON p.user_id = u.id
             ORDER BY COALESCE(p.points, 0) DESC, u.username",
        )
        .fetch_all(pool)
        .await?;

    Ok(rows
        .into_iter()
        .map(
            |(user_id, username, points, tutorials, challenges, emojis)| ProgressSummary {
                user_id,
                username,
                points: points.unwrap_or_default(),
                tutorials_completed: tutorials.unwrap_or_default() as usize,
                challenges_completed: challenges.unwrap_or_default() as usize,
                emojis_collected: emojis.unwrap_or_default() as usize,
            },
        )
        .collect())
}
