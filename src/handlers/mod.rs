pub mod achievements;
pub mod assistant;
pub mod auth;
pub mod entries;
pub mod export;
pub mod health;
pub mod insights;
pub mod profile;
pub mod reminders;
pub mod stats;

use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::entry::MoodEntry;
use crate::models::user::User;

/// Load the authenticated user's row (several handlers need the stored
/// time zone for day bucketing).
pub(crate) async fn fetch_user(db: &PgPool, user_id: Uuid) -> AppResult<User> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(db)
        .await?
        .ok_or(AppError::NotFound("User not found".into()))
}

/// Full entry list for one user, newest first. The analytics core does not
/// depend on the ordering; export and the assistant context do.
pub(crate) async fn fetch_entries(db: &PgPool, user_id: Uuid) -> AppResult<Vec<MoodEntry>> {
    let entries = sqlx::query_as::<_, MoodEntry>(
        "SELECT * FROM mood_entries WHERE user_id = $1 ORDER BY created_at DESC",
    )
    .bind(user_id)
    .fetch_all(db)
    .await?;
    Ok(entries)
}
