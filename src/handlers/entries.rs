use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use uuid::Uuid;

use crate::auth::middleware::AuthUser;
use crate::error::{AppError, AppResult};
use crate::models::entry::{mood_descriptor, CreateEntryRequest, EntryQuery, MoodEntry};
use crate::AppState;

const MAX_NOTE_LEN: usize = 2000;

pub async fn create_entry(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(body): Json<CreateEntryRequest>,
) -> AppResult<Json<MoodEntry>> {
    let mood = mood_descriptor(body.mood_level)
        .ok_or(AppError::Validation("Mood must be between 1 and 5".into()))?;

    if let Some(notes) = &body.notes {
        if notes.chars().count() > MAX_NOTE_LEN {
            return Err(AppError::Validation(format!(
                "Notes must be at most {} characters",
                MAX_NOTE_LEN
            )));
        }
    }
    let notes = body.notes.filter(|n| !n.trim().is_empty());

    let entry = sqlx::query_as::<_, MoodEntry>(
        r#"
        INSERT INTO mood_entries (id, user_id, mood_level, mood_emoji, mood_color, notes)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(auth_user.id)
    .bind(body.mood_level)
    .bind(mood.emoji)
    .bind(mood.color)
    .bind(&notes)
    .fetch_one(&state.db)
    .await?;

    // Unlocks depend on the full history, so evaluate after the insert.
    let unlocked =
        crate::handlers::achievements::evaluate_and_unlock(&state.db, auth_user.id).await?;
    if !unlocked.is_empty() {
        tracing::info!(user_id = %auth_user.id, achievements = ?unlocked, "Achievements unlocked");
    }

    Ok(Json(entry))
}

pub async fn list_entries(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Query(query): Query<EntryQuery>,
) -> AppResult<Json<Vec<MoodEntry>>> {
    let entries = match (query.start_date, query.end_date) {
        (None, None) => crate::handlers::fetch_entries(&state.db, auth_user.id).await?,
        (start, end) => {
            sqlx::query_as::<_, MoodEntry>(
                r#"
                SELECT * FROM mood_entries
                WHERE user_id = $1
                  AND ($2::date IS NULL OR created_at >= $2::date)
                  AND ($3::date IS NULL OR created_at < $3::date + INTERVAL '1 day')
                ORDER BY created_at DESC
                "#,
            )
            .bind(auth_user.id)
            .bind(start)
            .bind(end)
            .fetch_all(&state.db)
            .await?
        }
    };

    Ok(Json(entries))
}

pub async fn delete_entry(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(entry_id): Path<Uuid>,
) -> AppResult<Json<serde_json::Value>> {
    // Idempotent: deleting an already-gone entry still returns 200.
    let result = sqlx::query("DELETE FROM mood_entries WHERE id = $1 AND user_id = $2")
        .bind(entry_id)
        .bind(auth_user.id)
        .execute(&state.db)
        .await?;

    if result.rows_affected() > 0 {
        tracing::debug!(user_id = %auth_user.id, entry_id = %entry_id, "Entry deleted");
    }

    Ok(Json(serde_json::json!({ "deleted": true })))
}
