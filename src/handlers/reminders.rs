use axum::{
    extract::{Path, State},
    Extension, Json,
};
use uuid::Uuid;

use crate::auth::middleware::AuthUser;
use crate::error::{AppError, AppResult};
use crate::models::reminder::{CreateReminderRequest, Reminder, UpdateReminderRequest};
use crate::AppState;

pub async fn list_reminders(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> AppResult<Json<Vec<Reminder>>> {
    let reminders = sqlx::query_as::<_, Reminder>(
        "SELECT * FROM reminders WHERE user_id = $1 ORDER BY remind_at ASC",
    )
    .bind(auth_user.id)
    .fetch_all(&state.db)
    .await?;
    Ok(Json(reminders))
}

pub async fn create_reminder(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(body): Json<CreateReminderRequest>,
) -> AppResult<Json<Reminder>> {
    let reminder = sqlx::query_as::<_, Reminder>(
        r#"
        INSERT INTO reminders (id, user_id, remind_at, enabled)
        VALUES ($1, $2, $3, true)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(auth_user.id)
    .bind(body.remind_at)
    .fetch_one(&state.db)
    .await?;
    Ok(Json(reminder))
}

pub async fn update_reminder(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(reminder_id): Path<Uuid>,
    Json(body): Json<UpdateReminderRequest>,
) -> AppResult<Json<Reminder>> {
    let reminder = sqlx::query_as::<_, Reminder>(
        r#"
        UPDATE reminders SET
            remind_at = COALESCE($3, remind_at),
            enabled = COALESCE($4, enabled)
        WHERE id = $1 AND user_id = $2
        RETURNING *
        "#,
    )
    .bind(reminder_id)
    .bind(auth_user.id)
    .bind(body.remind_at)
    .bind(body.enabled)
    .fetch_optional(&state.db)
    .await?
    .ok_or(AppError::NotFound("Reminder not found".into()))?;
    Ok(Json(reminder))
}

pub async fn delete_reminder(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(reminder_id): Path<Uuid>,
) -> AppResult<Json<serde_json::Value>> {
    sqlx::query("DELETE FROM reminders WHERE id = $1 AND user_id = $2")
        .bind(reminder_id)
        .bind(auth_user.id)
        .execute(&state.db)
        .await?;
    Ok(Json(serde_json::json!({ "deleted": true })))
}
