use axum::{extract::State, Extension, Json};

use crate::auth::middleware::AuthUser;
use crate::error::{AppError, AppResult};
use crate::models::user::{UpdateProfileRequest, User, UserProfile};
use crate::AppState;

pub async fn update_profile(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(body): Json<UpdateProfileRequest>,
) -> AppResult<Json<UserProfile>> {
    if let Some(name) = &body.name {
        if name.trim().is_empty() {
            return Err(AppError::Validation("Name must not be empty".into()));
        }
    }
    if let Some(timezone) = &body.timezone {
        if timezone.parse::<chrono_tz::Tz>().is_err() {
            return Err(AppError::Validation("Unknown timezone".into()));
        }
    }

    let user = sqlx::query_as::<_, User>(
        r#"
        UPDATE users SET
            name = COALESCE($2, name),
            avatar_url = COALESCE($3, avatar_url),
            timezone = COALESCE($4, timezone),
            updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(auth_user.id)
    .bind(&body.name)
    .bind(&body.avatar_url)
    .bind(&body.timezone)
    .fetch_optional(&state.db)
    .await?
    .ok_or(AppError::NotFound("User not found".into()))?;

    Ok(Json(user.into()))
}

/// Delete the account and everything hanging off it. Child tables cascade on
/// the user row, but the deletes are explicit so the order (and the logs)
/// stay meaningful if the constraints ever change.
pub async fn delete_account(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> AppResult<Json<serde_json::Value>> {
    let mut tx = state.db.begin().await?;

    for table in ["mood_entries", "achievements", "reminders", "refresh_tokens"] {
        sqlx::query(&format!("DELETE FROM {} WHERE user_id = $1", table))
            .bind(auth_user.id)
            .execute(&mut *tx)
            .await?;
    }

    sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(auth_user.id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    tracing::info!(user_id = %auth_user.id, "Account deleted");
    Ok(Json(serde_json::json!({ "message": "Account deleted successfully" })))
}
