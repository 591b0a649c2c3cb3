use axum::{extract::State, Extension, Json};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::{
    jwt::{create_token_pair, hash_token, verify_token, TokenPair, TokenType},
    middleware::AuthUser,
    password::{hash_password, verify_password},
};
use crate::error::{AppError, AppResult};
use crate::models::user::{RefreshToken, User, UserProfile};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: String,
    pub timezone: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

async fn store_refresh_token(
    db: &sqlx::PgPool,
    user_id: Uuid,
    raw_refresh_token: &str,
    ttl_secs: i64,
    parent_token_id: Option<Uuid>,
) -> AppResult<Uuid> {
    let id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO refresh_tokens (id, user_id, token_hash, expires_at, parent_token_id)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(id)
    .bind(user_id)
    .bind(hash_token(raw_refresh_token))
    .bind(Utc::now() + Duration::seconds(ttl_secs))
    .bind(parent_token_id)
    .execute(db)
    .await?;
    Ok(id)
}

/// Create a token pair and persist the refresh token hash.
async fn issue_token_pair(
    db: &sqlx::PgPool,
    user_id: Uuid,
    email: &str,
    config: &crate::config::Config,
    parent_token_id: Option<Uuid>,
) -> AppResult<TokenPair> {
    let tokens = create_token_pair(user_id, email, config)?;
    store_refresh_token(
        db,
        user_id,
        &tokens.refresh_token,
        config.jwt_refresh_ttl_secs,
        parent_token_id,
    )
    .await?;
    Ok(tokens)
}

async fn revoke_all_user_tokens(db: &sqlx::PgPool, user_id: Uuid) -> AppResult<()> {
    sqlx::query(
        r#"
        UPDATE refresh_tokens
        SET revoked = true, revoked_at = NOW()
        WHERE user_id = $1 AND revoked = false
        "#,
    )
    .bind(user_id)
    .execute(db)
    .await?;
    Ok(())
}

pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> AppResult<Json<TokenPair>> {
    if body.email.is_empty() || !body.email.contains('@') {
        return Err(AppError::Validation("A valid email is required".into()));
    }
    if body.password.len() < 8 {
        return Err(AppError::Validation(
            "Password must be at least 8 characters".into(),
        ));
    }

    let timezone = body.timezone.unwrap_or_else(|| "UTC".into());
    if timezone.parse::<chrono_tz::Tz>().is_err() {
        return Err(AppError::Validation("Unknown timezone".into()));
    }

    let existing = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE email = $1")
        .bind(&body.email)
        .fetch_one(&state.db)
        .await?;
    if existing > 0 {
        return Err(AppError::Conflict("Email already registered".into()));
    }

    let user_id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO users (id, email, password_hash, name, timezone)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(user_id)
    .bind(&body.email)
    .bind(hash_password(&body.password)?)
    .bind(&body.name)
    .bind(&timezone)
    .execute(&state.db)
    .await?;

    tracing::info!(user_id = %user_id, "New user registered");

    let tokens = issue_token_pair(&state.db, user_id, &body.email, &state.config, None).await?;
    Ok(Json(tokens))
}

pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> AppResult<Json<TokenPair>> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
        .bind(&body.email)
        .fetch_optional(&state.db)
        .await?
        .ok_or(AppError::Unauthorized)?;

    if !verify_password(&body.password, &user.password_hash)? {
        return Err(AppError::Unauthorized);
    }

    let tokens = issue_token_pair(&state.db, user.id, &user.email, &state.config, None).await?;
    Ok(Json(tokens))
}

#[derive(Debug, PartialEq)]
enum RefreshCheck {
    Valid,
    Reused,
    Rejected,
}

/// Decide whether a stored refresh token may be rotated. The persisted
/// `expires_at` is authoritative: rows issued under an older, longer TTL die
/// at their stored expiry even if the JWT `exp` claim would still pass.
fn check_stored_token(stored: &RefreshToken, claimed_user: Uuid, now: DateTime<Utc>) -> RefreshCheck {
    if stored.revoked {
        return RefreshCheck::Reused;
    }
    if stored.user_id != claimed_user {
        return RefreshCheck::Rejected;
    }
    if stored.expires_at <= now {
        return RefreshCheck::Rejected;
    }
    RefreshCheck::Valid
}

pub async fn refresh(
    State(state): State<AppState>,
    Json(body): Json<RefreshRequest>,
) -> AppResult<Json<TokenPair>> {
    let token_data = verify_token(&body.refresh_token, &state.config)?;

    if token_data.claims.token_type != TokenType::Refresh {
        return Err(AppError::Unauthorized);
    }

    let stored = sqlx::query_as::<_, RefreshToken>(
        "SELECT * FROM refresh_tokens WHERE token_hash = $1",
    )
    .bind(hash_token(&body.refresh_token))
    .fetch_optional(&state.db)
    .await?
    .ok_or(AppError::Unauthorized)?;

    match check_stored_token(&stored, token_data.claims.sub, Utc::now()) {
        // Reuse detection: a revoked token being replayed means the family
        // may be compromised, so revoke everything for the user.
        RefreshCheck::Reused => {
            tracing::warn!(
                user_id = %stored.user_id,
                token_id = %stored.id,
                "Refresh token reuse detected — revoking all tokens for user"
            );
            revoke_all_user_tokens(&state.db, stored.user_id).await?;
            return Err(AppError::Unauthorized);
        }
        RefreshCheck::Rejected => return Err(AppError::Unauthorized),
        RefreshCheck::Valid => {}
    }

    // Single-use rotation.
    sqlx::query("UPDATE refresh_tokens SET revoked = true, revoked_at = NOW() WHERE id = $1")
        .bind(stored.id)
        .execute(&state.db)
        .await?;

    let tokens = issue_token_pair(
        &state.db,
        token_data.claims.sub,
        &token_data.claims.email,
        &state.config,
        Some(stored.id),
    )
    .await?;
    Ok(Json(tokens))
}

pub async fn logout(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> AppResult<Json<serde_json::Value>> {
    revoke_all_user_tokens(&state.db, auth_user.id).await?;
    Ok(Json(serde_json::json!({ "message": "Logged out successfully" })))
}

pub async fn me(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> AppResult<Json<UserProfile>> {
    let user = crate::handlers::fetch_user(&state.db, auth_user.id).await?;
    Ok(Json(user.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        "2024-03-15T12:00:00Z".parse().unwrap()
    }

    fn stored_token(user_id: Uuid, expires_at: DateTime<Utc>, revoked: bool) -> RefreshToken {
        RefreshToken {
            id: Uuid::new_v4(),
            user_id,
            token_hash: "abc123".into(),
            parent_token_id: None,
            expires_at,
            revoked,
            created_at: now() - Duration::hours(1),
        }
    }

    #[test]
    fn live_token_for_matching_user_is_valid() {
        let user_id = Uuid::new_v4();
        let stored = stored_token(user_id, now() + Duration::days(7), false);
        assert_eq!(check_stored_token(&stored, user_id, now()), RefreshCheck::Valid);
    }

    #[test]
    fn revoked_token_reports_reuse() {
        let user_id = Uuid::new_v4();
        let stored = stored_token(user_id, now() + Duration::days(7), true);
        assert_eq!(check_stored_token(&stored, user_id, now()), RefreshCheck::Reused);
    }

    #[test]
    fn stored_expiry_wins_over_jwt_exp() {
        // Row persisted with a shorter lifetime than the JWT claim would
        // allow; the row decides.
        let user_id = Uuid::new_v4();
        let stored = stored_token(user_id, now() - Duration::seconds(1), false);
        assert_eq!(check_stored_token(&stored, user_id, now()), RefreshCheck::Rejected);
    }

    #[test]
    fn user_mismatch_is_rejected() {
        let stored = stored_token(Uuid::new_v4(), now() + Duration::days(7), false);
        assert_eq!(
            check_stored_token(&stored, Uuid::new_v4(), now()),
            RefreshCheck::Rejected
        );
    }
}
