use axum::{
    extract::{Query, State},
    Extension, Json,
};
use chrono::{Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::analytics::{self, Window};
use crate::auth::middleware::AuthUser;
use crate::error::{AppError, AppResult};
use crate::models::entry::MoodEntry;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub current_streak: u32,
    pub average_mood: Option<f64>,
    pub modal_mood: Option<i32>,
    pub total_entries: usize,
}

#[derive(Debug, Deserialize)]
pub struct TrendQuery {
    pub days: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct CalendarQuery {
    pub year: i32,
    pub month: u32,
}

/// One cell of the month view. When a day has several entries the most
/// recent one supplies the emoji and level.
#[derive(Debug, Serialize)]
pub struct CalendarDay {
    pub date: NaiveDate,
    pub mood_level: Option<i32>,
    pub mood_emoji: Option<String>,
    pub entry_count: usize,
}

pub async fn get_stats(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> AppResult<Json<StatsResponse>> {
    let user = crate::handlers::fetch_user(&state.db, auth_user.id).await?;
    let entries = crate::handlers::fetch_entries(&state.db, auth_user.id).await?;

    let now = Utc::now();
    let tz = analytics::parse_timezone(&user.timezone);
    let stats = analytics::aggregate(&entries, Window::All, now);

    Ok(Json(StatsResponse {
        current_streak: analytics::compute_streak(&entries, now, tz),
        average_mood: stats.average_mood,
        modal_mood: stats.modal_mood,
        total_entries: stats.entry_count,
    }))
}

pub async fn get_trend(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Query(query): Query<TrendQuery>,
) -> AppResult<Json<Vec<analytics::TrendPoint>>> {
    let days = query.days.unwrap_or(30);
    if !(1..=365).contains(&days) {
        return Err(AppError::Validation("days must be between 1 and 365".into()));
    }

    let user = crate::handlers::fetch_user(&state.db, auth_user.id).await?;
    let entries = crate::handlers::fetch_entries(&state.db, auth_user.id).await?;
    let tz = analytics::parse_timezone(&user.timezone);

    Ok(Json(analytics::daily_trend(&entries, days, Utc::now(), tz)))
}

pub async fn get_calendar(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Query(query): Query<CalendarQuery>,
) -> AppResult<Json<Vec<CalendarDay>>> {
    let first = NaiveDate::from_ymd_opt(query.year, query.month, 1)
        .ok_or(AppError::Validation("Invalid year/month".into()))?;

    let user = crate::handlers::fetch_user(&state.db, auth_user.id).await?;
    let entries = crate::handlers::fetch_entries(&state.db, auth_user.id).await?;
    let tz = analytics::parse_timezone(&user.timezone);

    let next_month = if query.month == 12 {
        NaiveDate::from_ymd_opt(query.year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(query.year, query.month + 1, 1)
    }
    .ok_or(AppError::Validation("Invalid year/month".into()))?;

    let mut days = Vec::with_capacity(31);
    let mut date = first;
    while date < next_month {
        // Entries arrive newest-first, so the first match is the day's
        // representative entry.
        let mut representative: Option<&MoodEntry> = None;
        let mut count = 0usize;
        for entry in &entries {
            if analytics::day_key(entry.created_at, tz) == date {
                if representative.is_none() {
                    representative = Some(entry);
                }
                count += 1;
            }
        }

        days.push(CalendarDay {
            date,
            mood_level: representative.map(|e| e.mood_level),
            mood_emoji: representative.map(|e| e.mood_emoji.clone()),
            entry_count: count,
        });
        date += Duration::days(1);
    }

    Ok(Json(days))
}
