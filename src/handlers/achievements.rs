use axum::{extract::State, Extension, Json};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use sqlx::PgPool;
use uuid::Uuid;

use crate::analytics;
use crate::auth::middleware::AuthUser;
use crate::error::AppResult;
use crate::models::achievement::{Achievement, ACHIEVEMENT_DEFS};
use crate::models::entry::MoodEntry;
use crate::AppState;

/// One catalog entry with its unlock state, so the client can render locked
/// and unlocked achievements in a single pass.
#[derive(Debug, serde::Serialize)]
pub struct AchievementStatus {
    pub achievement_type: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    pub emoji: &'static str,
    pub unlocked_at: Option<DateTime<Utc>>,
}

pub async fn list_achievements(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> AppResult<Json<Vec<AchievementStatus>>> {
    let unlocked = sqlx::query_as::<_, Achievement>(
        "SELECT * FROM achievements WHERE user_id = $1 ORDER BY unlocked_at ASC",
    )
    .bind(auth_user.id)
    .fetch_all(&state.db)
    .await?;

    let statuses = ACHIEVEMENT_DEFS
        .iter()
        .map(|def| AchievementStatus {
            achievement_type: def.achievement_type,
            title: def.title,
            description: def.description,
            emoji: def.emoji,
            unlocked_at: unlocked
                .iter()
                .find(|a| a.achievement_type == def.achievement_type)
                .map(|a| a.unlocked_at),
        })
        .collect();
    Ok(Json(statuses))
}

/// Re-evaluate the user's history and persist any newly earned achievements.
/// Inserts are idempotent, so this is safe to run on every entry creation.
/// Returns the types that were newly unlocked.
pub async fn evaluate_and_unlock(db: &PgPool, user_id: Uuid) -> AppResult<Vec<&'static str>> {
    let user = crate::handlers::fetch_user(db, user_id).await?;
    let entries = crate::handlers::fetch_entries(db, user_id).await?;
    let tz = analytics::parse_timezone(&user.timezone);

    let mut unlocked = Vec::new();
    for achievement_type in due_achievements(&entries, Utc::now(), tz) {
        let inserted = sqlx::query(
            r#"
            INSERT INTO achievements (id, user_id, achievement_type)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id, achievement_type) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(achievement_type)
        .execute(db)
        .await?;

        if inserted.rows_affected() > 0 {
            unlocked.push(achievement_type);
        }
    }
    Ok(unlocked)
}

/// Which achievement criteria the current history satisfies, in catalog
/// order. Pure; the database layer handles dedup against already-unlocked
/// rows.
pub fn due_achievements(entries: &[MoodEntry], now: DateTime<Utc>, tz: Tz) -> Vec<&'static str> {
    let streak = analytics::compute_streak(entries, now, tz);

    ACHIEVEMENT_DEFS
        .iter()
        .map(|def| def.achievement_type)
        .filter(|&achievement_type| match achievement_type {
            "first_entry" => !entries.is_empty(),
            "week_streak" => streak >= 7,
            "month_streak" => streak >= 30,
            "fifty_entries" => entries.len() >= 50,
            "hundred_entries" => entries.len() >= 100,
            "positive_week" => is_positive_week(entries, now, tz),
            _ => false,
        })
        .collect()
}

/// An entry on each of the last 7 calendar days (today back through six days
/// ago), averaging above 4 across those entries.
fn is_positive_week(entries: &[MoodEntry], now: DateTime<Utc>, tz: Tz) -> bool {
    let today = analytics::day_key(now, tz);
    let start = today - chrono::Duration::days(6);

    let mut days = std::collections::HashSet::new();
    let mut sum = 0i64;
    let mut count = 0i64;
    for entry in entries {
        let day = analytics::day_key(entry.created_at, tz);
        if day >= start && day <= today {
            days.insert(day);
            sum += i64::from(entry.mood_level);
            count += 1;
        }
    }

    days.len() == 7 && count > 0 && sum as f64 / count as f64 > 4.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(created_at: &str, mood_level: i32) -> MoodEntry {
        MoodEntry {
            id: Uuid::new_v4(),
            user_id: Uuid::nil(),
            mood_level,
            mood_emoji: "🙂".into(),
            mood_color: "#84cc16".into(),
            notes: None,
            created_at: created_at.parse().expect("test timestamp"),
        }
    }

    fn now() -> DateTime<Utc> {
        "2024-03-15T12:00:00Z".parse().unwrap()
    }

    fn daily_entries(days: u32, level: i32) -> Vec<MoodEntry> {
        (0..days)
            .map(|offset| {
                let date = now() - chrono::Duration::days(offset as i64);
                entry(&date.to_rfc3339(), level)
            })
            .collect()
    }

    #[test]
    fn no_entries_means_nothing_due() {
        assert!(due_achievements(&[], now(), chrono_tz::UTC).is_empty());
    }

    #[test]
    fn first_entry_unlocks_immediately() {
        let entries = vec![entry("2024-03-15T08:00:00Z", 3)];
        let due = due_achievements(&entries, now(), chrono_tz::UTC);
        assert_eq!(due, vec!["first_entry"]);
    }

    #[test]
    fn week_streak_needs_seven_consecutive_days() {
        let due6 = due_achievements(&daily_entries(6, 3), now(), chrono_tz::UTC);
        assert!(!due6.contains(&"week_streak"));

        let due7 = due_achievements(&daily_entries(7, 3), now(), chrono_tz::UTC);
        assert!(due7.contains(&"week_streak"));
        assert!(!due7.contains(&"month_streak"));
    }

    #[test]
    fn month_streak_needs_thirty_consecutive_days() {
        let due = due_achievements(&daily_entries(30, 3), now(), chrono_tz::UTC);
        assert!(due.contains(&"week_streak"));
        assert!(due.contains(&"month_streak"));
    }

    #[test]
    fn positive_week_needs_full_week_above_four() {
        // Seven consecutive good days.
        let due = due_achievements(&daily_entries(7, 5), now(), chrono_tz::UTC);
        assert!(due.contains(&"positive_week"));

        // Same coverage but average at 3 — not positive.
        let due = due_achievements(&daily_entries(7, 3), now(), chrono_tz::UTC);
        assert!(!due.contains(&"positive_week"));
    }

    #[test]
    fn positive_week_needs_an_entry_today() {
        // Seven good days ending yesterday span eight calendar days of
        // history; the week must cover today back through six days ago.
        let entries: Vec<MoodEntry> = (1..=7)
            .map(|offset| {
                let date = now() - chrono::Duration::days(offset);
                entry(&date.to_rfc3339(), 5)
            })
            .collect();
        let due = due_achievements(&entries, now(), chrono_tz::UTC);
        assert!(!due.contains(&"positive_week"));
    }

    #[test]
    fn entry_count_milestones() {
        let mut entries = Vec::new();
        for i in 0..50 {
            // Spread over the same day; count milestones ignore dates.
            entries.push(entry(&format!("2024-03-15T08:{:02}:00Z", i % 60), 3));
        }
        let due = due_achievements(&entries, now(), chrono_tz::UTC);
        assert!(due.contains(&"fifty_entries"));
        assert!(!due.contains(&"hundred_entries"));
    }
}
