use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Extension,
};
use chrono_tz::Tz;
use serde::Deserialize;

use crate::analytics;
use crate::auth::middleware::AuthUser;
use crate::error::{AppError, AppResult};
use crate::models::achievement::Achievement;
use crate::models::entry::MoodEntry;
use crate::models::user::UserProfile;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ExportQuery {
    pub format: Option<String>,
}

pub async fn export_data(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Query(query): Query<ExportQuery>,
) -> AppResult<Response> {
    let user = crate::handlers::fetch_user(&state.db, auth_user.id).await?;
    let entries = crate::handlers::fetch_entries(&state.db, auth_user.id).await?;
    let achievements = sqlx::query_as::<_, Achievement>(
        "SELECT * FROM achievements WHERE user_id = $1 ORDER BY unlocked_at ASC",
    )
    .bind(auth_user.id)
    .fetch_all(&state.db)
    .await?;

    let tz = analytics::parse_timezone(&user.timezone);

    match query.format.as_deref().unwrap_or("json") {
        "csv" => {
            let csv = entries_to_csv(&entries, tz);
            Ok((
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, "text/csv"),
                    (
                        header::CONTENT_DISPOSITION,
                        "attachment; filename=\"mood-journal-export.csv\"",
                    ),
                ],
                csv,
            )
                .into_response())
        }
        "json" => {
            let profile: UserProfile = user.into();
            let body = serde_json::json!({
                "export_date": chrono::Utc::now(),
                "profile": profile,
                "mood_entries": entries,
                "achievements": achievements,
            });
            Ok((
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, "application/json"),
                    (
                        header::CONTENT_DISPOSITION,
                        "attachment; filename=\"mood-journal-export.json\"",
                    ),
                ],
                serde_json::to_string_pretty(&body)
                    .map_err(|e| AppError::Internal(e.into()))?,
            )
                .into_response())
        }
        other => Err(AppError::Validation(format!(
            "Unknown export format: {}",
            other
        ))),
    }
}

/// Render entries as CSV, dates and times in the user's zone. Column order is
/// part of the export contract.
fn entries_to_csv(entries: &[MoodEntry], tz: Tz) -> String {
    let mut csv = String::from("Date,Time,Mood Level,Mood Emoji,Notes\n");
    for entry in entries {
        let local = entry.created_at.with_timezone(&tz);
        let notes = match &entry.notes {
            Some(notes) => quote_csv_field(notes),
            None => String::new(),
        };
        csv.push_str(&format!(
            "{},{},{},{},{}\n",
            local.format("%Y-%m-%d"),
            local.format("%H:%M:%S"),
            entry.mood_level,
            entry.mood_emoji,
            notes,
        ));
    }
    csv
}

/// Wrap a field in double quotes, doubling any internal quote characters.
fn quote_csv_field(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn entry(created_at: &str, mood_level: i32, notes: Option<&str>) -> MoodEntry {
        MoodEntry {
            id: Uuid::new_v4(),
            user_id: Uuid::nil(),
            mood_level,
            mood_emoji: "🙂".into(),
            mood_color: "#84cc16".into(),
            notes: notes.map(String::from),
            created_at: created_at.parse().expect("test timestamp"),
        }
    }

    #[test]
    fn csv_has_contract_header_even_when_empty() {
        let csv = entries_to_csv(&[], chrono_tz::UTC);
        assert_eq!(csv, "Date,Time,Mood Level,Mood Emoji,Notes\n");
    }

    #[test]
    fn csv_renders_rows_in_user_zone() {
        let tz: Tz = "America/Los_Angeles".parse().unwrap();
        // 06:00 UTC Jan 2 is 22:00 Jan 1 in Los Angeles.
        let entries = vec![entry("2024-01-02T06:00:00Z", 4, None)];
        let csv = entries_to_csv(&entries, tz);
        assert!(csv.contains("2024-01-01,22:00:00,4,🙂,\n"));
    }

    #[test]
    fn csv_doubles_internal_quotes_in_notes() {
        let entries = vec![entry(
            "2024-01-02T06:00:00Z",
            3,
            Some(r#"felt "okay", I guess"#),
        )];
        let csv = entries_to_csv(&entries, chrono_tz::UTC);
        assert!(csv.contains(r#""felt ""okay"", I guess""#));
    }

    #[test]
    fn csv_leaves_absent_notes_empty() {
        let entries = vec![entry("2024-01-02T06:00:00Z", 3, None)];
        let csv = entries_to_csv(&entries, chrono_tz::UTC);
        let row = csv.lines().nth(1).unwrap();
        assert!(row.ends_with(",3,🙂,"));
    }
}
