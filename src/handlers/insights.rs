use axum::{extract::State, Extension, Json};
use chrono::{DateTime, Datelike, Utc};
use chrono_tz::Tz;
use serde::Serialize;

use crate::analytics::{self, Window};
use crate::auth::middleware::AuthUser;
use crate::error::AppResult;
use crate::models::entry::{mood_descriptor, MoodEntry};
use crate::AppState;

#[derive(Debug, Serialize, PartialEq)]
pub struct Insight {
    pub title: String,
    pub description: String,
    pub emoji: String,
}

const AFFIRMATIONS: [&str; 5] = [
    "Remember to be kind to yourself today.",
    "Your feelings are valid and important.",
    "Every day is a new opportunity for growth.",
    "You're doing better than you think.",
    "Progress, not perfection, is the goal.",
];

pub async fn get_insights(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> AppResult<Json<Vec<Insight>>> {
    let user = crate::handlers::fetch_user(&state.db, auth_user.id).await?;
    let entries = crate::handlers::fetch_entries(&state.db, auth_user.id).await?;
    let tz = analytics::parse_timezone(&user.timezone);

    Ok(Json(generate_insights(&entries, Utc::now(), tz)))
}

/// Deterministic insight cards. Pure so the tier boundaries and card set are
/// directly testable.
pub fn generate_insights(entries: &[MoodEntry], now: DateTime<Utc>, tz: Tz) -> Vec<Insight> {
    if entries.is_empty() {
        return vec![Insight {
            title: "Get Started".into(),
            description: "Start tracking your mood to see personalized insights and patterns."
                .into(),
            emoji: "📝".into(),
        }];
    }

    let mut insights = Vec::new();
    let all_time = analytics::aggregate(entries, Window::All, now);

    // Overall mood trend.
    let average = all_time.average_mood.unwrap_or(0.0);
    insights.push(if average >= 4.0 {
        Insight {
            title: "You're doing great!".into(),
            description: "Your average mood is above 4. Keep up the positive momentum!".into(),
            emoji: "🌟".into(),
        }
    } else if average >= 3.0 {
        Insight {
            title: "Steady state".into(),
            description: "Your mood is stable. Consider activities that bring you joy.".into(),
            emoji: "⚖️".into(),
        }
    } else {
        Insight {
            title: "Challenging times".into(),
            description: "Your mood has been lower recently. Consider self-care activities."
                .into(),
            emoji: "🤗".into(),
        }
    });

    // Most common mood and how often it occurred.
    if let Some(modal) = all_time.modal_mood {
        let count = entries.iter().filter(|e| e.mood_level == modal).count();
        let label = mood_descriptor(modal).map(|m| m.label).unwrap_or("Unknown");
        insights.push(Insight {
            title: format!("Your typical mood is {}", label),
            description: format!(
                "You've felt this way {} times in your tracked entries.",
                count
            ),
            emoji: "📊".into(),
        });
    }

    // Recent consistency.
    let last_week = analytics::aggregate(entries, Window::Days(7), now);
    if last_week.entry_count >= 5 {
        insights.push(Insight {
            title: "Great consistency!".into(),
            description: format!(
                "You've logged {} entries in the last 7 days. Keep tracking!",
                last_week.entry_count
            ),
            emoji: "✅".into(),
        });
    }

    // Affirmation, rotated by local day-of-year so it changes daily but stays
    // deterministic for a given evaluation instant.
    let day_index = analytics::day_key(now, tz).ordinal0() as usize;
    insights.push(Insight {
        title: "Daily Affirmation".into(),
        description: AFFIRMATIONS[day_index % AFFIRMATIONS.len()].into(),
        emoji: "💫".into(),
    });

    insights
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn entry(created_at: &str, mood_level: i32) -> MoodEntry {
        MoodEntry {
            id: Uuid::new_v4(),
            user_id: Uuid::nil(),
            mood_level,
            mood_emoji: "😐".into(),
            mood_color: "#eab308".into(),
            notes: None,
            created_at: created_at.parse().expect("test timestamp"),
        }
    }

    fn now() -> DateTime<Utc> {
        "2024-03-15T12:00:00Z".parse().unwrap()
    }

    #[test]
    fn empty_history_gets_onboarding_card() {
        let insights = generate_insights(&[], now(), chrono_tz::UTC);
        assert_eq!(insights.len(), 1);
        assert_eq!(insights[0].title, "Get Started");
    }

    #[test]
    fn high_average_gets_positive_card() {
        let entries = vec![
            entry("2024-03-15T08:00:00Z", 5),
            entry("2024-03-14T08:00:00Z", 4),
        ];
        let insights = generate_insights(&entries, now(), chrono_tz::UTC);
        assert_eq!(insights[0].title, "You're doing great!");
    }

    #[test]
    fn low_average_gets_supportive_card() {
        let entries = vec![
            entry("2024-03-15T08:00:00Z", 1),
            entry("2024-03-14T08:00:00Z", 2),
        ];
        let insights = generate_insights(&entries, now(), chrono_tz::UTC);
        assert_eq!(insights[0].title, "Challenging times");
    }

    #[test]
    fn consistency_card_requires_five_recent_entries() {
        let sparse = vec![
            entry("2024-03-15T08:00:00Z", 3),
            entry("2024-03-14T08:00:00Z", 3),
        ];
        let insights = generate_insights(&sparse, now(), chrono_tz::UTC);
        assert!(!insights.iter().any(|i| i.title == "Great consistency!"));

        let dense: Vec<MoodEntry> = (10..=15)
            .map(|d| entry(&format!("2024-03-{:02}T08:00:00Z", d), 3))
            .collect();
        let insights = generate_insights(&dense, now(), chrono_tz::UTC);
        assert!(insights.iter().any(|i| i.title == "Great consistency!"));
    }

    #[test]
    fn affirmation_is_deterministic_per_day() {
        let entries = vec![entry("2024-03-15T08:00:00Z", 3)];
        let a = generate_insights(&entries, now(), chrono_tz::UTC);
        let b = generate_insights(&entries, now(), chrono_tz::UTC);
        assert_eq!(a.last(), b.last());
        assert_eq!(a.last().unwrap().title, "Daily Affirmation");
    }
}
