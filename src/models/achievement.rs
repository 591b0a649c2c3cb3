use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Achievement {
    pub id: Uuid,
    pub user_id: Uuid,
    pub achievement_type: String,
    pub unlocked_at: DateTime<Utc>,
}

/// Static metadata for each achievement type, mirrored by the frontend.
pub struct AchievementDef {
    pub achievement_type: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    pub emoji: &'static str,
}

pub const ACHIEVEMENT_DEFS: [AchievementDef; 6] = [
    AchievementDef {
        achievement_type: "first_entry",
        title: "First Step",
        description: "Logged your first mood entry",
        emoji: "🌱",
    },
    AchievementDef {
        achievement_type: "week_streak",
        title: "Week Warrior",
        description: "Logged mood for 7 consecutive days",
        emoji: "🔥",
    },
    AchievementDef {
        achievement_type: "month_streak",
        title: "Monthly Master",
        description: "Logged mood for 30 consecutive days",
        emoji: "👑",
    },
    AchievementDef {
        achievement_type: "fifty_entries",
        title: "Fifty Strong",
        description: "Logged 50 mood entries",
        emoji: "💪",
    },
    AchievementDef {
        achievement_type: "hundred_entries",
        title: "Century Club",
        description: "Logged 100 mood entries",
        emoji: "🏆",
    },
    AchievementDef {
        achievement_type: "positive_week",
        title: "Sunshine Week",
        description: "Average mood above 4 for a week",
        emoji: "☀️",
    },
];
