use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MoodEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub mood_level: i32,
    pub mood_emoji: String,
    pub mood_color: String,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateEntryRequest {
    pub mood_level: i32,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct EntryQuery {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

/// Canonical presentation for each mood level. The client sends only the
/// level; emoji, label and color are derived here so stored rows stay
/// consistent across client versions.
pub struct MoodDescriptor {
    pub level: i32,
    pub emoji: &'static str,
    pub label: &'static str,
    pub color: &'static str,
}

pub const MOODS: [MoodDescriptor; 5] = [
    MoodDescriptor { level: 1, emoji: "😢", label: "Terrible", color: "#ef4444" },
    MoodDescriptor { level: 2, emoji: "😞", label: "Bad", color: "#f97316" },
    MoodDescriptor { level: 3, emoji: "😐", label: "Okay", color: "#eab308" },
    MoodDescriptor { level: 4, emoji: "🙂", label: "Good", color: "#84cc16" },
    MoodDescriptor { level: 5, emoji: "😄", label: "Great", color: "#22c55e" },
];

pub fn mood_descriptor(level: i32) -> Option<&'static MoodDescriptor> {
    MOODS.iter().find(|m| m.level == level)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_covers_valid_range() {
        for level in 1..=5 {
            let m = mood_descriptor(level).expect("level should have a descriptor");
            assert_eq!(m.level, level);
            assert!(!m.emoji.is_empty());
        }
    }

    #[test]
    fn descriptor_rejects_out_of_range() {
        assert!(mood_descriptor(0).is_none());
        assert!(mood_descriptor(6).is_none());
    }
}
