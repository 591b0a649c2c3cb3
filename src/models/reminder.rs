use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Reminder {
    pub id: Uuid,
    pub user_id: Uuid,
    pub remind_at: NaiveTime,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateReminderRequest {
    pub remind_at: NaiveTime,
}

#[derive(Debug, Deserialize)]
pub struct UpdateReminderRequest {
    pub remind_at: Option<NaiveTime>,
    pub enabled: Option<bool>,
}
