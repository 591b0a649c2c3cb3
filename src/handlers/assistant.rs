use axum::{extract::State, Extension, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::analytics::{self, Window};
use crate::auth::middleware::AuthUser;
use crate::error::{AppError, AppResult};
use crate::models::entry::{mood_descriptor, MoodEntry};
use crate::AppState;

const MAX_HISTORY_MESSAGES: usize = 20;

#[derive(Debug, Deserialize)]
pub struct AssistantRequest {
    pub message: String,
    pub mood_context: Option<String>,
    #[serde(default)]
    pub conversation_history: Vec<ChatMessage>,
}

#[derive(Debug, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

#[derive(Debug, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

#[derive(Debug, Serialize)]
pub struct AssistantResponse {
    pub message: String,
    pub source: String, // "claude" or "fallback"
}

pub async fn chat(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(body): Json<AssistantRequest>,
) -> AppResult<Json<AssistantResponse>> {
    if body.message.trim().is_empty() {
        return Err(AppError::Validation("Message must not be empty".into()));
    }
    if body.conversation_history.len() > MAX_HISTORY_MESSAGES {
        return Err(AppError::Validation(format!(
            "Conversation history is limited to {} messages",
            MAX_HISTORY_MESSAGES
        )));
    }

    let entries = crate::handlers::fetch_entries(&state.db, auth_user.id).await?;
    let system_prompt = build_system_prompt(&entries, body.mood_context.as_deref());

    let conversation: String = body
        .conversation_history
        .iter()
        .map(|m| {
            let speaker = match m.role {
                ChatRole::User => "User",
                ChatRole::Assistant => "Assistant",
            };
            format!("{}: {}\n", speaker, m.content)
        })
        .collect();
    let prompt = format!("{}\nUser: {}", conversation, body.message);

    match call_claude(&state, &system_prompt, &prompt).await {
        Ok(message) => Ok(Json(AssistantResponse {
            message,
            source: "claude".into(),
        })),
        Err(e) => {
            tracing::warn!(error = %e, "Anthropic API unavailable, using fallback reply");
            Ok(Json(AssistantResponse {
                message: fallback_reply(&entries),
                source: "fallback".into(),
            }))
        }
    }
}

fn build_system_prompt(entries: &[MoodEntry], mood_context: Option<&str>) -> String {
    // Entries come newest-first; summarize the five most recent.
    let mood_summary = if entries.is_empty() {
        "No recent mood entries".to_string()
    } else {
        let emojis: Vec<&str> = entries.iter().take(5).map(|e| e.mood_emoji.as_str()).collect();
        format!("Recent moods: {}", emojis.join(", "))
    };

    let stats = analytics::aggregate(entries, Window::All, Utc::now());
    let stats_line = match (stats.average_mood, stats.modal_mood) {
        (Some(avg), Some(modal)) => {
            let label = mood_descriptor(modal).map(|m| m.label).unwrap_or("Unknown");
            format!(
                "Average mood: {:.1}/5, most common mood: {}",
                avg, label
            )
        }
        _ => "No mood statistics yet".to_string(),
    };

    format!(
        r#"You are a compassionate and supportive mood journal assistant. Your role is to:
1. Provide personalized affirmations and encouragement based on the user's mood
2. Suggest journaling prompts to help them explore their feelings
3. Offer coping strategies and wellness tips
4. Listen empathetically and validate their emotions
5. Help them identify patterns in their mood

Current mood context: {}
{}
{}

Keep responses concise (2-3 sentences), warm, and supportive. Use emojis occasionally to add warmth."#,
        mood_context.unwrap_or("Not specified"),
        mood_summary,
        stats_line,
    )
}

async fn call_claude(state: &AppState, system: &str, prompt: &str) -> Result<String, anyhow::Error> {
    if state.config.anthropic_api_key.is_empty() {
        anyhow::bail!("No Anthropic API key configured");
    }

    // Bounded wait so a slow upstream cannot hang the request.
    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(30))
        .build()?;

    let response = client
        .post("https://api.anthropic.com/v1/messages")
        .header("x-api-key", &state.config.anthropic_api_key)
        .header("anthropic-version", "2023-06-01")
        .header("content-type", "application/json")
        .json(&serde_json::json!({
            "model": state.config.anthropic_model,
            "max_tokens": 256,
            "temperature": 0.7,
            "system": system,
            "messages": [{
                "role": "user",
                "content": prompt
            }]
        }))
        .send()
        .await?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        anyhow::bail!("Anthropic API error {}: {}", status, body);
    }

    let api_response: serde_json::Value = response.json().await?;
    let text = api_response["content"][0]["text"]
        .as_str()
        .ok_or_else(|| anyhow::anyhow!("Unexpected Anthropic response shape"))?;
    Ok(text.to_string())
}

/// Deterministic supportive reply for when the LLM is unreachable, tiered by
/// the recent average mood.
fn fallback_reply(entries: &[MoodEntry]) -> String {
    let recent = analytics::aggregate(entries, Window::Days(7), Utc::now());
    match recent.average_mood {
        Some(avg) if avg >= 4.0 => {
            "It sounds like things have been going well for you lately — that's wonderful! 🌟 \
             What's been bringing you the most joy? Writing it down can help you return to it later."
                .into()
        }
        Some(avg) if avg >= 3.0 => {
            "Thanks for checking in. Your mood has been fairly steady this week. ⚖️ \
             Is there one small thing you could do today that usually lifts your spirits?"
                .into()
        }
        Some(_) => {
            "I hear you — the past days look like they've been heavy. 🤗 Be gentle with \
             yourself. A short walk, a glass of water, or writing one sentence about how you \
             feel can be a good next step."
                .into()
        }
        None => {
            "Hello! I'm your mood journal assistant. Log a mood entry whenever you're ready, \
             and I can help you reflect on how you've been feeling. 💫"
                .into()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn entry(created_at: &str, mood_level: i32, emoji: &str) -> MoodEntry {
        MoodEntry {
            id: Uuid::new_v4(),
            user_id: Uuid::nil(),
            mood_level,
            mood_emoji: emoji.into(),
            mood_color: "#84cc16".into(),
            notes: None,
            created_at: created_at.parse().expect("test timestamp"),
        }
    }

    #[test]
    fn system_prompt_includes_recent_emojis_and_context() {
        let entries = vec![
            entry("2024-03-15T08:00:00Z", 4, "🙂"),
            entry("2024-03-14T08:00:00Z", 5, "😄"),
        ];
        let prompt = build_system_prompt(&entries, Some("feeling reflective"));
        assert!(prompt.contains("Recent moods: 🙂, 😄"));
        assert!(prompt.contains("feeling reflective"));
        assert!(prompt.contains("most common mood"));
    }

    #[test]
    fn system_prompt_handles_empty_history() {
        let prompt = build_system_prompt(&[], None);
        assert!(prompt.contains("No recent mood entries"));
        assert!(prompt.contains("Not specified"));
    }

    #[test]
    fn system_prompt_caps_summary_at_five_moods() {
        let entries: Vec<MoodEntry> = (10..=17)
            .map(|d| entry(&format!("2024-03-{:02}T08:00:00Z", d), 3, "😐"))
            .collect();
        let prompt = build_system_prompt(&entries, None);
        let count = prompt.matches("😐").count();
        assert_eq!(count, 5);
    }

    #[test]
    fn fallback_reply_has_a_tier_for_every_state() {
        assert!(fallback_reply(&[]).contains("mood journal assistant"));

        let good = vec![entry("2100-01-01T08:00:00Z", 5, "😄")];
        assert!(fallback_reply(&good).contains("going well"));
    }
}
