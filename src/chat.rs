//! Health assistant chat — transcript types, prompt suggestions, and the
//! send flow over `POST /api/chat`.
//!
//! The transcript lives in `CoreState` and is cleared on sign-out. The
//! service answers with the patient's recent triage history as context, so
//! the client only sends uid and message.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::context::AppContext;
use crate::core_state::CoreError;
use crate::models::TriageResult;
use crate::triage_api::ApiClientError;

/// Maximum characters in one chat message.
pub const MAX_MESSAGE_CHARS: usize = 2000;

// ═══════════════════════════════════════════
// Types
// ═══════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
    pub sent_at: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(role: ChatRole, content: &str) -> Self {
        Self {
            role,
            content: content.to_string(),
            sent_at: Utc::now(),
        }
    }
}

/// Prompt suggestion for an empty transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptSuggestion {
    pub text: String,
    pub category: String,
}

/// Chat screen payload.
#[derive(Debug, Clone, Serialize)]
pub struct ChatView {
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<PromptSuggestion>,
}

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("Message cannot be empty")]
    EmptyMessage,
    #[error("Message too long (max {MAX_MESSAGE_CHARS} characters)")]
    MessageTooLong,
    #[error(transparent)]
    Api(#[from] ApiClientError),
    #[error(transparent)]
    State(#[from] CoreError),
}

// ═══════════════════════════════════════════
// Validation & suggestions
// ═══════════════════════════════════════════

/// Trim and check a message before sending.
pub fn validate_message(raw: &str) -> Result<&str, ChatError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ChatError::EmptyMessage);
    }
    if trimmed.chars().count() > MAX_MESSAGE_CHARS {
        return Err(ChatError::MessageTooLong);
    }
    Ok(trimmed)
}

/// Default prompt suggestions for an empty transcript.
pub fn default_prompt_suggestions() -> Vec<PromptSuggestion> {
    vec![
        PromptSuggestion {
            text: "How have my symptoms changed since my last check?".into(),
            category: "history".into(),
        },
        PromptSuggestion {
            text: "When should I go to the emergency room?".into(),
            category: "general".into(),
        },
        PromptSuggestion {
            text: "What can I do at home to feel better?".into(),
            category: "care".into(),
        },
        PromptSuggestion {
            text: "What should I ask my doctor at my next visit?".into(),
            category: "general".into(),
        },
    ]
}

/// Suggestions tailored to the last triage result, when there is one.
pub fn contextual_suggestions(last_result: Option<&TriageResult>) -> Vec<PromptSuggestion> {
    let mut suggestions = default_prompt_suggestions();
    if let Some(result) = last_result {
        let rec = &result.final_recommendation;
        suggestions[0] = PromptSuggestion {
            text: format!("Why was my risk assessed as {}?", rec.risk_level),
            category: "result".into(),
        };
        suggestions[3] = PromptSuggestion {
            text: format!("What happens at a {} visit?", rec.department),
            category: "department".into(),
        };
    }
    suggestions
}

// ═══════════════════════════════════════════
// Operations
// ═══════════════════════════════════════════

/// Current transcript, with suggestions while it is empty.
pub fn chat_view(ctx: &AppContext) -> Result<ChatView, ChatError> {
    let messages = ctx.state.chat_transcript()?;
    let suggestions = if messages.is_empty() {
        contextual_suggestions(ctx.state.last_result()?.as_ref())
    } else {
        Vec::new()
    };
    Ok(ChatView {
        messages,
        suggestions,
    })
}

/// Send one message and append the assistant's reply.
///
/// The user message stays in the transcript even when the service fails.
/// A reply arriving after the session ended is dropped.
pub async fn send_message(ctx: &AppContext, raw: &str) -> Result<ChatMessage, ChatError> {
    let message = validate_message(raw)?;
    let session = ctx.state.current_session()?;

    ctx.state.with_session(&session, || {
        ctx.state.push_chat(ChatMessage::new(ChatRole::User, message))
    })?;

    let reply = ctx.api.send_chat_message(&session.uid, message).await?;
    let reply = ChatMessage::new(ChatRole::Assistant, reply.reply.trim());
    ctx.state
        .with_session(&session, || ctx.state.push_chat(reply.clone()))?;
    Ok(reply)
}
