use serde::{Deserialize, Serialize};

use crate::domain::{FeedbackKind, InteractionId, SessionId, TurnId};

pub const MAX_MESSAGE_CHARS: usize = 5000;
pub const MAX_IMAGE_PROMPT_CHARS: usize = 1000;
pub const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;
pub const ALLOWED_IMAGE_TYPES: [&str; 4] = ["image/jpeg", "image/png", "image/gif", "image/webp"];
pub const DEFAULT_IMAGE_PROMPT: &str = "Describe this image in detail.";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    pub session_id: Option<SessionId>,
}

/// Shared response body of `POST /chat` and `POST /image-chat`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatResponse {
    pub response: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detected_language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interaction_id: Option<InteractionId>,
}

impl ChatResponse {
    pub fn text(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
            session_id: None,
            detected_language: None,
            language_name: None,
            confidence: None,
            interaction_id: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatHistoryResponse {
    #[serde(default)]
    pub sessions: Vec<SessionSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionSummary {
    pub session_id: SessionId,
    #[serde(default)]
    pub message_count: u64,
    #[serde(default)]
    pub session_title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest_timestamp: Option<String>,
    #[serde(default)]
    pub messages: Vec<StoredTurn>,
}

/// One persisted user input / bot response pair.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoredTurn {
    pub id: TurnId,
    #[serde(default)]
    pub user_input: String,
    #[serde(default)]
    pub bot_response: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub record_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub success: bool,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackRequest {
    pub interaction_id: InteractionId,
    pub session_id: SessionId,
    pub feedback_type: FeedbackKind,
    pub feedback_text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackResponse {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback_type: Option<FeedbackKind>,
}
