use serde::Serialize;
use shared::{
    domain::{FeedbackKind, InteractionId, MessageId, RequestId, Sender, SessionId},
    protocol::ChatResponse,
};

/// A single row of the live conversation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub id: MessageId,
    pub text: String,
    pub sender: Sender,
    pub is_loading: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<RequestId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detected_language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interaction_id: Option<InteractionId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feedback_submitted: Option<FeedbackKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feedback_message: Option<String>,
}

impl ChatMessage {
    fn bare(id: MessageId, text: impl Into<String>, sender: Sender) -> Self {
        Self {
            id,
            text: text.into(),
            sender,
            is_loading: false,
            request_id: None,
            image: None,
            image_name: None,
            detected_language: None,
            language_name: None,
            confidence: None,
            session_id: None,
            interaction_id: None,
            feedback_submitted: None,
            feedback_message: None,
        }
    }

    pub fn user(id: MessageId, text: impl Into<String>) -> Self {
        Self::bare(id, text, Sender::User)
    }

    pub fn user_image(id: MessageId, file_name: &str, image: impl Into<String>) -> Self {
        let mut message = Self::bare(id, format!("[Image uploaded: {file_name}]"), Sender::User);
        message.image = Some(image.into());
        message.image_name = Some(file_name.to_string());
        message
    }

    pub fn ai(id: MessageId, text: impl Into<String>) -> Self {
        Self::bare(id, text, Sender::Ai)
    }

    pub fn placeholder(id: MessageId, request_id: RequestId) -> Self {
        let mut message = Self::bare(id, String::new(), Sender::Ai);
        message.is_loading = true;
        message.request_id = Some(request_id);
        message
    }

    /// Resolved AI reply. `fallback_session` applies when the server omits a session id.
    pub fn resolved(
        id: MessageId,
        response: &ChatResponse,
        fallback_session: Option<&SessionId>,
    ) -> Self {
        let mut message = Self::bare(id, response.response.clone(), Sender::Ai);
        message.detected_language = response.detected_language.clone();
        message.language_name = response.language_name.clone();
        message.confidence = response.confidence;
        message.session_id = response
            .session_id
            .clone()
            .or_else(|| fallback_session.cloned());
        message.interaction_id = response.interaction_id.clone();
        message
    }

    pub fn is_placeholder_for(&self, request_id: RequestId) -> bool {
        self.is_loading && self.request_id == Some(request_id)
    }
}
