use std::path::Path;

use async_trait::async_trait;
use shared::{
    domain::SessionId,
    protocol::{
        ChatHistoryResponse, ChatRequest, ChatResponse, DeleteResponse, FeedbackRequest,
        FeedbackResponse, ALLOWED_IMAGE_TYPES, MAX_IMAGE_BYTES, MAX_IMAGE_PROMPT_CHARS,
        MAX_MESSAGE_CHARS,
    },
};
use tokio_util::sync::CancellationToken;

pub mod config;
pub mod coordinator;
pub mod error;
pub mod http;
mod ids;
pub mod message;
pub mod message_store;
pub mod reconciler;

pub use config::{load_settings, ClientSettings};
pub use coordinator::{CoordinatorEvent, RequestCoordinator, Submission, TurnKind, TurnOutcome};
pub use error::{ClientError, ClientResult};
pub use http::HttpChatApi;
pub use message::ChatMessage;
pub use message_store::MessageStore;
pub use reconciler::SessionReconciler;

/// The remote chat service as seen by the coordinator.
#[async_trait]
pub trait ChatApi: Send + Sync {
    async fn send_chat(&self, request: ChatRequest) -> ClientResult<ChatResponse>;
    async fn send_image(
        &self,
        upload: ImageUpload,
        prompt: String,
        session_id: Option<SessionId>,
    ) -> ClientResult<ChatResponse>;
    async fn chat_history(&self) -> ClientResult<ChatHistoryResponse>;
    async fn delete_session(&self, session_id: &SessionId) -> ClientResult<DeleteResponse>;
    async fn delete_all_history(&self) -> ClientResult<DeleteResponse>;
    async fn submit_feedback(&self, request: FeedbackRequest) -> ClientResult<FeedbackResponse>;
}

/// Produces the token each submitted turn is raced against.
pub trait CancellationSource: Send + Sync {
    fn token(&self) -> CancellationToken;
}

pub struct FreshCancellation;

impl CancellationSource for FreshCancellation {
    fn token(&self) -> CancellationToken {
        CancellationToken::new()
    }
}

#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub mime_type: String,
    /// Local reference shown next to the uploaded image in the transcript.
    pub source: String,
    pub bytes: Vec<u8>,
}

impl ImageUpload {
    pub async fn from_path(path: &Path) -> ClientResult<Self> {
        let bytes = tokio::fs::read(path).await.map_err(|e| {
            ClientError::Validation(format!("failed to read image '{}': {e}", path.display()))
        })?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string());
        Ok(Self {
            file_name,
            mime_type: mime_guess::from_path(path)
                .first_or_octet_stream()
                .essence_str()
                .to_string(),
            source: path.display().to_string(),
            bytes,
        })
    }
}

/// Input of one conversational turn.
#[derive(Debug, Clone)]
pub enum TurnRequest {
    Chat(String),
    Image {
        upload: ImageUpload,
        prompt: Option<String>,
    },
}

impl TurnRequest {
    pub fn kind(&self) -> TurnKind {
        match self {
            TurnRequest::Chat(_) => TurnKind::Chat,
            TurnRequest::Image { .. } => TurnKind::Image,
        }
    }

    /// Applies the limits the chat API enforces, so invalid turns never reach the store.
    pub(crate) fn validated(self, default_prompt: &str) -> ClientResult<Self> {
        match self {
            TurnRequest::Chat(text) => {
                let text = text.trim();
                if text.is_empty() {
                    return Err(ClientError::Validation("Message cannot be empty".into()));
                }
                if text.chars().count() > MAX_MESSAGE_CHARS {
                    return Err(ClientError::Validation(format!(
                        "Message too long (max {MAX_MESSAGE_CHARS} characters)"
                    )));
                }
                Ok(TurnRequest::Chat(text.to_string()))
            }
            TurnRequest::Image { upload, prompt } => {
                if upload.bytes.len() > MAX_IMAGE_BYTES {
                    return Err(ClientError::Validation(format!(
                        "File too large. Max size: {}MB",
                        MAX_IMAGE_BYTES / 1024 / 1024
                    )));
                }
                if !ALLOWED_IMAGE_TYPES.contains(&upload.mime_type.as_str()) {
                    return Err(ClientError::Validation(
                        "Unsupported file type. Use JPEG, PNG, GIF, or WebP".into(),
                    ));
                }
                let prompt = prompt
                    .map(|p| p.trim().to_string())
                    .filter(|p| !p.is_empty())
                    .unwrap_or_else(|| default_prompt.to_string());
                if prompt.chars().count() > MAX_IMAGE_PROMPT_CHARS {
                    return Err(ClientError::Validation(format!(
                        "Description too long (max {MAX_IMAGE_PROMPT_CHARS} characters)"
                    )));
                }
                Ok(TurnRequest::Image {
                    upload,
                    prompt: Some(prompt),
                })
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
