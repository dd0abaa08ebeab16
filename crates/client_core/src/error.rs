use shared::domain::{InteractionId, SessionId};
use thiserror::Error;

pub const GENERIC_CHAT_ERROR: &str = "Sorry, there was an error processing your request.";
pub const GENERIC_IMAGE_ERROR: &str = "Sorry, there was an error processing your image.";

pub type ClientResult<T> = std::result::Result<T, ClientError>;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("transport failure: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("{}", http_display(*status, detail.as_deref()))]
    Http { status: u16, detail: Option<String> },
    #[error("malformed response: {reason}")]
    Malformed { reason: String, body: String },
    #[error("invalid input: {0}")]
    Validation(String),
    #[error("server rejected the operation: {0}")]
    Rejected(String),
    #[error("feedback for interaction {0} is already being submitted")]
    FeedbackInFlight(InteractionId),
    #[error("unknown session {0}")]
    UnknownSession(SessionId),
    #[error("message {0} has no session to attach feedback to")]
    MissingSession(InteractionId),
    #[error("invalid client configuration: {0}")]
    Config(String),
}

fn http_display(status: u16, detail: Option<&str>) -> String {
    match detail {
        Some(detail) => detail.to_string(),
        None => format!("HTTP error! status: {status}"),
    }
}

impl ClientError {
    /// Text rendered inline in place of a failed turn's placeholder.
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            ClientError::Http { .. } | ClientError::Validation(_) | ClientError::Rejected(_) => {
                self.to_string()
            }
            ClientError::Malformed { body, .. } if !body.trim().is_empty() => body.clone(),
            _ => fallback.to_string(),
        }
    }
}
