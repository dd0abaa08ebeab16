use async_trait::async_trait;
use reqwest::{
    multipart::{Form, Part},
    Client, Response,
};
use serde::de::DeserializeOwned;
use shared::{
    domain::SessionId,
    error::ApiErrorBody,
    protocol::{
        ChatHistoryResponse, ChatRequest, ChatResponse, DeleteResponse, FeedbackRequest,
        FeedbackResponse,
    },
};
use tracing::debug;
use url::Url;

use crate::{
    config::ClientSettings,
    error::{ClientError, ClientResult},
    ChatApi, ImageUpload,
};

/// `ChatApi` over the chat service's JSON/HTTP endpoints.
pub struct HttpChatApi {
    http: Client,
    base_url: Url,
}

impl HttpChatApi {
    pub fn new(settings: &ClientSettings) -> ClientResult<Self> {
        let http = Client::builder()
            .timeout(settings.request_timeout)
            .build()?;
        Ok(Self {
            http,
            base_url: settings.base_url()?,
        })
    }

    fn endpoint(&self, segments: &[&str]) -> ClientResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| {
                ClientError::Config(format!("base url '{}' cannot hold paths", self.base_url))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

async fn read_json<T: DeserializeOwned>(response: Response) -> ClientResult<T> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        let detail = match serde_json::from_str::<ApiErrorBody>(&body) {
            Ok(parsed) => parsed.detail_text(),
            Err(_) => Some(body.trim().to_string()).filter(|text| !text.is_empty()),
        };
        debug!(status = status.as_u16(), ?detail, "chat api returned error status");
        return Err(ClientError::Http {
            status: status.as_u16(),
            detail,
        });
    }

    serde_json::from_str(&body).map_err(|e| ClientError::Malformed {
        reason: e.to_string(),
        body,
    })
}

#[async_trait]
impl ChatApi for HttpChatApi {
    async fn send_chat(&self, request: ChatRequest) -> ClientResult<ChatResponse> {
        let response = self
            .http
            .post(self.endpoint(&["chat"])?)
            .json(&request)
            .send()
            .await?;
        read_json(response).await
    }

    async fn send_image(
        &self,
        upload: ImageUpload,
        prompt: String,
        session_id: Option<SessionId>,
    ) -> ClientResult<ChatResponse> {
        let image = Part::bytes(upload.bytes)
            .file_name(upload.file_name)
            .mime_str(&upload.mime_type)?;
        let mut form = Form::new().part("image", image).text("text", prompt);
        if let Some(session_id) = session_id {
            form = form.text("session_id", session_id.0);
        }

        let response = self
            .http
            .post(self.endpoint(&["image-chat"])?)
            .multipart(form)
            .send()
            .await?;
        read_json(response).await
    }

    async fn chat_history(&self) -> ClientResult<ChatHistoryResponse> {
        let response = self
            .http
            .get(self.endpoint(&["chat-history"])?)
            .send()
            .await?;
        read_json(response).await
    }

    async fn delete_session(&self, session_id: &SessionId) -> ClientResult<DeleteResponse> {
        let response = self
            .http
            .delete(self.endpoint(&["session", session_id.as_str()])?)
            .send()
            .await?;
        read_json(response).await
    }

    async fn delete_all_history(&self) -> ClientResult<DeleteResponse> {
        let response = self
            .http
            .delete(self.endpoint(&["chat-history"])?)
            .send()
            .await?;
        read_json(response).await
    }

    async fn submit_feedback(&self, request: FeedbackRequest) -> ClientResult<FeedbackResponse> {
        let response = self
            .http
            .post(self.endpoint(&["feedback"])?)
            .json(&request)
            .send()
            .await?;
        read_json(response).await
    }
}

#[cfg(test)]
#[path = "tests/http_tests.rs"]
mod tests;
