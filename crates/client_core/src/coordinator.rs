//! Request lifecycle and session state for the live conversation.
//!
//! Every logical turn registers a cancellation token under its request id.
//! Starting a new turn, a new chat or switching sessions first drains that map,
//! cancelling each token and dropping its placeholder under the same lock, so a
//! superseded request can never write into newer state. A settling request
//! re-checks membership in the map before touching the store.

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use shared::{
    domain::{FeedbackKind, InteractionId, MessageId, RequestId, SessionId},
    protocol::{ChatRequest, ChatResponse, FeedbackRequest, FeedbackResponse, SessionSummary},
};
use tokio::{
    sync::{broadcast, Mutex},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    config::ClientSettings,
    error::{ClientError, ClientResult, GENERIC_CHAT_ERROR, GENERIC_IMAGE_ERROR},
    http::HttpChatApi,
    ids::{MessageIdGenerator, TurnIds},
    message::ChatMessage,
    message_store::MessageStore,
    reconciler::SessionReconciler,
    CancellationSource, ChatApi, FreshCancellation, ImageUpload, TurnRequest,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnKind {
    Chat,
    Image,
}

impl TurnKind {
    fn fallback_error(self) -> &'static str {
        match self {
            TurnKind::Chat => GENERIC_CHAT_ERROR,
            TurnKind::Image => GENERIC_IMAGE_ERROR,
        }
    }
}

/// Terminal state of one submitted turn.
#[derive(Debug)]
pub enum TurnOutcome {
    Resolved(ChatMessage),
    Failed {
        message: ChatMessage,
        error: ClientError,
    },
    /// The token fired before the request settled.
    Cancelled,
    /// The request settled after its entry had already been drained.
    Superseded,
}

impl TurnOutcome {
    pub fn applied(&self) -> bool {
        matches!(self, TurnOutcome::Resolved(_) | TurnOutcome::Failed { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoordinatorEvent {
    MessagesChanged,
    SessionsChanged,
    FeedbackRecorded { interaction_id: InteractionId },
}

/// Handle to a turn whose network call runs in the background.
pub struct Submission {
    request_id: RequestId,
    placeholder: MessageId,
    task: JoinHandle<TurnOutcome>,
}

impl Submission {
    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    pub fn placeholder_id(&self) -> MessageId {
        self.placeholder
    }

    pub async fn settled(self) -> TurnOutcome {
        match self.task.await {
            Ok(outcome) => outcome,
            Err(err) => {
                error!(request_id = %self.request_id, %err, "turn task did not complete");
                TurnOutcome::Cancelled
            }
        }
    }
}

struct PendingRequest {
    kind: TurnKind,
    cancel: CancellationToken,
}

#[derive(Default)]
struct CoordinatorState {
    store: MessageStore,
    pending: HashMap<RequestId, PendingRequest>,
    ids: MessageIdGenerator,
    sessions: Vec<SessionSummary>,
    selected_session: Option<SessionId>,
    current_session: Option<SessionId>,
    feedback_in_flight: HashSet<InteractionId>,
}

impl CoordinatorState {
    /// Cancels every in-flight turn and removes its placeholder.
    fn cancel_all(&mut self) -> usize {
        let drained: Vec<(RequestId, PendingRequest)> = self.pending.drain().collect();
        for (request_id, pending) in &drained {
            pending.cancel.cancel();
            self.store.remove_where(|m| m.is_placeholder_for(*request_id));
            debug!(request_id = %request_id, kind = ?pending.kind, "cancelled in-flight turn");
        }
        drained.len()
    }

    fn reset_conversation(&mut self) {
        self.cancel_all();
        self.store.clear();
        self.selected_session = None;
    }
}

pub struct RequestCoordinator {
    api: Arc<dyn ChatApi>,
    cancellation: Arc<dyn CancellationSource>,
    settings: ClientSettings,
    inner: Mutex<CoordinatorState>,
    events: broadcast::Sender<CoordinatorEvent>,
}

impl RequestCoordinator {
    pub fn new(api: Arc<dyn ChatApi>, settings: ClientSettings) -> Arc<Self> {
        Self::new_with_dependencies(api, Arc::new(FreshCancellation), settings)
    }

    pub fn new_with_dependencies(
        api: Arc<dyn ChatApi>,
        cancellation: Arc<dyn CancellationSource>,
        settings: ClientSettings,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(256);
        Arc::new(Self {
            api,
            cancellation,
            settings,
            inner: Mutex::new(CoordinatorState::default()),
            events,
        })
    }

    /// Coordinator talking to the HTTP chat service described by `settings`.
    pub fn connect(settings: ClientSettings) -> ClientResult<Arc<Self>> {
        let api = HttpChatApi::new(&settings)?;
        Ok(Self::new(Arc::new(api), settings))
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<CoordinatorEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: CoordinatorEvent) {
        let _ = self.events.send(event);
    }

    pub async fn submit_chat(self: &Arc<Self>, text: impl Into<String>) -> ClientResult<Submission> {
        self.submit(TurnRequest::Chat(text.into())).await
    }

    pub async fn submit_image(
        self: &Arc<Self>,
        upload: ImageUpload,
        prompt: Option<String>,
    ) -> ClientResult<Submission> {
        self.submit(TurnRequest::Image { upload, prompt }).await
    }

    /// Supersedes any active turn, shows the user message and a loading
    /// placeholder, then issues the request in the background.
    pub async fn submit(self: &Arc<Self>, request: TurnRequest) -> ClientResult<Submission> {
        let request = request.validated(&self.settings.image_prompt)?;
        let kind = request.kind();
        let cancel = self.cancellation.token();

        let (turn, session_id) = {
            let mut state = self.inner.lock().await;
            state.cancel_all();

            let turn = state.ids.next_turn();
            let user_message = match &request {
                TurnRequest::Chat(text) => ChatMessage::user(turn.user_message, text.clone()),
                TurnRequest::Image { upload, .. } => ChatMessage::user_image(
                    turn.user_message,
                    &upload.file_name,
                    upload.source.clone(),
                ),
            };
            state.store.push(user_message);
            state
                .store
                .push(ChatMessage::placeholder(turn.placeholder, turn.request_id));
            state.pending.insert(
                turn.request_id,
                PendingRequest {
                    kind,
                    cancel: cancel.clone(),
                },
            );
            (turn, state.current_session.clone())
        };
        self.emit(CoordinatorEvent::MessagesChanged);
        info!(request_id = %turn.request_id, ?kind, "submitted turn");

        let coordinator = Arc::clone(self);
        let task = tokio::spawn(async move {
            coordinator
                .drive(turn, kind, request, session_id, cancel)
                .await
        });

        Ok(Submission {
            request_id: turn.request_id,
            placeholder: turn.placeholder,
            task,
        })
    }

    async fn drive(
        self: Arc<Self>,
        turn: TurnIds,
        kind: TurnKind,
        request: TurnRequest,
        session_id: Option<SessionId>,
        cancel: CancellationToken,
    ) -> TurnOutcome {
        let api = Arc::clone(&self.api);
        let call = async move {
            match request {
                TurnRequest::Chat(message) => {
                    api.send_chat(ChatRequest {
                        message,
                        session_id,
                    })
                    .await
                }
                TurnRequest::Image { upload, prompt } => {
                    let prompt = prompt.unwrap_or_default();
                    api.send_image(upload, prompt, session_id).await
                }
            }
        };

        let result = tokio::select! {
            biased;

            () = cancel.cancelled() => {
                info!(request_id = %turn.request_id, "turn cancelled");
                return TurnOutcome::Cancelled;
            }

            result = call => result,
        };

        let delay = if result.is_ok() {
            self.settings.response_delay
        } else {
            self.settings.error_delay
        };
        if !delay.is_zero() {
            tokio::select! {
                biased;

                () = cancel.cancelled() => return TurnOutcome::Cancelled,
                () = tokio::time::sleep(delay) => {}
            }
        }

        self.settle(turn, kind, result).await
    }

    async fn settle(
        &self,
        turn: TurnIds,
        kind: TurnKind,
        result: ClientResult<ChatResponse>,
    ) -> TurnOutcome {
        let mut state = self.inner.lock().await;
        if state.pending.remove(&turn.request_id).is_none() {
            debug!(request_id = %turn.request_id, "late settlement ignored");
            return TurnOutcome::Superseded;
        }

        match result {
            Ok(response) => {
                if state.current_session.is_none() {
                    state.current_session = response.session_id.clone();
                }
                let message =
                    ChatMessage::resolved(turn.placeholder, &response, state.current_session.as_ref());
                state.store.replace(turn.placeholder, message.clone());
                drop(state);

                self.emit(CoordinatorEvent::MessagesChanged);
                info!(request_id = %turn.request_id, "turn resolved");
                let _ = self.refresh_sessions().await;
                TurnOutcome::Resolved(message)
            }
            Err(err) => {
                warn!(request_id = %turn.request_id, ?kind, %err, "turn failed");
                let message = ChatMessage::ai(turn.placeholder, err.user_message(kind.fallback_error()));
                state.store.replace(turn.placeholder, message.clone());
                drop(state);

                self.emit(CoordinatorEvent::MessagesChanged);
                TurnOutcome::Failed {
                    message,
                    error: err,
                }
            }
        }
    }

    /// Aborts every in-flight turn. Returns how many were cancelled.
    pub async fn cancel_all(&self) -> usize {
        let cancelled = self.inner.lock().await.cancel_all();
        if cancelled > 0 {
            self.emit(CoordinatorEvent::MessagesChanged);
        }
        cancelled
    }

    pub async fn start_new_chat(&self) {
        {
            let mut state = self.inner.lock().await;
            state.reset_conversation();
            state.current_session = None;
        }
        self.emit(CoordinatorEvent::MessagesChanged);
        info!("started new chat");
    }

    /// Reloads the session list. Failures leave the cached list untouched.
    pub async fn refresh_sessions(&self) -> ClientResult<usize> {
        let history = match self.api.chat_history().await {
            Ok(history) => history,
            Err(err) => {
                warn!(%err, "failed to fetch chat sessions");
                return Err(err);
            }
        };

        let count = history.sessions.len();
        self.inner.lock().await.sessions = history.sessions;
        self.emit(CoordinatorEvent::SessionsChanged);
        Ok(count)
    }

    /// Makes a stored session the live conversation.
    pub async fn select_session(&self, session_id: &SessionId) -> ClientResult<usize> {
        let count = {
            let mut state = self.inner.lock().await;
            let session = state
                .sessions
                .iter()
                .find(|s| &s.session_id == session_id)
                .cloned()
                .ok_or_else(|| ClientError::UnknownSession(session_id.clone()))?;

            state.cancel_all();
            let projected = SessionReconciler::project(&session);
            let count = projected.len();
            state.store.replace_all(projected);
            state.selected_session = Some(session_id.clone());
            state.current_session = Some(session_id.clone());
            count
        };
        self.emit(CoordinatorEvent::MessagesChanged);
        info!(session_id = %session_id, messages = count, "selected session");
        Ok(count)
    }

    pub async fn delete_session(&self, session_id: &SessionId) -> ClientResult<()> {
        let result = match self.api.delete_session(session_id).await {
            Ok(result) => result,
            Err(err) => {
                warn!(session_id = %session_id, %err, "failed to delete session");
                return Err(err);
            }
        };
        if !result.success {
            warn!(session_id = %session_id, message = %result.message, "failed to delete session");
            return Err(ClientError::Rejected(result.message));
        }

        let cleared_messages = {
            let mut state = self.inner.lock().await;
            state.sessions.retain(|s| &s.session_id != session_id);
            let was_selected = state.selected_session.as_ref() == Some(session_id);
            if was_selected {
                state.reset_conversation();
            }
            if state.current_session.as_ref() == Some(session_id) {
                state.current_session = None;
            }
            was_selected
        };

        self.emit(CoordinatorEvent::SessionsChanged);
        if cleared_messages {
            self.emit(CoordinatorEvent::MessagesChanged);
        }
        info!(session_id = %session_id, "deleted session");
        Ok(())
    }

    pub async fn delete_all_history(&self) -> ClientResult<()> {
        let result = match self.api.delete_all_history().await {
            Ok(result) => result,
            Err(err) => {
                warn!(%err, "failed to delete all chat history");
                return Err(err);
            }
        };
        if !result.success {
            warn!(message = %result.message, "failed to delete all chat history");
            return Err(ClientError::Rejected(result.message));
        }

        {
            let mut state = self.inner.lock().await;
            state.sessions.clear();
            state.reset_conversation();
            state.current_session = None;
        }
        self.emit(CoordinatorEvent::SessionsChanged);
        self.emit(CoordinatorEvent::MessagesChanged);
        info!(message = %result.message, "deleted all chat history");
        Ok(())
    }

    /// Records feedback on an AI reply. The confirmation notice is shown on
    /// every message of that interaction and cleared after `feedback_notice_ttl`.
    pub async fn submit_feedback(
        self: &Arc<Self>,
        interaction_id: &InteractionId,
        kind: FeedbackKind,
        text: impl Into<String>,
    ) -> ClientResult<FeedbackResponse> {
        let session_id = {
            let mut state = self.inner.lock().await;
            let session_id = state
                .store
                .iter()
                .find(|m| m.interaction_id.as_ref() == Some(interaction_id))
                .and_then(|m| m.session_id.clone())
                .or_else(|| state.current_session.clone())
                .ok_or_else(|| ClientError::MissingSession(interaction_id.clone()))?;
            if !state.feedback_in_flight.insert(interaction_id.clone()) {
                return Err(ClientError::FeedbackInFlight(interaction_id.clone()));
            }
            session_id
        };

        let result = self
            .api
            .submit_feedback(FeedbackRequest {
                interaction_id: interaction_id.clone(),
                session_id,
                feedback_type: kind,
                feedback_text: text.into(),
            })
            .await;

        let mut state = self.inner.lock().await;
        state.feedback_in_flight.remove(interaction_id);
        let response = match result {
            Ok(response) => response,
            Err(err) => {
                error!(interaction_id = %interaction_id, %err, "feedback submission failed");
                return Err(err);
            }
        };

        state.store.update_where(
            |m| m.interaction_id.as_ref() == Some(interaction_id),
            |m| {
                m.feedback_submitted = Some(kind);
                m.feedback_message = Some(response.message.clone());
            },
        );
        drop(state);

        self.emit(CoordinatorEvent::FeedbackRecorded {
            interaction_id: interaction_id.clone(),
        });
        self.emit(CoordinatorEvent::MessagesChanged);
        self.schedule_feedback_notice_clear(interaction_id.clone());
        Ok(response)
    }

    fn schedule_feedback_notice_clear(self: &Arc<Self>, interaction_id: InteractionId) {
        let coordinator = Arc::clone(self);
        let ttl = self.settings.feedback_notice_ttl;
        tokio::spawn(async move {
            tokio::time::sleep(ttl).await;
            let touched = coordinator.inner.lock().await.store.update_where(
                |m| m.interaction_id.as_ref() == Some(&interaction_id),
                |m| m.feedback_message = None,
            );
            if touched > 0 {
                coordinator.emit(CoordinatorEvent::MessagesChanged);
            }
        });
    }

    pub async fn messages(&self) -> Vec<ChatMessage> {
        self.inner.lock().await.store.snapshot()
    }

    pub async fn sessions(&self) -> Vec<SessionSummary> {
        self.inner.lock().await.sessions.clone()
    }

    pub async fn selected_session(&self) -> Option<SessionId> {
        self.inner.lock().await.selected_session.clone()
    }

    pub async fn current_session_id(&self) -> Option<SessionId> {
        self.inner.lock().await.current_session.clone()
    }

    pub async fn pending_count(&self) -> usize {
        self.inner.lock().await.pending.len()
    }

    pub async fn is_pending(&self, request_id: RequestId) -> bool {
        self.inner.lock().await.pending.contains_key(&request_id)
    }

    pub async fn is_feedback_in_flight(&self, interaction_id: &InteractionId) -> bool {
        self.inner
            .lock()
            .await
            .feedback_in_flight
            .contains(interaction_id)
    }
}

#[cfg(test)]
#[path = "tests/coordinator_tests.rs"]
mod tests;
