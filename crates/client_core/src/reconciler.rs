//! Projection of stored sessions into the live message list.

use shared::{
    domain::{InteractionId, MessageId, TurnId},
    protocol::{SessionSummary, StoredTurn},
};
use tracing::warn;

use crate::message::ChatMessage;

pub struct SessionReconciler;

impl SessionReconciler {
    /// Two messages per stored turn, in stored order: the user input at
    /// `2 * turn - 1` and the bot response at `2 * turn`. Turns whose ids
    /// fall outside that range are skipped.
    pub fn project(session: &SessionSummary) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(session.messages.len() * 2);
        for turn in &session.messages {
            let Some((user_id, reply_id)) = turn_message_ids(turn.id) else {
                warn!(
                    session_id = %session.session_id,
                    turn_id = %turn.id,
                    "skipping stored turn with out-of-range id"
                );
                continue;
            };
            messages.push(ChatMessage::user(user_id, turn.user_input.clone()));
            messages.push(project_reply(session, turn, reply_id));
        }
        messages
    }
}

fn turn_message_ids(turn: TurnId) -> Option<(MessageId, MessageId)> {
    let reply = turn.0.checked_mul(2)?;
    let user = reply.checked_sub(1)?;
    Some((MessageId(user), MessageId(reply)))
}

fn project_reply(session: &SessionSummary, turn: &StoredTurn, id: MessageId) -> ChatMessage {
    let session_id = turn
        .session_id
        .clone()
        .unwrap_or_else(|| session.session_id.clone());
    let interaction_id = match turn.record_id.as_deref() {
        Some(record_id) if !record_id.is_empty() => InteractionId::new(record_id),
        _ => InteractionId(format!("{session_id}_{id}")),
    };

    let mut message = ChatMessage::ai(id, turn.bot_response.clone());
    message.detected_language = turn.language_code.clone();
    message.language_name = turn.language_name.clone();
    message.session_id = Some(session_id);
    message.interaction_id = Some(interaction_id);
    message
}

#[cfg(test)]
mod tests {
    use shared::domain::{Sender, SessionId};

    use super::*;

    fn turn(id: i64, record_id: Option<&str>) -> StoredTurn {
        StoredTurn {
            id: TurnId(id),
            user_input: format!("question {id}"),
            bot_response: format!("answer {id}"),
            language_code: Some("en".into()),
            language_name: Some("English".into()),
            session_id: None,
            record_id: record_id.map(str::to_string),
        }
    }

    fn session(turns: Vec<StoredTurn>) -> SessionSummary {
        SessionSummary {
            session_id: SessionId::new("s1"),
            message_count: turns.len() as u64,
            session_title: "question 1".into(),
            latest_timestamp: None,
            messages: turns,
        }
    }

    #[test]
    fn n_turns_project_to_alternating_pairs_in_order() {
        let stored = session(vec![turn(1, None), turn(2, None), turn(3, None)]);
        let projected = SessionReconciler::project(&stored);

        assert_eq!(projected.len(), 6);
        for (index, message) in projected.iter().enumerate() {
            let expected = if index % 2 == 0 { Sender::User } else { Sender::Ai };
            assert_eq!(message.sender, expected);
        }
        let ids: Vec<i64> = projected.iter().map(|m| m.id.0).collect();
        assert_eq!(ids, [1, 2, 3, 4, 5, 6]);
        assert_eq!(projected[4].text, "question 3");
        assert_eq!(projected[5].text, "answer 3");
    }

    #[test]
    fn projection_is_deterministic() {
        let stored = session(vec![turn(7, Some("r7")), turn(8, None)]);
        let first: Vec<MessageId> = SessionReconciler::project(&stored)
            .iter()
            .map(|m| m.id)
            .collect();
        let second: Vec<MessageId> = SessionReconciler::project(&stored)
            .iter()
            .map(|m| m.id)
            .collect();
        assert_eq!(first, second);
    }

    #[test]
    fn reply_uses_record_id_then_composite_fallback() {
        let stored = session(vec![turn(2, Some("rec-2")), turn(3, None)]);
        let projected = SessionReconciler::project(&stored);

        assert_eq!(
            projected[1].interaction_id,
            Some(InteractionId::new("rec-2"))
        );
        assert_eq!(projected[3].interaction_id, Some(InteractionId::new("s1_6")));
        assert_eq!(projected[3].language_name.as_deref(), Some("English"));
        assert_eq!(projected[3].session_id, Some(SessionId::new("s1")));
        assert!(projected[2].interaction_id.is_none());
    }

    #[test]
    fn empty_session_projects_to_nothing() {
        assert!(SessionReconciler::project(&session(Vec::new())).is_empty());
    }

    #[test]
    fn turns_with_out_of_range_ids_are_skipped() {
        let raw = r#"{
            "session_id": "s1",
            "messages": [
                {"id": 9223372036854775807, "user_input": "q", "bot_response": "a"},
                {"id": 2, "user_input": "question 2", "bot_response": "answer 2"},
                {"id": -9223372036854775808, "user_input": "q", "bot_response": "a"}
            ]
        }"#;
        let stored: SessionSummary = serde_json::from_str(raw).expect("parse");

        let projected = SessionReconciler::project(&stored);

        let ids: Vec<i64> = projected.iter().map(|m| m.id.0).collect();
        assert_eq!(ids, [3, 4]);
        assert_eq!(projected[1].text, "answer 2");
    }
}
