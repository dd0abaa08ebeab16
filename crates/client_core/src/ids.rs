use chrono::Utc;
use shared::domain::{MessageId, RequestId};

/// Ids allocated for one live turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TurnIds {
    pub request_id: RequestId,
    pub user_message: MessageId,
    pub placeholder: MessageId,
}

/// Timestamp-derived ids that never repeat or go backwards, even when two
/// turns start within the same millisecond or the wall clock steps back.
#[derive(Debug, Default)]
pub struct MessageIdGenerator {
    last_issued: i64,
}

impl MessageIdGenerator {
    pub fn next_turn(&mut self) -> TurnIds {
        self.next_turn_at(Utc::now().timestamp_millis())
    }

    fn next_turn_at(&mut self, now_millis: i64) -> TurnIds {
        let base = now_millis.max(self.last_issued + 1);
        self.last_issued = base + 1;
        TurnIds {
            request_id: RequestId(base),
            user_message: MessageId(base),
            placeholder: MessageId(base + 1),
        }
    }
}
