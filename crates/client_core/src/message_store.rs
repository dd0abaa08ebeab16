use shared::domain::MessageId;

use crate::message::ChatMessage;

/// Insertion-ordered message list owned by the coordinator.
#[derive(Debug, Default, Clone)]
pub struct MessageStore {
    messages: Vec<ChatMessage>,
}

impl MessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    /// Replaces the message with `id` in place. Returns false when no such message exists.
    pub fn replace(&mut self, id: MessageId, message: ChatMessage) -> bool {
        match self.messages.iter_mut().find(|m| m.id == id) {
            Some(slot) => {
                *slot = message;
                true
            }
            None => false,
        }
    }

    pub fn remove_where(&mut self, mut predicate: impl FnMut(&ChatMessage) -> bool) -> usize {
        let before = self.messages.len();
        self.messages.retain(|m| !predicate(m));
        before - self.messages.len()
    }

    pub fn update_where(
        &mut self,
        mut predicate: impl FnMut(&ChatMessage) -> bool,
        mut update: impl FnMut(&mut ChatMessage),
    ) -> usize {
        let mut touched = 0;
        for message in self.messages.iter_mut().filter(|m| predicate(m)) {
            update(message);
            touched += 1;
        }
        touched
    }

    pub fn replace_all(&mut self, messages: Vec<ChatMessage>) {
        self.messages = messages;
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    pub fn get(&self, id: MessageId) -> Option<&ChatMessage> {
        self.messages.iter().find(|m| m.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChatMessage> {
        self.messages.iter()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn snapshot(&self) -> Vec<ChatMessage> {
        self.messages.clone()
    }
}
