use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::{Message, MessageId};

/// Mutations accepted by [`MessageLog::apply`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageAction {
    Add(Message),
    Update { id: MessageId, message: Message },
    Set(Vec<Message>),
    Delete(MessageId),
    Pop,
}

impl MessageAction {
    pub fn name(&self) -> &'static str {
        match self {
            MessageAction::Add(_) => "add",
            MessageAction::Update { .. } => "update",
            MessageAction::Set(_) => "set",
            MessageAction::Delete(_) => "delete",
            MessageAction::Pop => "pop",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("duplicate message id: {0}")]
    DuplicateId(MessageId),
}

/// Ordered chat transcript. Insertion order is display order and ids are unique.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageLog {
    messages: Vec<Message>,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_messages(messages: Vec<Message>) -> Result<Self, StoreError> {
        ensure_unique(&messages)?;
        Ok(Self { messages })
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn get(&self, id: &MessageId) -> Option<&Message> {
        self.messages.iter().find(|m| &m.id == id)
    }

    pub fn contains(&self, id: &MessageId) -> bool {
        self.position(id).is_some()
    }

    fn position(&self, id: &MessageId) -> Option<usize> {
        self.messages.iter().position(|m| &m.id == id)
    }

    /// Applies one action. Returns whether the log changed.
    ///
    /// Precondition violations are reported before anything is mutated, so an
    /// `Err` always leaves the log exactly as it was. Updates and deletes that
    /// name an absent id are tolerated and report `Ok(false)`.
    pub fn apply(&mut self, action: MessageAction) -> Result<bool, StoreError> {
        match action {
            MessageAction::Add(message) => {
                if self.contains(&message.id) {
                    return Err(StoreError::DuplicateId(message.id));
                }
                self.messages.push(message);
                Ok(true)
            }
            MessageAction::Update { id, message } => {
                let Some(index) = self.position(&id) else {
                    return Ok(false);
                };
                if message.id != id && self.contains(&message.id) {
                    return Err(StoreError::DuplicateId(message.id));
                }
                if self.messages[index] == message {
                    return Ok(false);
                }
                self.messages[index] = message;
                Ok(true)
            }
            MessageAction::Set(messages) => {
                ensure_unique(&messages)?;
                if self.messages == messages {
                    return Ok(false);
                }
                self.messages = messages;
                Ok(true)
            }
            MessageAction::Delete(id) => match self.position(&id) {
                Some(index) => {
                    self.messages.remove(index);
                    Ok(true)
                }
                None => Ok(false),
            },
            MessageAction::Pop => Ok(self.messages.pop().is_some()),
        }
    }
}

fn ensure_unique(messages: &[Message]) -> Result<(), StoreError> {
    let mut seen = HashSet::with_capacity(messages.len());
    for message in messages {
        if !seen.insert(&message.id) {
            return Err(StoreError::DuplicateId(message.id.clone()));
        }
    }
    Ok(())
}
