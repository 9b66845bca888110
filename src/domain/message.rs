use serde::{Deserialize, Serialize};

use super::{MessageId, MessageRole};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn new(id: MessageId, role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            id,
            role,
            content: content.into(),
        }
    }

    /// Client-synthesized entry with a fresh id, inserted before the server confirms it.
    pub fn optimistic(role: MessageRole, content: impl Into<String>) -> Self {
        Self::new(MessageId::generate(), role, content)
    }

    pub fn with_content(&self, content: impl Into<String>) -> Self {
        Self {
            id: self.id.clone(),
            role: self.role,
            content: content.into(),
        }
    }
}
