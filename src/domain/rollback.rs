use super::Message;

/// Undo information captured before an optimistic insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RollbackContext {
    Snapshot {
        messages: Vec<Message>,
        input: String,
    },
    NoSnapshot,
}

impl RollbackContext {
    pub fn capture(messages: Option<Vec<Message>>, input: String) -> Self {
        match messages {
            Some(messages) => RollbackContext::Snapshot { messages, input },
            None => RollbackContext::NoSnapshot,
        }
    }
}
