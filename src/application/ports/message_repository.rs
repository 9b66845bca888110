use async_trait::async_trait;

use crate::domain::{ConversationId, Message};

use super::ChatBackendError;

#[async_trait]
pub trait MessageRepository: Send + Sync {
    /// Persists a user message and returns the server-confirmed copy.
    async fn create_user_message(
        &self,
        conversation_id: &ConversationId,
        content: &str,
    ) -> Result<Message, ChatBackendError>;

    async fn list_messages(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Vec<Message>, ChatBackendError>;
}
