use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::Stream;

use crate::domain::{ConversationId, Message};

use super::ChatBackendError;

/// Raw completion body. Chunk boundaries carry no meaning; the stream ends
/// when the transport closes.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, ChatBackendError>> + Send + 'static>>;

#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Opens a streamed assistant reply given the full prior transcript as context.
    async fn create_chat_completion(
        &self,
        conversation_id: &ConversationId,
        messages: &[Message],
    ) -> Result<ByteStream, ChatBackendError>;
}
