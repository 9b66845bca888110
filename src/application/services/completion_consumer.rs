use std::sync::Arc;

use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use crate::application::ports::{ChatBackendError, CompletionClient};
use crate::domain::{ConversationId, Message, MessageAction, MessageRole, StoreError};

use super::message_store::MessageStore;
use super::stream_decoder::{DecodeError, StreamDecoder, StreamError};

/// What happens to a partially streamed assistant message when the stream fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartialReplyPolicy {
    /// Delete the assistant entry so the log only holds completed replies.
    #[default]
    Remove,
    /// Keep whatever was accumulated before the failure.
    Retain,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompletionError {
    #[error("transport: {0}")]
    Transport(ChatBackendError),
    #[error("decode: {0}")]
    Decode(DecodeError),
    #[error("message store: {0}")]
    Store(#[from] StoreError),
    #[error("completion stream cancelled")]
    Cancelled,
}

impl From<StreamError> for CompletionError {
    fn from(e: StreamError) -> Self {
        match e {
            StreamError::Transport(e) => CompletionError::Transport(e),
            StreamError::Decode(e) => CompletionError::Decode(e),
        }
    }
}

pub struct CompletionConsumer<C>
where
    C: CompletionClient,
{
    client: Arc<C>,
    store: MessageStore,
    policy: PartialReplyPolicy,
}

impl<C> CompletionConsumer<C>
where
    C: CompletionClient,
{
    pub fn new(client: Arc<C>, store: MessageStore, policy: PartialReplyPolicy) -> Self {
        Self {
            client,
            store,
            policy,
        }
    }

    pub fn policy(&self) -> PartialReplyPolicy {
        self.policy
    }

    /// Streams one assistant reply into the store and returns the finished message.
    ///
    /// `context` is the transcript sent to the backend; the optimistic assistant
    /// entry is appended after it and updated in place as fragments arrive.
    #[tracing::instrument(
        skip(self, context, cancel),
        fields(conversation_id = %conversation_id, context_len = context.len())
    )]
    pub async fn consume(
        &self,
        conversation_id: &ConversationId,
        context: Vec<Message>,
        cancel: CancellationToken,
    ) -> Result<Message, CompletionError> {
        let assistant = Message::optimistic(MessageRole::Assistant, String::new());
        self.store.dispatch(MessageAction::Add(assistant.clone()))?;
        tracing::debug!(message_id = %assistant.id, "Inserted optimistic assistant message");

        let result = self.stream_into(conversation_id, &context, &assistant, cancel).await;

        match result {
            Ok(message) => {
                tracing::info!(
                    message_id = %message.id,
                    content_len = message.content.len(),
                    "Completion finished"
                );
                Ok(message)
            }
            Err(e) => {
                tracing::error!(message_id = %assistant.id, error = %e, "Completion failed");
                self.discard_partial(&assistant);
                Err(e)
            }
        }
    }

    async fn stream_into(
        &self,
        conversation_id: &ConversationId,
        context: &[Message],
        assistant: &Message,
        cancel: CancellationToken,
    ) -> Result<Message, CompletionError> {
        let stream = self
            .client
            .create_chat_completion(conversation_id, context)
            .await
            .map_err(CompletionError::Transport)?;

        let mut decoder = StreamDecoder::new(stream, cancel.clone());
        let mut accumulated = String::new();
        let mut fragments = 0usize;

        while let Some(fragment) = decoder.next_fragment().await {
            let fragment = fragment?;
            accumulated.push_str(&fragment);
            fragments += 1;
            tracing::trace!(fragment_len = fragment.len(), "Received completion fragment");

            self.store.dispatch(MessageAction::Update {
                id: assistant.id.clone(),
                message: assistant.with_content(accumulated.as_str()),
            })?;
        }

        if cancel.is_cancelled() {
            return Err(CompletionError::Cancelled);
        }

        tracing::debug!(fragments, "Completion stream closed");
        Ok(assistant.with_content(accumulated))
    }

    fn discard_partial(&self, assistant: &Message) {
        match self.policy {
            PartialReplyPolicy::Remove => {
                if let Err(e) = self.store.dispatch(MessageAction::Delete(assistant.id.clone())) {
                    tracing::warn!(error = %e, "Failed to remove partial assistant message");
                }
            }
            PartialReplyPolicy::Retain => {
                tracing::debug!(message_id = %assistant.id, "Retaining partial assistant message");
            }
        }
    }
}
