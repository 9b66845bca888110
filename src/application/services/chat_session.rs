use std::sync::Arc;

use tokio::sync::watch;

use crate::application::ports::{ChatBackendError, CompletionClient, MessageRepository};
use crate::domain::{ConversationId, Message, MessageAction, MessageLog, PipelineState, StoreError};

use super::chat_orchestrator::{ChatOrchestrator, SubmitError};
use super::completion_consumer::PartialReplyPolicy;
use super::message_store::MessageStore;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("loading messages: {0}")]
    Load(#[from] ChatBackendError),
    #[error("seeding message store: {0}")]
    Store(#[from] StoreError),
}

/// What a chat view talks to: the ordered transcript, the input buffer, a busy
/// signal and `submit`.
pub struct ChatSession<B>
where
    B: MessageRepository + CompletionClient,
{
    orchestrator: ChatOrchestrator<B, B>,
}

impl<B> ChatSession<B>
where
    B: MessageRepository + CompletionClient,
{
    /// Loads the existing transcript once and seeds the store with it.
    #[tracing::instrument(skip(backend), fields(conversation_id = %conversation_id))]
    pub async fn open(
        conversation_id: ConversationId,
        backend: Arc<B>,
        policy: PartialReplyPolicy,
    ) -> Result<Self, SessionError> {
        let messages = backend.list_messages(&conversation_id).await?;
        tracing::info!(message_count = messages.len(), "Loaded conversation");

        let store = MessageStore::new(MessageLog::new());
        store.dispatch(MessageAction::Set(messages))?;

        let orchestrator =
            ChatOrchestrator::new(conversation_id, Arc::clone(&backend), backend, store, policy);
        Ok(Self { orchestrator })
    }

    pub fn conversation_id(&self) -> &ConversationId {
        self.orchestrator.conversation_id()
    }

    pub fn messages(&self) -> Vec<Message> {
        self.orchestrator.store().messages()
    }

    pub fn subscribe_messages(&self) -> watch::Receiver<MessageLog> {
        self.orchestrator.store().subscribe()
    }

    pub fn input(&self) -> String {
        self.orchestrator.input()
    }

    pub fn set_input(&self, text: impl Into<String>) {
        self.orchestrator.set_input(text);
    }

    pub fn is_busy(&self) -> bool {
        self.orchestrator.is_busy()
    }

    pub fn state(&self) -> PipelineState {
        self.orchestrator.state()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<PipelineState> {
        self.orchestrator.subscribe_state()
    }

    pub async fn submit(&self, text: impl Into<String>) -> Result<Message, SubmitError> {
        self.orchestrator.submit(text).await
    }

    pub async fn submit_input(&self) -> Result<Message, SubmitError> {
        self.orchestrator.submit_input().await
    }

    /// Releases the completion stream, if any, and stops all further log writes.
    pub fn close(&self) {
        tracing::debug!(conversation_id = %self.conversation_id(), "Closing chat session");
        self.orchestrator.shutdown();
    }
}

impl<B> Drop for ChatSession<B>
where
    B: MessageRepository + CompletionClient,
{
    fn drop(&mut self) {
        self.orchestrator.shutdown();
    }
}
