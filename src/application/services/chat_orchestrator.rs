use std::sync::Arc;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::application::ports::{ChatBackendError, CompletionClient, MessageRepository};
use crate::domain::{
    ConversationId, Message, MessageAction, MessageRole, PipelineState, RollbackContext,
    StoreError,
};
use crate::infrastructure::observability::sanitize_prompt;

use super::completion_consumer::{CompletionConsumer, CompletionError, PartialReplyPolicy};
use super::message_store::MessageStore;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubmitError {
    #[error("a submission is already in flight")]
    Busy,
    #[error("chat session is closed")]
    Closed,
    #[error("user message rejected: {0}")]
    UserMessageRejected(ChatBackendError),
    #[error("message store: {0}")]
    Store(#[from] StoreError),
    #[error("completion: {0}")]
    Completion(#[from] CompletionError),
}

impl SubmitError {
    /// Transient failures the user can retry by submitting again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SubmitError::UserMessageRejected(_)
                | SubmitError::Completion(CompletionError::Transport(_))
                | SubmitError::Completion(CompletionError::Decode(_))
        )
    }
}

/// Runs submissions through the user-message and completion phases, one at a time.
///
/// The user message is inserted optimistically and rolled back if the backend
/// rejects it; the completion phase only starts once the user message is
/// confirmed (or immediately, for an empty submission).
pub struct ChatOrchestrator<R, C>
where
    R: MessageRepository,
    C: CompletionClient,
{
    conversation_id: ConversationId,
    repository: Arc<R>,
    consumer: CompletionConsumer<C>,
    store: MessageStore,
    state: watch::Sender<PipelineState>,
    input: watch::Sender<String>,
    cancel: CancellationToken,
}

impl<R, C> ChatOrchestrator<R, C>
where
    R: MessageRepository,
    C: CompletionClient,
{
    pub fn new(
        conversation_id: ConversationId,
        repository: Arc<R>,
        completion_client: Arc<C>,
        store: MessageStore,
        policy: PartialReplyPolicy,
    ) -> Self {
        let (state, _) = watch::channel(PipelineState::Idle);
        let (input, _) = watch::channel(String::new());
        Self {
            conversation_id,
            repository,
            consumer: CompletionConsumer::new(completion_client, store.clone(), policy),
            store,
            state,
            input,
            cancel: CancellationToken::new(),
        }
    }

    pub fn conversation_id(&self) -> &ConversationId {
        &self.conversation_id
    }

    pub fn store(&self) -> &MessageStore {
        &self.store
    }

    pub fn state(&self) -> PipelineState {
        *self.state.borrow()
    }

    pub fn is_busy(&self) -> bool {
        self.state().is_busy()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<PipelineState> {
        self.state.subscribe()
    }

    pub fn input(&self) -> String {
        self.input.borrow().clone()
    }

    pub fn set_input(&self, text: impl Into<String>) {
        self.input.send_replace(text.into());
    }

    pub fn subscribe_input(&self) -> watch::Receiver<String> {
        self.input.subscribe()
    }

    /// Submits whatever the input buffer currently holds.
    pub async fn submit_input(&self) -> Result<Message, SubmitError> {
        let text = self.input();
        self.submit(text).await
    }

    #[tracing::instrument(skip(self, text), fields(conversation_id = %self.conversation_id))]
    pub async fn submit(&self, text: impl Into<String>) -> Result<Message, SubmitError> {
        let text = text.into();
        let first_phase = if text.is_empty() {
            PipelineState::AwaitingCompletion
        } else {
            PipelineState::AwaitingUserCreate
        };

        if self.cancel.is_cancelled() || self.store.is_torn_down() {
            tracing::debug!("Rejected submission after shutdown");
            return Err(SubmitError::Closed);
        }

        let Some(pipeline) = PipelineGuard::acquire(&self.state, first_phase) else {
            tracing::debug!(state = %self.state(), "Rejected submission while busy");
            return Err(SubmitError::Busy);
        };

        if text.is_empty() {
            tracing::debug!("Empty submission, requesting completion only");
        } else {
            self.create_user_message(&text).await?;
            pipeline.advance(PipelineState::AwaitingCompletion);
        }

        let context = self.store.messages();
        match self
            .consumer
            .consume(&self.conversation_id, context, self.cancel.child_token())
            .await
        {
            Ok(reply) => {
                tracing::info!(outcome = "done", "Submission finished");
                Ok(reply)
            }
            Err(e) => {
                tracing::warn!(outcome = "partial_failure", error = %e, "Submission failed during completion");
                Err(e.into())
            }
        }
    }

    async fn create_user_message(&self, text: &str) -> Result<(), SubmitError> {
        self.input.send_replace(text.to_string());
        let rollback = RollbackContext::capture(self.store.snapshot(), self.input());

        let optimistic = Message::optimistic(MessageRole::User, text);
        self.store.dispatch(MessageAction::Add(optimistic.clone()))?;
        self.input.send_replace(String::new());
        tracing::debug!(
            message_id = %optimistic.id,
            prompt = %sanitize_prompt(text),
            "Inserted optimistic user message"
        );

        match self
            .repository
            .create_user_message(&self.conversation_id, text)
            .await
        {
            Ok(confirmed) => {
                tracing::debug!(
                    optimistic_id = %optimistic.id,
                    confirmed_id = %confirmed.id,
                    "User message confirmed"
                );
                let promoted = self.store.dispatch(MessageAction::Update {
                    id: optimistic.id,
                    message: confirmed,
                });
                if let Err(e) = promoted {
                    tracing::warn!(outcome = "rolled_back", error = %e, "Confirmed message conflicts with log");
                    self.roll_back(rollback, text);
                    return Err(e.into());
                }
                Ok(())
            }
            Err(e) => {
                tracing::warn!(outcome = "rolled_back", error = %e, "User message rejected");
                self.roll_back(rollback, text);
                Err(SubmitError::UserMessageRejected(e))
            }
        }
    }

    fn roll_back(&self, rollback: RollbackContext, text: &str) {
        let (action, input) = match rollback {
            RollbackContext::Snapshot { messages, input } => (MessageAction::Set(messages), input),
            RollbackContext::NoSnapshot => (MessageAction::Pop, text.to_string()),
        };
        if let Err(e) = self.store.dispatch(action) {
            tracing::error!(error = %e, "Failed to restore message log");
        }
        self.input.send_replace(input);
    }

    /// Cancels any in-flight stream and detaches the store from further writes.
    pub fn shutdown(&self) {
        self.cancel.cancel();
        self.store.teardown();
    }
}

/// Holds the pipeline out of `Idle` for one submission and returns it on drop,
/// including when the submission future is dropped mid-flight.
struct PipelineGuard<'a> {
    state: &'a watch::Sender<PipelineState>,
}

impl<'a> PipelineGuard<'a> {
    fn acquire(state: &'a watch::Sender<PipelineState>, next: PipelineState) -> Option<Self> {
        let acquired = state.send_if_modified(|current| {
            if current.is_busy() {
                return false;
            }
            *current = next;
            true
        });
        acquired.then_some(Self { state })
    }

    fn advance(&self, next: PipelineState) {
        self.state.send_replace(next);
    }
}

impl Drop for PipelineGuard<'_> {
    fn drop(&mut self) {
        self.state.send_if_modified(|current| {
            if *current == PipelineState::Idle {
                return false;
            }
            *current = PipelineState::Idle;
            true
        });
    }
}
