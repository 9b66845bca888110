use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::channel::mpsc;
use tokio::sync::Mutex;

use crate::application::ports::{
    ByteStream, ChatBackendError, CompletionClient, MessageRepository,
};
use crate::domain::{ConversationId, Message, MessageId, MessageRole};

/// How the mock answers a completion request.
pub enum MockCompletion {
    /// Replies with the last user message, one word per chunk.
    Echo,
    /// Replays the given chunks, then closes.
    Chunks(Vec<Bytes>),
    /// Replays the given chunks, then fails with `error`.
    FailAfter {
        chunks: Vec<Bytes>,
        error: ChatBackendError,
    },
    /// Fails before any byte is streamed.
    FailToOpen(ChatBackendError),
    /// Streams whatever the test pushes into the paired sender; used once.
    Live(mpsc::UnboundedReceiver<Result<Bytes, ChatBackendError>>),
}

/// In-memory backend used by scaffold mode and tests.
pub struct MockChatBackend {
    history: Mutex<Vec<Message>>,
    user_create_error: Mutex<Option<ChatBackendError>>,
    completion: Mutex<MockCompletion>,
    completion_requests: Mutex<Vec<Vec<Message>>>,
    next_id: AtomicUsize,
    response_delay: Duration,
}

impl MockChatBackend {
    pub fn new() -> Self {
        Self {
            history: Mutex::new(Vec::new()),
            user_create_error: Mutex::new(None),
            completion: Mutex::new(MockCompletion::Echo),
            completion_requests: Mutex::new(Vec::new()),
            next_id: AtomicUsize::new(1),
            response_delay: Duration::ZERO,
        }
    }

    pub fn with_history(self, messages: Vec<Message>) -> Self {
        Self {
            history: Mutex::new(messages),
            ..self
        }
    }

    pub fn with_completion(self, completion: MockCompletion) -> Self {
        Self {
            completion: Mutex::new(completion),
            ..self
        }
    }

    pub fn with_fragments(self, fragments: &[&str]) -> Self {
        let chunks = fragments
            .iter()
            .map(|f| Bytes::copy_from_slice(f.as_bytes()))
            .collect();
        self.with_completion(MockCompletion::Chunks(chunks))
    }

    pub fn failing_user_create(self, error: ChatBackendError) -> Self {
        Self {
            user_create_error: Mutex::new(Some(error)),
            ..self
        }
    }

    pub fn with_response_delay(self, delay: Duration) -> Self {
        Self {
            response_delay: delay,
            ..self
        }
    }

    /// Returns a backend whose next completion streams whatever is sent on the
    /// returned channel, closing when the sender is dropped.
    pub fn with_live_completion(
        self,
    ) -> (Self, mpsc::UnboundedSender<Result<Bytes, ChatBackendError>>) {
        let (sender, receiver) = mpsc::unbounded();
        (self.with_completion(MockCompletion::Live(receiver)), sender)
    }

    pub async fn set_user_create_error(&self, error: Option<ChatBackendError>) {
        *self.user_create_error.lock().await = error;
    }

    pub async fn stored_messages(&self) -> Vec<Message> {
        self.history.lock().await.clone()
    }

    /// Contexts received by every completion request so far, in call order.
    pub async fn completion_requests(&self) -> Vec<Vec<Message>> {
        self.completion_requests.lock().await.clone()
    }

    async fn delay(&self) {
        if !self.response_delay.is_zero() {
            tokio::time::sleep(self.response_delay).await;
        }
    }

    fn next_server_id(&self) -> MessageId {
        let n = self.next_id.fetch_add(1, Ordering::Relaxed);
        MessageId::from_raw(format!("srv-{n}"))
    }
}

impl Default for MockChatBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageRepository for MockChatBackend {
    async fn create_user_message(
        &self,
        _conversation_id: &ConversationId,
        content: &str,
    ) -> Result<Message, ChatBackendError> {
        self.delay().await;
        if let Some(error) = self.user_create_error.lock().await.clone() {
            return Err(error);
        }

        let message = Message::new(self.next_server_id(), MessageRole::User, content);
        self.history.lock().await.push(message.clone());
        Ok(message)
    }

    async fn list_messages(
        &self,
        _conversation_id: &ConversationId,
    ) -> Result<Vec<Message>, ChatBackendError> {
        self.delay().await;
        Ok(self.history.lock().await.clone())
    }
}

#[async_trait]
impl CompletionClient for MockChatBackend {
    async fn create_chat_completion(
        &self,
        _conversation_id: &ConversationId,
        messages: &[Message],
    ) -> Result<ByteStream, ChatBackendError> {
        self.delay().await;
        self.completion_requests
            .lock()
            .await
            .push(messages.to_vec());

        let mut completion = self.completion.lock().await;
        match std::mem::replace(&mut *completion, MockCompletion::Chunks(Vec::new())) {
            MockCompletion::Live(receiver) => Ok(Box::pin(receiver)),
            scripted => {
                let result = scripted.replay(messages);
                *completion = scripted;
                result
            }
        }
    }
}

impl MockCompletion {
    fn replay(&self, messages: &[Message]) -> Result<ByteStream, ChatBackendError> {
        let items: Vec<Result<Bytes, ChatBackendError>> = match self {
            MockCompletion::Echo => {
                let last_user = messages
                    .iter()
                    .rev()
                    .find(|m| m.role == MessageRole::User)
                    .map(|m| m.content.as_str())
                    .unwrap_or("nothing");
                format!("You said: {last_user}")
                    .split_inclusive(' ')
                    .map(|word| Ok(Bytes::copy_from_slice(word.as_bytes())))
                    .collect()
            }
            MockCompletion::Chunks(chunks) => chunks.iter().cloned().map(Ok).collect(),
            MockCompletion::FailAfter { chunks, error } => chunks
                .iter()
                .cloned()
                .map(Ok)
                .chain(std::iter::once(Err(error.clone())))
                .collect(),
            MockCompletion::FailToOpen(error) => return Err(error.clone()),
            MockCompletion::Live(_) => Vec::new(),
        };
        Ok(Box::pin(futures::stream::iter(items)))
    }
}
