use std::time::Duration;

use async_trait::async_trait;
use futures::stream::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::Instrument;

use crate::application::ports::{
    ByteStream, ChatBackendError, CompletionClient, MessageRepository,
};
use crate::domain::{ConversationId, Message, MessageId, MessageRole};
use crate::infrastructure::observability::{REQUEST_ID_HEADER, RequestId};
use crate::presentation::config::{BackendSettings, StreamFraming};

use super::event_stream::unwrap_event_stream;

pub struct HttpChatBackend {
    client: Client,
    base_url: String,
    request_timeout: Duration,
    framing: StreamFraming,
}

#[derive(Serialize)]
struct CreateMessageRequest<'a> {
    challenge_id: &'a str,
    content: &'a str,
    role: MessageRole,
}

#[derive(Deserialize)]
struct CreateMessageResponse {
    message: MessageDto,
}

#[derive(Deserialize)]
struct ListMessagesResponse {
    messages: Vec<MessageDto>,
}

#[derive(Deserialize)]
struct MessageDto {
    #[serde(alias = "_id")]
    id: String,
    content: String,
    role: MessageRole,
}

impl From<MessageDto> for Message {
    fn from(dto: MessageDto) -> Self {
        Message::new(MessageId::from_raw(dto.id), dto.role, dto.content)
    }
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    challenge_id: &'a str,
    messages: Vec<ContextMessage<'a>>,
}

#[derive(Serialize)]
struct ContextMessage<'a> {
    role: MessageRole,
    content: &'a str,
}

impl HttpChatBackend {
    pub fn new(
        base_url: &str,
        request_timeout: Duration,
        framing: StreamFraming,
    ) -> Result<Self, ChatBackendError> {
        let client = Client::builder()
            .connect_timeout(request_timeout)
            .build()
            .map_err(|e| ChatBackendError::RequestFailed(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            request_timeout,
            framing,
        })
    }

    fn messages_url(&self, conversation_id: &ConversationId) -> String {
        format!("{}/challenges/{}/messages", self.base_url, conversation_id)
    }

    fn completions_url(&self, conversation_id: &ConversationId) -> String {
        format!("{}/challenges/{}/completions", self.base_url, conversation_id)
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        request_id: &RequestId,
    ) -> Result<reqwest::Response, ChatBackendError> {
        let response = request
            .header(REQUEST_ID_HEADER, request_id.as_str())
            .send()
            .await
            .map_err(|e| ChatBackendError::RequestFailed(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), "Backend returned error status");
            return Err(ChatBackendError::HttpStatus {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response)
    }
}

#[async_trait]
impl MessageRepository for HttpChatBackend {
    async fn create_user_message(
        &self,
        conversation_id: &ConversationId,
        content: &str,
    ) -> Result<Message, ChatBackendError> {
        let request_id = RequestId::generate();
        let span = tracing::debug_span!("create_user_message", request_id = %request_id);

        async {
            let body = CreateMessageRequest {
                challenge_id: conversation_id.as_str(),
                content,
                role: MessageRole::User,
            };
            let request = self
                .client
                .post(self.messages_url(conversation_id))
                .timeout(self.request_timeout)
                .json(&body);

            let response: CreateMessageResponse = self
                .send(request, &request_id)
                .await?
                .json()
                .await
                .map_err(|e| ChatBackendError::InvalidResponse(e.to_string()))?;

            Ok::<_, ChatBackendError>(response.message.into())
        }
        .instrument(span)
        .await
    }

    async fn list_messages(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Vec<Message>, ChatBackendError> {
        let request_id = RequestId::generate();
        let span = tracing::debug_span!("list_messages", request_id = %request_id);

        async {
            let request = self
                .client
                .get(self.messages_url(conversation_id))
                .timeout(self.request_timeout);

            let response: ListMessagesResponse = self
                .send(request, &request_id)
                .await?
                .json()
                .await
                .map_err(|e| ChatBackendError::InvalidResponse(e.to_string()))?;

            Ok::<_, ChatBackendError>(response.messages.into_iter().map(Message::from).collect())
        }
        .instrument(span)
        .await
    }
}

#[async_trait]
impl CompletionClient for HttpChatBackend {
    async fn create_chat_completion(
        &self,
        conversation_id: &ConversationId,
        messages: &[Message],
    ) -> Result<ByteStream, ChatBackendError> {
        let request_id = RequestId::generate();
        let span = tracing::debug_span!(
            "create_chat_completion",
            request_id = %request_id,
            context_len = messages.len()
        );

        async {
            let body = ChatCompletionRequest {
                challenge_id: conversation_id.as_str(),
                messages: messages
                    .iter()
                    .map(|m| ContextMessage {
                        role: m.role,
                        content: &m.content,
                    })
                    .collect(),
            };
            let request = self
                .client
                .post(self.completions_url(conversation_id))
                .header(reqwest::header::ACCEPT, "text/event-stream")
                .json(&body);

            let response = self.send(request, &request_id).await?;

            let bytes: ByteStream = Box::pin(
                response
                    .bytes_stream()
                    .map(|chunk| chunk.map_err(|e| ChatBackendError::RequestFailed(e.to_string()))),
            );

            Ok::<_, ChatBackendError>(match self.framing {
                StreamFraming::Raw => bytes,
                StreamFraming::EventStream => unwrap_event_stream(bytes),
            })
        }
        .instrument(span)
        .await
    }
}

pub fn create_http_chat_backend(
    settings: &BackendSettings,
    framing: StreamFraming,
) -> Result<HttpChatBackend, ChatBackendError> {
    if settings.base_url.trim().is_empty() {
        return Err(ChatBackendError::InvalidResponse(
            "backend.base_url must not be empty".to_string(),
        ));
    }

    HttpChatBackend::new(
        &settings.base_url,
        Duration::from_secs(settings.request_timeout_secs),
        framing,
    )
}
