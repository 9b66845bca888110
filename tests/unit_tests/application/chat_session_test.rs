use std::sync::Arc;

use bytes::Bytes;
use challenge_chat::application::services::{ChatSession, PartialReplyPolicy, SubmitError};
use challenge_chat::domain::{ConversationId, Message, MessageId, MessageRole, PipelineState};
use challenge_chat::infrastructure::backend::MockChatBackend;

fn history() -> Vec<Message> {
    vec![
        Message::new(MessageId::from_raw("h1"), MessageRole::User, "hello"),
        Message::new(MessageId::from_raw("h2"), MessageRole::Assistant, "hi, ask me anything"),
    ]
}

async fn open(backend: MockChatBackend) -> ChatSession<MockChatBackend> {
    ChatSession::open(
        ConversationId::new("challenge-1"),
        Arc::new(backend),
        PartialReplyPolicy::Remove,
    )
    .await
    .unwrap()
}

#[tokio::test]
async fn given_existing_transcript_when_opening_then_store_is_seeded_in_order() {
    let session = open(MockChatBackend::new().with_history(history())).await;

    assert_eq!(session.messages(), history());
    assert_eq!(session.conversation_id().as_str(), "challenge-1");
    assert_eq!(session.state(), PipelineState::Idle);
    assert!(!session.is_busy());
}

#[tokio::test]
async fn given_open_session_when_submitting_then_reply_is_appended_after_history() {
    let session = open(
        MockChatBackend::new()
            .with_history(history())
            .with_fragments(&["pon", "g!"]),
    )
    .await;

    session.submit("ping").await.unwrap();

    let messages = session.messages();
    assert_eq!(messages.len(), 4);
    assert_eq!(&messages[..2], &history()[..]);
    assert_eq!(messages[2].content, "ping");
    assert_eq!(messages[3].content, "pong!");
}

#[tokio::test]
async fn given_session_when_input_is_set_then_submit_input_sends_it() {
    let session = open(MockChatBackend::new()).await;
    session.set_input("what is the flag?");

    let reply = session.submit_input().await.unwrap();

    assert_eq!(reply.content, "You said: what is the flag?");
    assert_eq!(session.input(), "");
}

#[tokio::test]
async fn given_subscriber_when_reply_streams_then_it_observes_each_growth_step() {
    let (backend, sender) = MockChatBackend::new().with_live_completion();
    let session = Arc::new(open(backend).await);
    let mut updates = session.subscribe_messages();

    let submitting = {
        let session = Arc::clone(&session);
        tokio::spawn(async move { session.submit("ping").await })
    };

    updates
        .wait_for(|log| log.last().is_some_and(|m| m.role == MessageRole::Assistant))
        .await
        .unwrap();
    sender.unbounded_send(Ok(Bytes::from_static(b"po"))).unwrap();
    updates
        .wait_for(|log| log.last().is_some_and(|m| m.content == "po"))
        .await
        .unwrap();
    sender.unbounded_send(Ok(Bytes::from_static(b"ng"))).unwrap();
    drop(sender);

    let reply = submitting.await.unwrap().unwrap();
    assert_eq!(reply.content, "pong");
}

#[tokio::test]
async fn given_closed_session_when_submitting_then_nothing_reaches_backend_or_log() {
    let backend = Arc::new(MockChatBackend::new().with_history(history()));
    let session = ChatSession::open(
        ConversationId::new("challenge-1"),
        Arc::clone(&backend),
        PartialReplyPolicy::Remove,
    )
    .await
    .unwrap();

    session.close();
    let result = session.submit("ping").await;

    assert_eq!(result, Err(SubmitError::Closed));
    assert_eq!(session.messages(), history());
    assert_eq!(backend.stored_messages().await, history());
    assert!(backend.completion_requests().await.is_empty());
    assert!(!session.is_busy());
}
