use std::sync::Arc;

use bytes::Bytes;
use challenge_chat::application::ports::ChatBackendError;
use challenge_chat::application::services::{
    CompletionConsumer, CompletionError, DecodeError, MessageStore, PartialReplyPolicy,
};
use challenge_chat::domain::{ConversationId, Message, MessageAction, MessageId, MessageRole};
use challenge_chat::infrastructure::backend::{MockChatBackend, MockCompletion};
use tokio_util::sync::CancellationToken;

fn conversation() -> ConversationId {
    ConversationId::new("challenge-1")
}

fn user(id: &str, content: &str) -> Message {
    Message::new(MessageId::from_raw(id), MessageRole::User, content)
}

fn seeded_store(messages: Vec<Message>) -> MessageStore {
    let store = MessageStore::default();
    store.dispatch(MessageAction::Set(messages)).unwrap();
    store
}

fn reset() -> ChatBackendError {
    ChatBackendError::RequestFailed("connection reset".to_string())
}

#[tokio::test]
async fn given_fragments_when_consuming_then_assistant_message_holds_concatenation() {
    let backend = Arc::new(MockChatBackend::new().with_fragments(&["pon", "g!"]));
    let store = seeded_store(vec![user("srv-1", "ping")]);
    let consumer = CompletionConsumer::new(backend, store.clone(), PartialReplyPolicy::Remove);

    let reply = consumer
        .consume(&conversation(), store.messages(), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(reply.content, "pong!");
    assert_eq!(reply.role, MessageRole::Assistant);
    let messages = store.messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[1], reply);
}

#[tokio::test]
async fn given_context_when_consuming_then_backend_receives_it_without_placeholder() {
    let backend = Arc::new(MockChatBackend::new().with_fragments(&["ok"]));
    let context = vec![user("srv-1", "ping")];
    let store = seeded_store(context.clone());
    let consumer =
        CompletionConsumer::new(Arc::clone(&backend), store, PartialReplyPolicy::Remove);

    consumer
        .consume(&conversation(), context.clone(), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(backend.completion_requests().await, vec![context]);
}

#[tokio::test]
async fn given_stream_failing_midway_when_policy_is_remove_then_partial_reply_is_deleted() {
    let backend = Arc::new(MockChatBackend::new().with_completion(MockCompletion::FailAfter {
        chunks: vec![Bytes::from_static(b"half")],
        error: reset(),
    }));
    let store = seeded_store(vec![user("srv-1", "ping")]);
    let consumer = CompletionConsumer::new(backend, store.clone(), PartialReplyPolicy::Remove);

    let result = consumer
        .consume(&conversation(), store.messages(), CancellationToken::new())
        .await;

    assert_eq!(result, Err(CompletionError::Transport(reset())));
    assert_eq!(store.messages(), vec![user("srv-1", "ping")]);
}

#[tokio::test]
async fn given_stream_failing_midway_when_policy_is_retain_then_partial_reply_stays() {
    let backend = Arc::new(MockChatBackend::new().with_completion(MockCompletion::FailAfter {
        chunks: vec![Bytes::from_static(b"half")],
        error: reset(),
    }));
    let store = seeded_store(vec![user("srv-1", "ping")]);
    let consumer = CompletionConsumer::new(backend, store.clone(), PartialReplyPolicy::Retain);

    let result = consumer
        .consume(&conversation(), store.messages(), CancellationToken::new())
        .await;

    assert!(matches!(result, Err(CompletionError::Transport(_))));
    let messages = store.messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[1].role, MessageRole::Assistant);
    assert_eq!(messages[1].content, "half");
}

#[tokio::test]
async fn given_invalid_byte_after_text_when_policy_is_retain_then_decoded_text_is_kept() {
    let backend = Arc::new(MockChatBackend::new().with_completion(MockCompletion::Chunks(vec![
        Bytes::from_static(b"pon"),
        Bytes::from_static(b"g\xFF!"),
    ])));
    let store = MessageStore::default();
    let consumer = CompletionConsumer::new(backend, store.clone(), PartialReplyPolicy::Retain);

    let result = consumer
        .consume(&conversation(), Vec::new(), CancellationToken::new())
        .await;

    assert_eq!(
        result,
        Err(CompletionError::Decode(DecodeError::InvalidUtf8 { offset: 4 }))
    );
    assert_eq!(store.messages()[0].content, "pong");
}

#[tokio::test]
async fn given_backend_refusing_stream_when_consuming_then_placeholder_is_removed() {
    let backend = Arc::new(
        MockChatBackend::new().with_completion(MockCompletion::FailToOpen(
            ChatBackendError::HttpStatus {
                status: 503,
                body: "busy".to_string(),
            },
        )),
    );
    let store = seeded_store(vec![user("srv-1", "ping")]);
    let consumer = CompletionConsumer::new(backend, store.clone(), PartialReplyPolicy::Remove);

    let result = consumer
        .consume(&conversation(), store.messages(), CancellationToken::new())
        .await;

    assert!(matches!(
        result,
        Err(CompletionError::Transport(ChatBackendError::HttpStatus { status: 503, .. }))
    ));
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn given_truncated_utf8_when_consuming_then_reports_decode_error() {
    let crab = "🦀".as_bytes();
    let backend = Arc::new(MockChatBackend::new().with_completion(MockCompletion::Chunks(vec![
        Bytes::from_static(b"ok "),
        Bytes::copy_from_slice(&crab[..3]),
    ])));
    let store = MessageStore::default();
    let consumer = CompletionConsumer::new(backend, store.clone(), PartialReplyPolicy::Remove);

    let result = consumer
        .consume(&conversation(), Vec::new(), CancellationToken::new())
        .await;

    assert_eq!(
        result,
        Err(CompletionError::Decode(DecodeError::Truncated { pending_bytes: 3 }))
    );
    assert!(store.is_empty());
}

#[tokio::test]
async fn given_live_stream_when_fragments_arrive_then_store_grows_in_order() {
    let (backend, sender) = MockChatBackend::new().with_live_completion();
    let store = MessageStore::default();
    let consumer =
        CompletionConsumer::new(Arc::new(backend), store.clone(), PartialReplyPolicy::Remove);
    let mut updates = store.subscribe();

    let consuming = tokio::spawn(async move {
        consumer
            .consume(&conversation(), Vec::new(), CancellationToken::new())
            .await
    });

    updates.changed().await.unwrap();
    assert_eq!(updates.borrow_and_update().messages()[0].content, "");

    sender.unbounded_send(Ok(Bytes::from_static(b"pon"))).unwrap();
    updates.changed().await.unwrap();
    assert_eq!(updates.borrow_and_update().messages()[0].content, "pon");

    sender.unbounded_send(Ok(Bytes::from_static(b"g!"))).unwrap();
    updates.changed().await.unwrap();
    assert_eq!(updates.borrow_and_update().messages()[0].content, "pong!");

    drop(sender);
    let reply = consuming.await.unwrap().unwrap();
    assert_eq!(reply.content, "pong!");
}

#[tokio::test]
async fn given_cancellation_mid_stream_when_consuming_then_returns_cancelled() {
    let (backend, sender) = MockChatBackend::new().with_live_completion();
    let store = MessageStore::default();
    let consumer =
        CompletionConsumer::new(Arc::new(backend), store.clone(), PartialReplyPolicy::Remove);
    let cancel = CancellationToken::new();
    let mut updates = store.subscribe();

    let token = cancel.clone();
    let consuming = tokio::spawn(async move {
        consumer.consume(&conversation(), Vec::new(), token).await
    });

    sender.unbounded_send(Ok(Bytes::from_static(b"par"))).unwrap();
    while store.messages().first().map(|m| m.content.as_str()) != Some("par") {
        updates.changed().await.unwrap();
    }
    cancel.cancel();

    let result = consuming.await.unwrap();
    assert_eq!(result, Err(CompletionError::Cancelled));
    assert!(store.is_empty());
    assert!(sender.is_closed());
}

#[tokio::test]
async fn given_torn_down_store_when_stream_continues_then_log_is_left_alone() {
    let (backend, sender) = MockChatBackend::new().with_live_completion();
    let store = MessageStore::default();
    let consumer =
        CompletionConsumer::new(Arc::new(backend), store.clone(), PartialReplyPolicy::Remove);
    let mut updates = store.subscribe();

    let consuming = tokio::spawn(async move {
        consumer
            .consume(&conversation(), Vec::new(), CancellationToken::new())
            .await
    });

    updates.changed().await.unwrap();
    store.teardown();
    sender.unbounded_send(Ok(Bytes::from_static(b"late"))).unwrap();
    drop(sender);

    let reply = consuming.await.unwrap().unwrap();
    assert_eq!(reply.content, "late");
    assert_eq!(store.messages()[0].content, "");
}

#[test]
fn given_default_policy_then_partial_replies_are_removed() {
    assert_eq!(PartialReplyPolicy::default(), PartialReplyPolicy::Remove);
}
