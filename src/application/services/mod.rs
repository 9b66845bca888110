mod chat_orchestrator;
mod chat_session;
mod completion_consumer;
mod message_store;
mod stream_decoder;

pub use chat_orchestrator::{ChatOrchestrator, SubmitError};
pub use chat_session::{ChatSession, SessionError};
pub use completion_consumer::{CompletionConsumer, CompletionError, PartialReplyPolicy};
pub use message_store::MessageStore;
pub use stream_decoder::{DecodeError, StreamDecoder, StreamError};
