mod chat_backend_error;
mod completion_client;
mod message_repository;

pub use chat_backend_error::ChatBackendError;
pub use completion_client::{ByteStream, CompletionClient};
pub use message_repository::MessageRepository;
