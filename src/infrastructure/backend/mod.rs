mod event_stream;
mod http_chat_backend;
mod mock_chat_backend;

pub use event_stream::{EventStreamUnwrapper, unwrap_event_stream};
pub use http_chat_backend::{HttpChatBackend, create_http_chat_backend};
pub use mock_chat_backend::{MockChatBackend, MockCompletion};
