mod conversation_id;
mod message;
mod message_id;
mod message_log;
mod message_role;
mod pipeline_state;
mod rollback;

pub use conversation_id::ConversationId;
pub use message::Message;
pub use message_id::MessageId;
pub use message_log::{MessageAction, MessageLog, StoreError};
pub use message_role::MessageRole;
pub use pipeline_state::PipelineState;
pub use rollback::RollbackContext;
