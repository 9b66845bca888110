#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChatBackendError {
    #[error("request failed: {0}")]
    RequestFailed(String),
    #[error("HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}
