use std::fmt;

/// Where a submission currently is. Every terminal outcome returns to `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PipelineState {
    #[default]
    Idle,
    AwaitingUserCreate,
    AwaitingCompletion,
}

impl PipelineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineState::Idle => "idle",
            PipelineState::AwaitingUserCreate => "awaiting_user_create",
            PipelineState::AwaitingCompletion => "awaiting_completion",
        }
    }

    pub fn is_busy(&self) -> bool {
        !matches!(self, PipelineState::Idle)
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
