/// Fatal conditions that abort a run. Each maps to its own process exit code,
/// kept clear of 1 (other failures) and 2 (command-line usage errors).
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Feed fetch failed: {0}")]
    Fetch(String),

    #[error("Feed returned no usable titles")]
    EmptyContent,

    #[error("Summarization failed: {0}")]
    Summarization(String),

    #[error("Publishing failed: {0}")]
    Publish(String),
}

impl PipelineError {
    pub fn exit_code(&self) -> u8 {
        match self {
            PipelineError::Config(_) => 10,
            PipelineError::Fetch(_) => 11,
            PipelineError::EmptyContent => 12,
            PipelineError::Summarization(_) => 13,
            PipelineError::Publish(_) => 14,
        }
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;
