// Public modules
pub mod config;
pub mod error;
pub mod fallback;
pub mod feed;
pub mod pipeline;
pub mod publisher;
pub mod summarizer;
pub mod text;

// Re-export commonly used types
pub use config::Config;
pub use error::{PipelineError, PipelineResult};
pub use feed::{FeedKind, FeedSource, FollowinClient};
pub use pipeline::{run, RunOutcome};
pub use publisher::{Publisher, TelegramApi, TelegramPublisher};
pub use summarizer::{AiClient, AiProvider, AiSummarizer, Summarizer};
