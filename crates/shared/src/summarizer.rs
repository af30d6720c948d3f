use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::time::Duration;

use chrono::{Local, NaiveDate};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::{PipelineError, PipelineResult};
use crate::fallback::{describe_failures, first_success};
use crate::text::snippet;

pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DISCLAIMER: &str = "本文不构成投资建议";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(45);
const MODEL_FALLBACK_DELAY: Duration = Duration::from_secs(1);

/// Produces the report text from a batch of headlines.
pub trait Summarizer {
    fn summarize(&self, titles: &[String]) -> impl Future<Output = PipelineResult<String>>;
}

/// Wire protocol used to talk to the model provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AiProvider {
    /// Native `models/<model>:generateContent`, key as a query parameter.
    #[default]
    GenerateContent,
    /// OpenAI-style `/chat/completions`, key as a bearer token.
    ChatCompletion,
}

impl AiProvider {
    pub fn default_models(&self) -> &'static [&'static str] {
        match self {
            AiProvider::GenerateContent => &[
                "gemini-1.5-flash",
                "gemini-1.5-flash-latest",
                "gemini-1.5-pro",
            ],
            AiProvider::ChatCompletion => &["gemini-1.5-flash", "gpt-4o-mini"],
        }
    }
}

impl fmt::Display for AiProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AiProvider::GenerateContent => f.write_str("gemini"),
            AiProvider::ChatCompletion => f.write_str("openai"),
        }
    }
}

impl FromStr for AiProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "gemini" | "generate-content" => Ok(AiProvider::GenerateContent),
            "openai" | "chat-completion" => Ok(AiProvider::ChatCompletion),
            other => Err(format!("unknown provider '{other}'. Use 'gemini' or 'openai'")),
        }
    }
}

pub fn build_prompt(titles: &[String], date: NaiveDate) -> String {
    let headlines = titles
        .iter()
        .enumerate()
        .map(|(i, title)| format!("{}. {}", i + 1, title))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"你是一位资深的加密货币市场分析师。请根据下面的最新快讯标题，写一份简洁、有 Emoji 的中文日报（{date}）。

要求：
1. 以 "🔥 *今日看点*" 开头，用 2-3 句话概括今天的主要主题
2. 接着是 "📌 *重点快讯*"，挑选 3-5 条最值得关注的消息，每条一行，简短点评
3. 加粗只用单个星号包裹（如 *粗体*），不要使用 **、下划线、表格、代码块或其他复杂格式
4. 全文不超过 400 字
5. 只依据给出的标题，不要编造数据或价格
6. 最后一行必须是："⚠️ {DISCLAIMER}"

快讯标题：
{headlines}"#,
        date = date.format("%Y-%m-%d"),
    )
}

/// Why a single model attempt did not produce a report.
#[derive(Debug, thiserror::Error)]
pub enum AttemptError {
    #[error("model not found (404)")]
    NotFound,

    #[error("HTTP {0}: {1}")]
    Status(u16, String),

    #[error("unexpected response: {0}")]
    Parse(String),

    #[error("request failed: {0}")]
    Transport(String),
}

/// A single completion call against one model.
pub trait CompletionBackend {
    fn complete(
        &self,
        model: &str,
        prompt: &str,
    ) -> impl Future<Output = Result<String, AttemptError>>;
}

#[derive(Serialize)]
struct GenerateContentRequest<'a> {
    contents: Vec<GenerateContentBlock<'a>>,
}

#[derive(Serialize)]
struct GenerateContentBlock<'a> {
    parts: Vec<TextPart<'a>>,
}

#[derive(Serialize)]
struct TextPart<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ReplyPart>,
}

#[derive(Deserialize)]
struct ReplyPart {
    text: Option<String>,
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

fn non_empty(text: Option<String>) -> Option<String> {
    text.filter(|t| !t.trim().is_empty())
}

/// Reads `candidates[0].content.parts[0].text`.
pub fn generate_content_text(body: &str) -> Result<String, AttemptError> {
    let response: GenerateContentResponse =
        serde_json::from_str(body).map_err(|e| AttemptError::Parse(e.to_string()))?;

    let text = response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .and_then(|c| c.parts.into_iter().next())
        .and_then(|p| p.text);

    non_empty(text).ok_or_else(|| AttemptError::Parse(format!("no text in {}", snippet(body))))
}

/// Reads `choices[0].message.content`.
pub fn chat_completion_text(body: &str) -> Result<String, AttemptError> {
    let response: ChatCompletionResponse =
        serde_json::from_str(body).map_err(|e| AttemptError::Parse(e.to_string()))?;

    let text = response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message)
        .and_then(|m| m.content);

    non_empty(text).ok_or_else(|| AttemptError::Parse(format!("no text in {}", snippet(body))))
}

/// Sorts one provider reply into report text or the reason to try the next model.
pub fn classify_reply(provider: AiProvider, status: StatusCode, body: &str) -> Result<String, AttemptError> {
    if status == StatusCode::NOT_FOUND {
        return Err(AttemptError::NotFound);
    }
    if status != StatusCode::OK {
        return Err(AttemptError::Status(status.as_u16(), snippet(body)));
    }

    match provider {
        AiProvider::GenerateContent => generate_content_text(body),
        AiProvider::ChatCompletion => chat_completion_text(body),
    }
}

/// HTTP client for either provider protocol.
pub struct AiClient {
    client: Client,
    provider: AiProvider,
    api_key: String,
    base_url: String,
}

impl AiClient {
    pub fn new(provider: AiProvider, api_key: String, base_url: String) -> PipelineResult<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| PipelineError::Summarization(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            provider,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &Config) -> PipelineResult<Self> {
        let base_url = match config.ai_provider {
            AiProvider::GenerateContent => config.gemini_base_url.clone(),
            AiProvider::ChatCompletion => config.ai_base_url.clone().ok_or_else(|| {
                PipelineError::Config("AI_BASE_URL is required by the chat-completion provider".to_string())
            })?,
        };
        Self::new(config.ai_provider, config.ai_api_key.clone(), base_url)
    }

    async fn send(&self, model: &str, prompt: &str) -> Result<reqwest::Response, reqwest::Error> {
        match self.provider {
            AiProvider::GenerateContent => {
                let url = format!("{}/models/{}:generateContent", self.base_url, model);
                let request = GenerateContentRequest {
                    contents: vec![GenerateContentBlock {
                        parts: vec![TextPart { text: prompt }],
                    }],
                };
                self.client
                    .post(&url)
                    .query(&[("key", self.api_key.as_str())])
                    .json(&request)
                    .send()
                    .await
            }
            AiProvider::ChatCompletion => {
                let url = format!("{}/chat/completions", self.base_url);
                let request = ChatCompletionRequest {
                    model,
                    messages: vec![ChatMessage {
                        role: "user",
                        content: prompt,
                    }],
                };
                self.client
                    .post(&url)
                    .bearer_auth(&self.api_key)
                    .json(&request)
                    .send()
                    .await
            }
        }
    }
}

impl CompletionBackend for AiClient {
    async fn complete(&self, model: &str, prompt: &str) -> Result<String, AttemptError> {
        let response = self
            .send(model, prompt)
            .await
            // without_url keeps the query-string key out of the message
            .map_err(|e| AttemptError::Transport(e.without_url().to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AttemptError::Transport(e.without_url().to_string()))?;

        classify_reply(self.provider, status, &body)
    }
}

/// Walks the candidate models in priority order until one produces a report.
pub struct AiSummarizer<B> {
    backend: B,
    models: Vec<String>,
    delay: Duration,
}

impl<B: CompletionBackend> AiSummarizer<B> {
    pub fn new(backend: B, models: Vec<String>) -> Self {
        Self {
            backend,
            models,
            delay: MODEL_FALLBACK_DELAY,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub async fn summarize_prompt(&self, prompt: &str) -> PipelineResult<String> {
        if self.models.is_empty() {
            return Err(PipelineError::Summarization("no candidate models configured".to_string()));
        }

        let outcome = first_success(&self.models, self.delay, |model| {
            tracing::info!(model = %model, "requesting summary");
            self.backend.complete(model, prompt)
        })
        .await;

        match outcome {
            Ok((index, report)) => {
                tracing::info!(model = %self.models[index], chars = report.chars().count(), "summary generated");
                Ok(report)
            }
            Err(failures) => Err(PipelineError::Summarization(format!(
                "all {} candidate models failed ({})",
                failures.len(),
                describe_failures(&failures)
            ))),
        }
    }
}

impl<B: CompletionBackend> Summarizer for AiSummarizer<B> {
    async fn summarize(&self, titles: &[String]) -> PipelineResult<String> {
        let prompt = build_prompt(titles, Local::now().date_naive());
        self.summarize_prompt(&prompt).await
    }
}
