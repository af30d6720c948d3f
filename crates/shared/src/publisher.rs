use std::fmt;
use std::future::Future;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, PipelineResult};
use crate::fallback::{describe_failures, first_success};
use crate::text::{snippet, truncate_utf16};

pub const DEFAULT_TELEGRAM_API_BASE: &str = "https://api.telegram.org";
pub const TELEGRAM_MAX_LENGTH: usize = 4096;

const SEND_TIMEOUT: Duration = Duration::from_secs(15);

/// Delivers the finished report.
pub trait Publisher {
    fn publish(&self, text: &str) -> impl Future<Output = PipelineResult<()>>;
}

/// Rendering modes, in the order they are tried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageFormat {
    Markdown,
    Plain,
}

impl MessageFormat {
    pub const FALLBACK_ORDER: [MessageFormat; 2] = [MessageFormat::Markdown, MessageFormat::Plain];

    pub fn parse_mode(&self) -> Option<&'static str> {
        match self {
            MessageFormat::Markdown => Some("Markdown"),
            MessageFormat::Plain => None,
        }
    }
}

impl fmt::Display for MessageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageFormat::Markdown => f.write_str("markdown"),
            MessageFormat::Plain => f.write_str("plain"),
        }
    }
}

/// Form body of a `sendMessage` call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SendMessage<'a> {
    pub chat_id: &'a str,
    pub text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parse_mode: Option<&'static str>,
}

#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("rejected (HTTP {status}): {description}")]
    Rejected { status: u16, description: String },

    #[error("unexpected response: {0}")]
    Parse(String),

    #[error("request failed: {0}")]
    Transport(String),
}

/// One `sendMessage` round trip.
pub trait MessageTransport {
    fn send_message(
        &self,
        message: &SendMessage<'_>,
    ) -> impl Future<Output = Result<(), DeliveryError>>;
}

#[derive(Debug, Deserialize)]
struct TelegramResponse {
    ok: bool,
    description: Option<String>,
}

/// Decides whether a `sendMessage` reply means the message went out. The
/// body's `ok` flag is authoritative; a 2xx status alone is not enough.
pub fn delivery_result(status: StatusCode, body: &str) -> Result<(), DeliveryError> {
    let reply: TelegramResponse = serde_json::from_str(body)
        .map_err(|_| DeliveryError::Parse(format!("HTTP {status}: {}", snippet(body))))?;

    if reply.ok && status.is_success() {
        Ok(())
    } else {
        Err(DeliveryError::Rejected {
            status: status.as_u16(),
            description: reply.description.unwrap_or_else(|| "no description".to_string()),
        })
    }
}

/// Telegram Bot API client. The bot token lives in the URL path.
pub struct TelegramApi {
    client: Client,
    endpoint: String,
}

impl TelegramApi {
    pub fn new(bot_token: &str, api_base: &str) -> PipelineResult<Self> {
        let client = Client::builder()
            .timeout(SEND_TIMEOUT)
            .build()
            .map_err(|e| PipelineError::Publish(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: format!("{}/bot{}/sendMessage", api_base.trim_end_matches('/'), bot_token),
        })
    }
}

impl MessageTransport for TelegramApi {
    async fn send_message(&self, message: &SendMessage<'_>) -> Result<(), DeliveryError> {
        let response = self
            .client
            .post(&self.endpoint)
            .form(message)
            .send()
            .await
            // without_url keeps the bot token out of logs
            .map_err(|e| DeliveryError::Transport(e.without_url().to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| DeliveryError::Transport(e.without_url().to_string()))?;

        delivery_result(status, &body)
    }
}

/// Sends to one chat, falling back from Markdown to plain text once.
pub struct TelegramPublisher<T> {
    transport: T,
    chat_id: String,
}

impl<T: MessageTransport> TelegramPublisher<T> {
    pub fn new(transport: T, chat_id: String) -> Self {
        Self { transport, chat_id }
    }
}

impl<T: MessageTransport> Publisher for TelegramPublisher<T> {
    async fn publish(&self, text: &str) -> PipelineResult<()> {
        let text = truncate_utf16(text, TELEGRAM_MAX_LENGTH);

        let outcome = first_success(&MessageFormat::FALLBACK_ORDER, Duration::ZERO, |format| {
            let message = SendMessage {
                chat_id: &self.chat_id,
                text,
                parse_mode: format.parse_mode(),
            };
            async move { self.transport.send_message(&message).await }
        })
        .await;

        match outcome {
            Ok((index, ())) => {
                tracing::info!(format = %MessageFormat::FALLBACK_ORDER[index], "report published");
                Ok(())
            }
            Err(failures) => Err(PipelineError::Publish(describe_failures(&failures))),
        }
    }
}
