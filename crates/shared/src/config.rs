use std::env;

use crate::error::{PipelineError, PipelineResult};
use crate::feed::{DEFAULT_FOLLOWIN_BASE_URL, DEFAULT_MAX_ITEMS};
use crate::publisher::DEFAULT_TELEGRAM_API_BASE;
use crate::summarizer::{AiProvider, DEFAULT_GEMINI_BASE_URL};

const SETUP_HINT: &str = "Set it as an environment variable or add it to ~/.config/crypto-brief/.env";

/// Everything a run needs, read once at start and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct Config {
    pub followin_api_key: String,
    pub followin_base_url: String,
    pub ai_api_key: String,
    pub ai_base_url: Option<String>,
    pub ai_provider: AiProvider,
    pub ai_models: Option<Vec<String>>,
    pub gemini_base_url: String,
    pub max_items: usize,
    pub tg_bot_token: Option<String>,
    pub tg_chat_id: Option<String>,
    pub telegram_api_base: String,
}

impl Config {
    pub fn from_env() -> PipelineResult<Self> {
        // Try to load .env from multiple locations
        Self::try_load_dotenv();

        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the config from any name → value source. Empty values count as missing.
    pub fn from_lookup<F>(lookup: F) -> PipelineResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let require = |name: &str| {
            get(name).ok_or_else(|| PipelineError::Config(format!("{name} not found. {SETUP_HINT}")))
        };

        let followin_api_key = require("FOLLOWIN_API_KEY")?;
        let ai_api_key = require("AI_API_KEY")?;

        let ai_provider = match get("AI_PROVIDER") {
            Some(raw) => raw
                .parse::<AiProvider>()
                .map_err(|e| PipelineError::Config(format!("AI_PROVIDER: {e}")))?,
            None => AiProvider::default(),
        };

        let max_items = match get("FEED_MAX_ITEMS") {
            Some(raw) => parse_max_items(&raw)?,
            None => DEFAULT_MAX_ITEMS,
        };

        let ai_models = get("AI_MODELS").map(|raw| split_models(&raw)).filter(|m| !m.is_empty());

        Ok(Self {
            followin_api_key,
            followin_base_url: get("FOLLOWIN_BASE_URL")
                .unwrap_or_else(|| DEFAULT_FOLLOWIN_BASE_URL.to_string()),
            ai_api_key,
            ai_base_url: get("AI_BASE_URL"),
            ai_provider,
            ai_models,
            gemini_base_url: get("GEMINI_BASE_URL")
                .unwrap_or_else(|| DEFAULT_GEMINI_BASE_URL.to_string()),
            max_items,
            tg_bot_token: get("TG_BOT_TOKEN"),
            tg_chat_id: get("TG_CHAT_ID"),
            telegram_api_base: get("TELEGRAM_API_BASE")
                .unwrap_or_else(|| DEFAULT_TELEGRAM_API_BASE.to_string()),
        })
    }

    /// Checks the settings that depend on how the run is invoked. Call after
    /// command-line overrides are applied and before any network traffic.
    pub fn validate(&self, require_telegram: bool) -> PipelineResult<()> {
        if self.ai_provider == AiProvider::ChatCompletion && self.ai_base_url.is_none() {
            return Err(PipelineError::Config(format!(
                "AI_BASE_URL not found (required by the chat-completion provider). {SETUP_HINT}"
            )));
        }
        if self.max_items == 0 {
            return Err(PipelineError::Config("max items must be at least 1".to_string()));
        }
        if require_telegram {
            self.telegram_credentials()?;
        }
        Ok(())
    }

    pub fn telegram_credentials(&self) -> PipelineResult<(&str, &str)> {
        let token = self.tg_bot_token.as_deref().ok_or_else(|| {
            PipelineError::Config(format!("TG_BOT_TOKEN not found. {SETUP_HINT}"))
        })?;
        let chat_id = self.tg_chat_id.as_deref().ok_or_else(|| {
            PipelineError::Config(format!("TG_CHAT_ID not found. {SETUP_HINT}"))
        })?;
        Ok((token, chat_id))
    }

    /// Model identifiers to try, in priority order.
    pub fn candidate_models(&self) -> Vec<String> {
        match &self.ai_models {
            Some(models) => models.clone(),
            None => self
                .ai_provider
                .default_models()
                .iter()
                .map(|m| m.to_string())
                .collect(),
        }
    }

    fn try_load_dotenv() {
        // 1. Current directory (for development)
        if dotenvy::dotenv().is_ok() {
            return;
        }

        // 2. ~/.config/crypto-brief/.env
        if let Some(config_dir) = dirs::config_dir() {
            let config_path = config_dir.join("crypto-brief").join(".env");
            if config_path.exists() && dotenvy::from_path(&config_path).is_ok() {
                return;
            }
        }

        // 3. ~/.env
        if let Some(home_dir) = dirs::home_dir() {
            let home_path = home_dir.join(".env");
            if home_path.exists() {
                let _ = dotenvy::from_path(&home_path);
            }
        }

        // Variables may also come straight from the scheduler's environment
    }
}

pub fn split_models(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_max_items(raw: &str) -> PipelineResult<usize> {
    raw.parse::<usize>()
        .map_err(|_| PipelineError::Config(format!("FEED_MAX_ITEMS must be a positive integer, got {raw:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    const MINIMAL: &[(&str, &str)] = &[("FOLLOWIN_API_KEY", "f-key"), ("AI_API_KEY", "ai-key")];

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = Config::from_lookup(lookup(MINIMAL)).unwrap();
        assert_eq!(config.followin_api_key, "f-key");
        assert_eq!(config.ai_provider, AiProvider::GenerateContent);
        assert_eq!(config.max_items, DEFAULT_MAX_ITEMS);
        assert_eq!(config.followin_base_url, DEFAULT_FOLLOWIN_BASE_URL);
        assert!(config.tg_bot_token.is_none());
        assert_eq!(config.candidate_models()[0], "gemini-1.5-flash");
    }

    #[test]
    fn test_missing_feed_key_is_config_error() {
        let err = Config::from_lookup(lookup(&[("AI_API_KEY", "k")])).unwrap_err();
        assert!(matches!(err, PipelineError::Config(ref m) if m.contains("FOLLOWIN_API_KEY")));
    }

    #[test]
    fn test_blank_value_counts_as_missing() {
        let err = Config::from_lookup(lookup(&[("FOLLOWIN_API_KEY", "f"), ("AI_API_KEY", "  ")]))
            .unwrap_err();
        assert!(matches!(err, PipelineError::Config(ref m) if m.contains("AI_API_KEY")));
    }

    #[test]
    fn test_validate_requires_telegram_when_publishing() {
        let config = Config::from_lookup(lookup(MINIMAL)).unwrap();
        assert!(config.validate(false).is_ok());
        let err = config.validate(true).unwrap_err();
        assert!(matches!(err, PipelineError::Config(ref m) if m.contains("TG_BOT_TOKEN")));
    }

    #[test]
    fn test_validate_chat_provider_needs_base_url() {
        let mut pairs = MINIMAL.to_vec();
        pairs.push(("AI_PROVIDER", "openai"));
        let config = Config::from_lookup(lookup(&pairs)).unwrap();
        assert_eq!(config.ai_provider, AiProvider::ChatCompletion);
        assert!(matches!(config.validate(false), Err(PipelineError::Config(_))));

        pairs.push(("AI_BASE_URL", "https://example.test/v1"));
        let config = Config::from_lookup(lookup(&pairs)).unwrap();
        assert!(config.validate(false).is_ok());
    }

    #[test]
    fn test_models_override_and_max_items() {
        let mut pairs = MINIMAL.to_vec();
        pairs.push(("AI_MODELS", " a, b ,,c "));
        pairs.push(("FEED_MAX_ITEMS", "12"));
        let config = Config::from_lookup(lookup(&pairs)).unwrap();
        assert_eq!(config.candidate_models(), vec!["a", "b", "c"]);
        assert_eq!(config.max_items, 12);
    }

    #[test]
    fn test_bad_max_items_is_config_error() {
        let mut pairs = MINIMAL.to_vec();
        pairs.push(("FEED_MAX_ITEMS", "ten"));
        assert!(matches!(
            Config::from_lookup(lookup(&pairs)),
            Err(PipelineError::Config(_))
        ));
    }

    #[test]
    fn test_telegram_credentials() {
        let mut pairs = MINIMAL.to_vec();
        pairs.push(("TG_BOT_TOKEN", "123:abc"));
        pairs.push(("TG_CHAT_ID", "-10042"));
        let config = Config::from_lookup(lookup(&pairs)).unwrap();
        assert_eq!(config.telegram_credentials().unwrap(), ("123:abc", "-10042"));
        assert!(config.validate(true).is_ok());
    }
}
