use crate::cli::{ Args, DEFAULT_BASE_URL, DEFAULT_MODEL, DEFAULT_SYSTEM_PROMPT };
use std::time::Duration;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid provider base URL '{url}': {source}")]
    InvalidBaseUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("Provider base URL '{0}' must use http or https")]
    UnsupportedScheme(String),
    #[error("TLS configuration error: {0}")]
    Tls(String),
}

/// Everything the outbound client needs to reach the provider.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub system_prompt: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: String::new(),
            model: DEFAULT_MODEL.to_string(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }
}

impl ProviderConfig {
    pub fn from_args(args: &Args) -> Result<Self, ConfigError> {
        let config = Self {
            base_url: args.base_url.trim().trim_end_matches('/').to_string(),
            api_key: args.api_key.trim().to_string(),
            model: args.model.clone(),
            system_prompt: args.system_prompt.clone(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let parsed = Url::parse(&self.base_url).map_err(|source| ConfigError::InvalidBaseUrl {
            url: self.base_url.clone(),
            source,
        })?;
        match parsed.scheme() {
            "http" | "https" => Ok(()),
            _ => Err(ConfigError::UnsupportedScheme(self.base_url.clone())),
        }
    }

    pub fn chat_completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    pub fn has_api_key(&self) -> bool {
        !self.api_key.is_empty()
    }
}

/// Per-request streaming behaviour shared by every handler invocation.
#[derive(Debug, Clone)]
pub struct ChatSettings {
    pub max_duration: Duration,
    pub send_reasoning: bool,
    pub send_sources: bool,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            max_duration: Duration::from_secs(30),
            send_reasoning: true,
            send_sources: true,
        }
    }
}

impl ChatSettings {
    pub fn from_args(args: &Args) -> Self {
        Self {
            max_duration: Duration::from_secs(args.max_duration_secs),
            send_reasoning: args.send_reasoning,
            send_sources: args.send_sources,
        }
    }
}
