pub mod chat;
pub mod convert;

use futures::Stream;
use serde::Serialize;
use serde_json::Value;
use std::pin::Pin;
use thiserror::Error;

/// Message in the provider's chat-completion wire format. `Raw` entries are
/// client messages we could not interpret; they are sent as received.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ProviderMessage {
    Chat {
        role: String,
        content: MessageContent,
    },
    Raw(Value),
}

impl ProviderMessage {
    pub fn text(role: &str, content: impl Into<String>) -> Self {
        ProviderMessage::Chat {
            role: role.to_string(),
            content: MessageContent::Text(content.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text {
        text: String,
    },
    ImageUrl {
        image_url: ImageUrl,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageUrl {
    pub url: String,
}

/// Streaming chat-completion request body.
#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ProviderMessage>,
    pub stream: bool,
}

/// One incremental unit of a streamed model response.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamChunk {
    Text(String),
    Reasoning(String),
    Source {
        id: String,
        url: String,
        title: Option<String>,
    },
    Finish {
        reason: Option<String>,
    },
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Provider request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Provider returned HTTP {status}: {body}")]
    Status {
        status: u16,
        body: String,
    },
    #[error("Provider error: {0}")]
    Api(String),
    #[error("Invalid provider header: {0}")]
    InvalidHeader(String),
}

/// Lazy, finite, non-restartable sequence of chunks in provider emission order.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<StreamChunk, ProviderError>> + Send>>;
