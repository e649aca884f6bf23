use serde::{ Deserialize, Serialize };
use serde_json::Value;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One part of a chat-widget message. Unknown part types are kept as `Other`
/// so a newer widget never breaks deserialization.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum UiPart {
    Text {
        text: String,
    },
    Reasoning {
        text: String,
    },
    #[serde(rename_all = "camelCase")]
    SourceUrl {
        source_id: String,
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    File {
        media_type: String,
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        filename: Option<String>,
    },
    #[serde(other)]
    Other,
}

/// A message as the chat widget sends it: either a list of typed parts or a
/// plain `content` string.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UiMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub role: Role,
    #[serde(default)]
    pub parts: Vec<UiPart>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl UiMessage {
    pub fn text(role: Role, text: impl Into<String>) -> Self {
        Self {
            id: None,
            role,
            parts: vec![UiPart::Text { text: text.into() }],
            content: None,
        }
    }

    /// Concatenated text of all `text` parts, falling back to `content`.
    pub fn joined_text(&self) -> String {
        let texts: Vec<&str> = self.parts
            .iter()
            .filter_map(|part| match part {
                UiPart::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect();

        if texts.is_empty() {
            self.content.clone().unwrap_or_default()
        } else {
            texts.concat()
        }
    }
}

/// Body of `POST /api/chat`. Messages stay as raw JSON so entries the widget
/// model does not recognise can still be handed to the provider untouched.
#[derive(Clone, Debug, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<Value>,
}

/// Conversation entry after the permissive parse.
#[derive(Clone, Debug, PartialEq)]
pub enum IncomingMessage {
    Ui(UiMessage),
    Raw(Value),
}

impl IncomingMessage {
    pub fn from_value(value: Value) -> Self {
        match serde_json::from_value::<UiMessage>(value.clone()) {
            Ok(message) => IncomingMessage::Ui(message),
            Err(_) => IncomingMessage::Raw(value),
        }
    }
}

impl ChatRequest {
    pub fn into_conversation(self) -> Vec<IncomingMessage> {
        self.messages.into_iter().map(IncomingMessage::from_value).collect()
    }
}
