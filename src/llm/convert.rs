use crate::models::chat::{ IncomingMessage, Role, UiMessage, UiPart };
use super::{ ContentPart, ImageUrl, MessageContent, ProviderMessage };

/// Maps the widget conversation onto provider messages one-to-one, keeping order.
pub fn to_provider_messages(conversation: Vec<IncomingMessage>) -> Vec<ProviderMessage> {
    conversation.into_iter().map(to_provider_message).collect()
}

pub fn to_provider_message(message: IncomingMessage) -> ProviderMessage {
    match message {
        IncomingMessage::Ui(ui) => convert_ui_message(ui),
        IncomingMessage::Raw(value) => ProviderMessage::Raw(value),
    }
}

fn convert_ui_message(message: UiMessage) -> ProviderMessage {
    let content = match message.role {
        Role::User => user_content(&message),
        // Reasoning and sources are display-only; the provider gets the text.
        Role::System | Role::Assistant => MessageContent::Text(message.joined_text()),
    };

    ProviderMessage::Chat {
        role: message.role.as_str().to_string(),
        content,
    }
}

fn user_content(message: &UiMessage) -> MessageContent {
    let has_images = message.parts.iter().any(is_image);
    if !has_images {
        return MessageContent::Text(message.joined_text());
    }

    let parts = message.parts
        .iter()
        .filter_map(|part| match part {
            UiPart::Text { text } => Some(ContentPart::Text { text: text.clone() }),
            UiPart::File { url, .. } if is_image(part) => Some(ContentPart::ImageUrl {
                image_url: ImageUrl { url: url.clone() },
            }),
            _ => None,
        })
        .collect();

    MessageContent::Parts(parts)
}

fn is_image(part: &UiPart) -> bool {
    matches!(part, UiPart::File { media_type, .. } if media_type.starts_with("image/"))
}
