use serde::Serialize;

use crate::config::ChatSettings;
use crate::llm::StreamChunk;

/// Terminal event of a completed UI message stream.
pub const DONE_EVENT: &str = "data: [DONE]\n\n";

/// Events understood by the chat widget, serialized as `data: <json>` lines.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum UiStreamPart {
    #[serde(rename_all = "camelCase")]
    Start {
        message_id: String,
    },
    StartStep,
    TextStart {
        id: String,
    },
    TextDelta {
        id: String,
        delta: String,
    },
    TextEnd {
        id: String,
    },
    ReasoningStart {
        id: String,
    },
    ReasoningDelta {
        id: String,
        delta: String,
    },
    ReasoningEnd {
        id: String,
    },
    #[serde(rename_all = "camelCase")]
    SourceUrl {
        source_id: String,
        url: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        title: Option<String>,
    },
    FinishStep,
    Finish,
    #[serde(rename_all = "camelCase")]
    Error {
        error_text: String,
    },
}

impl UiStreamPart {
    pub fn to_sse(&self) -> String {
        let json = serde_json::to_string(self).unwrap_or_default();
        format!("data: {}\n\n", json)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockKind {
    Text,
    Reasoning,
}

#[derive(Debug)]
struct OpenBlock {
    kind: BlockKind,
    id: String,
}

/// Turns provider chunks into widget events. Consecutive deltas of one kind
/// share a block; a different kind of chunk closes the open block first.
#[derive(Debug)]
pub struct UiStreamEncoder {
    message_id: String,
    send_reasoning: bool,
    send_sources: bool,
    open: Option<OpenBlock>,
    next_block: usize,
}

impl UiStreamEncoder {
    pub fn new(message_id: impl Into<String>, settings: &ChatSettings) -> Self {
        Self {
            message_id: message_id.into(),
            send_reasoning: settings.send_reasoning,
            send_sources: settings.send_sources,
            open: None,
            next_block: 0,
        }
    }

    pub fn start(&mut self) -> Vec<UiStreamPart> {
        vec![UiStreamPart::Start { message_id: self.message_id.clone() }, UiStreamPart::StartStep]
    }

    pub fn push(&mut self, chunk: StreamChunk) -> Vec<UiStreamPart> {
        let mut parts = Vec::new();
        match chunk {
            StreamChunk::Text(delta) => {
                let id = self.ensure_block(BlockKind::Text, &mut parts);
                parts.push(UiStreamPart::TextDelta { id, delta });
            }
            StreamChunk::Reasoning(delta) => {
                if self.send_reasoning {
                    let id = self.ensure_block(BlockKind::Reasoning, &mut parts);
                    parts.push(UiStreamPart::ReasoningDelta { id, delta });
                }
            }
            StreamChunk::Source { id, url, title } => {
                if self.send_sources {
                    self.close_block(&mut parts);
                    parts.push(UiStreamPart::SourceUrl { source_id: id, url, title });
                }
            }
            StreamChunk::Finish { .. } => {
                self.close_block(&mut parts);
            }
        }
        parts
    }

    pub fn finish(&mut self) -> Vec<UiStreamPart> {
        let mut parts = Vec::new();
        self.close_block(&mut parts);
        parts.push(UiStreamPart::FinishStep);
        parts.push(UiStreamPart::Finish);
        parts
    }

    pub fn error(&mut self, message: impl Into<String>) -> Vec<UiStreamPart> {
        let mut parts = Vec::new();
        self.close_block(&mut parts);
        parts.push(UiStreamPart::Error { error_text: message.into() });
        parts
    }

    fn ensure_block(&mut self, kind: BlockKind, parts: &mut Vec<UiStreamPart>) -> String {
        if let Some(open) = &self.open {
            if open.kind == kind {
                return open.id.clone();
            }
        }
        self.close_block(parts);

        let id = match kind {
            BlockKind::Text => format!("text-{}", self.next_block),
            BlockKind::Reasoning => format!("reasoning-{}", self.next_block),
        };
        self.next_block += 1;
        parts.push(match kind {
            BlockKind::Text => UiStreamPart::TextStart { id: id.clone() },
            BlockKind::Reasoning => UiStreamPart::ReasoningStart { id: id.clone() },
        });
        self.open = Some(OpenBlock { kind, id: id.clone() });
        id
    }

    fn close_block(&mut self, parts: &mut Vec<UiStreamPart>) {
        if let Some(open) = self.open.take() {
            parts.push(match open.kind {
                BlockKind::Text => UiStreamPart::TextEnd { id: open.id },
                BlockKind::Reasoning => UiStreamPart::ReasoningEnd { id: open.id },
            });
        }
    }
}
