pub mod encoder;

use futures::StreamExt;
use log::{ debug, error, info, warn };
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{ timeout_at, Instant };
use tokio_stream::wrappers::ReceiverStream;
use uuid::Uuid;

use crate::config::ChatSettings;
use crate::llm::chat::ChatClient;
use crate::llm::ProviderMessage;
use self::encoder::{ UiStreamEncoder, UiStreamPart, DONE_EVENT };

pub type BodyStream = ReceiverStream<Result<String, Infallible>>;

pub type BodySender = mpsc::Sender<Result<String, Infallible>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayOutcome {
    Completed,
    ProviderFailed,
    ClientGone,
    DeadlineExceeded,
}

struct ClientGone;

/// Starts relaying one chat exchange and returns the encoded response body.
///
/// The provider call and every forwarded chunk run under a single deadline of
/// `settings.max_duration`. When it passes, the provider stream is dropped and
/// the body simply ends, leaving the client with an incomplete stream.
pub fn relay_chat(
    client: Arc<dyn ChatClient>,
    messages: Vec<ProviderMessage>,
    settings: ChatSettings
) -> BodyStream {
    let (tx, rx) = mpsc::channel(32);

    tokio::spawn(async move {
        run_relay(client, messages, settings, tx).await;
    });

    ReceiverStream::new(rx)
}

pub async fn run_relay(
    client: Arc<dyn ChatClient>,
    messages: Vec<ProviderMessage>,
    settings: ChatSettings,
    tx: BodySender
) -> RelayOutcome {
    let message_id = format!("msg-{}", Uuid::new_v4().simple());
    let deadline = Instant::now() + settings.max_duration;
    let encoder = UiStreamEncoder::new(message_id.clone(), &settings);

    let outcome = match timeout_at(deadline, forward(client, messages, encoder, &tx)).await {
        Ok(outcome) => outcome,
        Err(_) => {
            warn!(
                "Chat {} exceeded the {}s limit; closing stream",
                message_id,
                settings.max_duration.as_secs_f32()
            );
            RelayOutcome::DeadlineExceeded
        }
    };

    match outcome {
        RelayOutcome::Completed => info!("Chat {} completed", message_id),
        RelayOutcome::ClientGone => warn!("Client disconnected from chat {}", message_id),
        RelayOutcome::ProviderFailed | RelayOutcome::DeadlineExceeded => {}
    }
    outcome
}

async fn forward(
    client: Arc<dyn ChatClient>,
    messages: Vec<ProviderMessage>,
    mut encoder: UiStreamEncoder,
    tx: &BodySender
) -> RelayOutcome {
    match forward_inner(client, messages, &mut encoder, tx).await {
        Ok(outcome) => outcome,
        Err(ClientGone) => RelayOutcome::ClientGone,
    }
}

async fn forward_inner(
    client: Arc<dyn ChatClient>,
    messages: Vec<ProviderMessage>,
    encoder: &mut UiStreamEncoder,
    tx: &BodySender
) -> Result<RelayOutcome, ClientGone> {
    emit(tx, encoder.start()).await?;

    let opened = tokio::select! {
        _ = tx.closed() => return Err(ClientGone),
        opened = client.stream_chat(messages) => opened,
    };
    let mut chunks = match opened {
        Ok(chunks) => chunks,
        Err(e) => {
            error!("Provider request failed: {}", e);
            emit(tx, encoder.error(e.to_string())).await?;
            send(tx, DONE_EVENT.to_string()).await?;
            return Ok(RelayOutcome::ProviderFailed);
        }
    };

    loop {
        // Waiting on a quiet provider must not hide a client that already left.
        let item = tokio::select! {
            _ = tx.closed() => return Err(ClientGone),
            item = chunks.next() => item,
        };
        let Some(item) = item else {
            break;
        };
        match item {
            Ok(chunk) => {
                debug!("Provider chunk: {:?}", chunk);
                emit(tx, encoder.push(chunk)).await?;
            }
            Err(e) => {
                error!("Provider stream failed: {}", e);
                emit(tx, encoder.error(e.to_string())).await?;
                send(tx, DONE_EVENT.to_string()).await?;
                return Ok(RelayOutcome::ProviderFailed);
            }
        }
    }

    emit(tx, encoder.finish()).await?;
    send(tx, DONE_EVENT.to_string()).await?;
    Ok(RelayOutcome::Completed)
}

async fn emit(tx: &BodySender, parts: Vec<UiStreamPart>) -> Result<(), ClientGone> {
    for part in parts {
        send(tx, part.to_sse()).await?;
    }
    Ok(())
}

async fn send(tx: &BodySender, event: String) -> Result<(), ClientGone> {
    tx.send(Ok(event)).await.map_err(|_| ClientGone)
}
