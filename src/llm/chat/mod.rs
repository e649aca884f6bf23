pub mod openai;
pub mod sse;

use async_trait::async_trait;
use futures::Future;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use super::{ ChunkStream, ProviderError, ProviderMessage, StreamChunk };
use crate::config::ProviderConfig;
use self::openai::OpenAICompatibleClient;

pub type ChunkSender = mpsc::Sender<Result<StreamChunk, ProviderError>>;

#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Opens one streaming completion for `messages`. The returned future
    /// resolves once the provider has accepted the request; chunks follow on
    /// the stream.
    async fn stream_chat(
        &self,
        messages: Vec<ProviderMessage>
    ) -> Result<ChunkStream, ProviderError>;

    fn get_model(&self) -> String;
}

/// Runs `producer` on its own task and exposes what it sends as a stream. The
/// consumer may drop the stream at any time, so a producer waiting on anything
/// slower than a send should also watch `ChunkSender::closed`.
pub fn create_streaming_response<F, Fut>(producer: F) -> ChunkStream
    where
        F: FnOnce(ChunkSender) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static
{
    let (tx, rx) = mpsc::channel(32);

    tokio::spawn(async move {
        producer(tx).await;
    });

    Box::pin(ReceiverStream::new(rx))
}

pub fn new_client(config: &ProviderConfig) -> Result<Arc<dyn ChatClient>, ProviderError> {
    let client = OpenAICompatibleClient::from_config(config)?;
    Ok(Arc::new(client))
}
