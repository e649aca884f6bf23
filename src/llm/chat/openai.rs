use async_trait::async_trait;
use futures::StreamExt;
use log::{ debug, error };
use reqwest::{ Client as HttpClient, header::{ HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE } };
use serde::Deserialize;

use super::sse::{ SseDecoder, SseEvent };
use super::{ create_streaming_response, ChatClient, ChunkSender };
use crate::config::ProviderConfig;
use crate::llm::{ ChatCompletionRequest, ChunkStream, ProviderError, ProviderMessage, StreamChunk };

/// Longest provider error body kept in a `ProviderError::Status`.
const MAX_ERROR_BODY: usize = 2048;

/// Streaming client for any OpenAI-compatible `/chat/completions` endpoint
/// (OpenRouter by default).
pub struct OpenAICompatibleClient {
    http: HttpClient,
    config: ProviderConfig,
}

#[derive(Deserialize)]
struct CompletionChunk {
    choices: Option<Vec<ChunkChoice>>,
    error: Option<ApiErrorBody>,
}

#[derive(Deserialize)]
struct ChunkChoice {
    delta: Option<ChunkDelta>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ChunkDelta {
    content: Option<String>,
    reasoning: Option<String>,
    reasoning_content: Option<String>,
    annotations: Option<Vec<Annotation>>,
}

#[derive(Deserialize)]
struct Annotation {
    #[serde(rename = "type")]
    kind: String,
    url_citation: Option<UrlCitation>,
}

#[derive(Deserialize)]
struct UrlCitation {
    url: String,
    title: Option<String>,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    message: String,
    code: Option<serde_json::Value>,
}

impl OpenAICompatibleClient {
    pub fn new(config: ProviderConfig) -> Result<Self, ProviderError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if config.has_api_key() {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {}", config.api_key)).map_err(|e|
                    ProviderError::InvalidHeader(format!("Invalid API key format: {}", e))
                )?
            );
        }

        let http = HttpClient::builder().default_headers(headers).build()?;

        Ok(Self { http, config })
    }

    pub fn from_config(config: &ProviderConfig) -> Result<Self, ProviderError> {
        Self::new(config.clone())
    }

    fn build_request(&self, messages: Vec<ProviderMessage>) -> ChatCompletionRequest {
        let mut all = Vec::with_capacity(messages.len() + 1);
        if !self.config.system_prompt.is_empty() {
            all.push(ProviderMessage::text("system", self.config.system_prompt.clone()));
        }
        all.extend(messages);

        ChatCompletionRequest {
            model: self.config.model.clone(),
            messages: all,
            stream: true,
        }
    }
}

#[async_trait]
impl ChatClient for OpenAICompatibleClient {
    async fn stream_chat(
        &self,
        messages: Vec<ProviderMessage>
    ) -> Result<ChunkStream, ProviderError> {
        let url = self.config.chat_completions_url();
        let req = self.build_request(messages);
        debug!("Opening completion stream: model={}, messages={}", req.model, req.messages.len());

        let resp = self.http
            .post(&url)
            .header(ACCEPT, "text/event-stream")
            .json(&req)
            .send().await?;

        let status = resp.status();
        if !status.is_success() {
            let mut body = resp.text().await.unwrap_or_default();
            if body.len() > MAX_ERROR_BODY {
                let mut cut = MAX_ERROR_BODY;
                while !body.is_char_boundary(cut) {
                    cut -= 1;
                }
                body.truncate(cut);
            }
            return Err(ProviderError::Status { status: status.as_u16(), body });
        }

        Ok(
            create_streaming_response(move |tx| async move {
                let mut bytes = resp.bytes_stream();
                let mut decoder = SseDecoder::new();
                let mut sources = 0usize;

                loop {
                    // A dropped consumer must also drop the provider response.
                    let next = tokio::select! {
                        _ = tx.closed() => {
                            debug!("Chunk consumer gone; closing provider stream");
                            return;
                        }
                        next = bytes.next() => next,
                    };
                    let Some(chunk) = next else {
                        break;
                    };
                    match chunk {
                        Ok(buf) => {
                            for event in decoder.push(&buf) {
                                if !forward_event(event, &mut sources, &tx).await {
                                    return;
                                }
                            }
                        }
                        Err(e) => {
                            error!("Provider stream interrupted: {}", e);
                            let _ = tx.send(Err(ProviderError::Http(e))).await;
                            return;
                        }
                    }
                }

                if let Some(event) = decoder.finish() {
                    forward_event(event, &mut sources, &tx).await;
                }
            })
        )
    }

    fn get_model(&self) -> String {
        self.config.model.clone()
    }
}

/// Sends the chunks of one SSE event. Returns `false` when the stream is over,
/// either because the provider said so or because nobody is listening.
async fn forward_event(event: SseEvent, sources: &mut usize, tx: &ChunkSender) -> bool {
    let data = match event {
        SseEvent::Done => {
            return false;
        }
        SseEvent::Data(data) => data,
    };

    match decode_chunk(&data, sources) {
        Ok(chunks) => {
            for chunk in chunks {
                if tx.send(Ok(chunk)).await.is_err() {
                    return false;
                }
            }
            true
        }
        Err(e) => {
            let _ = tx.send(Err(e)).await;
            false
        }
    }
}

/// Turns one `data:` payload into chunks, reasoning first, then text, then
/// sources. Payloads that are not completion chunks are skipped.
fn decode_chunk(data: &str, sources: &mut usize) -> Result<Vec<StreamChunk>, ProviderError> {
    let parsed = match serde_json::from_str::<CompletionChunk>(data) {
        Ok(parsed) => parsed,
        Err(e) => {
            debug!("Skipping unparsable provider event: {} for data: {}", e, data);
            return Ok(Vec::new());
        }
    };

    if let Some(err) = parsed.error {
        let message = match err.code {
            Some(code) => format!("{} (code {})", err.message, code),
            None => err.message,
        };
        return Err(ProviderError::Api(message));
    }

    let mut chunks = Vec::new();
    for choice in parsed.choices.unwrap_or_default() {
        if let Some(delta) = choice.delta {
            let reasoning = delta.reasoning.or(delta.reasoning_content);
            if let Some(text) = reasoning.filter(|t| !t.is_empty()) {
                chunks.push(StreamChunk::Reasoning(text));
            }
            if let Some(text) = delta.content.filter(|t| !t.is_empty()) {
                chunks.push(StreamChunk::Text(text));
            }
            for annotation in delta.annotations.unwrap_or_default() {
                if annotation.kind != "url_citation" {
                    continue;
                }
                if let Some(citation) = annotation.url_citation {
                    chunks.push(StreamChunk::Source {
                        id: format!("source-{}", *sources),
                        url: citation.url,
                        title: citation.title.filter(|t| !t.is_empty()),
                    });
                    *sources += 1;
                }
            }
        }
        if let Some(reason) = choice.finish_reason {
            chunks.push(StreamChunk::Finish { reason: Some(reason) });
        }
    }

    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{ extract::State, http::{ HeaderMap as AxumHeaders, StatusCode }, routing::post, Json, Router };
    use crate::config::ChatSettings;
    use crate::stream::{ run_relay, RelayOutcome };
    use axum::body::{ Body, Bytes };
    use serde_json::{ json, Value };
    use std::convert::Infallible;
    use std::sync::atomic::{ AtomicBool, Ordering };
    use std::sync::{ Arc, Mutex };
    use std::time::Duration;
    use tokio::sync::mpsc;

    #[test]
    fn decodes_openrouter_delta_fields() {
        let mut sources = 0;
        let data = json!({
            "choices": [{
                "delta": {
                    "content": "Paris",
                    "reasoning": "capital of France",
                    "annotations": [{
                        "type": "url_citation",
                        "url_citation": { "url": "https://en.wikipedia.org/wiki/Paris", "title": "Paris" }
                    }]
                },
                "finish_reason": null
            }]
        }).to_string();

        assert_eq!(decode_chunk(&data, &mut sources).unwrap(), vec![
            StreamChunk::Reasoning("capital of France".into()),
            StreamChunk::Text("Paris".into()),
            StreamChunk::Source {
                id: "source-0".into(),
                url: "https://en.wikipedia.org/wiki/Paris".into(),
                title: Some("Paris".into()),
            }
        ]);
        assert_eq!(sources, 1);
    }

    #[test]
    fn reasoning_content_alias_and_finish() {
        let mut sources = 0;
        let data =
            r#"{"choices":[{"delta":{"reasoning_content":"hmm","content":""},"finish_reason":"stop"}]}"#;
        assert_eq!(decode_chunk(data, &mut sources).unwrap(), vec![
            StreamChunk::Reasoning("hmm".into()),
            StreamChunk::Finish { reason: Some("stop".into()) }
        ]);
    }

    #[test]
    fn in_stream_error_becomes_provider_error() {
        let mut sources = 0;
        let data = r#"{"error":{"message":"Rate limit exceeded","code":429}}"#;
        let err = decode_chunk(data, &mut sources).unwrap_err();
        assert_eq!(err.to_string(), "Provider error: Rate limit exceeded (code 429)");
    }

    #[test]
    fn usage_only_and_garbage_events_are_skipped() {
        let mut sources = 0;
        assert!(decode_chunk(r#"{"choices":[],"usage":{"total_tokens":3}}"#, &mut sources).unwrap().is_empty());
        assert!(decode_chunk("not json", &mut sources).unwrap().is_empty());
    }

    #[derive(Clone, Default)]
    struct Captured {
        bodies: Arc<Mutex<Vec<Value>>>,
        auth: Arc<Mutex<Vec<Option<String>>>>,
    }

    async fn completions(
        State(captured): State<Captured>,
        headers: AxumHeaders,
        Json(body): Json<Value>
    ) -> (StatusCode, String) {
        captured.bodies.lock().unwrap().push(body);
        captured.auth
            .lock()
            .unwrap()
            .push(
                headers
                    .get("authorization")
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_owned)
            );
        let sse = concat!(
            ": OPENROUTER PROCESSING\n\n",
            "data: {\"choices\":[{\"delta\":{\"reasoning\":\"think\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"lo\"},\"finish_reason\":\"stop\"}]}\n\n",
            "data: [DONE]\n\n"
        );
        (StatusCode::OK, sse.to_string())
    }

    async fn spawn_provider(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}/api/v1", addr)
    }

    #[tokio::test]
    async fn streams_chunks_from_http_provider() {
        let captured = Captured::default();
        let router = Router::new()
            .route("/api/v1/chat/completions", post(completions))
            .with_state(captured.clone());
        let base_url = spawn_provider(router).await;

        let client = OpenAICompatibleClient::new(ProviderConfig {
            base_url,
            api_key: "sk-test".into(),
            model: "test/model".into(),
            system_prompt: "be helpful".into(),
        }).unwrap();

        let stream = client.stream_chat(vec![ProviderMessage::text("user", "hello")]).await.unwrap();
        let chunks: Vec<StreamChunk> = stream.map(|c| c.unwrap()).collect().await;

        assert_eq!(chunks, vec![
            StreamChunk::Reasoning("think".into()),
            StreamChunk::Text("Hel".into()),
            StreamChunk::Text("lo".into()),
            StreamChunk::Finish { reason: Some("stop".into()) }
        ]);

        let bodies = captured.bodies.lock().unwrap().clone();
        assert_eq!(bodies.len(), 1);
        assert_eq!(
            bodies[0],
            json!({
                "model": "test/model",
                "messages": [
                    { "role": "system", "content": "be helpful" },
                    { "role": "user", "content": "hello" }
                ],
                "stream": true
            })
        );
        assert_eq!(captured.auth.lock().unwrap()[0].as_deref(), Some("Bearer sk-test"));
    }

    #[tokio::test]
    async fn non_success_status_is_reported() {
        let router = Router::new().route(
            "/api/v1/chat/completions",
            post(|| async {
                (StatusCode::UNAUTHORIZED, r#"{"error":{"message":"No auth credentials found","code":401}}"#)
            })
        );
        let base_url = spawn_provider(router).await;

        let client = OpenAICompatibleClient::new(ProviderConfig {
            base_url,
            ..ProviderConfig::default()
        }).unwrap();

        match client.stream_chat(Vec::new()).await {
            Err(ProviderError::Status { status, body }) => {
                assert_eq!(status, 401);
                assert!(body.contains("No auth credentials found"));
            }
            Err(other) => panic!("unexpected error: {}", other),
            Ok(_) => panic!("expected an error"),
        }
    }

    /// Flips its flag when the mock provider's response body is dropped.
    struct BodyDropped(Arc<AtomicBool>);

    impl Drop for BodyDropped {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    /// Sends one delta, then never finishes the body.
    fn stalled_provider(dropped: Arc<AtomicBool>) -> Router {
        Router::new().route(
            "/api/v1/chat/completions",
            post(move || {
                let guard = BodyDropped(dropped.clone());
                async move {
                    let body = futures::stream::unfold((guard, false), |(guard, sent)| async move {
                        if sent {
                            std::future::pending::<()>().await;
                        }
                        let event = Bytes::from_static(
                            b"data: {\"choices\":[{\"delta\":{\"content\":\"slow\"}}]}\n\n"
                        );
                        Some((Ok::<_, Infallible>(event), (guard, true)))
                    });
                    Body::from_stream(body)
                }
            })
        )
    }

    async fn wait_for(flag: &AtomicBool, limit: Duration) -> bool {
        let start = tokio::time::Instant::now();
        while start.elapsed() < limit {
            if flag.load(Ordering::SeqCst) {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        flag.load(Ordering::SeqCst)
    }

    #[tokio::test]
    async fn deadline_closes_stalled_provider_connection() {
        let dropped = Arc::new(AtomicBool::new(false));
        let base_url = spawn_provider(stalled_provider(dropped.clone())).await;
        let client = OpenAICompatibleClient::new(ProviderConfig {
            base_url,
            ..ProviderConfig::default()
        }).unwrap();

        let (tx, mut rx) = mpsc::channel(64);
        let drain = tokio::spawn(async move { while rx.recv().await.is_some() {} });
        let settings = ChatSettings {
            max_duration: Duration::from_millis(300),
            ..ChatSettings::default()
        };

        let outcome = run_relay(Arc::new(client), Vec::new(), settings, tx).await;
        assert_eq!(outcome, RelayOutcome::DeadlineExceeded);
        assert!(
            wait_for(&dropped, Duration::from_secs(2)).await,
            "provider body still open after the deadline"
        );
        drain.await.unwrap();
    }

    #[tokio::test]
    async fn dropping_chunk_stream_closes_provider_connection() {
        let dropped = Arc::new(AtomicBool::new(false));
        let base_url = spawn_provider(stalled_provider(dropped.clone())).await;
        let client = OpenAICompatibleClient::new(ProviderConfig {
            base_url,
            ..ProviderConfig::default()
        }).unwrap();

        let mut stream = client.stream_chat(Vec::new()).await.unwrap();
        assert_eq!(stream.next().await.unwrap().unwrap(), StreamChunk::Text("slow".into()));
        drop(stream);

        assert!(wait_for(&dropped, Duration::from_secs(2)).await);
    }
}
