use crate::config::ChatSettings;
use crate::llm::chat::ChatClient;
use crate::llm::convert::to_provider_messages;
use crate::models::chat::ChatRequest;
use crate::page;
use crate::stream::{ relay_chat, BodyStream };
use std::sync::Arc;
use axum::{
    body::{ Body, Bytes },
    extract::State,
    http::{ header::{ CACHE_CONTROL, CONNECTION, CONTENT_TYPE }, HeaderValue, StatusCode },
    response::{ Html, IntoResponse, Response },
    routing::{ get, post },
    Json,
    Router,
};
use serde::Serialize;
use thiserror::Error;
use tower_http::cors::{ Any, CorsLayer };
use log::{ info, warn };

pub const UI_MESSAGE_STREAM_HEADER: &str = "x-vercel-ai-ui-message-stream";

#[derive(Clone)]
pub struct AppState {
    pub client: Arc<dyn ChatClient>,
    pub settings: ChatSettings,
}

impl AppState {
    pub fn new(client: Arc<dyn ChatClient>, settings: ChatSettings) -> Self {
        Self { client, settings }
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Request body is not valid JSON: {0}")]
    InvalidJson(serde_json::Error),
    #[error("Invalid chat request: {0}")]
    InvalidRequest(serde_json::Error),
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        if err.is_data() {
            ApiError::InvalidRequest(err)
        } else {
            ApiError::InvalidJson(err)
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        warn!("Rejected chat request: {}", self);
        (StatusCode::BAD_REQUEST, Json(ErrorBody { error: self.to_string() })).into_response()
    }
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(index_handler))
        .route("/health", get(health_handler))
        .route("/api/chat", post(chat_handler))
        .layer(cors)
        .with_state(state)
}

async fn index_handler() -> Html<&'static str> {
    Html(page::INDEX_HTML)
}

async fn health_handler() -> &'static str {
    "ok"
}

async fn chat_handler(State(state): State<AppState>, body: Bytes) -> Result<Response, ApiError> {
    let request: ChatRequest = serde_json::from_slice(&body)?;
    let conversation = request.into_conversation();
    info!("Chat request with {} message(s) for model {}", conversation.len(), state.client.get_model());

    let messages = to_provider_messages(conversation);
    let body = relay_chat(state.client.clone(), messages, state.settings.clone());
    Ok(ui_stream_response(body))
}

fn ui_stream_response(body: BodyStream) -> Response {
    let mut response = Response::new(Body::from_stream(body));
    let headers = response.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/event-stream"));
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));
    headers.insert(UI_MESSAGE_STREAM_HEADER, HeaderValue::from_static("v1"));
    headers.insert("x-accel-buffering", HeaderValue::from_static("no"));
    response
}
