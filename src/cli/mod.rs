use clap::Parser;

pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_MODEL: &str = "openrouter/sonoma-dusk-alpha";
pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a helpful assistant that can answer questions and help with tasks";

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    // --- Server Args ---
    /// Host address and port for the HTTP server to listen on.
    #[arg(long, env = "SERVER_ADDR", default_value = "127.0.0.1:3000")]
    pub server_addr: String,

    // --- Chat LLM Provider Args ---
    /// API key for the OpenRouter provider. Not validated locally; a missing key
    /// surfaces as an authentication error from the provider.
    #[arg(long, env = "OPENROUTER_API_KEY", default_value = "", hide_env_values = true)]
    pub api_key: String,

    /// Base URL of the OpenAI-compatible API (the `/chat/completions` route is appended).
    #[arg(long, env = "CHAT_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// Model identifier sent with every completion request.
    #[arg(long, env = "CHAT_MODEL", default_value = DEFAULT_MODEL)]
    pub model: String,

    /// System prompt prepended to every conversation.
    #[arg(long, env = "SYSTEM_PROMPT", default_value = DEFAULT_SYSTEM_PROMPT)]
    pub system_prompt: String,

    // --- Streaming Args ---
    /// Hard limit in seconds for a whole chat exchange, provider connect included.
    #[arg(long, env = "MAX_DURATION_SECS", default_value = "30")]
    pub max_duration_secs: u64,

    /// Forward reasoning deltas to the client.
    #[arg(long, env = "SEND_REASONING", default_value = "true", action = clap::ArgAction::Set)]
    pub send_reasoning: bool,

    /// Forward source citations to the client.
    #[arg(long, env = "SEND_SOURCES", default_value = "true", action = clap::ArgAction::Set)]
    pub send_sources: bool,

    // --- TLS Args ---
    /// Optional path to the TLS certificate file (PEM format). Requires --tls-key-path.
    #[arg(long, env = "TLS_CERT_PATH")]
    pub tls_cert_path: Option<String>,

    /// Optional path to the TLS private key file (PEM format). Requires --tls-cert-path.
    #[arg(long, env = "TLS_KEY_PATH")]
    pub tls_key_path: Option<String>,

    #[arg(long, env = "ENABLE_TLS", default_value = "false")]
    pub enable_tls: bool,
}
