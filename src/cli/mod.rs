use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Host address and port for the WebSocket server to listen on.
    #[arg(long, env = "SERVER_ADDR", default_value = "127.0.0.1:4000")]
    pub server_addr: String,

    /// Optional port for the HTTP health endpoint. Disabled when unset.
    #[arg(long, env = "HTTP_PORT")]
    pub http_port: Option<u16>,

    /// API Key for the completion service. A missing or invalid key is not a
    /// startup error; it surfaces as failed gateway calls with the fallback
    /// reply.
    #[arg(long, env = "API_KEY", default_value = "")]
    pub api_key: String,

    /// Model name for chat completion.
    #[arg(long, env = "CHAT_MODEL", default_value = "gemini-3-flash-preview")]
    pub chat_model: String,

    /// Base URL for the completion service API.
    #[arg(long, env = "CHAT_BASE_URL", default_value = "https://generativelanguage.googleapis.com")]
    pub chat_base_url: String,

    /// Optional API Key required for clients to connect to the WebSocket
    /// server. If set, clients must provide a signed handshake.
    #[arg(long, env = "SERVER_API_KEY")]
    pub server_api_key: Option<String>,
}
