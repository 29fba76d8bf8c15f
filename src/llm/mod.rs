pub mod chat;

/// Transport configuration for the completion service. The API key may be
/// absent; a missing key surfaces as a failed gateway call, never as a
/// startup error.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: Option<String>,
    pub completion_model: String,
    pub base_url: String,
}
