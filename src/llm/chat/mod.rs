pub mod gemini;

use async_trait::async_trait;
use std::error::Error as StdError;
use std::sync::Arc;

use self::gemini::GeminiChatClient;
use super::LlmConfig;
use crate::config::persona::Persona;
use crate::models::chat::ChatTurn;

#[derive(Debug, Clone)]
pub struct CompletionResponse {
    pub text: String,
}

/// Boundary to the external completion service. Implementations translate
/// (prior turns, new utterance) into one outbound request and hand back the
/// raw reply text; normalization of failures into displayable strings is
/// the agent's job, not the client's.
#[async_trait]
pub trait ChatClient: Send + Sync {
    async fn complete(
        &self,
        history: &[ChatTurn],
        message: &str,
    ) -> Result<CompletionResponse, Box<dyn StdError + Send + Sync>>;
}

pub fn new_client(
    config: &LlmConfig,
    persona: &'static Persona,
) -> Result<Arc<dyn ChatClient>, Box<dyn StdError + Send + Sync>> {
    let client = GeminiChatClient::from_config(config, persona);
    Ok(Arc::new(client))
}
