use log::{error, info};
use std::error::Error;
use std::sync::Arc;

use crate::cli::Args;
use crate::config::persona;
use crate::llm::chat::{new_client, ChatClient};
use crate::llm::LlmConfig;
use crate::models::chat::ChatTurn;

/// Substituted when the service answers successfully but with no text.
pub const EMPTY_REPLY_APOLOGY: &str = "I'm sorry, I couldn't process that.";

/// Substituted when the completion call fails for any reason.
pub const FALLBACK_REPLY: &str =
    "I am currently taking a coffee break. Please try again in a moment!";

/// The response gateway: stateless bridge between local conversation state
/// and the external completion service. Every call path produces a
/// displayable string; errors stop here.
pub struct AssistantAgent {
    chat_client: Arc<dyn ChatClient>,
}

impl AssistantAgent {
    pub fn new(args: &Args) -> Result<Self, Box<dyn Error + Send + Sync>> {
        let api_key = if args.api_key.is_empty() {
            None
        } else {
            Some(args.api_key.clone())
        };
        let config = LlmConfig {
            api_key,
            completion_model: args.chat_model.clone(),
            base_url: args.chat_base_url.clone(),
        };
        let chat_client = new_client(&config, persona::persona())?;
        info!(
            "Chat client configured: Model={}, BaseURL={}",
            config.completion_model, config.base_url
        );
        Ok(Self { chat_client })
    }

    pub fn with_client(chat_client: Arc<dyn ChatClient>) -> Self {
        Self { chat_client }
    }

    /// Total function: never raises past this boundary. `history` holds the
    /// turns before `message`; the client appends `message` itself.
    pub async fn reply(&self, history: &[ChatTurn], message: &str) -> String {
        match self.chat_client.complete(history, message).await {
            Ok(response) if response.text.is_empty() => EMPTY_REPLY_APOLOGY.to_string(),
            Ok(response) => response.text,
            Err(e) => {
                error!("Completion service error: {}", e);
                FALLBACK_REPLY.to_string()
            }
        }
    }
}
