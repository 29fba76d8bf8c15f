use async_trait::async_trait;
use log::info;
use serde::{Deserialize, Serialize};
use std::error::Error as StdError;
use thiserror::Error;

use super::{ChatClient, CompletionResponse};
use crate::config::persona::Persona;
use crate::llm::LlmConfig;
use crate::models::chat::{ChatTurn, Role};

#[derive(Serialize)]
struct GenerateContentRequest {
    #[serde(rename = "systemInstruction")]
    system_instruction: GeminiSystemInstruction,
    contents: Vec<GeminiContent>,
    #[serde(rename = "generationConfig")]
    generation_config: GeminiGenerationConfig,
}

#[derive(Serialize)]
struct GeminiSystemInstruction {
    parts: Vec<GeminiPart>,
}

#[derive(Serialize)]
struct GeminiContent {
    role: String,
    parts: Vec<GeminiPart>,
}

#[derive(Serialize)]
struct GeminiPart {
    text: String,
}

#[derive(Serialize)]
struct GeminiGenerationConfig {
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    candidates: Option<Vec<GeminiCandidate>>,
    error: Option<GeminiApiError>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiCandidateContent>,
}

#[derive(Deserialize)]
struct GeminiCandidateContent {
    parts: Option<Vec<GeminiResponsePart>>,
}

#[derive(Deserialize)]
struct GeminiResponsePart {
    text: Option<String>,
}

#[derive(Deserialize)]
struct GeminiApiError {
    message: String,
}

#[derive(Debug, Error)]
pub enum GeminiError {
    #[error("API key is not configured")]
    MissingApiKey,
    #[error("completion request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("completion service returned {status}: {body}")]
    Status { status: reqwest::StatusCode, body: String },
    #[error("completion service error: {0}")]
    Api(String),
}

/// The completion service tags assistant turns as "model" on the wire.
fn wire_role(role: Role) -> &'static str {
    match role {
        Role::User => "user",
        Role::Assistant => "model",
    }
}

/// Request body for one completion call: persona instruction, every prior
/// turn mapped in original order, the new user message last, and the
/// reply-length cap.
fn build_request(persona: &Persona, history: &[ChatTurn], message: &str) -> GenerateContentRequest {
    let mut contents: Vec<GeminiContent> = history
        .iter()
        .map(|turn| GeminiContent {
            role: wire_role(turn.role).to_string(),
            parts: vec![GeminiPart { text: turn.text.clone() }],
        })
        .collect();

    contents.push(GeminiContent {
        role: "user".to_string(),
        parts: vec![GeminiPart { text: message.to_string() }],
    });

    GenerateContentRequest {
        system_instruction: GeminiSystemInstruction {
            parts: vec![GeminiPart { text: persona.system_instruction.clone() }],
        },
        contents,
        generation_config: GeminiGenerationConfig {
            max_output_tokens: persona.max_output_tokens,
        },
    }
}

/// First-candidate text, parts concatenated. A well-formed response without
/// a text field is an empty reply, not an error — the agent substitutes the
/// apology string for it.
fn extract_text(response: GenerateContentResponse) -> String {
    response
        .candidates
        .into_iter()
        .flatten()
        .next()
        .and_then(|candidate| candidate.content)
        .and_then(|content| content.parts)
        .map(|parts| {
            parts
                .into_iter()
                .filter_map(|part| part.text)
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default()
}

pub struct GeminiChatClient {
    http: reqwest::Client,
    api_key: Option<String>,
    model: String,
    base_url: String,
    persona: &'static Persona,
}

impl GeminiChatClient {
    pub fn new(
        api_key: Option<String>,
        model: String,
        base_url: String,
        persona: &'static Persona,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key,
            model,
            base_url,
            persona,
        }
    }

    pub fn from_config(config: &LlmConfig, persona: &'static Persona) -> Self {
        Self::new(
            config.api_key.clone(),
            config.completion_model.clone(),
            config.base_url.clone(),
            persona,
        )
    }

    fn endpoint(&self, api_key: &str) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.base_url.trim_end_matches('/'),
            self.model,
            api_key
        )
    }
}

#[async_trait]
impl ChatClient for GeminiChatClient {
    async fn complete(
        &self,
        history: &[ChatTurn],
        message: &str,
    ) -> Result<CompletionResponse, Box<dyn StdError + Send + Sync>> {
        let api_key = match self.api_key.as_deref() {
            Some(key) if !key.is_empty() => key,
            _ => return Err(GeminiError::MissingApiKey.into()),
        };

        let request = build_request(self.persona, history, message);
        info!(
            "GeminiChatClient::complete() → model={} contents={}",
            self.model,
            request.contents.len()
        );

        let response = self
            .http
            .post(self.endpoint(api_key))
            .json(&request)
            .send()
            .await
            .map_err(GeminiError::Http)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(GeminiError::Status { status, body }.into());
        }

        let parsed: GenerateContentResponse =
            response.json().await.map_err(GeminiError::Http)?;
        if let Some(err) = parsed.error {
            return Err(GeminiError::Api(err.message).into());
        }

        Ok(CompletionResponse { text: extract_text(parsed) })
    }
}
