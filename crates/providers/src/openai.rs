//! OpenAI chat-completions and embeddings client.

use std::time::Duration;

use async_trait::async_trait;
use litessay_core::collaborators::{CompletionRequest, EmbeddingModel, LanguageModel};
use litessay_core::error::CollaboratorError;
use serde::{Deserialize, Serialize};

use crate::http::{parse_response, request_error};

const SERVICE: &str = "openai";

/// Inputs sent per embeddings request.
pub const EMBEDDING_BATCH_SIZE: usize = 100;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_CHAT_MODEL: &str = "gpt-5-mini";
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub base_url: String,
    pub chat_model: String,
    pub embedding_model: String,
}

impl OpenAiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct OpenAiClient {
    client: reqwest::Client,
    config: OpenAiConfig,
}

impl OpenAiClient {
    pub fn new(config: OpenAiConfig) -> Result<Self, CollaboratorError> {
        if config.api_key.trim().is_empty() {
            return Err(CollaboratorError::Config {
                service: SERVICE,
                message: "OPENAI_API_KEY is empty".into(),
            });
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| request_error(SERVICE, e))?;
        Ok(Self { client, config })
    }

    async fn embed_chunk(&self, input: &[String]) -> Result<Vec<Vec<f32>>, CollaboratorError> {
        let body = EmbeddingRequest {
            model: &self.config.embedding_model,
            input,
        };
        let response = self
            .client
            .post(format!("{}/embeddings", self.config.base_url))
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| request_error(SERVICE, e))?;

        let parsed: EmbeddingResponse = parse_response(SERVICE, response).await?;
        order_embeddings(parsed, input.len())
    }
}

#[async_trait]
impl LanguageModel for OpenAiClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, CollaboratorError> {
        let body = ChatRequest {
            model: &self.config.chat_model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: &request.system,
                },
                ChatMessage {
                    role: "user",
                    content: &request.user,
                },
            ],
            temperature: request.temperature,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.config.base_url))
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| request_error(SERVICE, e))?;

        let parsed: ChatResponse = parse_response(SERVICE, response).await?;
        first_choice_content(parsed)
    }
}

#[async_trait]
impl EmbeddingModel for OpenAiClient {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, CollaboratorError> {
        let mut vectors = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(EMBEDDING_BATCH_SIZE) {
            vectors.extend(self.embed_chunk(chunk).await?);
            tracing::debug!(embedded = vectors.len(), total = texts.len(), "Embedding batch done");
        }
        Ok(vectors)
    }
}

// ---- response shaping ----

fn first_choice_content(response: ChatResponse) -> Result<String, CollaboratorError> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| CollaboratorError::Decode {
            service: SERVICE,
            message: "chat completion has no content".into(),
        })
}

/// Order vectors by their `index` and check one came back per input.
fn order_embeddings(
    mut response: EmbeddingResponse,
    expected: usize,
) -> Result<Vec<Vec<f32>>, CollaboratorError> {
    if response.data.len() != expected {
        return Err(CollaboratorError::Decode {
            service: SERVICE,
            message: format!(
                "expected {expected} embeddings, got {}",
                response.data.len()
            ),
        });
    }
    response.data.sort_by_key(|d| d.index);
    Ok(response.data.into_iter().map(|d| d.embedding).collect())
}
