//! # API Module
//!
//! Remote service seams for the triage pipeline.
//!
//! The pipeline only ever needs two things from a hosted model provider:
//!
//! - [`Embedder`]: turn a piece of text into a fixed-length float vector.
//! - [`Generator`]: turn a system prompt plus a user prompt into text.
//!
//! [`OpenAiBackend`] implements both against any OpenAI-compatible endpoint using
//! `async-openai`. Tests substitute in-process fakes. There is no retry policy: a
//! failed call surfaces as [`TriageError::RemoteService`] at the call site.
//!
//! # Example
//!
//! ```no_run
//! use symptom_triage::api::{Embedder, Generator, OpenAiBackend};
//! use symptom_triage::config::TriageConfig;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let backend = OpenAiBackend::new(&TriageConfig::default());
//! let vector = backend.embed("headache").await?;
//! let text = backend.generate("You are terse.", "Say hi.").await?;
//! println!("{} dims, reply: {text}", vector.len());
//! # Ok(()) }
//! ```
use async_openai::{
    Client,
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessage,
        ChatCompletionRequestSystemMessageContent, ChatCompletionRequestUserMessage,
        ChatCompletionRequestUserMessageContent, CreateChatCompletionRequestArgs,
        CreateEmbeddingRequestArgs,
    },
};
use async_trait::async_trait;

use tracing::debug;

use crate::config::TriageConfig;
use crate::error::{TriageError, TriageResult};

/// Text-embedding service contract: text in, fixed-length vector out.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> TriageResult<Vec<f32>>;
}

/// Generative-text service contract: prompt in, trimmed text out.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, system_prompt: &str, prompt: &str) -> TriageResult<String>;
}

/// Creates a new OpenAI API client from configuration.
///
/// # Parameters
/// - `config: &TriageConfig`: Configuration containing API base and key.
///
/// # Returns
/// - `Client<OpenAIConfig>` pointed at `config.api_base`.
fn create_client(config: &TriageConfig) -> Client<OpenAIConfig> {
    let openai_config = OpenAIConfig::new()
        .with_api_key(config.api_key.clone())
        .with_api_base(config.api_base.clone());
    debug!("Client created for api base {}", config.api_base);
    Client::with_config(openai_config)
}

/// OpenAI-compatible implementation of both service contracts.
pub struct OpenAiBackend {
    client: Client<OpenAIConfig>,
    model: String,
    embedding_model: String,
    temperature: f32,
}

impl OpenAiBackend {
    pub fn new(config: &TriageConfig) -> Self {
        Self {
            client: create_client(config),
            model: config.model.clone(),
            embedding_model: config.embedding_model.clone(),
            temperature: config.temperature,
        }
    }
}

#[async_trait]
impl Embedder for OpenAiBackend {
    async fn embed(&self, text: &str) -> TriageResult<Vec<f32>> {
        let request = CreateEmbeddingRequestArgs::default()
            .model(self.embedding_model.clone())
            .input(text.to_string())
            .build()?;

        debug!("Embedding {:?} with {}", text, self.embedding_model);

        let response = self.client.embeddings().create(request).await?;

        response
            .data
            .into_iter()
            .next()
            .map(|embedding| embedding.embedding)
            .ok_or_else(|| TriageError::RemoteService("embedding response had no data".into()))
    }
}

#[async_trait]
impl Generator for OpenAiBackend {
    async fn generate(&self, system_prompt: &str, prompt: &str) -> TriageResult<String> {
        let messages = vec![
            ChatCompletionRequestMessage::System(ChatCompletionRequestSystemMessage {
                content: ChatCompletionRequestSystemMessageContent::Text(
                    system_prompt.to_string(),
                ),
                name: None,
            }),
            ChatCompletionRequestMessage::User(ChatCompletionRequestUserMessage {
                content: ChatCompletionRequestUserMessageContent::Text(prompt.to_string()),
                name: None,
            }),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(self.model.clone())
            .temperature(self.temperature)
            .messages(messages)
            .build()?;

        debug!("Sending request: {:?}", request);

        let response = self.client.chat().create(request).await?;

        let mut response_string = String::new();
        response.choices.iter().for_each(|chat_choice| {
            if let Some(ref message_text) = chat_choice.message.content {
                response_string.push_str(message_text);
            }
        });

        if response_string.trim().is_empty() {
            return Err(TriageError::RemoteService(
                "No assistant response".to_string(),
            ));
        }

        Ok(response_string.trim().to_string())
    }
}
