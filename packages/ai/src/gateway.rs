// ABOUTME: Capability surface every LLM backend exposes to agents and the demo pipeline
// ABOUTME: Text, structured JSON, chunked streaming and image generation behind one trait

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde_json::Value;

use crate::error::AIServiceResult;

/// Lazy, finite, non-restartable sequence of text chunks
pub type TextStream = BoxStream<'static, AIServiceResult<String>>;

/// Parameters for a single generation call
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub system_instruction: Option<String>,
    pub schema: Option<Value>,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            system_instruction: None,
            schema: None,
            temperature: 0.7,
            max_tokens: 8192,
        }
    }

    pub fn system(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = Some(instruction.into());
        self
    }

    pub fn schema(mut self, schema: Value) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

#[async_trait]
pub trait LlmGateway: Send + Sync {
    /// Plain text completion
    async fn generate_text(&self, request: GenerationRequest) -> AIServiceResult<String>;

    /// JSON completion; fails with `Decode` when no object is recoverable
    async fn generate_structured(&self, request: GenerationRequest) -> AIServiceResult<Value>;

    /// Streamed completion. Only opening the stream is retried.
    async fn generate_text_stream(&self, request: GenerationRequest)
        -> AIServiceResult<TextStream>;

    /// Image bytes, or `None` on any failure
    async fn generate_image(&self, prompt: &str, aspect_ratio: &str) -> Option<Vec<u8>>;
}
