// ABOUTME: Scripted LLM gateway for tests of agents, the demo pipeline and the HTTP layer
// ABOUTME: Each capability replays queued responses in order and records every request

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use futures::stream;
use pmstation_ai::{AIServiceError, AIServiceResult, GenerationRequest, LlmGateway, TextStream};
use serde_json::Value;

/// A queued streaming response
#[derive(Debug, Clone)]
pub enum ScriptedStream {
    /// Yields every chunk, then ends
    Chunks(Vec<String>),
    /// Yields the chunks, then fails with the message
    FailAfter(Vec<String>, String),
    /// Opening the stream fails
    FailToOpen(String),
}

/// Gateway replaying queued responses; an empty queue is an error (or `None` for images)
#[derive(Default)]
pub struct ScriptedGateway {
    text: Mutex<VecDeque<AIServiceResult<String>>>,
    structured: Mutex<VecDeque<AIServiceResult<Value>>>,
    streams: Mutex<VecDeque<ScriptedStream>>,
    images: Mutex<VecDeque<Option<Vec<u8>>>>,
    requests: Mutex<Vec<GenerationRequest>>,
    image_prompts: Mutex<Vec<String>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn exhausted(capability: &str) -> AIServiceError {
    AIServiceError::InvalidResponse(format!("no scripted {} response left", capability))
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_text(&self, text: impl Into<String>) -> &Self {
        lock(&self.text).push_back(Ok(text.into()));
        self
    }

    pub fn push_structured(&self, value: Value) -> &Self {
        lock(&self.structured).push_back(Ok(value));
        self
    }

    pub fn push_structured_error(&self, error: AIServiceError) -> &Self {
        lock(&self.structured).push_back(Err(error));
        self
    }

    pub fn push_stream<S: Into<String>>(&self, chunks: impl IntoIterator<Item = S>) -> &Self {
        let chunks = chunks.into_iter().map(Into::into).collect();
        lock(&self.streams).push_back(ScriptedStream::Chunks(chunks));
        self
    }

    pub fn push_failing_stream<S: Into<String>>(
        &self,
        chunks: impl IntoIterator<Item = S>,
        message: impl Into<String>,
    ) -> &Self {
        let chunks = chunks.into_iter().map(Into::into).collect();
        lock(&self.streams).push_back(ScriptedStream::FailAfter(chunks, message.into()));
        self
    }

    pub fn push_stream_open_error(&self, message: impl Into<String>) -> &Self {
        lock(&self.streams).push_back(ScriptedStream::FailToOpen(message.into()));
        self
    }

    pub fn push_image(&self, image: Option<Vec<u8>>) -> &Self {
        lock(&self.images).push_back(image);
        self
    }

    /// Every text, structured and stream request received, in call order
    pub fn requests(&self) -> Vec<GenerationRequest> {
        lock(&self.requests).clone()
    }

    pub fn image_prompts(&self) -> Vec<String> {
        lock(&self.image_prompts).clone()
    }

    fn record(&self, request: GenerationRequest) {
        lock(&self.requests).push(request);
    }
}

#[async_trait]
impl LlmGateway for ScriptedGateway {
    async fn generate_text(&self, request: GenerationRequest) -> AIServiceResult<String> {
        self.record(request);
        lock(&self.text)
            .pop_front()
            .unwrap_or_else(|| Err(exhausted("text")))
    }

    async fn generate_structured(&self, request: GenerationRequest) -> AIServiceResult<Value> {
        self.record(request);
        lock(&self.structured)
            .pop_front()
            .unwrap_or_else(|| Err(exhausted("structured")))
    }

    async fn generate_text_stream(
        &self,
        request: GenerationRequest,
    ) -> AIServiceResult<TextStream> {
        self.record(request);
        let scripted = lock(&self.streams)
            .pop_front()
            .ok_or_else(|| exhausted("stream"))?;

        let items: Vec<AIServiceResult<String>> = match scripted {
            ScriptedStream::Chunks(chunks) => chunks.into_iter().map(Ok).collect(),
            ScriptedStream::FailAfter(chunks, message) => chunks
                .into_iter()
                .map(Ok)
                .chain(std::iter::once(Err(AIServiceError::InvalidResponse(message))))
                .collect(),
            ScriptedStream::FailToOpen(message) => {
                return Err(AIServiceError::ApiError {
                    status: 500,
                    message,
                })
            }
        };
        Ok(Box::pin(stream::iter(items)))
    }

    async fn generate_image(&self, prompt: &str, _aspect_ratio: &str) -> Option<Vec<u8>> {
        lock(&self.image_prompts).push(prompt.to_string());
        lock(&self.images).pop_front().flatten()
    }
}
