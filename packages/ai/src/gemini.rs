// ABOUTME: Gemini REST client implementing the LLM gateway
// ABOUTME: Handles request building, response parsing, SSE streaming and image extraction

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use futures::StreamExt;
use pmstation_config::{constants, env};
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::decode::{extract_json_object, SseBuffer};
use crate::error::{AIServiceError, AIServiceResult};
use crate::gateway::{GenerationRequest, LlmGateway, TextStream};
use crate::retry::RetryPolicy;

/// Connection settings shared by every Gemini model client
#[derive(Debug, Clone)]
pub struct GeminiSettings {
    pub api_key: Option<String>,
    pub base_url: String,
    pub pro_model: String,
    pub flash_model: String,
    pub image_model: String,
    pub retry: RetryPolicy,
}

impl GeminiSettings {
    pub fn from_env() -> Self {
        let api_key = env::env_string(constants::GEMINI_API_KEY);
        if api_key.is_none() {
            warn!("GEMINI_API_KEY not set - generation requests will fail");
        }

        Self {
            api_key,
            base_url: env::env_string_or(
                constants::GEMINI_API_BASE_URL,
                constants::DEFAULT_GEMINI_API_BASE_URL,
            ),
            pro_model: env::env_string_or(constants::PMSTATION_PRO_MODEL, constants::DEFAULT_PRO_MODEL),
            flash_model: env::env_string_or(
                constants::PMSTATION_FLASH_MODEL,
                constants::DEFAULT_FLASH_MODEL,
            ),
            image_model: env::env_string_or(
                constants::PMSTATION_IMAGE_MODEL,
                constants::DEFAULT_IMAGE_MODEL,
            ),
            retry: RetryPolicy::from_env(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize, Default)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    #[serde(default)]
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize, Default)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_schema: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_modalities: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    image_config: Option<ImageConfig>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ImageConfig {
    aspect_ratio: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Content,
    #[serde(default)]
    finish_reason: Option<String>,
}

impl GeminiResponse {
    fn text(&self) -> String {
        self.candidates
            .first()
            .map(|c| {
                c.content
                    .parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect::<String>()
            })
            .unwrap_or_default()
    }

    fn inline_image(&self) -> Option<&InlineData> {
        self.candidates
            .iter()
            .flat_map(|c| c.content.parts.iter())
            .find_map(|p| p.inline_data.as_ref())
    }
}

impl GeminiRequest {
    fn from_generation(request: &GenerationRequest, json_mode: bool) -> Self {
        Self {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part {
                    text: Some(request.prompt.clone()),
                    inline_data: None,
                }],
            }],
            system_instruction: request.system_instruction.as_ref().map(|s| Content {
                role: None,
                parts: vec![Part {
                    text: Some(s.clone()),
                    inline_data: None,
                }],
            }),
            generation_config: GenerationConfig {
                temperature: Some(request.temperature),
                max_output_tokens: Some(request.max_tokens),
                response_mime_type: json_mode.then(|| "application/json".to_string()),
                response_schema: if json_mode {
                    request.schema.clone()
                } else {
                    None
                },
                ..Default::default()
            },
        }
    }
}

/// Gemini client bound to a single model
pub struct GeminiClient {
    client: Client,
    api_key: Option<String>,
    base_url: String,
    model: String,
    retry: RetryPolicy,
}

impl GeminiClient {
    /// Create HTTP client with timeout configuration
    fn create_client() -> AIServiceResult<Client> {
        Ok(Client::builder()
            .timeout(Duration::from_secs(600))
            .connect_timeout(Duration::from_secs(10))
            .build()?)
    }

    pub fn new(
        api_key: Option<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
        retry: RetryPolicy,
    ) -> AIServiceResult<Self> {
        Ok(Self {
            client: Self::create_client()?,
            api_key,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            retry,
        })
    }

    /// Client for `model` using shared settings
    pub fn from_settings(settings: &GeminiSettings, model: &str) -> AIServiceResult<Self> {
        Self::new(
            settings.api_key.clone(),
            settings.base_url.clone(),
            model,
            settings.retry,
        )
    }

    /// Get the model being used by this client
    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/v1beta/models/{}:{}", self.base_url, self.model, method)
    }

    async fn post(&self, url: &str, body: &GeminiRequest) -> AIServiceResult<Response> {
        let api_key = self.api_key.as_ref().ok_or(AIServiceError::NoApiKey)?;

        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", api_key)
            .header("content-type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    error!("Gemini API request timed out after 600 seconds");
                    AIServiceError::Transient("request timed out after 600 seconds".to_string())
                } else if e.is_connect() {
                    error!("Failed to connect to Gemini API: {}", e);
                    AIServiceError::Transient(format!("connection failed: {}", e))
                } else {
                    error!("Gemini API request failed: {}", e);
                    AIServiceError::RequestFailed(e)
                }
            })?;

        let status = response.status();
        debug!(model = %self.model, status = %status, "Received response from Gemini API");

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            error!("Gemini API error: {} - {}", status, error_text);
            return Err(AIServiceError::ApiError {
                status: status.as_u16(),
                message: error_text,
            });
        }

        Ok(response)
    }

    async fn generate_once(&self, body: &GeminiRequest) -> AIServiceResult<GeminiResponse> {
        let response = self.post(&self.endpoint("generateContent"), body).await?;
        response
            .json::<GeminiResponse>()
            .await
            .map_err(|e| AIServiceError::InvalidResponse(e.to_string()))
    }

    async fn complete(&self, body: GeminiRequest, operation: &str) -> AIServiceResult<String> {
        let response = self
            .retry
            .run(operation, || self.generate_once(&body))
            .await?;

        if let Some(reason) = response
            .candidates
            .first()
            .and_then(|c| c.finish_reason.as_deref())
        {
            if reason != "STOP" {
                warn!(model = %self.model, finish_reason = reason, "Generation did not finish cleanly");
            }
        }

        let text = response.text();
        if text.is_empty() {
            return Err(AIServiceError::InvalidResponse(
                "response contained no text".to_string(),
            ));
        }
        Ok(text)
    }
}

#[async_trait]
impl LlmGateway for GeminiClient {
    async fn generate_text(&self, request: GenerationRequest) -> AIServiceResult<String> {
        info!(
            model = %self.model,
            temperature = request.temperature,
            max_tokens = request.max_tokens,
            "Making Gemini text generation request"
        );
        let body = GeminiRequest::from_generation(&request, false);
        self.complete(body, "generate_text").await
    }

    async fn generate_structured(&self, request: GenerationRequest) -> AIServiceResult<Value> {
        info!(
            model = %self.model,
            temperature = request.temperature,
            max_tokens = request.max_tokens,
            "Making Gemini structured generation request"
        );
        let body = GeminiRequest::from_generation(&request, true);
        let text = self.complete(body, "generate_structured").await?;

        extract_json_object(&text).map_err(|e| {
            error!(
                "JSON decoding failed: {}. Snippet: {}",
                e,
                text.chars().take(500).collect::<String>()
            );
            e
        })
    }

    async fn generate_text_stream(
        &self,
        request: GenerationRequest,
    ) -> AIServiceResult<TextStream> {
        info!(
            model = %self.model,
            temperature = request.temperature,
            max_tokens = request.max_tokens,
            "Making Gemini streaming text generation request"
        );
        let body = GeminiRequest::from_generation(&request, false);
        let url = format!("{}?alt=sse", self.endpoint("streamGenerateContent"));
        let response = self
            .retry
            .run("generate_text_stream", || self.post(&url, &body))
            .await?;

        let stream = async_stream::stream! {
            let mut byte_stream = response.bytes_stream();
            let mut buffer = SseBuffer::new();

            while let Some(chunk_result) = byte_stream.next().await {
                match chunk_result {
                    Ok(bytes) => {
                        for data in buffer.push(&bytes) {
                            match parse_stream_event(&data) {
                                Ok(Some(text)) => yield Ok(text),
                                Ok(None) => {}
                                Err(e) => {
                                    yield Err(e);
                                    return;
                                }
                            }
                        }
                    }
                    Err(e) => {
                        yield Err(AIServiceError::RequestFailed(e));
                        return;
                    }
                }
            }

            for data in buffer.finish() {
                match parse_stream_event(&data) {
                    Ok(Some(text)) => yield Ok(text),
                    Ok(None) => {}
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                }
            }
        };

        Ok(stream.boxed())
    }

    async fn generate_image(&self, prompt: &str, aspect_ratio: &str) -> Option<Vec<u8>> {
        info!(model = %self.model, aspect_ratio, "Making Gemini image generation request");

        let body = GeminiRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part {
                    text: Some(prompt.to_string()),
                    inline_data: None,
                }],
            }],
            system_instruction: None,
            generation_config: GenerationConfig {
                response_modalities: Some(vec!["TEXT".to_string(), "IMAGE".to_string()]),
                image_config: Some(ImageConfig {
                    aspect_ratio: aspect_ratio.to_string(),
                }),
                ..Default::default()
            },
        };

        let response = match self
            .retry
            .run("generate_image", || self.generate_once(&body))
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!(model = %self.model, "Image generation failed: {}", e);
                return None;
            }
        };

        let Some(inline) = response.inline_image() else {
            warn!(model = %self.model, "Image response contained no inline data");
            return None;
        };

        match base64::engine::general_purpose::STANDARD.decode(&inline.data) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                warn!(model = %self.model, "Image payload is not valid base64: {}", e);
                None
            }
        }
    }
}

/// Text carried by one streamed event, or the error it reports
fn parse_stream_event(data: &str) -> AIServiceResult<Option<String>> {
    let event: Value = serde_json::from_str(data)
        .map_err(|e| AIServiceError::InvalidResponse(format!("bad stream event: {}", e)))?;

    if let Some(err) = event.get("error") {
        let message = err["message"]
            .as_str()
            .unwrap_or("Unknown streaming error")
            .to_string();
        let status = err["code"].as_u64().unwrap_or(500) as u16;
        return Err(AIServiceError::ApiError { status, message });
    }

    let response: GeminiResponse = serde_json::from_value(event)
        .map_err(|e| AIServiceError::InvalidResponse(format!("bad stream event: {}", e)))?;
    let text = response.text();
    Ok((!text.is_empty()).then_some(text))
}
