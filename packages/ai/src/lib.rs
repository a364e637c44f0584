// ABOUTME: LLM gateway integration
// ABOUTME: Gemini REST client, retry policy, lenient JSON decoding and the model-tier registry

pub mod decode;
pub mod error;
pub mod gateway;
pub mod gemini;
pub mod registry;
pub mod retry;

pub use decode::{extract_json_object, strip_json_fences, SseBuffer};
pub use error::{AIServiceError, AIServiceResult};
pub use gateway::{GenerationRequest, LlmGateway, TextStream};
pub use gemini::{GeminiClient, GeminiSettings};
pub use registry::{GatewayRegistry, ModelTier};
pub use retry::RetryPolicy;
