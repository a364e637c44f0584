// ABOUTME: Error types for LLM gateway calls
// ABOUTME: Separates retryable transient failures from terminal API and decode errors

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AIServiceError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("API returned {status}: {message}")]
    ApiError { status: u16, message: String },

    #[error("Transient gateway failure: {0}")]
    Transient(String),

    #[error("Failed to decode model output: {0}")]
    Decode(String),

    #[error("No API key configured")]
    NoApiKey,

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),
}

impl AIServiceError {
    /// Whether another attempt may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            AIServiceError::Transient(_) => true,
            AIServiceError::RequestFailed(e) => e.is_timeout() || e.is_connect(),
            AIServiceError::ApiError { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

pub type AIServiceResult<T> = Result<T, AIServiceError>;
