// ABOUTME: Error types for the workflow package
// ABOUTME: Precondition, dependency, decode and page errors plus wrapped lower-layer failures

use pmstation_ai::AIServiceError;
use pmstation_core::StageType;
use pmstation_prompts::PromptError;
use pmstation_storage::StorageError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error("Precondition failed: {0}")]
    Precondition(String),

    #[error("Missing dependency: {stage} {detail}")]
    MissingDependency { stage: StageType, detail: String },

    #[error("No structured output: {0}")]
    NoStructuredOutput(String),

    #[error("Failed to decode {stage} output: {message}")]
    Decode { stage: StageType, message: String },

    #[error("Page not found: {0}")]
    PageNotFound(String),

    #[error("Invalid selection: {0}")]
    InvalidSelection(String),

    #[error("Stage not found: {0}")]
    StageNotFound(StageType),

    #[error("Project not found: {0}")]
    ProjectNotFound(String),

    #[error("Generation failed: {0}")]
    Generation(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Prompt error: {0}")]
    Prompt(#[from] PromptError),

    #[error("AI service error: {0}")]
    AIService(#[from] AIServiceError),
}

impl WorkflowError {
    pub fn missing(stage: StageType, detail: impl Into<String>) -> Self {
        WorkflowError::MissingDependency {
            stage,
            detail: detail.into(),
        }
    }

    pub fn decode(stage: StageType, message: impl std::fmt::Display) -> Self {
        WorkflowError::Decode {
            stage,
            message: message.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, WorkflowError>;
