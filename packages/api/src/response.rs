// ABOUTME: Shared API response envelope and workflow error mapping
// ABOUTME: Every endpoint answers with ApiResponse; failures carry an HTTP status and a machine code

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json as ResponseJson, Response},
};
use pmstation_workflow::WorkflowError;
use serde::Serialize;
use tracing::error;

/// Standard API response wrapper
#[derive(Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<&'static str>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        ApiResponse {
            success: true,
            data: Some(data),
            error: None,
            code: None,
        }
    }

    pub fn error(message: String, code: &'static str) -> ApiResponse<()> {
        ApiResponse {
            success: false,
            data: None,
            error: Some(message),
            code: Some(code),
        }
    }
}

/// Handler failure rendered through the envelope
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn too_many_streams() -> Self {
        Self::new(
            StatusCode::TOO_MANY_REQUESTS,
            "too_many_streams",
            "Too many concurrent streams from this address",
        )
    }
}

impl From<WorkflowError> for ApiError {
    fn from(err: WorkflowError) -> Self {
        let (status, code) = match &err {
            WorkflowError::Precondition(_) => (StatusCode::BAD_REQUEST, "precondition_failed"),
            WorkflowError::MissingDependency { .. } => {
                (StatusCode::BAD_REQUEST, "missing_dependency")
            }
            WorkflowError::InvalidSelection(_) => (StatusCode::BAD_REQUEST, "invalid_selection"),
            WorkflowError::ProjectNotFound(_) => (StatusCode::NOT_FOUND, "project_not_found"),
            WorkflowError::StageNotFound(_) => (StatusCode::NOT_FOUND, "stage_not_found"),
            WorkflowError::PageNotFound(_) => (StatusCode::NOT_FOUND, "page_not_found"),
            WorkflowError::Decode { .. } | WorkflowError::NoStructuredOutput(_) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "decode_failed")
            }
            WorkflowError::AIService(_) => (StatusCode::BAD_GATEWAY, "gateway_failed"),
            WorkflowError::Generation(_)
            | WorkflowError::Storage(_)
            | WorkflowError::Prompt(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        };

        if status.is_server_error() {
            error!(error = %err, code, "Request failed");
        }
        Self::new(status, code, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            ResponseJson(ApiResponse::<()>::error(self.message, self.code)),
        )
            .into_response()
    }
}

pub type ApiResult<T> = Result<ResponseJson<ApiResponse<T>>, ApiError>;

/// Wrap a workflow result in the success envelope
pub fn respond<T: Serialize>(result: pmstation_workflow::Result<T>) -> ApiResult<T> {
    Ok(ResponseJson(ApiResponse::success(result?)))
}
