// Uniform API error envelope: `{code, message}` with a matching HTTP status.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::git::GitError;
use crate::sync::RunnerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    ValidationFailed,
    AuthInvalidCredentials,
    AuthInvalidToken,
    RepoNotFound,
    RepoNotRunning,
    GitOperationFailed,
    InternalError,
}

impl ErrorCode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ValidationFailed => "VALIDATION_FAILED",
            Self::AuthInvalidCredentials => "AUTH_INVALID_CREDENTIALS",
            Self::AuthInvalidToken => "AUTH_INVALID_TOKEN",
            Self::RepoNotFound => "REPO_NOT_FOUND",
            Self::RepoNotRunning => "REPO_NOT_RUNNING",
            Self::GitOperationFailed => "GIT_OPERATION_FAILED",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    pub const fn status(self) -> StatusCode {
        match self {
            Self::ValidationFailed => StatusCode::BAD_REQUEST,
            Self::AuthInvalidCredentials => StatusCode::UNAUTHORIZED,
            Self::AuthInvalidToken => StatusCode::UNAUTHORIZED,
            Self::RepoNotFound => StatusCode::NOT_FOUND,
            Self::RepoNotRunning => StatusCode::NOT_FOUND,
            Self::GitOperationFailed => StatusCode::INTERNAL_SERVER_ERROR,
            Self::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ApiError {
    code: ErrorCode,
    message: String,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self { code, message: message.into() }
    }

    pub fn code(&self) -> ErrorCode {
        self.code
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.code.status(),
            Json(json!({
                "code": self.code.as_str(),
                "message": self.message,
            })),
        )
            .into_response()
    }
}

impl From<RunnerError> for ApiError {
    fn from(error: RunnerError) -> Self {
        let code = match error {
            RunnerError::InvalidId(_) => ErrorCode::RepoNotFound,
            RunnerError::NotRunning(_) => ErrorCode::RepoNotRunning,
        };
        Self::new(code, error.to_string())
    }
}

impl From<GitError> for ApiError {
    fn from(error: GitError) -> Self {
        Self::new(ErrorCode::GitOperationFailed, error.to_string())
    }
}
