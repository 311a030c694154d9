use core::fmt;

use actix_web::{http::StatusCode, HttpResponse, ResponseError};

pub(crate) fn json_error_with_code(
    status: StatusCode,
    message: impl Into<String>,
    error_code: Option<&str>,
) -> HttpResponse {
    let mut body = serde_json::json!({
        "success": false,
        "error": message.into(),
    });
    if let Some(code) = error_code {
        body["error_code"] = serde_json::Value::String(code.to_string());
    }
    HttpResponse::build(status).json(body)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ApiError {
    Unauthenticated(String),
    PermissionDenied(String),
    InvalidArgument(String),
    NotFound(String),
    FailedPrecondition(String),
    ResourceExhausted(String),
    /// The message is logged, never sent to the client.
    Internal(String),
}

impl ApiError {
    /// Logs a store failure and hides it behind a generic internal error.
    pub(crate) fn internal(context: &str, err: impl fmt::Display) -> Self {
        tracing::error!("{context}: {err}");
        Self::Internal(format!("{context}: {err}"))
    }

    pub(crate) fn code(&self) -> &'static str {
        match self {
            Self::Unauthenticated(_) => "unauthenticated",
            Self::PermissionDenied(_) => "permission-denied",
            Self::InvalidArgument(_) => "invalid-argument",
            Self::NotFound(_) => "not-found",
            Self::FailedPrecondition(_) => "failed-precondition",
            Self::ResourceExhausted(_) => "resource-exhausted",
            Self::Internal(_) => "internal",
        }
    }

    fn client_message(&self) -> &str {
        match self {
            Self::Unauthenticated(msg)
            | Self::PermissionDenied(msg)
            | Self::InvalidArgument(msg)
            | Self::NotFound(msg)
            | Self::FailedPrecondition(msg)
            | Self::ResourceExhausted(msg) => msg,
            Self::Internal(_) => "internal error",
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Internal(msg) => write!(f, "{}: {msg}", self.code()),
            other => write!(f, "{}: {}", other.code(), other.client_message()),
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            Self::PermissionDenied(_) => StatusCode::FORBIDDEN,
            Self::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::FailedPrecondition(_) => StatusCode::PRECONDITION_FAILED,
            Self::ResourceExhausted(_) => StatusCode::TOO_MANY_REQUESTS,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        json_error_with_code(self.status_code(), self.client_message(), Some(self.code()))
    }
}
