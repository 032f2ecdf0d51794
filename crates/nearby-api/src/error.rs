use axum::{
    Json,
    extract::rejection::{JsonRejection, QueryRejection},
    http::{HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

use nearby_types::api::ErrorBody;

/// Response header carrying the stable machine-readable error code.
pub const ERROR_CODE_HEADER: &str = "error-code";

/// Why a login was refused. Logged for operators; never rendered
/// differently to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialFailure {
    UnknownEmail,
    WrongPassword,
}

impl CredentialFailure {
    pub fn code(self) -> &'static str {
        match self {
            CredentialFailure::UnknownEmail => "no-such-account",
            CredentialFailure::WrongPassword => "wrong-password",
        }
    }
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("Authentication required")]
    Unauthenticated,

    #[error("Invalid email or password")]
    InvalidCredentials(CredentialFailure),

    #[error("Not found")]
    NotFound,

    #[error("Post not found")]
    PostNotFound,

    #[error("Email already registered")]
    DuplicateEmail,

    #[error("Internal error: {0:#}")]
    Internal(anyhow::Error),
}

impl ApiError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        ApiError::InvalidInput(msg.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthenticated | ApiError::InvalidCredentials(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound | ApiError::PostNotFound => StatusCode::NOT_FOUND,
            ApiError::DuplicateEmail => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::InvalidInput(_) => "invalid-input",
            ApiError::Unauthenticated => "unauthenticated",
            ApiError::InvalidCredentials(_) => "invalid-credentials",
            ApiError::NotFound => "not-found",
            ApiError::PostNotFound => "post-not-found",
            ApiError::DuplicateEmail => "duplicate-email",
            ApiError::Internal(_) => "internal",
        }
    }

    /// Client-facing message. Internal details stay in the logs.
    fn public_message(&self) -> String {
        match self {
            ApiError::Internal(_) => "Internal error".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Internal(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::InvalidInput(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::InvalidInput(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Internal(err) = &self {
            error!("{:#}", err);
        }

        let code = self.code();
        let body = ErrorBody {
            error: code.to_string(),
            message: self.public_message(),
        };

        (
            self.status(),
            [(HeaderName::from_static(ERROR_CODE_HEADER), HeaderValue::from_static(code))],
            Json(body),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credential_failures_render_identically() {
        let unknown = ApiError::InvalidCredentials(CredentialFailure::UnknownEmail);
        let wrong = ApiError::InvalidCredentials(CredentialFailure::WrongPassword);

        assert_eq!(unknown.status(), wrong.status());
        assert_eq!(unknown.code(), wrong.code());
        assert_eq!(unknown.public_message(), wrong.public_message());
        assert_ne!(
            CredentialFailure::UnknownEmail.code(),
            CredentialFailure::WrongPassword.code()
        );
    }

    #[test]
    fn internal_details_are_not_public() {
        let err = ApiError::from(anyhow::anyhow!("disk I/O error at /var/db"));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!err.public_message().contains("/var/db"));
    }

    #[test]
    fn response_carries_error_code_header() {
        let response = ApiError::DuplicateEmail.into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(response.headers()[ERROR_CODE_HEADER], "duplicate-email");
    }
}
