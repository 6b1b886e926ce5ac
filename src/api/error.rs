use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::fmt;

use super::ApiResponse;
use crate::services::{AuthError, ContentError, MembershipError};

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),

    ValidationError(String),

    Unauthorized(String),

    /// 403 with an optional machine-readable code so clients can branch on
    /// specific refusals without parsing the message.
    Forbidden {
        message: String,
        code: Option<&'static str>,
    },

    Conflict(String),

    UpstreamError(String),

    DatabaseError(String),

    InternalError(String),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound(msg) => write!(f, "Not found: {msg}"),
            Self::ValidationError(msg) => write!(f, "Validation error: {msg}"),
            Self::Unauthorized(msg) => write!(f, "Unauthorized: {msg}"),
            Self::Forbidden { message, .. } => write!(f, "Forbidden: {message}"),
            Self::Conflict(msg) => write!(f, "Conflict: {msg}"),
            Self::UpstreamError(msg) => write!(f, "Upstream error: {msg}"),
            Self::DatabaseError(msg) => write!(f, "Database error: {msg}"),
            Self::InternalError(msg) => write!(f, "Internal error: {msg}"),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message, code) = match self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg, None),
            Self::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg, None),
            Self::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg, None),
            Self::Forbidden { message, code } => (StatusCode::FORBIDDEN, message, code),
            Self::Conflict(msg) => (StatusCode::CONFLICT, msg, None),
            Self::UpstreamError(msg) => {
                tracing::warn!("Upstream error: {msg}");
                (
                    StatusCode::BAD_GATEWAY,
                    "An upstream service is unavailable".to_string(),
                    None,
                )
            }
            Self::DatabaseError(msg) => {
                tracing::error!("Database error: {msg}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "A database error occurred".to_string(),
                    None,
                )
            }
            Self::InternalError(msg) => {
                tracing::error!("Internal error: {msg}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal error occurred".to_string(),
                    None,
                )
            }
        };

        let body = code.map_or_else(
            || ApiResponse::<()>::error(message.clone()),
            |code| ApiResponse::<()>::error_with_code(message.clone(), code),
        );
        (status, Json(body)).into_response()
    }
}

impl ApiError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ValidationError(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden {
            message: msg.into(),
            code: None,
        }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::InternalError(msg.into())
    }

    pub fn mural_not_found() -> Self {
        Self::NotFound("Mural not found".to_string())
    }

    pub fn post_not_found() -> Self {
        Self::NotFound("Post not found".to_string())
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::InternalError(format!("{err:#}"))
    }
}

impl From<MembershipError> for ApiError {
    fn from(err: MembershipError) -> Self {
        match err {
            MembershipError::MuralNotFound => Self::mural_not_found(),
            MembershipError::Forbidden => Self::forbidden(err.to_string()),
            MembershipError::CreatorMustTransfer => Self::Forbidden {
                message: err.to_string(),
                code: Some("creator_must_transfer"),
            },
            MembershipError::CreatorImmune => Self::Forbidden {
                message: err.to_string(),
                code: Some("creator_immune"),
            },
            MembershipError::DuplicateRequest => Self::Conflict(err.to_string()),
            MembershipError::TargetNotMember | MembershipError::NotAMember => {
                Self::ValidationError(err.to_string())
            }
            MembershipError::Internal(e) => Self::from(e),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::EmailTaken => Self::Conflict(err.to_string()),
            AuthError::InvalidCredentials => Self::Unauthorized(err.to_string()),
            AuthError::Locked => Self::Forbidden {
                message: err.to_string(),
                code: Some("account_locked"),
            },
            AuthError::Validation(msg) => Self::ValidationError(msg),
            AuthError::TokenInvalid | AuthError::TokenExpired | AuthError::CaptchaFailed => {
                Self::ValidationError(err.to_string())
            }
            AuthError::Internal(e) => Self::from(e),
        }
    }
}

impl From<ContentError> for ApiError {
    fn from(err: ContentError) -> Self {
        match err {
            ContentError::PostNotFound => Self::post_not_found(),
            ContentError::Validation(msg) => Self::ValidationError(msg),
            ContentError::Inconsistent => Self::internal(err.to_string()),
            ContentError::Internal(e) => Self::from(e),
        }
    }
}
