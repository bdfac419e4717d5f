use std::sync::atomic::{AtomicBool, Ordering};

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::types::ApiErrorResponse;

static EXPOSE_DETAILS: AtomicBool = AtomicBool::new(false);

/// Toggle whether internal error details are attached to responses.
/// Only development deployments should turn this on.
pub fn set_expose_details(expose: bool) {
    EXPOSE_DETAILS.store(expose, Ordering::Relaxed);
}

fn expose_details() -> bool {
    EXPOSE_DETAILS.load(Ordering::Relaxed)
}

/// Coarse error taxonomy. Every [`ErrorCode`] belongs to exactly one kind,
/// and the kind alone decides the HTTP status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    Validation,
    Unauthenticated,
    Forbidden,
    NotFound,
    Conflict,
    Internal,
}

impl ErrorKind {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation => StatusCode::BAD_REQUEST,
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Conflict => StatusCode::CONFLICT,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Application error codes following the pattern E{area}{sequence}
///
/// Ranges:
/// - E0xxx: Shared/infrastructure errors
/// - E1xxx: Auth errors
/// - E2xxx: User errors
/// - E3xxx: Post, comment and like errors
/// - E4xxx: Follow errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    // Shared (E0xxx)
    InternalError,
    ValidationError,
    NotFound,
    Unauthorized,
    Forbidden,
    Conflict,

    // Auth (E1xxx)
    InvalidCredentials,
    EmailAlreadyExists,
    TokenExpired,
    TokenInvalid,
    PasswordTooWeak,

    // User (E2xxx)
    UserNotFound,
    NotProfileOwner,
    InvalidAvatar,
    AvatarUploadFailed,

    // Content (E3xxx)
    PostNotFound,
    NotPostAuthor,
    CommentNotFound,
    NotCommentModerator,
    LikeNotFound,
    NotLikeOwner,
    AlreadyLiked,

    // Follow (E4xxx)
    FollowNotFound,
    FollowAlreadyExists,
    CannotFollowSelf,
}

impl ErrorCode {
    pub fn code(&self) -> &'static str {
        match self {
            // Shared
            Self::InternalError => "E0001",
            Self::ValidationError => "E0002",
            Self::NotFound => "E0003",
            Self::Unauthorized => "E0004",
            Self::Forbidden => "E0005",
            Self::Conflict => "E0006",

            // Auth
            Self::InvalidCredentials => "E1001",
            Self::EmailAlreadyExists => "E1002",
            Self::TokenExpired => "E1003",
            Self::TokenInvalid => "E1004",
            Self::PasswordTooWeak => "E1005",

            // User
            Self::UserNotFound => "E2001",
            Self::NotProfileOwner => "E2002",
            Self::InvalidAvatar => "E2003",
            Self::AvatarUploadFailed => "E2004",

            // Content
            Self::PostNotFound => "E3001",
            Self::NotPostAuthor => "E3002",
            Self::CommentNotFound => "E3003",
            Self::NotCommentModerator => "E3004",
            Self::LikeNotFound => "E3005",
            Self::NotLikeOwner => "E3006",
            Self::AlreadyLiked => "E3007",

            // Follow
            Self::FollowNotFound => "E4001",
            Self::FollowAlreadyExists => "E4002",
            Self::CannotFollowSelf => "E4003",
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InternalError | Self::AvatarUploadFailed => ErrorKind::Internal,
            Self::ValidationError | Self::PasswordTooWeak | Self::InvalidAvatar
            | Self::CannotFollowSelf => ErrorKind::Validation,
            Self::NotFound | Self::UserNotFound | Self::PostNotFound | Self::CommentNotFound
            | Self::LikeNotFound | Self::FollowNotFound => ErrorKind::NotFound,
            Self::Unauthorized | Self::InvalidCredentials | Self::TokenExpired
            | Self::TokenInvalid => ErrorKind::Unauthenticated,
            Self::Forbidden | Self::NotProfileOwner | Self::NotPostAuthor
            | Self::NotCommentModerator | Self::NotLikeOwner => ErrorKind::Forbidden,
            Self::Conflict | Self::EmailAlreadyExists | Self::AlreadyLiked
            | Self::FollowAlreadyExists => ErrorKind::Conflict,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        self.kind().status_code()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{message}")]
    Known {
        code: ErrorCode,
        message: String,
        details: Option<serde_json::Value>,
    },

    #[error("internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Known {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(code: ErrorCode, message: impl Into<String>, details: serde_json::Value) -> Self {
        Self::Known {
            code,
            message: message.into(),
            details: Some(details),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ValidationError, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Conflict, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Known { code, .. } => code.kind(),
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// The fine-grained code, `InternalError` for opaque failures.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Known { code, .. } => *code,
            Self::Internal(_) => ErrorCode::InternalError,
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::validation(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        Self::validation(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.kind().status_code();

        let error_response = match self {
            AppError::Known { code, message, details } => {
                if status.is_server_error() {
                    tracing::error!(code = code.code(), status = status.as_u16(), "{message}");
                } else {
                    tracing::warn!(code = code.code(), status = status.as_u16(), "{message}");
                }
                let mut resp = ApiErrorResponse::new(code.code(), message, status);
                match details {
                    Some(d) if !status.is_server_error() || expose_details() => {
                        resp = resp.with_details(d);
                    }
                    _ => {}
                }
                resp
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "internal server error");
                let resp = ApiErrorResponse::new(
                    ErrorCode::InternalError.code(),
                    "internal server error",
                    status,
                );
                if expose_details() {
                    resp.with_details(serde_json::Value::String(format!("{err:#}")))
                } else {
                    resp
                }
            }
        };

        (status, Json(error_response)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_json(err: AppError) -> serde_json::Value {
        let response = err.into_response();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn envelope_carries_message_and_status() {
        let value = body_json(AppError::new(ErrorCode::PostNotFound, "post not found")).await;

        assert_eq!(value["error"]["code"], "E3001");
        assert_eq!(value["error"]["message"], "post not found");
        assert_eq!(value["error"]["status"], 404);
        assert!(value["error"].get("details").is_none());
    }

    #[tokio::test]
    async fn status_follows_kind() {
        let response = AppError::new(ErrorCode::AlreadyLiked, "already liked").into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let response = AppError::new(ErrorCode::CannotFollowSelf, "nope").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = AppError::new(ErrorCode::NotCommentModerator, "nope").into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn internal_errors_hide_their_cause() {
        set_expose_details(false);
        let value = body_json(AppError::from(anyhow::anyhow!("connection refused"))).await;

        assert_eq!(value["error"]["code"], "E0001");
        assert_eq!(value["error"]["message"], "internal server error");
        assert_eq!(value["error"]["status"], 500);
        assert!(value["error"].get("details").is_none());
    }

    #[test]
    fn every_code_maps_to_its_kind() {
        assert_eq!(ErrorCode::InvalidCredentials.kind(), ErrorKind::Unauthenticated);
        assert_eq!(ErrorCode::EmailAlreadyExists.kind(), ErrorKind::Conflict);
        assert_eq!(ErrorCode::FollowNotFound.kind(), ErrorKind::NotFound);
        assert_eq!(ErrorCode::AvatarUploadFailed.kind(), ErrorKind::Internal);
        assert_eq!(AppError::from(anyhow::anyhow!("x")).kind(), ErrorKind::Internal);
    }
}
