//! API error type and its mapping onto structured responses.

use axum::extract::rejection::{BytesRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response as AxumResponse};
use axum::Json;
use hostdb_protocol::{ErrorKind, Response};
use thiserror::Error;

use crate::command::DispatchError;
use crate::delete::{DeleteError, INTERNAL_ERROR_MESSAGE};

/// Errors returned by API handlers.
///
/// Every variant is rendered as a [`Response`] payload; the HTTP status is
/// informational.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error(transparent)]
    Delete(#[from] DeleteError),

    /// The query string could not be decoded.
    #[error("invalid query string: {0}")]
    InvalidQuery(String),

    /// The request body could not be read (e.g. it exceeds the size limit).
    #[error("invalid request body: {reason}")]
    InvalidBody { status: StatusCode, reason: String },

    #[error("method not allowed")]
    MethodNotAllowed,

    #[error("unknown path")]
    UnknownPath,

    #[error("request timed out")]
    Timeout,

    /// Failure outside the delete handlers (e.g. a panicked blocking task).
    #[error("internal error: {0}")]
    Internal(String),
}

const INVALID_QUERY_MESSAGE: &str = "Invalid query string!";
const INVALID_BODY_MESSAGE: &str = "Invalid request body!";
const METHOD_NOT_ALLOWED_MESSAGE: &str = "Method not allowed!";
const UNKNOWN_PATH_MESSAGE: &str = "Unknown path!";
const TIMEOUT_MESSAGE: &str = "Request timed out!";

impl ApiError {
    fn kind(&self) -> Option<ErrorKind> {
        match self {
            ApiError::Dispatch(DispatchError::MissingArgument) => Some(ErrorKind::MissingArgument),
            ApiError::Dispatch(DispatchError::UnknownItem(_)) => Some(ErrorKind::UnknownItem),
            ApiError::Dispatch(DispatchError::InvalidArgumentCount(_)) => {
                Some(ErrorKind::InvalidArgumentCount)
            }
            ApiError::Delete(e) => e.kind(),
            ApiError::InvalidQuery(_) | ApiError::InvalidBody { .. } => Some(ErrorKind::BadRequest),
            ApiError::MethodNotAllowed => Some(ErrorKind::MethodNotAllowed),
            ApiError::UnknownPath => Some(ErrorKind::NotFound),
            ApiError::Timeout => Some(ErrorKind::Timeout),
            ApiError::Internal(_) => Some(ErrorKind::InternalError),
        }
    }

    /// Client-facing payload.
    pub fn to_response(&self) -> Response {
        match self {
            ApiError::Dispatch(e) => Response::error(self.kind_or_internal(), e.to_string()),
            ApiError::Delete(e) => e.to_response(),
            ApiError::InvalidQuery(_) => Response::error(ErrorKind::BadRequest, INVALID_QUERY_MESSAGE),
            ApiError::InvalidBody { .. } => Response::error(ErrorKind::BadRequest, INVALID_BODY_MESSAGE),
            ApiError::MethodNotAllowed => {
                Response::error(ErrorKind::MethodNotAllowed, METHOD_NOT_ALLOWED_MESSAGE)
            }
            ApiError::UnknownPath => Response::error(ErrorKind::NotFound, UNKNOWN_PATH_MESSAGE),
            ApiError::Timeout => Response::error(ErrorKind::Timeout, TIMEOUT_MESSAGE),
            ApiError::Internal(_) => Response::error(ErrorKind::InternalError, INTERNAL_ERROR_MESSAGE),
        }
    }

    fn kind_or_internal(&self) -> ErrorKind {
        self.kind().unwrap_or(ErrorKind::InternalError)
    }

    fn status(&self) -> StatusCode {
        if let ApiError::InvalidBody { status, .. } = self {
            return *status;
        }
        let Some(kind) = self.kind() else {
            return StatusCode::UNAUTHORIZED;
        };
        match kind {
            ErrorKind::MissingArgument
            | ErrorKind::UnknownItem
            | ErrorKind::InvalidArgumentCount
            | ErrorKind::BadRequest => StatusCode::BAD_REQUEST,
            ErrorKind::ValidationError => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorKind::Forbidden => StatusCode::FORBIDDEN,
            ErrorKind::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ErrorKind::Timeout => StatusCode::REQUEST_TIMEOUT,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::PreconditionFailed => StatusCode::PRECONDITION_FAILED,
            ErrorKind::ConfigurationError => StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        tracing::debug!(error = %rejection.body_text(), "rejected query string");
        ApiError::InvalidQuery(rejection.body_text())
    }
}

impl From<BytesRejection> for ApiError {
    fn from(rejection: BytesRejection) -> Self {
        tracing::debug!(error = %rejection.body_text(), "rejected request body");
        ApiError::InvalidBody {
            status: rejection.status(),
            reason: rejection.body_text(),
        }
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(e: tokio::task::JoinError) -> Self {
        tracing::error!(error = %e, "blocking task failed");
        ApiError::Internal(e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> AxumResponse {
        (self.status(), Json(self.to_response())).into_response()
    }
}
