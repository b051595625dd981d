//! Error types for the HTTP surface.
//!
//! Every failure leaves the server as `{"code": "...", "message": "..."}`.
//!
//! ```text
//! DbError ──kind()──► ErrorKind ──► ErrorCode ──► HTTP status
//!                      Validation      validation       400
//!                      (missing id)    unauthenticated  401
//!                      Forbidden       forbidden        403
//!                      NotFound        not_found        404
//!                      Conflict        conflict         409
//!                      Unavailable     unavailable      503  (message hidden)
//!                      Internal        internal         500  (message hidden)
//! ```

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use kosh_core::{CoreError, ErrorKind, ValidationError};
use kosh_db::DbError;

/// Machine-readable error class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    Validation,
    Unauthenticated,
    Forbidden,
    NotFound,
    Conflict,
    Unavailable,
    Internal,
}

impl ErrorCode {
    pub fn status(&self) -> StatusCode {
        match self {
            ErrorCode::Validation => StatusCode::BAD_REQUEST,
            ErrorCode::Unauthenticated => StatusCode::UNAUTHORIZED,
            ErrorCode::Forbidden => StatusCode::FORBIDDEN,
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::Conflict => StatusCode::CONFLICT,
            ErrorCode::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn is_server_error(&self) -> bool {
        matches!(self, ErrorCode::Unavailable | ErrorCode::Internal)
    }
}

impl From<ErrorKind> for ErrorCode {
    fn from(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::Validation => ErrorCode::Validation,
            ErrorKind::Forbidden => ErrorCode::Forbidden,
            ErrorKind::NotFound => ErrorCode::NotFound,
            ErrorKind::Conflict => ErrorCode::Conflict,
            ErrorKind::Unavailable => ErrorCode::Unavailable,
            ErrorKind::Internal => ErrorCode::Internal,
        }
    }
}

/// API error: a code and a message for the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{code:?}: {message}")]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        ApiError {
            code,
            message: message.into(),
        }
    }

    pub fn unauthenticated(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::Unauthenticated, message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::Validation, message)
    }
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        let code = ErrorCode::from(err.kind());

        if code.is_server_error() {
            error!(error = %err, ?code, "Request failed");
            let message = match code {
                ErrorCode::Unavailable => "Service temporarily unavailable",
                _ => "Internal server error",
            };
            return ApiError::new(code, message);
        }

        if matches!(err, DbError::Busy) {
            warn!("Write lock contention outlasted the retry budget");
        }

        ApiError::new(code, err.to_string())
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        ApiError::from(DbError::from(err))
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::validation(err.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::validation(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::validation(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.code.status(), Json(self)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_to_status() {
        let cases = [
            (ErrorKind::Validation, StatusCode::BAD_REQUEST),
            (ErrorKind::Forbidden, StatusCode::FORBIDDEN),
            (ErrorKind::NotFound, StatusCode::NOT_FOUND),
            (ErrorKind::Conflict, StatusCode::CONFLICT),
            (ErrorKind::Unavailable, StatusCode::SERVICE_UNAVAILABLE),
            (ErrorKind::Internal, StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (kind, status) in cases {
            assert_eq!(ErrorCode::from(kind).status(), status);
        }
    }

    #[test]
    fn test_server_errors_are_opaque() {
        let err = ApiError::from(DbError::QueryFailed("no such table: orders".to_string()));
        assert_eq!(err.code, ErrorCode::Internal);
        assert!(!err.message.contains("orders"));

        let err = ApiError::from(DbError::PoolExhausted);
        assert_eq!(err.code, ErrorCode::Unavailable);
    }

    #[test]
    fn test_client_errors_keep_detail() {
        let err = ApiError::from(CoreError::InvoiceAlreadyIssued {
            order_number: "ORD2026100001".to_string(),
            invoice_number: "INV2026100001".to_string(),
        });
        assert_eq!(err.code, ErrorCode::Conflict);
        assert!(err.message.contains("INV2026100001"));
    }

    #[test]
    fn test_lock_contention_is_conflict() {
        let err = ApiError::from(DbError::Busy);
        assert_eq!(err.code, ErrorCode::Conflict);
        assert_eq!(err.code.status(), StatusCode::CONFLICT);
    }
}
