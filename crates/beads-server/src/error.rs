//! HTTP error mapping.
//!
//! Body shape: `{"error": {"code", "kind", "message", "hint"?, "candidates"?}}`.

use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use beads_core::{ErrorCode, ErrorKind, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Malformed request before it reaches the store.
    #[error("{0}")]
    BadRequest(String),
    #[error("missing or unrecognized bearer token")]
    Unauthorized,
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Store(err) => match err.kind() {
                ErrorKind::NotFound => StatusCode::NOT_FOUND,
                ErrorKind::Ambiguous | ErrorKind::Invalid => StatusCode::BAD_REQUEST,
                ErrorKind::Conflict => StatusCode::CONFLICT,
                ErrorKind::Persist => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    const fn kind(&self) -> &'static str {
        match self {
            Self::Store(err) => err.kind().as_str(),
            Self::BadRequest(_) => ErrorKind::Invalid.as_str(),
            Self::Unauthorized => "unauthorized",
            Self::Internal(_) => "internal",
        }
    }

    fn code(&self) -> Option<ErrorCode> {
        match self {
            Self::Store(err) => Some(err.code()),
            Self::BadRequest(_) => Some(ErrorCode::InvalidInput),
            Self::Unauthorized => None,
            Self::Internal(_) => Some(ErrorCode::InternalUnexpected),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: ErrorDetail<'a>,
}

#[derive(Serialize)]
struct ErrorDetail<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<&'static str>,
    kind: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    hint: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    candidates: Option<&'a [String]>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let candidates = match &self {
            Self::Store(StoreError::Ambiguous { candidates, .. }) => Some(candidates.as_slice()),
            _ => None,
        };
        let code = self.code();
        let body = ErrorBody {
            error: ErrorDetail {
                code: code.map(ErrorCode::code),
                kind: self.kind(),
                message: self.to_string(),
                hint: code.and_then(ErrorCode::hint),
                candidates,
            },
        };
        (status, Json(body)).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_kinds_map_to_statuses() {
        let cases = [
            (StoreError::not_found("bd-x"), StatusCode::NOT_FOUND),
            (StoreError::invalid("bad"), StatusCode::BAD_REQUEST),
            (StoreError::cycle("a -> b -> a"), StatusCode::BAD_REQUEST),
            (StoreError::conflict("busy"), StatusCode::CONFLICT),
            (
                StoreError::Ambiguous {
                    prefix: "bd-a".into(),
                    candidates: vec!["bd-ab".into(), "bd-ac".into()],
                },
                StatusCode::BAD_REQUEST,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
        assert_eq!(ApiError::Unauthorized.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn unauthorized_has_no_code() {
        assert_eq!(ApiError::Unauthorized.code(), None);
        assert_eq!(ApiError::Unauthorized.kind(), "unauthorized");
    }
}
