//! HTTP error responses in JSON:API form.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::gist::GistError;
use crate::registration::{ErrorClass, RegistrationError};
use crate::uniqueness::UniquenessError;

const INTERNAL_DETAIL: &str = "internal server error";

#[derive(Debug, Serialize)]
pub struct ErrorObject {
    pub title: String,
    pub status: String,
    pub code: String,
    pub detail: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub errors: Vec<ErrorObject>,
}

/// An error rendered as an HTTP response. Internal causes are logged when the
/// error is built and never sent to the client.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub detail: String,
}

impl ApiError {
    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            code: "bad_request",
            detail: detail.into(),
        }
    }

    pub fn conflict(code: &'static str, detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::CONFLICT,
            code,
            detail: detail.into(),
        }
    }

    pub fn not_implemented(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_IMPLEMENTED,
            code: "not_implemented",
            detail: detail.into(),
        }
    }

    pub fn internal(cause: &dyn std::fmt::Display) -> Self {
        tracing::error!(error = %cause, "request failed");
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: "internal_error",
            detail: INTERNAL_DETAIL.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            errors: vec![ErrorObject {
                title: self
                    .status
                    .canonical_reason()
                    .unwrap_or("Error")
                    .to_string(),
                status: self.status.as_u16().to_string(),
                code: self.code.to_string(),
                detail: self.detail,
            }],
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<RegistrationError> for ApiError {
    fn from(err: RegistrationError) -> Self {
        match err.class() {
            ErrorClass::Validation => {
                tracing::info!(error = %err, "registration rejected");
                Self::bad_request(err.to_string())
            }
            ErrorClass::Conflict => {
                tracing::info!(error = %err, "registration rejected");
                Self::conflict("document_banned", err.to_string())
            }
            ErrorClass::Internal => Self::internal(&err),
        }
    }
}

impl From<UniquenessError> for ApiError {
    fn from(err: UniquenessError) -> Self {
        Self::internal(&err)
    }
}

impl From<GistError> for ApiError {
    fn from(err: GistError) -> Self {
        match err {
            GistError::BlockAhead { .. } => Self::bad_request(err.to_string()),
            GistError::Source(_) => Self::internal(&err),
        }
    }
}
