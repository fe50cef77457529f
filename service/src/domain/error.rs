use crate::domain::error::ErrorResponse::{NotFoundError, StoreFailure, ValidationError};
use crate::router::full;
use http_body_util::combinators::BoxBody;
use hyper::body::Bytes;
use hyper::{Response, StatusCode};
use std::error;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorResponse {
    /// Malformed, missing or oversized input. Nothing was written.
    ValidationError { reason: String },
    /// The id was never issued or has been deleted.
    NotFoundError { id: i64 },
    /// The store could not complete the statement. Safe to retry.
    StoreFailure { reason: String },
}

impl ErrorResponse {
    pub fn validation(reason: impl Into<String>) -> ErrorResponse {
        ValidationError {
            reason: reason.into(),
        }
    }

    pub fn handle(&self) -> hyper::http::Result<Response<BoxBody<Bytes, hyper::Error>>> {
        match self {
            ValidationError { reason } => error_response(StatusCode::BAD_REQUEST, reason.clone()),
            NotFoundError { .. } => error_response(StatusCode::NOT_FOUND, self.to_string()),
            StoreFailure { .. } => error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Image store unavailable.".to_string(),
            ),
        }
    }
}

impl Display for ErrorResponse {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError { reason } => write!(f, "Invalid request: {reason}"),
            NotFoundError { id } => write!(f, "Image {id} not found."),
            StoreFailure { reason } => write!(f, "Image store failure: {reason}"),
        }
    }
}

impl error::Error for ErrorResponse {}

fn error_response(
    status_code: StatusCode,
    message: String,
) -> hyper::http::Result<Response<BoxBody<Bytes, hyper::Error>>> {
    Response::builder()
        .status(status_code)
        .header("content-type", "text/plain; charset=utf-8")
        .body(full(message))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_maps_to_bad_request_with_reason() {
        let response = ErrorResponse::validation("file required").handle().unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn not_found_maps_to_404() {
        let response = NotFoundError { id: 7 }.handle().unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn store_failure_hides_the_cause() {
        let failure = StoreFailure {
            reason: "disk I/O error".to_string(),
        };
        let response = failure.handle().unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(failure.to_string(), "Image store failure: disk I/O error");
    }
}
