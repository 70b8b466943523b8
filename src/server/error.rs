use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tracing::error;

use crate::error::RepurposeError;

/// Maps crate errors onto HTTP responses with a JSON `{error}` body.
#[derive(Debug)]
pub struct ApiError(pub RepurposeError);

impl From<RepurposeError> for ApiError {
    fn from(err: RepurposeError) -> Self {
        Self(err)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match &self.0 {
            RepurposeError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            RepurposeError::NotFound { .. } => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self.0, "request failed");
        }
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_argument_is_bad_request() {
        let resp = ApiError(RepurposeError::InvalidArgument("Drug name is required".into()))
            .into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn io_failure_is_internal_error() {
        let resp = ApiError(RepurposeError::Io(std::io::Error::other("disk full"))).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
