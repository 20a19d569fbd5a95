//! Error types for the HTTP API.
//!
//! [`ApiError`] unifies request validation failures and engine errors
//! into a single enum that can be converted into an Axum HTTP response
//! via its [`IntoResponse`](axum::response::IntoResponse) implementation.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use geolens_core::{CoreError, StoreError};

/// Errors that can occur in the API layer.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// An engine operation failed.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A path segment or query parameter could not be parsed.
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// A response body could not be serialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ApiError {
    /// The HTTP status this error is reported with.
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::InvalidQuery(_)
            | Self::Core(CoreError::InvalidInput(_) | CoreError::InvalidGeometry(_)) => {
                StatusCode::BAD_REQUEST
            }
            Self::Core(CoreError::NotFound { .. }) => StatusCode::NOT_FOUND,
            Self::Core(CoreError::Backend { source, .. }) => match source {
                StoreError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
                StoreError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
                StoreError::Query(_) | StoreError::Codec(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Core(CoreError::Serialization(_)) | Self::Serialization(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = serde_json::json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        });

        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use geolens_types::{GeometryError, LayerType};

    use super::*;

    #[test]
    fn engine_errors_map_to_status_codes() {
        let cases = [
            (CoreError::not_found(LayerType::City, "Atlantis"), StatusCode::NOT_FOUND),
            (CoreError::InvalidInput(String::from("radius")), StatusCode::BAD_REQUEST),
            (CoreError::InvalidGeometry(GeometryError::Empty), StatusCode::BAD_REQUEST),
            (
                CoreError::backend(
                    "fetch_centroid",
                    LayerType::City,
                    "Austin",
                    StoreError::Unavailable(String::from("refused")),
                ),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                CoreError::backend(
                    "fetch_centroid",
                    LayerType::City,
                    "Austin",
                    StoreError::Timeout(Duration::from_secs(2)),
                ),
                StatusCode::GATEWAY_TIMEOUT,
            ),
            (
                CoreError::Serialization(String::from("eof")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
    }

    #[test]
    fn invalid_query_is_bad_request() {
        let err = ApiError::InvalidQuery(String::from("distance must be a number"));
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }
}
