//! Error types for the registry

use axum::extract::rejection::PathRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use storage::{StorageError, StorageErrorKind};

/// Result type for registry operations
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Error types for registry operations
///
/// Malformed keys never show up here: they are skipped while the catalog is
/// built. Only failures to reach the store, or bad request paths, end a request.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// The object store could not be listed
    #[error("object store unavailable: {0}")]
    StoreUnavailable(#[from] StorageError),

    /// Invalid provider namespace or type
    #[error("invalid provider address: {0}")]
    InvalidProvider(String),

    /// The background scan ended without producing a result
    #[error("catalog scan failed: {0}")]
    ScanAborted(#[from] tokio::task::JoinError),
}

impl RegistryError {
    /// Get the HTTP status code for this error
    ///
    /// Store failures originate upstream of the registry, so they map to
    /// gateway statuses rather than blaming the request.
    pub fn status_code(&self) -> StatusCode {
        match self {
            RegistryError::StoreUnavailable(err) => match err.kind() {
                StorageErrorKind::TimedOut => StatusCode::GATEWAY_TIMEOUT,
                StorageErrorKind::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
                _ => StatusCode::BAD_GATEWAY,
            },
            RegistryError::InvalidProvider(_) => StatusCode::BAD_REQUEST,
            RegistryError::ScanAborted(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Registry protocol error body
#[derive(Debug, serde::Serialize)]
struct ErrorResponse {
    status: u16,
    message: String,
}

impl From<PathRejection> for RegistryError {
    fn from(rejection: PathRejection) -> Self {
        RegistryError::InvalidProvider(rejection.body_text())
    }
}

impl IntoResponse for RegistryError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if let RegistryError::StoreUnavailable(err) = &self {
            tracing::error!(
                error = %self,
                engine = err.engine(),
                spantrace = %err.span_trace(),
                "request failed"
            );
        } else if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, "request rejected");
        }

        let body = ErrorResponse {
            status: status.as_u16(),
            message: self.to_string(),
        };

        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_error(kind: StorageErrorKind) -> RegistryError {
        StorageError::builder(
            "memory",
            kind,
            std::io::Error::other("connection reset by peer"),
        )
        .bucket("tfindex")
        .build()
        .into()
    }

    #[test]
    fn store_failures_are_upstream_errors() {
        assert_eq!(
            store_error(StorageErrorKind::Io).status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            store_error(StorageErrorKind::PermissionDenied).status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            store_error(StorageErrorKind::TimedOut).status_code(),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            store_error(StorageErrorKind::ServiceUnavailable).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn message_carries_cause() {
        let message = store_error(StorageErrorKind::Io).to_string();
        assert!(message.starts_with("object store unavailable: "));
        assert!(message.contains("connection reset by peer"));
    }

    #[tokio::test]
    async fn response_body_has_status_and_message() {
        let response = RegistryError::InvalidProvider("..".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"status": 400, "message": "invalid provider address: .."})
        );
    }
}
