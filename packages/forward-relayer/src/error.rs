//! Error types for the relayer.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

/// Infrastructure error: anything that is not a verdict on the request itself.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),
    /// RPC communication error.
    #[error("rpc error: {0}")]
    Rpc(String),
    /// Relayer key or transaction signing error.
    #[error("signer error: {0}")]
    Signer(String),
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match &self {
            Error::Config(_) | Error::Signer(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Rpc(_) => StatusCode::BAD_GATEWAY,
        };
        let body = serde_json::json!({
            "success": false,
            "error": self.to_string()
        });
        (status, Json(body)).into_response()
    }
}
