use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::completion::CompletionError;

/// Errors a request handler can answer with.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// The request carried no usable question.
    #[error("no question provided")]
    MissingInput,
    /// The provider failed before producing anything.
    #[error("provider failed: {0}")]
    Provider(#[from] CompletionError),
}

impl GatewayError {
    fn status(&self) -> StatusCode {
        match self {
            Self::MissingInput => StatusCode::BAD_REQUEST,
            Self::Provider(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn public_message(&self) -> &'static str {
        match self {
            Self::MissingInput => "No question provided",
            Self::Provider(_) => "Error generating response",
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let body = Json(json!({ "error": self.public_message() }));
        (self.status(), body).into_response()
    }
}
