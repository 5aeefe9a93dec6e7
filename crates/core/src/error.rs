//! Error types.

use std::time::Duration;

use reqwest::StatusCode;

use crate::network::NetworkStatus;

/// Failure reported by a [`crate::Transport`].
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The server answered with a non-success status.
    #[error("HTTP {0}")]
    Http(StatusCode),
    /// The server could not be reached.
    #[error("server unreachable: {0}")]
    Unreachable(String),
    /// Reading the response body failed.
    #[error("response body failed: {0}")]
    Body(String),
    /// Any other failure.
    #[error("{0}")]
    Other(String),
}

/// Why a single attempt at answering a question failed.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum AttemptError {
    /// The server did not respond in time.
    #[error("no response within {0:?}")]
    ConnectTimeout(Duration),
    /// The response body stalled.
    #[error("no data received for {0:?}")]
    StreamTimeout(Duration),
    /// The response body ended without any data.
    #[error("empty response body")]
    EmptyBody,
    /// The transport failed.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl AttemptError {
    /// Returns the message shown to the user once retries are exhausted.
    ///
    /// Timeouts take precedence over HTTP errors, which take precedence
    /// over the network being offline.
    pub fn user_message(&self, network: NetworkStatus) -> String {
        match self {
            Self::ConnectTimeout(_) | Self::StreamTimeout(_) => {
                "Request timeout. Check your network.".to_owned()
            }
            Self::Transport(TransportError::Http(status)) => {
                format!("Server error: HTTP {status}")
            }
            _ if !network.is_online() => {
                "Network offline. Check your internet.".to_owned()
            }
            _ => "Connection failed. Try again later".to_owned(),
        }
    }
}

/// Error returned when a question cannot be submitted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SubmitError {
    /// The question is empty or whitespace only.
    #[error("no question provided")]
    MissingInput,
    /// The session has been closed.
    #[error("the chat session has been closed")]
    SessionClosed,
}
