//! An out-of-the-box relaychat assembly: the gateway backed by an
//! OpenAI-compatible provider, and a terminal front-end for the chat
//! session.
//!
//! The crate includes a CLI tool for using in the terminal. And you can also
//! use it as a library to embed the pieces in your own host apps.

#![deny(missing_docs)]

#[macro_use]
extern crate tracing;

mod printer;

pub use printer::TranscriptPrinter;
use relaychat_gateway::{CompletionClient, GatewayState};
use relaychat_openai_model::{OpenAIConfig, OpenAIProvider};

/// Creates gateway state answering with an OpenAI-compatible provider.
pub fn openai_gateway_state(config: OpenAIConfig) -> GatewayState {
    debug!("using model {} at {}", config.model(), config.base_url());
    GatewayState::new(CompletionClient::new(OpenAIProvider::new(config)))
}

/// Re-exports of [`relaychat_core`] crate.
pub mod core {
    pub use relaychat_core::*;
}

/// Re-exports of [`relaychat_gateway`] crate.
pub mod gateway {
    pub use relaychat_gateway::*;
}
