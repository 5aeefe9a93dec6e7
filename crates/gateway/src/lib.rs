//! HTTP gateway relaying answers from a completion provider as a plain
//! text stream.

#[macro_use]
extern crate tracing;

mod completion;
mod error;
mod server;

pub use completion::{CompletionClient, CompletionError, Fragments};
pub use error::GatewayError;
pub use server::{
    GatewayConfig, GatewayState, router, serve, serve_with_listener,
};
