//! An abstraction layer for streaming completion providers.
//!
//! The gateway only needs one thing from a language model: given a prompt,
//! a lazy and finite sequence of text fragments in the order they were
//! generated. This crate pins down that contract so that the gateway can
//! relay any provider without knowing which one sits behind it.
//!
//! Types in this crate don't define any behavior, instead they are the
//! constraints that the implementors should adhere to.

#![deny(missing_docs)]

mod error;
mod provider;
mod request;
mod response;

pub use error::*;
pub use provider::*;
pub use request::*;
pub use response::*;
