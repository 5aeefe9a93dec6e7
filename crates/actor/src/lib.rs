//! A lightweight actor framework.
//!
//! An actor owns a piece of state and processes messages sent to it one
//! by one on a tokio task, which makes it a natural home for state
//! machines that are driven by timers and I/O running elsewhere.

#![deny(missing_docs)]

#[macro_use]
extern crate tracing;

mod error;
mod handle;
mod macros;
mod mailbox;
mod scheduler;

pub use error::ActorStoppedError;
pub use handle::{Actor, WeakActor};
pub use mailbox::Message;
