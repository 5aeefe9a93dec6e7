//! Client side of relaychat: asks questions over a streaming transport,
//! retries failed attempts and reveals answers like a typewriter.

#![deny(missing_docs)]
#![deny(clippy::missing_safety_doc)]

#[macro_use]
extern crate tracing;

mod config;
pub mod conversation;
mod decoder;
mod error;
mod network;
mod session;
mod transport;
mod typewriter;
mod view;

pub use config::{PartialReplyPolicy, SessionConfig, SessionConfigBuilder};
pub use decoder::Utf8Decoder;
pub use error::{AttemptError, SubmitError, TransportError};
pub use network::{NetworkMonitor, NetworkStatus, NetworkSwitch};
pub use session::{ChatSession, ChatSessionBuilder};
pub use transport::{HttpBody, HttpTransport, ResponseBody, Transport};
pub use view::{ChatView, ConnectionState};
