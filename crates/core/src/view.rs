//! Observable session state.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;

use crate::conversation::Transcript;
use crate::network::NetworkStatus;

/// Lifecycle of the current question.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    /// No question in flight.
    #[default]
    Idle,
    /// Waiting for the server to respond.
    Connecting,
    /// The server responded and the answer is streaming in.
    Streaming,
    /// An attempt failed and another one is scheduled.
    Retrying,
    /// All attempts failed.
    Error,
}

impl ConnectionState {
    /// Returns whether a question is in flight.
    #[inline]
    pub fn is_active(self) -> bool {
        matches!(self, Self::Connecting | Self::Streaming | Self::Retrying)
    }

    /// Returns the banner text for this state, if it has one.
    pub fn status_text(
        self,
        retry_count: u32,
        max_retries: u32,
    ) -> Option<String> {
        let text = match self {
            Self::Idle => return None,
            Self::Connecting => "Connecting...".to_owned(),
            Self::Streaming => "Receiving response...".to_owned(),
            Self::Retrying => {
                format!("Retrying ({retry_count}/{max_retries})...")
            }
            Self::Error => "Connection failed".to_owned(),
        };
        Some(text)
    }
}

/// A snapshot of everything a renderer needs to draw the chat.
#[derive(Clone, Debug, Default, Serialize)]
pub struct ChatView {
    /// The conversation so far.
    pub transcript: Transcript,
    /// Where the current question is in its lifecycle.
    pub connection: ConnectionState,
    /// Retries used by the current question.
    pub retry_count: u32,
    /// Retries allowed per question.
    pub max_retries: u32,
    /// Last known network reachability.
    pub network: NetworkStatus,
    #[serde(skip)]
    pub(crate) render: RenderState,
}

impl ChatView {
    /// Returns whether the answer is still being revealed.
    #[inline]
    pub fn is_typing(&self) -> bool {
        self.render.pending_chunks > 0
    }

    /// Returns whether a new question would be accepted right now.
    #[inline]
    pub fn accepts_input(&self) -> bool {
        !self.connection.is_active() && self.network.is_online()
    }

    /// Returns the status line to show, if any.
    #[inline]
    pub fn status_text(&self) -> Option<String> {
        self.connection
            .status_text(self.retry_count, self.max_retries)
    }
}

/// Bookkeeping for the typewriter, guarded by the view lock so that
/// appends from a stale run can be detected and dropped.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct RenderState {
    /// Identifies the typewriter run allowed to touch the answer. Zero
    /// means none is.
    pub epoch: u64,
    pub pending_chunks: usize,
}

/// The single writer side of the view, shared between the session and its
/// typewriter.
#[derive(Clone, Debug)]
pub(crate) struct SharedView(Arc<watch::Sender<ChatView>>);

impl SharedView {
    pub fn new(view: ChatView) -> Self {
        Self(Arc::new(watch::Sender::new(view)))
    }

    #[inline]
    pub fn subscribe(&self) -> watch::Receiver<ChatView> {
        self.0.subscribe()
    }

    #[inline]
    pub fn is_typing(&self) -> bool {
        self.0.borrow().is_typing()
    }

    #[inline]
    pub fn snapshot(&self) -> ChatView {
        self.0.borrow().clone()
    }

    #[inline]
    pub fn update(&self, f: impl FnOnce(&mut ChatView)) {
        self.0.send_modify(f);
    }

    /// Like [`Self::update`], but only notifies subscribers when `f`
    /// returns `true`.
    #[inline]
    pub fn update_if(&self, f: impl FnOnce(&mut ChatView) -> bool) -> bool {
        self.0.send_if_modified(f)
    }
}
