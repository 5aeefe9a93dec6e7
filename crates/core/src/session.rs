mod attempt;
mod builder;
mod state;
#[cfg(test)]
mod tests;

use relaychat_actor::{WeakActor, define_actor};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;

use crate::config::SessionConfig;
use crate::error::SubmitError;
use crate::network::NetworkMonitor;
use crate::transport::AskClient;
use crate::typewriter::Typewriter;
use crate::view::{ChatView, SharedView};
pub use builder::ChatSessionBuilder;
use state::{ActiveQuestion, Cancel, NetworkChanged, Submit};

define_actor! {
    /// Owns the question in flight: its attempts, retries and the
    /// typewriter revealing its answer.
    ///
    /// Spawned tasks (attempts, backoff waits) never touch the state
    /// directly. They report back with messages tagged with the token they
    /// were started with, and messages carrying an outdated token are
    /// dropped.
    struct SessionController(SessionState) {
        client: AskClient,
        config: SessionConfig,
        view: SharedView,
        network: NetworkMonitor,
        typewriter: Typewriter,
        active: Option<ActiveQuestion>,
        next_token: u64,
        _network_watch: NetworkWatch,
    }
}

/// A chat session against an answer service.
///
/// At most one question is in flight at a time. Everything a front-end
/// needs to draw is published as a [`ChatView`].
///
/// The session stops once every clone of it has been dropped, or when
/// [`ChatSession::close`] is called.
#[derive(Clone)]
pub struct ChatSession {
    controller: SessionController,
    view: SharedView,
}

impl ChatSession {
    /// Submits a question.
    ///
    /// Blank questions are rejected right away. A question submitted while
    /// another one is in flight is ignored.
    pub fn submit<S: Into<String>>(&self, question: S) -> Result<(), SubmitError> {
        let question = question.into();
        if question.trim().is_empty() {
            return Err(SubmitError::MissingInput);
        }
        self.controller
            .handle()
            .send(Submit(question))
            .map_err(|_| SubmitError::SessionClosed)
    }

    /// Cancels the question in flight, if any.
    pub fn cancel(&self) {
        self.controller.handle().send(Cancel).ok();
    }

    /// Subscribes to view changes.
    #[inline]
    pub fn subscribe(&self) -> watch::Receiver<ChatView> {
        self.view.subscribe()
    }

    /// Returns a snapshot of the current view.
    #[inline]
    pub fn view(&self) -> ChatView {
        self.view.snapshot()
    }

    /// Stops the session. The question in flight, if any, is abandoned.
    #[inline]
    pub fn close(&self) {
        self.controller.handle().try_kill();
    }

    /// Returns whether the session has stopped.
    #[inline]
    pub fn is_closed(&self) -> bool {
        self.controller.handle().is_stopped()
    }
}

impl ChatSession {
    fn spawn_from_builder(builder: ChatSessionBuilder) -> Self {
        let ChatSessionBuilder {
            client,
            config,
            network,
        } = builder;
        let network = network.unwrap_or_else(NetworkMonitor::always_online);

        let view = SharedView::new(ChatView {
            max_retries: config.max_retries,
            network: network.status(),
            ..Default::default()
        });
        let typewriter = Typewriter::new(
            view.clone(),
            config.typing_interval,
            config.chunk_pause,
        );
        let (actor_tx, actor_rx) = oneshot::channel();
        let state = SessionState {
            client,
            config,
            view: view.clone(),
            network: network.clone(),
            typewriter,
            active: None,
            next_token: 1,
            _network_watch: watch_network(actor_rx, network),
        };
        let controller = SessionController::spawn(state, Some("chat-session"));
        actor_tx.send(controller.handle().downgrade()).ok();

        Self { controller, view }
    }
}

/// Forwards network changes to the controller. Dropped with the session
/// state, which aborts the task and releases its monitor.
struct NetworkWatch(JoinHandle<()>);

impl Drop for NetworkWatch {
    fn drop(&mut self) {
        self.0.abort();
    }
}

fn watch_network(
    actor: oneshot::Receiver<WeakActor<SessionState>>,
    mut network: NetworkMonitor,
) -> NetworkWatch {
    NetworkWatch(tokio::spawn(async move {
        let Ok(actor) = actor.await else {
            return;
        };
        while let Some(status) = network.changed().await {
            if actor.send(NetworkChanged(status)).is_err() {
                break;
            }
        }
    }))
}
