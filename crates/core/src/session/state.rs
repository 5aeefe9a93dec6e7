use backoff::ExponentialBackoff;
use backoff::backoff::Backoff;
use relaychat_actor::{Actor, Message};
use tokio::task::JoinHandle;

use super::SessionState;
use super::attempt::{
    AttemptEvent, BackoffEvent, Timeouts, run_attempt, wait_before_retry,
};
use crate::config::PartialReplyPolicy;
use crate::conversation::{ConversationMessage, MessageKind};
use crate::error::AttemptError;
use crate::network::NetworkStatus;
use crate::view::ConnectionState;

/// The question in flight.
pub struct ActiveQuestion {
    question: String,
    retry_count: u32,
    backoff: ExponentialBackoff,
    // The attempt or backoff wait currently running.
    task: Option<TaskToken>,
    // Whether the current attempt has delivered any text.
    received: bool,
}

impl ActiveQuestion {
    #[inline]
    fn is_current(&self, token: u64) -> bool {
        self.task.as_ref().is_some_and(|task| task.id == token)
    }
}

/// A spawned task tied to the question. Dropping it aborts the task.
struct TaskToken {
    id: u64,
    handle: JoinHandle<()>,
}

impl Drop for TaskToken {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

impl SessionState {
    #[inline]
    fn next_token(&mut self) -> u64 {
        let token = self.next_token;
        self.next_token += 1;
        token
    }

    fn submit(&mut self, question: String, handle: &Actor<Self>) {
        if self.active.is_some() {
            warn!("a question is already in flight, ignoring input");
            return;
        }
        if !self.network.status().is_online() {
            self.notify("Network offline.", MessageKind::Error);
            return;
        }

        // The previous answer may still be typing.
        self.typewriter.flush();
        self.view.update(|view| {
            view.transcript.push(ConversationMessage::user(question.as_str()));
            view.transcript
                .push(ConversationMessage::assistant_placeholder());
            view.retry_count = 0;
        });
        self.active = Some(ActiveQuestion {
            question,
            retry_count: 0,
            backoff: self.config.backoff(),
            task: None,
            received: false,
        });
        self.start_attempt(handle);
    }

    fn start_attempt(&mut self, handle: &Actor<Self>) {
        let token = self.next_token();
        let Some(active) = &mut self.active else {
            return;
        };
        active.received = false;
        self.typewriter.start(token);

        let retry_count = active.retry_count;
        self.view.update(|view| {
            view.connection = ConnectionState::Connecting;
            view.retry_count = retry_count;
        });
        debug!(token, attempt = retry_count + 1, "starting attempt");

        let task = tokio::spawn(run_attempt(
            self.client.clone(),
            active.question.clone(),
            Timeouts::from_config(&self.config),
            token,
            handle.downgrade(),
        ));
        active.task = Some(TaskToken {
            id: token,
            handle: task,
        });
    }

    fn on_attempt_event(
        &mut self,
        token: u64,
        event: AttemptEvent,
        handle: &Actor<Self>,
    ) {
        let Some(active) =
            self.active.as_mut().filter(|active| active.is_current(token))
        else {
            trace!(token, "discarding stale attempt event: {event:?}");
            return;
        };

        match event {
            AttemptEvent::Responded => {
                self.view.update(|view| {
                    view.connection = ConnectionState::Streaming;
                });
            }
            AttemptEvent::Chunk(text) => {
                active.received = true;
                self.typewriter.enqueue(text);
            }
            AttemptEvent::Finished(Ok(())) => {
                info!("answer complete");
                self.active = None;
                self.view.update(|view| {
                    view.connection = ConnectionState::Idle;
                    view.retry_count = 0;
                });
            }
            AttemptEvent::Finished(Err(err)) => {
                self.on_attempt_failed(err, handle);
            }
        }
    }

    fn on_attempt_failed(&mut self, err: AttemptError, handle: &Actor<Self>) {
        let Some(active) = &mut self.active else {
            return;
        };
        warn!(attempt = active.retry_count + 1, "attempt failed: {err}");

        let keep_partial = active.received
            && self.config.partial_reply == PartialReplyPolicy::Keep;
        if keep_partial || active.retry_count >= self.config.max_retries {
            self.give_up(err);
            return;
        }

        active.retry_count += 1;
        let retry_count = active.retry_count;
        let delay = active
            .backoff
            .next_backoff()
            .unwrap_or(self.config.initial_backoff);
        let token = self.next_token;
        self.next_token += 1;
        debug!(token, ?delay, "scheduling retry {retry_count}");

        let task = tokio::spawn(wait_before_retry(
            delay,
            self.network.clone(),
            token,
            handle.downgrade(),
        ));
        active.task = Some(TaskToken {
            id: token,
            handle: task,
        });

        self.typewriter.stop();
        self.view.update(|view| {
            view.connection = ConnectionState::Retrying;
            view.retry_count = retry_count;
        });
        self.notify(
            format!("Connection failed, retrying {retry_count}"),
            MessageKind::Warning,
        );
    }

    fn on_backoff_event(
        &mut self,
        token: u64,
        event: BackoffEvent,
        handle: &Actor<Self>,
    ) {
        if !self
            .active
            .as_ref()
            .is_some_and(|active| active.is_current(token))
        {
            trace!(token, "discarding stale backoff event: {event:?}");
            return;
        }

        match event {
            BackoffEvent::WaitingForNetwork => {
                warn!("network offline, holding retry");
                self.notify(
                    "Network offline detected during retry. Waiting for connection...",
                    MessageKind::Warning,
                );
            }
            BackoffEvent::NetworkRestored => {
                self.notify(
                    "Network restored. Continuing...",
                    MessageKind::Info,
                );
            }
            BackoffEvent::Elapsed => self.start_attempt(handle),
        }
    }

    /// Ends the question with an error after the last failed attempt.
    fn give_up(&mut self, err: AttemptError) {
        let Some(active) = self.active.take() else {
            return;
        };
        error!("giving up after {} retries: {err}", active.retry_count);

        if active.received {
            self.typewriter.flush();
        } else {
            self.typewriter.stop();
        }
        self.view.update(|view| {
            view.transcript.remove_empty_assistant_tail();
            view.connection = ConnectionState::Error;
        });
        let message = err.user_message(self.network.status());
        self.notify(message, MessageKind::Error);
    }

    fn cancel(&mut self) {
        let cancelled = self.active.take();
        if cancelled.is_none() && !self.view.is_typing() {
            debug!("nothing to cancel");
            return;
        }
        // Dropping the question aborts its task.
        drop(cancelled);
        info!("question cancelled");

        self.typewriter.stop();
        self.view.update(|view| {
            view.transcript.remove_empty_assistant_tail();
            view.connection = ConnectionState::Idle;
            view.retry_count = 0;
        });
        self.notify("Request cancelled", MessageKind::Info);
    }

    /// Adds a system message. While a question is in flight the message
    /// goes right before its answer, so the answer stays last.
    fn notify<S: Into<String>>(&mut self, text: S, kind: MessageKind) {
        let msg = ConversationMessage::system(text, kind);
        if self.active.is_some() {
            self.view.update(|view| {
                view.transcript.insert_before_assistant_tail(msg);
            });
        } else {
            self.typewriter.flush();
            self.view.update(|view| view.transcript.push(msg));
        }
    }
}

#[derive(Debug)]
pub struct Submit(pub String);

impl Message<SessionState> for Submit {
    fn handle(self, state: &mut SessionState, handle: &Actor<SessionState>) {
        state.submit(self.0, handle);
    }
}

#[derive(Debug)]
pub struct Cancel;

impl Message<SessionState> for Cancel {
    fn handle(self, state: &mut SessionState, _handle: &Actor<SessionState>) {
        state.cancel();
    }
}

#[derive(Debug)]
pub struct NetworkChanged(pub NetworkStatus);

impl Message<SessionState> for NetworkChanged {
    fn handle(self, state: &mut SessionState, _handle: &Actor<SessionState>) {
        debug!("network is now {:?}", self.0);
        state.view.update(|view| view.network = self.0);
    }
}

#[derive(Debug)]
pub struct AttemptUpdate {
    pub token: u64,
    pub event: AttemptEvent,
}

impl Message<SessionState> for AttemptUpdate {
    fn handle(self, state: &mut SessionState, handle: &Actor<SessionState>) {
        state.on_attempt_event(self.token, self.event, handle);
    }
}

#[derive(Debug)]
pub struct BackoffUpdate {
    pub token: u64,
    pub event: BackoffEvent,
}

impl Message<SessionState> for BackoffUpdate {
    fn handle(self, state: &mut SessionState, handle: &Actor<SessionState>) {
        state.on_backoff_event(self.token, self.event, handle);
    }
}
