use std::time::Duration;

use relaychat_actor::WeakActor;
use tokio::time::{sleep, timeout};

use super::SessionState;
use super::state::{AttemptUpdate, BackoffUpdate};
use crate::config::SessionConfig;
use crate::decoder::Utf8Decoder;
use crate::error::AttemptError;
use crate::network::NetworkMonitor;
use crate::transport::{AskClient, next_chunk};

#[derive(Clone, Copy, Debug)]
pub struct Timeouts {
    connect: Duration,
    stream: Duration,
}

impl Timeouts {
    #[inline]
    pub fn from_config(config: &SessionConfig) -> Self {
        Self {
            connect: config.connect_timeout,
            stream: config.stream_timeout,
        }
    }
}

/// Progress of a single attempt.
#[derive(Debug)]
pub enum AttemptEvent {
    /// The server responded with a success status.
    Responded,
    /// Decoded answer text.
    Chunk(String),
    Finished(Result<(), AttemptError>),
}

/// Progress of a wait before a retry.
#[derive(Debug)]
pub enum BackoffEvent {
    WaitingForNetwork,
    NetworkRestored,
    Elapsed,
}

pub async fn run_attempt(
    client: AskClient,
    question: String,
    timeouts: Timeouts,
    token: u64,
    actor: WeakActor<SessionState>,
) {
    let report = |event| actor.send(AttemptUpdate { token, event }).is_ok();
    let result = stream_answer(&client, &question, timeouts, &report).await;
    if let Err(err) = &result {
        debug!(token, "attempt ended with error: {err}");
    }
    report(AttemptEvent::Finished(result));
}

async fn stream_answer(
    client: &AskClient,
    question: &str,
    timeouts: Timeouts,
    report: &impl Fn(AttemptEvent) -> bool,
) -> Result<(), AttemptError> {
    let mut body = timeout(timeouts.connect, client.open(question))
        .await
        .map_err(|_| AttemptError::ConnectTimeout(timeouts.connect))??;
    if !report(AttemptEvent::Responded) {
        // Nobody is listening anymore.
        return Ok(());
    }

    let mut decoder = Utf8Decoder::default();
    let mut received_bytes = 0;
    while let Some(chunk) = timeout(timeouts.stream, next_chunk(&mut body))
        .await
        .map_err(|_| AttemptError::StreamTimeout(timeouts.stream))??
    {
        trace!("received {} bytes", chunk.len());
        received_bytes += chunk.len();
        let text = decoder.decode(&chunk);
        if !text.is_empty() && !report(AttemptEvent::Chunk(text)) {
            return Ok(());
        }
    }

    let rest = decoder.finish();
    if !rest.is_empty() {
        report(AttemptEvent::Chunk(rest));
    }
    if received_bytes == 0 {
        return Err(AttemptError::EmptyBody);
    }
    Ok(())
}

pub async fn wait_before_retry(
    delay: Duration,
    mut network: NetworkMonitor,
    token: u64,
    actor: WeakActor<SessionState>,
) {
    let report = |event| actor.send(BackoffUpdate { token, event }).is_ok();

    sleep(delay).await;
    if !network.status().is_online() {
        if !report(BackoffEvent::WaitingForNetwork) {
            return;
        }
        network.wait_online().await;
        report(BackoffEvent::NetworkRestored);
    }
    report(BackoffEvent::Elapsed);
}
